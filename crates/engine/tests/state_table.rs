//! Registration, interning and dense id behavior through the public API,
//! using a small synthetic block set.

use std::collections::HashSet;
use std::sync::Arc;

use blockstore_engine::error::{RegistryError, StateError};
use blockstore_engine::registry::{BasicBlock, BlockId, BlockRegistry, DenseStateId};
use blockstore_engine::state::{Facing, Property, StateRef, StateView};

struct Props {
    facing: Property<Facing>,
    powered: Property<bool>,
    level: Property<i32>,
}

fn registry() -> (Arc<BlockRegistry>, Props) {
    let props = Props {
        facing: Property::new("facing", Facing::HORIZONTAL).unwrap(),
        powered: Property::boolean("powered"),
        level: Property::int_range("level", 0, 2).unwrap(),
    };
    let mut builder = BlockRegistry::builder();
    builder.register(0, "air", &[], BasicBlock::air()).unwrap();
    builder.register(1, "stone", &[], BasicBlock::solid()).unwrap();
    builder
        .register(50, "torch", &[props.facing.erased()], BasicBlock::transparent().with_light(14))
        .unwrap();
    builder
        .register(
            69,
            "lever",
            &[props.facing.erased(), props.powered.erased(), props.level.erased()],
            BasicBlock::transparent(),
        )
        .unwrap();
    (builder.build().unwrap(), props)
}

fn default_of<'r>(registry: &'r BlockRegistry, name: &str) -> StateRef<'r> {
    registry.block_by_name(name).unwrap().default_state()
}

// ---------------------------------------------------------------------------
// StateTable generation
// ---------------------------------------------------------------------------

#[test]
fn state_count_is_product_of_domains() {
    let (registry, _) = registry();
    let lever = registry.block_by_name("lever").unwrap();
    assert_eq!(lever.table().len(), 4 * 2 * 3);

    let combos: HashSet<Vec<u16>> = (0..lever.table().len())
        .map(|i| lever.table().combination(i).to_vec())
        .collect();
    assert_eq!(combos.len(), 24);
    assert_eq!(registry.state_count(), 1 + 1 + 4 + 24);
}

#[test]
fn default_state_is_first_value_of_every_property() {
    let (registry, props) = registry();
    let lever = default_of(&registry, "lever");
    assert_eq!(lever.local_index(), 0);
    assert_eq!(lever.value(&props.facing), Ok(Facing::North));
    assert_eq!(lever.value(&props.powered), Ok(false));
    assert_eq!(lever.value(&props.level), Ok(0));
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[test]
fn with_current_value_is_identity() {
    let (registry, props) = registry();
    for state in registry.block_by_name("lever").unwrap().states() {
        let facing = state.value(&props.facing).unwrap();
        assert_eq!(state.with(&props.facing, facing).unwrap(), state);
        let level = state.value(&props.level).unwrap();
        assert_eq!(state.with(&props.level, level).unwrap(), state);
    }
}

#[test]
fn with_then_restore_returns_same_state() {
    let (registry, props) = registry();
    for state in registry.block_by_name("lever").unwrap().states() {
        let original = state.value(&props.level).unwrap();
        for &level in props.level.values() {
            let changed = state.with(&props.level, level).unwrap();
            assert_eq!(changed.value(&props.level), Ok(level));
            assert_eq!(changed.value(&props.facing), state.value(&props.facing));
            assert_eq!(changed.with(&props.level, original).unwrap(), state);
        }
    }
}

#[test]
fn out_of_domain_values_are_contract_violations() {
    let (registry, props) = registry();
    let lever = default_of(&registry, "lever");
    assert!(matches!(
        lever.with(&props.facing, Facing::Up),
        Err(StateError::DisallowedValue { .. })
    ));
    assert!(matches!(
        lever.with(&props.level, 3),
        Err(StateError::DisallowedValue { .. })
    ));

    let stone = default_of(&registry, "stone");
    assert!(matches!(
        stone.with(&props.powered, true),
        Err(StateError::UnknownProperty { .. })
    ));

    // same name, different axis
    let impostor = Property::boolean("powered");
    assert!(matches!(
        lever.with(&impostor, true),
        Err(StateError::UnknownProperty { .. })
    ));
}

#[test]
fn torch_facing_transitions_are_interned() {
    let (registry, props) = registry();
    let torch = registry.block_by_name("torch").unwrap();
    assert_eq!(torch.states().count(), 4);

    let default = torch.default_state();
    let via_east = default
        .with(&props.facing, Facing::East)
        .unwrap()
        .with(&props.facing, Facing::North)
        .unwrap();
    let direct = default.with(&props.facing, Facing::North).unwrap();
    assert_eq!(via_east, direct);
    assert_eq!(via_east.handle(), direct.handle());
    assert_eq!(direct.to_string(), "torch[facing=north]");
}

#[test]
fn cycle_visits_every_value() {
    let (registry, props) = registry();
    let start = default_of(&registry, "lever");
    let mut state = start;
    let mut seen = Vec::new();
    for _ in 0..3 {
        state = state.cycle(&props.level).unwrap();
        seen.push(state.value(&props.level).unwrap());
    }
    assert_eq!(seen, [1, 2, 0]);
    assert_eq!(state, start);
}

// ---------------------------------------------------------------------------
// Detached states
// ---------------------------------------------------------------------------

#[test]
fn detached_and_interned_agree() {
    let (registry, props) = registry();
    let interned = default_of(&registry, "lever")
        .with(&props.powered, true)
        .unwrap()
        .with(&props.facing, Facing::West)
        .unwrap();

    let detached = default_of(&registry, "lever")
        .detach()
        .with(&props.powered, true)
        .unwrap()
        .with_named("facing", "west")
        .unwrap();
    assert_eq!(detached, interned.detach());
    assert_eq!(registry.intern(&detached), Ok(interned.handle()));
}

#[test]
fn intern_rejects_foreign_layout() {
    let (registry, props) = registry();
    let foreign = blockstore_engine::state::DetachedState::new(BlockId(50), "torch", vec![props.powered.erased()]);
    assert!(matches!(registry.intern(&foreign), Err(StateError::LayoutMismatch(_))));
}

// ---------------------------------------------------------------------------
// GlobalStateIndex
// ---------------------------------------------------------------------------

#[test]
fn dense_ids_round_trip_for_exact_metadata() {
    let (registry, _) = registry();
    for block in ["air", "stone", "torch"] {
        for state in registry.block_by_name(block).unwrap().states() {
            let id = state.dense_id();
            assert_eq!(id.block(), state.block().id());
            assert_eq!(registry.state_by_id(id, registry.default_state()), state.handle());
        }
    }
}

#[test]
fn lossy_metadata_still_decodes_to_same_block() {
    let (registry, _) = registry();
    let lever = registry.block_by_name("lever").unwrap();
    for state in lever.states() {
        let decoded = registry.state_by_id(state.dense_id(), registry.default_state());
        assert_eq!(registry.block_of(decoded), lever.id());
    }
}

#[test]
fn unknown_ids_return_the_supplied_default() {
    let (registry, _) = registry();
    let stone = default_of(&registry, "stone").handle();
    let missing = DenseStateId::new(BlockId(400), 2);
    assert_eq!(registry.state_by_id(missing, stone), stone);
    assert_eq!(registry.resolve(missing), None);
    // stone has a single state, so metadata 5 means nothing
    assert_eq!(registry.state_by_id(DenseStateId::new(BlockId(1), 5), stone), stone);
    assert_eq!(registry.resolve(DenseStateId::new(BlockId(1), 5)), None);
}

// ---------------------------------------------------------------------------
// Registration errors
// ---------------------------------------------------------------------------

#[test]
fn registry_requires_default_block() {
    let mut builder = BlockRegistry::builder();
    builder.register(1, "stone", &[], BasicBlock::solid()).unwrap();
    assert_eq!(builder.build().unwrap_err(), RegistryError::MissingDefault);
}

#[test]
fn duplicate_registrations_fail() {
    let mut builder = BlockRegistry::builder();
    builder.register(0, "air", &[], BasicBlock::air()).unwrap();
    assert_eq!(
        builder.register(0, "void", &[], BasicBlock::air()),
        Err(RegistryError::DuplicateId(0))
    );
    assert_eq!(
        builder.register(2, "air", &[], BasicBlock::air()),
        Err(RegistryError::DuplicateName("air".into()))
    );
    assert_eq!(
        builder.register(4096, "huge", &[], BasicBlock::solid()),
        Err(RegistryError::IdOutOfRange(4096))
    );
}
