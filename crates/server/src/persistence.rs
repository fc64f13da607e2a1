//! Chunk persistence in the legacy (pre-flattening) Anvil layout.
//!
//! Snapshots are written to `<world>/region/r.X.Z.mca`. Each section keeps
//! the numeric `Blocks`/`Add`/`Data` arrays plus both light channels, so
//! the files stay readable by old-format tools.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use blockstore_engine::registry::BlockRegistry;
use blockstore_engine::world::{Chunk, ChunkPos, ChunkSnapshot, SectionData};
use fastnbt::{ByteArray, IntArray};
use serde::{Deserialize, Serialize};

use crate::world_store::ChunkStore;

/// DataVersion of the last numeric-id format (1.12.2).
const DATA_VERSION: i32 = 1343;

/// Chunks per region edge.
const REGION_SIZE: i32 = 32;

// ── Chunk NBT structs (serde) ────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Debug)]
struct ChunkNbt {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "Level")]
    level: LevelNbt,
}

#[derive(Serialize, Deserialize, Debug)]
struct LevelNbt {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,
    #[serde(rename = "LastUpdate", default)]
    last_update: i64,
    #[serde(rename = "TerrainPopulated", default)]
    terrain_populated: i8,
    #[serde(rename = "Sections", default)]
    sections: Vec<SectionNbt>,
    #[serde(rename = "HeightMap", default, skip_serializing_if = "Option::is_none")]
    height_map: Option<IntArray>,
}

#[derive(Serialize, Deserialize, Debug)]
struct SectionNbt {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
    #[serde(rename = "Add", default, skip_serializing_if = "Option::is_none")]
    add: Option<ByteArray>,
    #[serde(rename = "Data")]
    data: ByteArray,
    #[serde(rename = "BlockLight")]
    block_light: ByteArray,
    #[serde(rename = "SkyLight")]
    sky_light: ByteArray,
}

fn to_nbt_bytes(bytes: &[u8]) -> ByteArray {
    ByteArray::new(bytes.iter().map(|&b| b as i8).collect())
}

fn from_nbt_bytes(array: ByteArray) -> Vec<u8> {
    array.into_inner().into_iter().map(|b| b as u8).collect()
}

fn snapshot_to_nbt(snapshot: &ChunkSnapshot, last_update: i64) -> ChunkNbt {
    let sections = snapshot
        .sections
        .iter()
        .map(|section| SectionNbt {
            y: section.y as i8,
            blocks: to_nbt_bytes(&section.blocks),
            add: section.add.as_deref().map(to_nbt_bytes),
            data: to_nbt_bytes(&section.data),
            block_light: to_nbt_bytes(&section.block_light),
            sky_light: to_nbt_bytes(&section.sky_light),
        })
        .collect();

    ChunkNbt {
        data_version: DATA_VERSION,
        level: LevelNbt {
            x_pos: snapshot.x,
            z_pos: snapshot.z,
            last_update,
            terrain_populated: 1,
            sections,
            height_map: Some(IntArray::new(snapshot.height_map.clone())),
        },
    }
}

fn nbt_to_snapshot(nbt: ChunkNbt) -> ChunkSnapshot {
    let level = nbt.level;
    let sections = level
        .sections
        .into_iter()
        .map(|section| SectionData {
            y: section.y as u8,
            blocks: from_nbt_bytes(section.blocks),
            add: section.add.map(from_nbt_bytes),
            data: from_nbt_bytes(section.data),
            block_light: from_nbt_bytes(section.block_light),
            sky_light: from_nbt_bytes(section.sky_light),
        })
        .collect();

    ChunkSnapshot {
        x: level.x_pos,
        z: level.z_pos,
        sections,
        // An absent height map comes back empty and is rebuilt on load.
        height_map: level.height_map.map(IntArray::into_inner).unwrap_or_default(),
    }
}

fn region_of(pos: ChunkPos) -> (i32, i32) {
    (pos.x.div_euclid(REGION_SIZE), pos.z.div_euclid(REGION_SIZE))
}

fn region_path(region_dir: &Path, (rx, rz): (i32, i32)) -> PathBuf {
    region_dir.join(format!("r.{rx}.{rz}.mca"))
}

/// Parse `r.X.Z.mca` into region coordinates.
fn parse_region_name(name: &str) -> Option<(i32, i32)> {
    let mut parts = name.strip_suffix(".mca")?.split('.');
    if parts.next()? != "r" {
        return None;
    }
    let rx = parts.next()?.parse().ok()?;
    let rz = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((rx, rz))
}

// ── Save ─────────────────────────────────────────────────────────────────────

/// Write `snapshots` into the region files under `<dir>/region/`.
///
/// Existing region files are updated in place; chunks not in `snapshots`
/// keep whatever was saved before. Returns the number of chunks written.
pub fn save_snapshots(snapshots: &[ChunkSnapshot], dir: &Path, last_update: i64) -> Result<usize> {
    if snapshots.is_empty() {
        tracing::debug!("world save: nothing to save");
        return Ok(0);
    }

    let start = Instant::now();
    let region_dir = dir.join("region");
    fs::create_dir_all(&region_dir)
        .with_context(|| format!("creating {}", region_dir.display()))?;

    let mut regions: HashMap<(i32, i32), Vec<(ChunkPos, Vec<u8>)>> = HashMap::new();
    for snapshot in snapshots {
        let pos = snapshot.pos();
        let bytes = fastnbt::to_bytes(&snapshot_to_nbt(snapshot, last_update))
            .with_context(|| format!("serializing chunk ({}, {})", pos.x, pos.z))?;
        regions.entry(region_of(pos)).or_default().push((pos, bytes));
    }

    let mut written = 0usize;
    for (&(rx, rz), chunks) in &regions {
        let path = region_path(&region_dir, (rx, rz));
        let mut region = if path.exists() {
            let file_bytes =
                fs::read(&path).with_context(|| format!("reading region r.{rx}.{rz}"))?;
            fastanvil::Region::from_stream(Cursor::new(file_bytes))
                .with_context(|| format!("parsing region r.{rx}.{rz}"))?
        } else {
            fastanvil::Region::new(Cursor::new(Vec::new()))
                .with_context(|| format!("creating region r.{rx}.{rz}"))?
        };

        for (pos, bytes) in chunks {
            let local_x = pos.x.rem_euclid(REGION_SIZE) as usize;
            let local_z = pos.z.rem_euclid(REGION_SIZE) as usize;
            region
                .write_chunk(local_x, local_z, bytes)
                .with_context(|| format!("writing chunk ({}, {})", pos.x, pos.z))?;
            written += 1;
        }

        let mut cursor = region.into_inner()?;
        let len = cursor.stream_position()?;
        let data = cursor.into_inner();
        fs::write(&path, &data[..len as usize])
            .with_context(|| format!("writing {}", path.display()))?;
    }

    tracing::info!(
        chunks = written,
        regions = regions.len(),
        elapsed = ?start.elapsed(),
        "world saved"
    );
    Ok(written)
}

// ── Load ─────────────────────────────────────────────────────────────────────

/// Read every stored chunk snapshot under `<dir>/region/`.
///
/// A missing region directory is an empty world.
pub fn load_snapshots(dir: &Path) -> Result<Vec<ChunkSnapshot>> {
    let region_dir = dir.join("region");
    if !region_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(&region_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((rx, rz)) = parse_region_name(name) else {
            tracing::warn!(file = name, "skipping unexpected file in region dir");
            continue;
        };

        let file =
            fs::File::open(&path).with_context(|| format!("opening region file {}", path.display()))?;
        let mut region = fastanvil::Region::from_stream(file)
            .with_context(|| format!("parsing region file {}", path.display()))?;

        for x in 0..REGION_SIZE as usize {
            for z in 0..REGION_SIZE as usize {
                let Some(bytes) = region
                    .read_chunk(x, z)
                    .with_context(|| format!("reading chunk ({x}, {z}) from r.{rx}.{rz}"))?
                else {
                    continue;
                };
                let nbt: ChunkNbt = fastnbt::from_bytes(&bytes)
                    .with_context(|| format!("deserializing chunk ({x}, {z}) from r.{rx}.{rz}"))?;
                if nbt.data_version > DATA_VERSION {
                    tracing::warn!(
                        data_version = nbt.data_version,
                        "chunk ({x}, {z}) in r.{rx}.{rz} is newer than the numeric-id format"
                    );
                }
                snapshots.push(nbt_to_snapshot(nbt));
            }
        }
    }
    Ok(snapshots)
}

/// Load every stored chunk under `<dir>/region/`.
pub fn load_world(registry: &Arc<BlockRegistry>, dir: &Path) -> Result<Vec<Chunk>> {
    let start = Instant::now();
    let chunks = load_snapshots(dir)?
        .iter()
        .map(|snapshot| {
            Chunk::load(Arc::clone(registry), snapshot)
                .with_context(|| format!("loading chunk ({}, {})", snapshot.x, snapshot.z))
        })
        .collect::<Result<Vec<_>>>()?;

    if !chunks.is_empty() {
        tracing::info!(chunks = chunks.len(), elapsed = ?start.elapsed(), "world loaded");
    }
    Ok(chunks)
}

/// Load saved chunks over whatever `store` already holds. Returns the number
/// of chunks loaded.
pub fn load_into(store: &mut ChunkStore, dir: &Path) -> Result<usize> {
    let registry = Arc::clone(store.registry());
    let chunks = load_world(&registry, dir)?;
    let count = chunks.len();
    for chunk in chunks {
        store.insert(chunk);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockSet;
    use blockstore_engine::world::BlockPos;

    fn temp_world(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("blockstore_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn region_names() {
        assert_eq!(parse_region_name("r.0.0.mca"), Some((0, 0)));
        assert_eq!(parse_region_name("r.-1.12.mca"), Some((-1, 12)));
        assert_eq!(parse_region_name("r.1.mca"), None);
        assert_eq!(parse_region_name("r.1.2.3.mca"), None);
        assert_eq!(parse_region_name("level.dat"), None);
        assert_eq!(region_of(ChunkPos::new(-1, 32)), (-1, 1));
    }

    #[test]
    fn nbt_keeps_every_section_array() {
        let blocks = BlockSet::register().unwrap();
        let mut chunk = Chunk::empty(Arc::clone(&blocks.registry), ChunkPos::new(3, -2));
        chunk.set_state(BlockPos::new(50, 20, -30), blocks.water);
        let snapshot = chunk.snapshot();

        let bytes = fastnbt::to_bytes(&snapshot_to_nbt(&snapshot, 7)).unwrap();
        let nbt: ChunkNbt = fastnbt::from_bytes(&bytes).unwrap();
        assert_eq!(nbt.data_version, DATA_VERSION);
        assert_eq!(nbt.level.last_update, 7);
        assert!(nbt.level.sections[0].add.is_none());
        assert_eq!(nbt_to_snapshot(nbt), snapshot);
    }

    #[test]
    fn save_then_load_round_trips() {
        let blocks = BlockSet::register().unwrap();
        let mut chunk = Chunk::empty(Arc::clone(&blocks.registry), ChunkPos::new(0, 0));
        for x in 0..16 {
            for z in 0..16 {
                chunk.set_state(BlockPos::new(x, 60, z), blocks.bedrock);
                chunk.set_state(BlockPos::new(x, 61, z), blocks.stone);
            }
        }
        let torch = blocks.facing(blocks.torch, blockstore_engine::state::Facing::West).unwrap();
        chunk.set_state(BlockPos::new(4, 62, 4), torch);

        let dir = temp_world("round_trip");
        assert_eq!(save_snapshots(&[chunk.snapshot()], &dir, 0).unwrap(), 1);
        assert!(dir.join("region/r.0.0.mca").exists());

        let loaded = load_world(&blocks.registry, &dir).unwrap();
        assert_eq!(loaded.len(), 1);
        let back = &loaded[0];
        assert_eq!(back.state(BlockPos::new(9, 60, 9)), blocks.bedrock);
        assert_eq!(back.state(BlockPos::new(4, 62, 4)), torch);
        assert_eq!(back.height(4, 4), 62);
        assert_eq!(back.snapshot(), chunk.snapshot());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn incremental_save_keeps_untouched_chunks() {
        let blocks = BlockSet::register().unwrap();
        let mut store = ChunkStore::new(Arc::clone(&blocks.registry));
        store.set_state(BlockPos::new(0, 60, 0), blocks.stone);
        store.set_state(BlockPos::new(-16, 60, 0), blocks.dirt);

        let dir = temp_world("incremental");
        let saved = save_snapshots(&store.take_dirty_snapshots(), &dir, 1).unwrap();
        assert_eq!(saved, 2);

        store.set_state(BlockPos::new(1, 60, 0), blocks.bedrock);
        let saved = save_snapshots(&store.take_dirty_snapshots(), &dir, 2).unwrap();
        assert_eq!(saved, 1);

        let mut reloaded = ChunkStore::new(Arc::clone(&blocks.registry));
        assert_eq!(load_into(&mut reloaded, &dir).unwrap(), 2);
        assert_eq!(reloaded.dirty_count(), 0);
        assert_eq!(reloaded.state(BlockPos::new(0, 60, 0)), blocks.stone);
        assert_eq!(reloaded.state(BlockPos::new(1, 60, 0)), blocks.bedrock);
        assert_eq!(reloaded.state(BlockPos::new(-16, 60, 0)), blocks.dirt);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_region_dir_is_empty_world() {
        let blocks = BlockSet::register().unwrap();
        let dir = temp_world("missing");
        assert!(load_world(&blocks.registry, &dir).unwrap().is_empty());
    }
}
