use super::{COLUMN_HEIGHT, Chunk, SkyRelight, UNKNOWN_PRECIPITATION};
use crate::state::Facing;
use crate::world::LightChannel;
use crate::world::position::BlockPos;
use crate::world::section::SECTION_SIZE;

#[inline]
const fn column(x: usize, z: usize) -> usize {
    (z << 4) | x
}

impl Chunk {
    /// First Y whose block below has non-zero opacity; 0 for an open column.
    pub fn height(&self, x: usize, z: usize) -> i32 {
        self.height_map[column(x, z)]
    }

    /// Smallest entry of the height map.
    pub fn lowest_height(&self) -> i32 {
        self.lowest_height
    }

    pub fn height_map(&self) -> &[i32] {
        &self.height_map
    }

    pub fn can_see_sky(&self, pos: BlockPos) -> bool {
        let local = pos.local();
        local.y >= self.height_map[local.column()]
    }

    fn opacity_at(&self, x: usize, y: i32, z: usize) -> u8 {
        self.registry.light_opacity(self.state_at(x, y, z))
    }

    fn set_sky_if_present(&mut self, x: usize, y: i32, z: usize, value: u8) {
        if !(0..COLUMN_HEIGHT).contains(&y) {
            return;
        }
        if let Some(section) = self.sections[(y >> 4) as usize].as_mut() {
            section.set_sky_light(x, (y & 0xF) as usize, z, value);
        }
    }

    /// Scan one column downward from the top filled segment for its height.
    fn scan_height(&self, x: usize, z: usize) -> i32 {
        let top = self.top_filled_segment() + SECTION_SIZE as i32;
        (1..=top)
            .rev()
            .find(|&y| self.opacity_at(x, y - 1, z) != 0)
            .unwrap_or(0)
    }

    /// Recompute every column height without touching light.
    pub fn generate_height_map(&mut self) {
        let mut lowest = i32::MAX;
        for z in 0..SECTION_SIZE {
            for x in 0..SECTION_SIZE {
                let height = self.scan_height(x, z);
                self.height_map[column(x, z)] = height;
                self.precipitation[column(x, z)] = UNKNOWN_PRECIPITATION;
                lowest = lowest.min(height);
            }
        }
        self.lowest_height = lowest;
        self.modified = true;
    }

    /// Recompute heights and the whole sky light map from the blocks.
    pub fn generate_sky_light_map(&mut self) {
        self.generate_height_map();
        let top = self.top_filled_segment();
        for z in 0..SECTION_SIZE {
            for x in 0..SECTION_SIZE {
                self.sky_column(x, z, top);
            }
        }
    }

    /// Re-run the sky walk for local column `(x, z)`.
    pub fn check_sky_column(&mut self, x: usize, z: usize) {
        let top = self.top_filled_segment();
        self.sky_column(x, z, top);
        self.modified = true;
    }

    /// Walk down from the top of the column spending light on each cell.
    ///
    /// A transparent cell still costs 1 once light has dropped below 15; the
    /// walk stops when light runs out or it reaches y = 0.
    fn sky_column(&mut self, x: usize, z: usize, top: i32) {
        // zeroed first, so cells below where the walk ends read 0
        for section in self.sections.iter_mut().flatten() {
            for y in 0..SECTION_SIZE {
                section.set_sky_light(x, y, z, 0);
            }
        }
        let mut light: i32 = 15;
        let mut y = top + SECTION_SIZE as i32 - 1;
        loop {
            let mut cost = self.opacity_at(x, y, z) as i32;
            if cost == 0 && light != 15 {
                cost = 1;
            }
            light -= cost;
            if light > 0 {
                self.set_sky_if_present(x, y, z, light as u8);
            }
            y -= 1;
            if y <= 0 || light <= 0 {
                break;
            }
        }
    }

    /// Repair a column after the cell at `y - 1` changed opacity.
    pub(super) fn relight_column(&mut self, x: usize, y: i32, z: usize) {
        let index = column(x, z);
        let old = self.height_map[index];
        let mut height = old.max(y);
        while height > 0 && self.opacity_at(x, height - 1, z) == 0 {
            height -= 1;
        }
        if height == old {
            return;
        }
        self.height_map[index] = height;

        let (fill, span) = if height < old { (15, height..old) } else { (0, old..height) };
        for cell in span.clone() {
            self.set_sky_if_present(x, cell, z, fill);
        }
        let mut light: i32 = 15;
        let mut walk = height;
        while walk > 0 && light > 0 {
            walk -= 1;
            let cost = self.opacity_at(x, walk, z).max(1) as i32;
            light = (light - cost).max(0);
            self.set_sky_if_present(x, walk, z, light as u8);
        }

        self.lowest_height = self.lowest_height.min(height);
        let origin = self.pos.block_at(x, 0, z);
        for facing in Facing::HORIZONTAL {
            let neighbor = origin.offset(facing);
            self.queue_sky_relight(neighbor.x, neighbor.z, span.start, span.end);
        }
        self.queue_sky_relight(origin.x, origin.z, span.start, span.end);
        self.modified = true;
    }

    fn queue_sky_relight(&mut self, x: i32, z: i32, y_start: i32, y_end: i32) {
        if y_end > y_start {
            self.relights.push(SkyRelight {
                x,
                z,
                y_start,
                y_end,
            });
        }
    }

    pub(super) fn mark_gap(&mut self, column: usize) {
        self.gaps[column] = true;
        self.gap_check = true;
    }

    /// Whether any column waits for a gap recheck.
    pub fn has_gaps(&self) -> bool {
        self.gap_check
    }

    /// Turn flagged columns into [`SkyRelight`] requests.
    ///
    /// A column is compared with the lowest height of its neighbours, and
    /// each neighbour with the column. Neighbours outside this chunk are
    /// assumed to sit at this chunk's lowest height.
    pub fn recheck_gaps(&mut self) {
        for z in 0..SECTION_SIZE {
            for x in 0..SECTION_SIZE {
                let index = column(x, z);
                if !std::mem::take(&mut self.gaps[index]) {
                    continue;
                }
                let height = self.height_map[index];
                let lowest = self.lowest_height;
                let origin = self.pos.block_at(x, 0, z);
                self.check_neighbor_height(origin.x, origin.z, height, lowest);
                for facing in Facing::HORIZONTAL {
                    let neighbor = origin.offset(facing);
                    let there = self.known_height(neighbor).unwrap_or(lowest);
                    self.check_neighbor_height(neighbor.x, neighbor.z, there, height);
                }
            }
        }
        self.gap_check = false;
    }

    fn known_height(&self, pos: BlockPos) -> Option<i32> {
        (pos.chunk() == self.pos).then(|| self.height_map[pos.local().column()])
    }

    fn check_neighbor_height(&mut self, x: i32, z: i32, height: i32, max_value: i32) {
        if height > max_value {
            self.queue_sky_relight(x, z, max_value, height + 1);
        } else if height < max_value {
            self.queue_sky_relight(x, z, height, max_value + 1);
        }
    }

    /// Drain queued sky relight requests.
    pub fn take_sky_relights(&mut self) -> Vec<SkyRelight> {
        std::mem::take(&mut self.relights)
    }

    pub fn light_for(&self, channel: LightChannel, pos: BlockPos) -> u8 {
        let local = pos.local();
        if local.y < 0 {
            return 0;
        }
        if local.y >= COLUMN_HEIGHT {
            return channel.default_value();
        }
        let (x, y, z) = (local.x as usize, local.section_local_y() as usize, local.z as usize);
        match (self.sections[local.section_index() as usize].as_ref(), channel) {
            (None, _) if self.can_see_sky(pos) => channel.default_value(),
            (None, _) => 0,
            (Some(section), LightChannel::Sky) => section.sky_light(x, y, z),
            (Some(section), LightChannel::Block) => section.block_light(x, y, z),
        }
    }

    /// Store a light value, allocating the section if needed. A new section
    /// triggers a full sky light regeneration before the write.
    pub fn set_light_for(&mut self, channel: LightChannel, pos: BlockPos, value: u8) {
        let local = pos.local();
        if !(0..COLUMN_HEIGHT).contains(&local.y) {
            return;
        }
        let band = local.section_index() as usize;
        if self.sections[band].is_none() {
            self.sections[band] = Some(crate::world::section::SectionStorage::new(
                std::sync::Arc::clone(&self.registry),
                band as u8,
            ));
            self.generate_sky_light_map();
        }
        self.modified = true;
        let (x, y, z) = (local.x as usize, local.section_local_y() as usize, local.z as usize);
        if let Some(section) = self.sections[band].as_mut() {
            match channel {
                LightChannel::Sky => section.set_sky_light(x, y, z, value),
                LightChannel::Block => section.set_block_light(x, y, z, value),
            }
        }
    }

    /// Sky light minus `amount`, or block light if that is brighter.
    pub fn light_subtracted(&self, pos: BlockPos, amount: u8) -> u8 {
        let local = pos.local();
        let sky = LightChannel::Sky.default_value();
        let section = self.section_at(local.y);
        match section {
            None => sky.saturating_sub(amount),
            Some(section) => {
                let (x, y, z) = (local.x as usize, local.section_local_y() as usize, local.z as usize);
                section
                    .sky_light(x, y, z)
                    .saturating_sub(amount)
                    .max(section.block_light(x, y, z))
            }
        }
    }

    /// First Y above the highest cell that stops rain, or -1 if none does.
    /// Computed lazily and cached until a write at or above it.
    pub fn precipitation_height(&mut self, x: usize, z: usize) -> i32 {
        let index = column(x, z);
        if self.precipitation[index] == UNKNOWN_PRECIPITATION {
            let top = self.top_filled_segment() + SECTION_SIZE as i32 - 1;
            let height = (1..=top)
                .rev()
                .find(|&y| self.registry.blocks_precipitation(self.state_at(x, y, z)))
                .map_or(-1, |y| y + 1);
            self.precipitation[index] = height;
        }
        self.precipitation[index]
    }
}
