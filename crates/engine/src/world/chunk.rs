use super::block::Cell;
use super::position::LocalBlockPos;
use std::collections::HashMap;

/// Blocks along each axis of a section.
const SECTION_SIZE: usize = 16;
const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

/// 16x16x16 cells, y outermost and x innermost, plus a count of the
/// non-empty ones so the chunk knows when to drop the section.
#[derive(Clone)]
struct Section {
    cells: Box<[Cell; SECTION_VOLUME]>,
    occupied: u16,
}

impl Section {
    fn new() -> Self {
        Self {
            cells: Box::new([Cell::EMPTY; SECTION_VOLUME]),
            occupied: 0,
        }
    }

    #[inline]
    const fn index(x: u8, y: u8, z: u8) -> usize {
        (y as usize) * SECTION_SIZE * SECTION_SIZE + (z as usize) * SECTION_SIZE + (x as usize)
    }

    #[inline]
    fn get(&self, x: u8, y: u8, z: u8) -> Cell {
        self.cells[Self::index(x, y, z)]
    }

    /// Returns true if the section holds nothing afterwards.
    fn set(&mut self, x: u8, y: u8, z: u8, cell: Cell) -> bool {
        let slot = &mut self.cells[Self::index(x, y, z)];
        match (slot.is_empty(), cell.is_empty()) {
            (true, false) => self.occupied += 1,
            (false, true) => self.occupied -= 1,
            _ => {}
        }
        *slot = cell;
        self.occupied == 0
    }
}

/// A column of sections keyed by `y >> 4`. Sections holding only empty
/// cells are not stored.
#[derive(Clone, Default)]
pub struct Chunk {
    sections: HashMap<i32, Section>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_cell(&self, pos: LocalBlockPos) -> Cell {
        match self.sections.get(&pos.section_index()) {
            Some(section) => section.get(pos.x, pos.section_local_y(), pos.z),
            None => Cell::EMPTY,
        }
    }

    pub fn set_cell(&mut self, pos: LocalBlockPos, cell: Cell) {
        let idx = pos.section_index();
        let y = pos.section_local_y();
        if cell.is_empty() {
            let drained = self
                .sections
                .get_mut(&idx)
                .is_some_and(|section| section.set(pos.x, y, pos.z, cell));
            if drained {
                self.sections.remove(&idx);
            }
        } else {
            self.sections
                .entry(idx)
                .or_insert_with(Section::new)
                .set(pos.x, y, pos.z, cell);
        }
    }

    /// Set every cell of the horizontal layer at `y`.
    pub fn fill_layer(&mut self, y: i64, cell: Cell) {
        for x in 0..SECTION_SIZE as u8 {
            for z in 0..SECTION_SIZE as u8 {
                self.set_cell(LocalBlockPos { x, y, z }, cell);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
