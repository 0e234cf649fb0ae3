use std::collections::HashSet;

use crate::scheduler::job::{JobId, Shape};

/// Grid coordinates of a cell. Signed so that off-grid drag targets can be
/// expressed and rejected by bounds checks rather than by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

/// Fixed-size occupancy matrix. Each cell is either empty or holds the id of
/// the placed job covering it.
///
/// The grid is a plain data structure: it does not synchronize and it does not
/// touch job lifecycle state. The scheduler drives it from inside its own
/// critical section and keeps cells consistent with the job registry.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Option<JobId>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        Self {
            width,
            height,
            cells: vec![None; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height
    }

    pub fn get(&self, pos: GridPos) -> Option<JobId> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells[self.index(pos.x as usize, pos.y as usize)]
    }

    /// True when every set cell of `shape`, anchored at (x, y), maps onto an
    /// in-bounds empty cell. Checking stops at the first violation.
    pub fn can_place(&self, shape: &Shape, x: i32, y: i32) -> bool {
        for (dx, dy) in shape.offsets() {
            let pos = GridPos {
                x: x + dx as i32,
                y: y + dy as i32,
            };
            if !self.in_bounds(pos) || self.get(pos).is_some() {
                return false;
            }
        }
        true
    }

    /// Mark every set cell of `shape` with `id`. Callers must have validated
    /// with [`can_place`](Grid::can_place) inside the same critical section.
    pub(crate) fn occupy(&mut self, shape: &Shape, x: i32, y: i32, id: JobId) {
        debug_assert!(self.can_place(shape, x, y));
        for (dx, dy) in shape.offsets() {
            let i = self.index((x + dx as i32) as usize, (y + dy as i32) as usize);
            self.cells[i] = Some(id);
        }
    }

    /// Clear every cell currently attributed to `id`. Returns the number of
    /// cells released.
    pub(crate) fn vacate(&mut self, id: JobId) -> usize {
        let mut released = 0;
        for cell in &mut self.cells {
            if *cell == Some(id) {
                *cell = None;
                released += 1;
            }
        }
        released
    }

    /// Cells belonging to every fully-occupied row and fully-occupied column,
    /// each cell included once. Pure predicate over the current grid state.
    pub fn completed_cells(&self) -> Vec<GridPos> {
        let mut seen = HashSet::new();
        let mut cells = Vec::new();

        for y in 0..self.height {
            if (0..self.width).all(|x| self.cells[self.index(x, y)].is_some()) {
                for x in 0..self.width {
                    let pos = GridPos {
                        x: x as i32,
                        y: y as i32,
                    };
                    if seen.insert(pos) {
                        cells.push(pos);
                    }
                }
            }
        }
        for x in 0..self.width {
            if (0..self.height).all(|y| self.cells[self.index(x, y)].is_some()) {
                for y in 0..self.height {
                    let pos = GridPos {
                        x: x as i32,
                        y: y as i32,
                    };
                    if seen.insert(pos) {
                        cells.push(pos);
                    }
                }
            }
        }
        cells
    }

    /// Number of cells currently attributed to `id`.
    pub fn occupied_cells(&self, id: JobId) -> usize {
        self.cells.iter().filter(|&&c| c == Some(id)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|c| c.is_none())
    }

    /// Row-major deep copy, safe to hand to readers outside the lock.
    pub fn snapshot(&self) -> Vec<Vec<Option<JobId>>> {
        (0..self.height)
            .map(|y| (0..self.width).map(|x| self.cells[self.index(x, y)]).collect())
            .collect()
    }
}
