//! Battle grid and reachable-area expansion

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::MAP_SIZE;
use crate::data::BattleMap;
use crate::data::battle::terrain_blocks;

bitflags! {
    /// Per-cell state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        /// Terrain or a building stops movement and range
        const BLOCKED = 0x01;
        /// Inside the currently marked selectable area
        const IN_AREA = 0x02;
        /// Under the selection cursor
        const CURSOR  = 0x04;
    }
}

/// A combatant standing on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    /// Index into the battle roster
    pub index: usize,
    pub side: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Terrain and building texture ids
    pub earth: i16,
    pub building: i16,
    pub flags: CellFlags,
    pub occupant: Option<Occupant>,
}

impl Cell {
    pub fn is_blocked(&self) -> bool {
        self.flags.contains(CellFlags::BLOCKED)
    }
}

/// One cell of a reachable area.
///
/// Cells reached by walking have `moves >= 0` and `ranges == 0`; cells
/// only reached by extending range from a walkable cell have `moves == -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCell {
    pub moves: i32,
    pub ranges: i32,
    pub move_parent: Option<(i32, i32)>,
    pub range_parent: Option<(i32, i32)>,
}

impl AreaCell {
    pub fn is_walkable(&self) -> bool {
        self.moves >= 0
    }
}

pub type Area = BTreeMap<(i32, i32), AreaCell>;

const MOVE_NEIGHBORS: [(i32, i32); 4] = [(0, -1), (1, 0), (-1, 0), (0, 1)];
const RANGE_NEIGHBORS: [(i32, i32); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Empty grid with no blocked cells.
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width.max(0) * height.max(0)) as usize],
        }
    }

    /// Build the grid from a battle map's two layers.
    pub fn from_map(map: &BattleMap) -> Self {
        let size = MAP_SIZE as i32;
        let mut grid = Self::open(size, size);
        for (index, cell) in grid.cells.iter_mut().enumerate() {
            let (earth, building) = map.textures(index);
            cell.earth = earth;
            cell.building = building;
            if building > 0 || terrain_blocks(earth) {
                cell.flags.insert(CellFlags::BLOCKED);
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&y)
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y).then(|| (y * self.width + x) as usize)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).and_then(|i| self.cells.get(i))
    }

    pub fn cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        self.index(x, y).and_then(|i| self.cells.get_mut(i))
    }

    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_none_or(Cell::is_blocked)
    }

    pub fn set_blocked(&mut self, x: i32, y: i32, blocked: bool) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.flags.set(CellFlags::BLOCKED, blocked);
        }
    }

    pub fn occupant(&self, x: i32, y: i32) -> Option<Occupant> {
        self.cell(x, y).and_then(|c| c.occupant)
    }

    pub fn set_occupant(&mut self, x: i32, y: i32, occupant: Option<Occupant>) {
        if let Some(cell) = self.cell_mut(x, y) {
            cell.occupant = occupant;
        }
    }

    /// Whether some neighbor of `(x, y)` holds a combatant of `side`.
    fn next_to_side(&self, x: i32, y: i32, side: u8) -> bool {
        MOVE_NEIGHBORS
            .iter()
            .any(|(dx, dy)| self.occupant(x + dx, y + dy).is_some_and(|o| o.side == side))
    }

    /// Cells reachable from `origin` within `steps` moves, then within
    /// `ranges` more cells of reach from any of them.
    ///
    /// Walking stops at blocked or occupied cells. Reach only stops at
    /// blocked cells. With `zone_of_control`, a cell (the origin included)
    /// next to a combatant of `side` is reached but not expanded further.
    pub fn reachable(&self, origin: (i32, i32), side: u8, steps: i32, ranges: i32, zone_of_control: bool) -> Area {
        let mut area = Area::new();
        let mut heap = BinaryHeap::new();
        area.insert(
            origin,
            AreaCell {
                moves: 0,
                ranges: 0,
                move_parent: None,
                range_parent: None,
            },
        );
        if steps > 0 {
            heap.push(Reverse((0, origin.1, origin.0)));
        }
        while let Some(Reverse((moves, y, x))) = heap.pop() {
            if zone_of_control && self.next_to_side(x, y, side) {
                continue;
            }
            for (dx, dy) in MOVE_NEIGHBORS {
                let next = (x + dx, y + dy);
                if area.contains_key(&next) {
                    continue;
                }
                match self.cell(next.0, next.1) {
                    Some(cell) if !cell.is_blocked() && cell.occupant.is_none() => {}
                    _ => continue,
                }
                area.insert(
                    next,
                    AreaCell {
                        moves: moves + 1,
                        ranges: 0,
                        move_parent: Some((x, y)),
                        range_parent: None,
                    },
                );
                if moves + 1 < steps {
                    heap.push(Reverse((moves + 1, next.1, next.0)));
                }
            }
        }
        if ranges <= 0 {
            return area;
        }
        let mut heap: BinaryHeap<_> = area.keys().map(|&(x, y)| Reverse((0, y, x))).collect();
        while let Some(Reverse((reach, y, x))) = heap.pop() {
            for (dx, dy) in RANGE_NEIGHBORS {
                let next = (x + dx, y + dy);
                if area.contains_key(&next) || self.is_blocked(next.0, next.1) {
                    continue;
                }
                area.insert(
                    next,
                    AreaCell {
                        moves: -1,
                        ranges: reach + 1,
                        move_parent: None,
                        range_parent: Some((x, y)),
                    },
                );
                if reach + 1 < ranges {
                    heap.push(Reverse((reach + 1, next.1, next.0)));
                }
            }
        }
        area
    }

    /// Mark `area` as selectable and put the cursor on `cursor`.
    pub fn mark(&mut self, area: &Area, cursor: (i32, i32)) {
        self.unmark();
        for &(x, y) in area.keys() {
            if let Some(cell) = self.cell_mut(x, y) {
                cell.flags.insert(CellFlags::IN_AREA);
            }
        }
        self.move_cursor(cursor);
    }

    pub fn move_cursor(&mut self, cursor: (i32, i32)) {
        for cell in &mut self.cells {
            cell.flags.remove(CellFlags::CURSOR);
        }
        if let Some(cell) = self.cell_mut(cursor.0, cursor.1) {
            cell.flags.insert(CellFlags::CURSOR);
        }
    }

    pub fn unmark(&mut self) {
        for cell in &mut self.cells {
            cell.flags.remove(CellFlags::IN_AREA | CellFlags::CURSOR);
        }
    }

    pub fn is_marked(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_some_and(|c| c.flags.contains(CellFlags::IN_AREA))
    }
}

/// Walking path to `target`, target first and the origin last.
pub fn path_to(area: &Area, target: (i32, i32)) -> Vec<(i32, i32)> {
    let mut path = Vec::new();
    let mut current = Some(target);
    while let Some(pos) = current {
        let Some(cell) = area.get(&pos) else {
            break;
        };
        path.push(pos);
        current = cell.move_parent;
    }
    path
}

/// Cell an action aimed at `pos` is launched from: the previous step for
/// a walked cell, the origin for the origin, else the nearest walked cell
/// back along the reach chain.
pub fn launch_cell(area: &Area, pos: (i32, i32)) -> Option<(i32, i32)> {
    let start = area.get(&pos)?;
    if start.moves > 0 {
        return start.move_parent;
    }
    let mut current = pos;
    loop {
        let cell = area.get(&current)?;
        if cell.is_walkable() {
            return Some(current);
        }
        current = cell.range_parent?;
    }
}

pub fn manhattan(a: (i32, i32), b: (i32, i32)) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}
