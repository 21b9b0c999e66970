//! Grid Space
//!
//! Fixed-size 2-D grid of cells, bounded or toroidal, with optional per-cell capacity.

use indexmap::IndexSet;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;

use abm_snapshot::{PositionRecord, SpaceKind, SpaceSummary};

use super::{Neighborhood, Selection, SpaceError, SpatialIndex};
use crate::agent::AgentId;
use crate::config::GridConfig;

/// Grid coordinate `(x, y)`
///
/// Signed so callers can step off an edge (`x - 1` at `x = 0`) and let a
/// toroidal grid wrap it. Stored positions are always in range.
pub type Coord = (i64, i64);

/// Discrete 2-D grid
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    torus: bool,
    neighborhood: Neighborhood,
    /// Maximum occupants per cell; `None` for unlimited
    capacity: Option<usize>,
    /// Occupants per cell, indexed `y * width + x`
    cells: Vec<Vec<AgentId>>,
    positions: HashMap<AgentId, (usize, usize)>,
}

impl Grid {
    /// Multi-occupancy grid with a Moore neighborhood.
    ///
    /// Zero dimensions are raised to 1; use [`Grid::try_new`] to reject them.
    pub fn new(width: usize, height: usize, torus: bool) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            torus,
            neighborhood: Neighborhood::Moore,
            capacity: None,
            cells: vec![Vec::new(); width * height],
            positions: HashMap::new(),
        }
    }

    pub fn try_new(width: usize, height: usize, torus: bool) -> Result<Self, SpaceError> {
        if width == 0 || height == 0 {
            return Err(SpaceError::InvalidDimensions(format!(
                "grid must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        if i64::try_from(width).is_err() || i64::try_from(height).is_err() {
            return Err(SpaceError::InvalidDimensions("grid is too large".to_string()));
        }
        Ok(Self::new(width, height, torus))
    }

    pub fn from_config(config: &GridConfig) -> Result<Self, SpaceError> {
        let grid = Self::try_new(config.width, config.height, config.torus)?
            .with_neighborhood(config.neighborhood);
        Ok(match config.capacity {
            Some(capacity) => grid.with_capacity(capacity),
            None => grid,
        })
    }

    /// Grid that holds at most one agent per cell
    pub fn single(width: usize, height: usize, torus: bool) -> Self {
        Self::new(width, height, torus).with_capacity(1)
    }

    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    /// Limit each cell to `capacity` occupants (at least 1)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_torus(&self) -> bool {
        self.torus
    }

    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Whether the coordinate lies outside `0..width` x `0..height`
    pub fn out_of_bounds(&self, (x, y): Coord) -> bool {
        x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64
    }

    /// Reduce a coordinate to the cell it names
    ///
    /// Toroidal grids wrap modulo the dimensions; bounded grids return `None`
    /// for coordinates outside the grid.
    pub fn wrap(&self, coord: Coord) -> Option<Coord> {
        self.cell_of(coord).map(|(x, y)| (x as i64, y as i64))
    }

    fn cell_of(&self, (x, y): Coord) -> Option<(usize, usize)> {
        if self.torus {
            let x = x.rem_euclid(self.width as i64) as usize;
            let y = y.rem_euclid(self.height as i64) as usize;
            Some((x, y))
        } else if self.out_of_bounds((x, y)) {
            None
        } else {
            Some((x as usize, y as usize))
        }
    }

    fn index(&self, (x, y): (usize, usize)) -> usize {
        y * self.width + x
    }

    /// Agents occupying a cell, in arrival order
    pub fn agents_at(&self, coord: Coord) -> &[AgentId] {
        match self.cell_of(coord) {
            Some(cell) => &self.cells[self.index(cell)],
            None => &[],
        }
    }

    pub fn is_cell_empty(&self, coord: Coord) -> bool {
        self.agents_at(coord).is_empty()
    }

    /// Whether a cell has reached its capacity
    pub fn is_cell_full(&self, coord: Coord) -> bool {
        match self.capacity {
            Some(capacity) => self.agents_at(coord).len() >= capacity,
            None => false,
        }
    }

    /// Every cell with its occupants, row by row
    pub fn coord_iter(&self) -> impl Iterator<Item = (Coord, &[AgentId])> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(i, occupants)| {
            (((i % width) as i64, (i / width) as i64), occupants.as_slice())
        })
    }

    /// Cells without occupants, row by row
    pub fn empty_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.coord_iter()
            .filter(|(_, occupants)| occupants.is_empty())
            .map(|(coord, _)| coord)
    }

    /// Pick an empty cell uniformly at random
    pub fn random_empty_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Coord> {
        let empties: Vec<Coord> = self.empty_cells().collect();
        empties.choose(rng).copied()
    }

    /// Cells within `radius` of `center` using the grid's configured neighborhood
    ///
    /// Each cell appears once, even when several wrap paths reach it. The
    /// center cell is excluded unless `include_center` is set. A center
    /// outside a bounded grid has no neighborhood.
    pub fn neighborhood_cells(&self, center: Coord, radius: usize, include_center: bool) -> Vec<Coord> {
        self.neighborhood_cells_with(center, radius, include_center, self.neighborhood)
    }

    pub fn neighborhood_cells_with(
        &self,
        center: Coord,
        radius: usize,
        include_center: bool,
        neighborhood: Neighborhood,
    ) -> Vec<Coord> {
        let (w, h) = (self.width as i64, self.height as i64);
        // Offsets beyond w + h cannot reach new cells on a torus.
        let radius = i64::try_from(radius)
            .unwrap_or(i64::MAX)
            .min(w.saturating_add(h));
        // Offsets are applied to the in-range cell, never to the raw coordinate.
        let Some(center_cell) = self.cell_of(center) else {
            return Vec::new();
        };
        let (cx, cy) = (center_cell.0 as i64, center_cell.1 as i64);
        let mut cells: IndexSet<(usize, usize)> = IndexSet::new();

        let (x_range, y_range) = if self.torus {
            (-radius..=radius, -radius..=radius)
        } else {
            (
                (-radius).max(-cx)..=radius.min(w - 1 - cx),
                (-radius).max(-cy)..=radius.min(h - 1 - cy),
            )
        };

        for dy in y_range {
            for dx in x_range.clone() {
                if !neighborhood.contains(dx, dy, radius) {
                    continue;
                }
                let Some(cell) = self.cell_of((cx + dx, cy + dy)) else {
                    continue;
                };
                if !include_center && cell == center_cell {
                    continue;
                }
                cells.insert(cell);
            }
        }

        cells
            .into_iter()
            .map(|(x, y)| (x as i64, y as i64))
            .collect()
    }

    /// Occupants of the neighborhood of `center`
    pub fn neighbors(&self, center: Coord, radius: usize, include_center: bool) -> Vec<AgentId> {
        self.neighbors_with(center, radius, include_center, self.neighborhood)
    }

    pub fn neighbors_with(
        &self,
        center: Coord,
        radius: usize,
        include_center: bool,
        neighborhood: Neighborhood,
    ) -> Vec<AgentId> {
        self.neighborhood_cells_with(center, radius, include_center, neighborhood)
            .into_iter()
            .flat_map(|cell| self.agents_at(cell).iter().copied())
            .collect()
    }

    pub fn agent_position(&self, id: AgentId) -> Option<Coord> {
        self.position_of(id)
    }

    /// Every cell with its occupants, row by row
    pub fn all_cells(&self) -> Selection<'_, Coord> {
        Selection::new(self.coord_iter().collect())
    }

    /// Neighborhood of `center` as a selection, using the configured shape
    pub fn neighborhood_selection(&self, center: Coord, radius: usize, include_center: bool) -> Selection<'_, Coord> {
        Selection::new(
            self.neighborhood_cells(center, radius, include_center)
                .into_iter()
                .map(|cell| (cell, self.agents_at(cell)))
                .collect(),
        )
    }
}

impl SpatialIndex for Grid {
    type Position = Coord;

    fn place(&mut self, id: AgentId, position: Coord) -> Result<Coord, SpaceError> {
        let cell = self
            .cell_of(position)
            .ok_or_else(|| SpaceError::OutOfBounds(format!("({}, {})", position.0, position.1)))?;
        let stored = (cell.0 as i64, cell.1 as i64);

        if self.positions.get(&id) == Some(&cell) {
            return Ok(stored);
        }
        if let Some(capacity) = self.capacity {
            if self.cells[self.index(cell)].len() >= capacity {
                return Err(SpaceError::CellOccupied {
                    position: format!("({}, {})", stored.0, stored.1),
                    capacity,
                });
            }
        }

        if let Some(previous) = self.positions.insert(id, cell) {
            let index = self.index(previous);
            self.cells[index].retain(|occupant| *occupant != id);
        }
        let index = self.index(cell);
        self.cells[index].push(id);
        Ok(stored)
    }

    fn remove(&mut self, id: AgentId) -> Option<Coord> {
        let cell = self.positions.remove(&id)?;
        let index = self.index(cell);
        self.cells[index].retain(|occupant| *occupant != id);
        Some((cell.0 as i64, cell.1 as i64))
    }

    fn position_of(&self, id: AgentId) -> Option<Coord> {
        self.positions
            .get(&id)
            .map(|&(x, y)| (x as i64, y as i64))
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn summary(&self) -> SpaceSummary {
        SpaceSummary {
            kind: SpaceKind::Grid,
            width: Some(self.width as f64),
            height: Some(self.height as f64),
            nodes: None,
            torus: self.torus,
        }
    }

    fn record(position: &Coord) -> Option<PositionRecord> {
        Some(PositionRecord::Cell {
            x: position.0 as usize,
            y: position.1 as usize,
        })
    }
}
