//! Cell Selection
//!
//! A fixed collection of cells (grid cells or network nodes) together with
//! their occupants, and random or filtered picks over it. Every random pick
//! draws from the caller's stream so runs stay reproducible.

use rand::distributions::WeightedIndex;
use rand::seq::SliceRandom;
use rand::Rng;

use super::SpaceError;
use crate::agent::AgentId;

/// Cap on the number of cells kept by [`Selection::select`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AtMost {
    #[default]
    All,
    /// At most this many of the first matching cells
    Count(usize),
    /// At most this share of the original collection, rounded down.
    ///
    /// Values outside `0.0..=1.0` are clamped.
    Fraction(f64),
}

impl AtMost {
    fn limit(&self, len: usize) -> usize {
        match *self {
            AtMost::All => usize::MAX,
            AtMost::Count(count) => count,
            AtMost::Fraction(share) => {
                let share = if share.is_nan() { 0.0 } else { share.clamp(0.0, 1.0) };
                (len as f64 * share).floor() as usize
            }
        }
    }
}

/// Ordered cells with their occupants, borrowed from a space
#[derive(Debug, Clone)]
pub struct Selection<'a, P> {
    cells: Vec<(P, &'a [AgentId])>,
}

impl<'a, P: Copy> Selection<'a, P> {
    pub fn new(cells: Vec<(P, &'a [AgentId])>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell positions in collection order
    pub fn positions(&self) -> impl Iterator<Item = P> + '_ {
        self.cells.iter().map(|(position, _)| *position)
    }

    /// Occupants of every cell, cell by cell
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.cells
            .iter()
            .flat_map(|(_, occupants)| occupants.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (P, &'a [AgentId])> + '_ {
        self.cells.iter().copied()
    }

    /// One cell, uniformly at random
    pub fn select_random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<P> {
        self.cells.choose(rng).map(|(position, _)| *position)
    }

    /// One occupant of any cell, uniformly over all occupants
    pub fn select_random_agent<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<AgentId> {
        let agents: Vec<AgentId> = self.agents().collect();
        agents.choose(rng).copied()
    }

    /// `k` distinct cells without replacement.
    ///
    /// Fails when the collection holds fewer than `k` cells.
    pub fn sample_random_cells<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<Vec<P>, SpaceError> {
        if k > self.cells.len() {
            return Err(SpaceError::InvalidSample(format!(
                "cannot sample {} cells from {}",
                k,
                self.cells.len()
            )));
        }
        Ok(self
            .cells
            .choose_multiple(rng, k)
            .map(|(position, _)| *position)
            .collect())
    }

    /// `k` cells with replacement, weighted per cell when `weights` is given.
    ///
    /// Weights must match the collection length, be non-negative and not all zero.
    pub fn choices_random_cells<R: Rng + ?Sized>(
        &self,
        weights: Option<&[f64]>,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<P>, SpaceError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.cells.is_empty() {
            return Err(SpaceError::InvalidSample("cannot choose from an empty collection".to_string()));
        }
        let Some(weights) = weights else {
            return Ok((0..k)
                .map(|_| self.cells[rng.gen_range(0..self.cells.len())].0)
                .collect());
        };
        if weights.len() != self.cells.len() {
            return Err(SpaceError::InvalidSample(format!(
                "{} weights for {} cells",
                weights.len(),
                self.cells.len()
            )));
        }
        let index = WeightedIndex::new(weights).map_err(|err| SpaceError::InvalidSample(err.to_string()))?;
        Ok((0..k).map(|_| self.cells[rng.sample(&index)].0).collect())
    }

    /// Cells passing `filter`, in collection order, capped by `at_most`
    pub fn select<F>(&self, mut filter: F, at_most: AtMost) -> Selection<'a, P>
    where
        F: FnMut(P, &[AgentId]) -> bool,
    {
        let limit = at_most.limit(self.cells.len());
        let cells = self
            .cells
            .iter()
            .copied()
            .filter(|(position, occupants)| filter(*position, occupants))
            .take(limit)
            .collect();
        Selection { cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn occupants() -> Vec<Vec<AgentId>> {
        vec![
            vec![AgentId(1)],
            vec![],
            vec![AgentId(2), AgentId(3)],
            vec![],
        ]
    }

    fn selection(occupants: &[Vec<AgentId>]) -> Selection<'_, usize> {
        Selection::new(
            occupants
                .iter()
                .enumerate()
                .map(|(i, cell)| (i, cell.as_slice()))
                .collect(),
        )
    }

    #[test]
    fn test_random_cell_and_agent() {
        let cells = occupants();
        let selection = selection(&cells);
        let mut rng = SmallRng::seed_from_u64(4);

        for _ in 0..20 {
            let cell = selection.select_random_cell(&mut rng).unwrap();
            assert!(cell < 4);
            let agent = selection.select_random_agent(&mut rng).unwrap();
            assert!([AgentId(1), AgentId(2), AgentId(3)].contains(&agent));
        }

        let empty: Selection<'_, usize> = Selection::new(Vec::new());
        assert_eq!(empty.select_random_cell(&mut rng), None);
        assert_eq!(empty.select_random_agent(&mut rng), None);
    }

    #[test]
    fn test_sample_is_unique() {
        let cells = occupants();
        let selection = selection(&cells);
        let mut rng = SmallRng::seed_from_u64(8);

        let sample = selection.sample_random_cells(4, &mut rng).unwrap();
        let unique: HashSet<_> = sample.iter().collect();
        assert_eq!(unique.len(), 4);

        assert!(matches!(
            selection.sample_random_cells(5, &mut rng),
            Err(SpaceError::InvalidSample(_))
        ));
    }

    #[test]
    fn test_weighted_choices() {
        let cells = occupants();
        let selection = selection(&cells);
        let mut rng = SmallRng::seed_from_u64(15);

        let picks = selection
            .choices_random_cells(Some(&[0.0, 0.0, 1.0, 0.0][..]), 10, &mut rng)
            .unwrap();
        assert_eq!(picks, vec![2; 10]);

        let picks = selection.choices_random_cells(None, 50, &mut rng).unwrap();
        assert_eq!(picks.len(), 50);

        assert!(selection.choices_random_cells(Some(&[1.0][..]), 1, &mut rng).is_err());
        assert!(selection
            .choices_random_cells(Some(&[0.0; 4][..]), 1, &mut rng)
            .is_err());
    }

    #[test]
    fn test_select_filter_and_cap() {
        let cells = occupants();
        let selection = selection(&cells);

        let empty = selection.select(|_, occupants| occupants.is_empty(), AtMost::All);
        assert_eq!(empty.positions().collect::<Vec<_>>(), vec![1, 3]);

        let first = selection.select(|_, _| true, AtMost::Count(1));
        assert_eq!(first.positions().collect::<Vec<_>>(), vec![0]);

        let half = selection.select(|_, _| true, AtMost::Fraction(0.5));
        assert_eq!(half.positions().collect::<Vec<_>>(), vec![0, 1]);

        // The fraction is taken of the original collection, not of the matches
        let quarter = selection.select(|_, occupants| occupants.is_empty(), AtMost::Fraction(0.25));
        assert_eq!(quarter.positions().collect::<Vec<_>>(), vec![1]);

        assert_eq!(selection.agents().count(), 3);
    }
}
