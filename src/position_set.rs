//! Grid-hash set of vertex positions.
//!
//! Backs the duplicate-position invariant check: bucket every position
//! into a coarse grid and compare distances only inside the 3x3x3
//! neighbourhood of a query point, instead of against every vertex.

use glam::DVec3;
use hashbrown::HashMap;

use crate::math::EPSILON;

/// Positions closer than the tolerance count as the same point.
pub struct PositionSet {
    cells: HashMap<(i64, i64, i64), Vec<DVec3>>,
    cell_size: f64,
    tolerance: f64,
}

impl PositionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(EPSILON)
    }

    /// Cell size is twice the tolerance so near-duplicates always land in
    /// adjacent cells.
    #[must_use]
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size: tolerance * 2.0,
            tolerance,
        }
    }

    #[inline]
    fn cell_coords(&self, p: DVec3) -> (i64, i64, i64) {
        #[allow(clippy::cast_possible_truncation)]
        let discretize = |v: f64| (v / self.cell_size).floor() as i64;
        (discretize(p.x), discretize(p.y), discretize(p.z))
    }

    /// Is any recorded position within tolerance of `point`?
    #[must_use]
    pub fn contains(&self, point: DVec3) -> bool {
        let (cx, cy, cz) = self.cell_coords(point);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(pts) = self.cells.get(&(cx + dx, cy + dy, cz + dz))
                        && pts.iter().any(|&p| (p - point).length() < self.tolerance)
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn insert(&mut self, point: DVec3) {
        self.cells
            .entry(self.cell_coords(point))
            .or_default()
            .push(point);
    }

    /// Insert unless a duplicate is already present. Returns whether the
    /// point was inserted.
    pub fn insert_if_unique(&mut self, point: DVec3) -> bool {
        if self.contains(point) {
            false
        } else {
            self.insert(point);
            true
        }
    }
}

impl Default for PositionSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_detection() {
        let mut set = PositionSet::new();
        assert!(set.insert_if_unique(DVec3::new(1.0, 2.0, 3.0)));
        assert!(!set.insert_if_unique(DVec3::new(1.0, 2.0, 3.0 + EPSILON * 0.5)));
        assert!(set.insert_if_unique(DVec3::new(1.0, 2.0, 4.0)));
    }

    #[test]
    fn test_cell_boundary_neighbours() {
        let mut set = PositionSet::with_tolerance(0.1);
        // Straddle a cell boundary but stay within tolerance.
        assert!(set.insert_if_unique(DVec3::new(0.199, 0.0, 0.0)));
        assert!(set.contains(DVec3::new(0.201, 0.0, 0.0)));
    }
}
