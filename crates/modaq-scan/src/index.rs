//! Mapping of (average index, scan index) to storage coordinates.
//!
//! Non-adaptive scans decompose the flat scan index row-major over the
//! navigation shape established by the planner (outer axes first). When
//! more than one average is requested, the average index becomes an
//! extra leading coordinate and the averaging axis is itself a
//! navigation axis of length `averages`.
//!
//! Adaptive scans have no known extent: the coordinate is simply the
//! running append position, and the engine appends instead of writing
//! in place.

/// Converts run indices into storage coordinate tuples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMapper {
    nav_shape: Vec<usize>,
    averages: usize,
}

impl IndexMapper {
    pub fn new(nav_shape: Vec<usize>, averages: usize) -> Self {
        Self { nav_shape, averages }
    }

    /// Storage coordinate for one acquired sample, assuming the scan
    /// visits the grid in row-major order. Snake traversals visit cells
    /// out of row-major order; they use [`IndexMapper::map_coords`]
    /// with the grid coordinate recorded in the plan.
    pub fn map(&self, average_index: usize, scan_index: usize, adaptive: bool) -> Vec<usize> {
        if adaptive {
            // Total extent unknown: the coordinate is the append position.
            return vec![scan_index];
        }

        let mut coords = vec![0usize; self.nav_shape.len()];
        let mut remainder = scan_index;
        for axis in (0..self.nav_shape.len()).rev() {
            coords[axis] = remainder % self.nav_shape[axis];
            remainder /= self.nav_shape[axis];
        }
        self.map_coords(average_index, &coords)
    }

    /// Storage coordinate for a sample taken at a known grid cell.
    pub fn map_coords(&self, average_index: usize, grid: &[usize]) -> Vec<usize> {
        let mut coords = grid.to_vec();
        if self.averages > 1 {
            coords.insert(0, average_index);
        }
        coords
    }

    /// Full storage shape of one channel's array: averaging dimension
    /// (when present), navigation dimensions, then the sample shape.
    pub fn storage_shape(&self, sample_shape: &[usize]) -> Vec<usize> {
        let mut shape = Vec::new();
        if self.averages > 1 {
            shape.push(self.averages);
        }
        shape.extend_from_slice(&self.nav_shape);
        shape.extend_from_slice(sample_shape);
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_decomposition_with_averaging() {
        let mapper = IndexMapper::new(vec![3, 4], 2);
        // 5 = 1 * 4 + 1 over shape (3, 4), plus leading average index.
        assert_eq!(mapper.map(1, 5, false), vec![1, 1, 1]);
        assert_eq!(mapper.map(0, 0, false), vec![0, 0, 0]);
        assert_eq!(mapper.map(1, 11, false), vec![1, 2, 3]);
    }

    #[test]
    fn single_average_has_no_leading_coordinate() {
        let mapper = IndexMapper::new(vec![3, 4], 1);
        assert_eq!(mapper.map(0, 5, false), vec![1, 1]);
    }

    #[test]
    fn adaptive_coordinate_is_append_position() {
        let mapper = IndexMapper::new(Vec::new(), 3);
        assert_eq!(mapper.map(2, 7, true), vec![7]);
    }

    #[test]
    fn explicit_grid_coordinate_keeps_the_snake_cell() {
        let mapper = IndexMapper::new(vec![2, 3], 2);
        assert_eq!(mapper.map_coords(1, &[1, 2]), vec![1, 1, 2]);
        let mapper = IndexMapper::new(vec![2, 3], 1);
        assert_eq!(mapper.map_coords(0, &[1, 0]), vec![1, 0]);
    }

    #[test]
    fn storage_shape_composition() {
        let mapper = IndexMapper::new(vec![3, 4], 2);
        assert_eq!(mapper.storage_shape(&[128]), vec![2, 3, 4, 128]);
        let mapper = IndexMapper::new(vec![5], 1);
        assert_eq!(mapper.storage_shape(&[]), vec![5]);
    }

    #[test]
    fn mapping_is_deterministic() {
        let mapper = IndexMapper::new(vec![3, 4], 2);
        let first = mapper.map(1, 5, false);
        for _ in 0..10 {
            assert_eq!(mapper.map(1, 5, false), first);
        }
    }
}
