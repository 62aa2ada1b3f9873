//! Index permutation layer.
//!
//! A reorder maps logical indices onto physical ones. `ReversibleReorder`
//! proves at construction that its table is a bijection over the stated
//! domain, via cycle decomposition, and carries the exact inverse.

use crate::error::{MapError, MapResult};

/// Forward-only index mapping. The table is trusted as given; use
/// [`ReversibleReorder`] when the mapping must be a validated bijection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reorder {
    forward: Vec<usize>,
}

impl Reorder {
    pub fn new(forward: Vec<usize>) -> Self {
        Self { forward }
    }

    pub fn forward(&self, index: usize) -> usize {
        self.forward[index]
    }

    pub fn domain_len(&self) -> usize {
        self.forward.len()
    }

    pub fn table(&self) -> &[usize] {
        &self.forward
    }

    /// Applies the mapping to a sequence: output slot `i` takes the input
    /// element at `forward(i)`.
    pub fn apply<T: Copy>(&self, seq: &[T]) -> Vec<T> {
        self.forward.iter().map(|&i| seq[i]).collect()
    }

    pub fn pivots(&self) -> Vec<usize> {
        pivots(&self.forward)
    }
}

/// Validated bijection with its exact inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversibleReorder {
    forward: Vec<usize>,
    inverse: Vec<usize>,
}

impl ReversibleReorder {
    /// Builds a reorder from a forward table, rejecting any table that is
    /// not a permutation of `0..domain`.
    pub fn new(forward: Vec<usize>, domain: usize) -> MapResult<Self> {
        all_loops(&forward, domain)?;
        let mut inverse = vec![0usize; domain];
        for (i, &target) in forward.iter().enumerate() {
            inverse[target] = i;
        }
        Ok(Self { forward, inverse })
    }

    pub fn identity(domain: usize) -> Self {
        Self {
            forward: (0..domain).collect(),
            inverse: (0..domain).collect(),
        }
    }

    pub fn forward(&self, index: usize) -> usize {
        self.forward[index]
    }

    pub fn inverse(&self, index: usize) -> usize {
        self.inverse[index]
    }

    pub fn domain_len(&self) -> usize {
        self.forward.len()
    }

    /// Output slot `i` takes the input element at `forward(i)`.
    pub fn apply<T: Copy>(&self, seq: &[T]) -> Vec<T> {
        self.forward.iter().map(|&i| seq[i]).collect()
    }

    /// Undoes [`apply`](Self::apply).
    pub fn apply_inverse<T: Copy>(&self, seq: &[T]) -> Vec<T> {
        self.inverse.iter().map(|&i| seq[i]).collect()
    }

    pub fn pivots(&self) -> Vec<usize> {
        pivots(&self.forward)
    }
}

/// Decomposes `mapping` into its permutation cycles over `0..domain`.
///
/// Succeeding proves the mapping is a complete bijection: every index is
/// covered exactly once and every target lands inside the domain. Fails
/// with `IncompleteMapping` otherwise.
pub fn all_loops(mapping: &[usize], domain: usize) -> MapResult<Vec<Vec<usize>>> {
    if mapping.len() != domain {
        return Err(MapError::IncompleteMapping(format!(
            "mapping covers {} of {} indices",
            mapping.len(),
            domain
        )));
    }
    let mut hit = vec![false; domain];
    for (i, &target) in mapping.iter().enumerate() {
        if target >= domain {
            return Err(MapError::IncompleteMapping(format!(
                "index {i} maps to {target}, outside domain {domain}"
            )));
        }
        if hit[target] {
            return Err(MapError::IncompleteMapping(format!(
                "target {target} is mapped more than once"
            )));
        }
        hit[target] = true;
    }

    let mut visited = vec![false; domain];
    let mut cycles = Vec::new();
    for start in 0..domain {
        if visited[start] {
            continue;
        }
        let mut cycle = vec![start];
        visited[start] = true;
        let mut next = mapping[start];
        while next != start {
            visited[next] = true;
            cycle.push(next);
            next = mapping[next];
        }
        cycles.push(cycle);
    }
    Ok(cycles)
}

/// Indices where the forward table's stride changes.
///
/// A contiguous run of constant stride maps a block of logical indices onto
/// a block of physical ones; the returned indices mark the last element of
/// each run. Region boundaries that cut across a run keep locality, those
/// that straddle a pivot do not.
pub fn pivots(mapping: &[usize]) -> Vec<usize> {
    if mapping.len() < 2 {
        return Vec::new();
    }
    let mut points = Vec::new();
    let mut stride = mapping[1] as i64 - mapping[0] as i64;
    for i in 2..mapping.len() {
        let delta = mapping[i] as i64 - mapping[i - 1] as i64;
        if delta != stride {
            points.push(i - 1);
            stride = delta;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_decomposition_of_rotation() {
        let loops = all_loops(&[2, 0, 1], 3).unwrap();
        assert_eq!(loops, vec![vec![0, 2, 1]]);
    }

    #[test]
    fn swap_with_fixed_point_validates() {
        let loops = all_loops(&[1, 0, 2], 3).unwrap();
        assert_eq!(loops.len(), 2);
        assert!(ReversibleReorder::new(vec![1, 0, 2], 3).is_ok());
    }

    #[test]
    fn short_table_is_incomplete() {
        let err = all_loops(&[1, 2], 3).unwrap_err();
        assert!(matches!(err, MapError::IncompleteMapping(_)));
    }

    #[test]
    fn duplicate_target_is_incomplete() {
        let err = ReversibleReorder::new(vec![0, 0, 1], 3).unwrap_err();
        assert!(matches!(err, MapError::IncompleteMapping(_)));
    }

    #[test]
    fn out_of_domain_target_is_incomplete() {
        let err = ReversibleReorder::new(vec![0, 3, 1], 3).unwrap_err();
        assert!(matches!(err, MapError::IncompleteMapping(_)));
    }

    #[test]
    fn inverse_undoes_forward() {
        let r = ReversibleReorder::new(vec![3, 1, 0, 2], 4).unwrap();
        for i in 0..4 {
            assert_eq!(r.inverse(r.forward(i)), i);
            assert_eq!(r.forward(r.inverse(i)), i);
        }
        let seq = [10u64, 20, 30, 40];
        assert_eq!(r.apply_inverse(&r.apply(&seq)), seq.to_vec());
    }

    #[test]
    fn identity_has_no_pivots() {
        assert!(ReversibleReorder::identity(8).pivots().is_empty());
    }

    #[test]
    fn pivots_mark_stride_changes() {
        // Two ascending runs: 0..4 then 7 down to 4.
        let table = vec![0, 1, 2, 3, 7, 6, 5, 4];
        assert_eq!(pivots(&table), vec![3, 4]);
    }
}
