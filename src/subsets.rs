//! Partitioning of the angle set into ordered subsets (or blocks).
//!
//! Each subset is visited once per iteration, in order. Which angles end up
//! together changes the trajectory of OSEM-like solvers, so the rule is
//! explicit and selectable.

use std::str::FromStr;

use serde::Deserialize;

use crate::ReconError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SubsetOrdering {
    /// Subset `k` holds angles `k, k + num_subset, k + 2 num_subset, ...`
    #[default]
    Interleaved,
    /// Consecutive runs of `n_angles / num_subset` angles; the remainder is
    /// appended to the last run.
    Contiguous,
}

impl FromStr for SubsetOrdering {
    type Err = ReconError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interleaved" => Ok(Self::Interleaved),
            "contiguous"  => Ok(Self::Contiguous),
            _ => Err(ReconError::invalid("subset_ordering", format!("`{s}` is neither `interleaved` nor `contiguous`"))),
        }
    }
}

impl TryFrom<String> for SubsetOrdering {
    type Error = ReconError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

/// Angle indices of each subset, in processing order. Together the subsets
/// contain every angle exactly once; some may be empty when there are more
/// subsets than angles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subsets(Vec<Vec<usize>>);

impl Subsets {

    pub fn new(n_angles: usize, num_subset: usize, ordering: SubsetOrdering) -> Self {
        let num_subset = num_subset.max(1);
        let subsets = match ordering {
            SubsetOrdering::Interleaved =>
                (0..num_subset)
                .map(|k| (k..n_angles).step_by(num_subset).collect())
                .collect(),
            SubsetOrdering::Contiguous => {
                let size = n_angles / num_subset;
                (0..num_subset)
                    .map(|k| {
                        let start = k * size;
                        let stop = if k + 1 == num_subset { n_angles } else { start + size };
                        (start..stop).collect()
                    })
                    .collect()
            }
        };
        Self(subsets)
    }

    /// A single subset containing all angles
    pub fn whole(n_angles: usize) -> Self { Self(vec![(0..n_angles).collect()]) }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn get(&self, k: usize) -> &[usize] { &self.0[k] }
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> { self.0.iter().map(Vec::as_slice) }
}
