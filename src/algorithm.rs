//! The closed set of reconstruction algorithms, and what each of them needs.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::ReconError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Algorithm {
    Art,
    Bart,
    Fbp,
    Gridrec,
    Mlem,
    Osem,
    OspmlHybrid,
    OspmlQuad,
    PmlHybrid,
    PmlQuad,
    Sirt,
}

use Algorithm::*;

impl Algorithm {

    pub const ALL: [Algorithm; 11] = [
        Art, Bart, Fbp, Gridrec, Mlem, Osem,
        OspmlHybrid, OspmlQuad, PmlHybrid, PmlQuad, Sirt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Art         => "art",
            Bart        => "bart",
            Fbp         => "fbp",
            Gridrec     => "gridrec",
            Mlem        => "mlem",
            Osem        => "osem",
            OspmlHybrid => "ospml_hybrid",
            OspmlQuad   => "ospml_quad",
            PmlHybrid   => "pml_hybrid",
            PmlQuad     => "pml_quad",
            Sirt        => "sirt",
        }
    }

    /// Everything except `fbp` and `gridrec` refines an estimate over
    /// `num_iter` passes.
    pub fn is_iterative(self) -> bool { !matches!(self, Fbp | Gridrec) }

    /// Algorithms which split each pass into `num_subset` groups of angles
    pub fn uses_subsets(self) -> bool { matches!(self, Bart | Osem | OspmlHybrid | OspmlQuad) }

    /// Algorithms whose update is damped by a penalty gradient
    pub fn is_penalized(self) -> bool {
        matches!(self, OspmlHybrid | OspmlQuad | PmlHybrid | PmlQuad)
    }

    pub fn uses_hybrid_penalty(self) -> bool { matches!(self, OspmlHybrid | PmlHybrid) }

    pub fn uses_relaxation(self) -> bool { matches!(self, Art | Bart | Sirt) }

    pub fn uses_filter(self) -> bool { matches!(self, Fbp | Gridrec) }
}

impl FromStr for Algorithm {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter()
            .find(|a| a.name() == wanted)
            .ok_or_else(|| ReconError::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for Algorithm {
    type Error = ReconError;
    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[rstest]
    #[case("art"         , Art        )]
    #[case("bart"        , Bart       )]
    #[case("fbp"         , Fbp        )]
    #[case("gridrec"     , Gridrec    )]
    #[case("mlem"        , Mlem       )]
    #[case("osem"        , Osem       )]
    #[case("ospml_hybrid", OspmlHybrid)]
    #[case("ospml_quad"  , OspmlQuad  )]
    #[case("pml_hybrid"  , PmlHybrid  )]
    #[case("pml_quad"    , PmlQuad    )]
    #[case("sirt"        , Sirt       )]
    #[case("SIRT"        , Sirt       )]
    fn parse_known_names(#[case] name: &str, #[case] expected: Algorithm) {
        assert_eq!(name.parse::<Algorithm>().unwrap(), expected);
    }

    #[test]
    fn names_roundtrip() {
        for a in Algorithm::ALL {
            assert_eq!(a.to_string().parse::<Algorithm>().unwrap(), a);
        }
    }

    #[test]
    fn unknown_name_is_reported() {
        match "mart".parse::<Algorithm>() {
            Err(ReconError::UnknownAlgorithm(name)) => assert_eq!(name, "mart"),
            other => panic!("expected UnknownAlgorithm, got {other:?}"),
        }
    }

    #[test]
    fn only_analytic_algorithms_are_not_iterative() {
        let analytic: Vec<_> = Algorithm::ALL.into_iter().filter(|a| !a.is_iterative()).collect();
        assert_eq!(analytic, vec![Fbp, Gridrec]);
    }
}
