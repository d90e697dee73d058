//! Configuration file parser for reconstructions

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{
    Algorithm, Length, ReconError, Result,
    analytic::FilterName,
    recon::ReconParams,
    subsets::SubsetOrdering,
};

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Reconstruction algorithm, by name (`art`, `osem`, `gridrec`, ...)
    pub algorithm: Algorithm,

    /// Number of iterations of iterative algorithms. Signed, so that negative
    /// values can be reported as such rather than as a type error.
    #[serde(default = "one")]
    pub iterations: i64,

    /// Number of ordered subsets, or BART blocks, per iteration
    #[serde(default = "one")]
    pub subsets: i64,

    /// Detector coordinate of the rotation axis. Defaults to the middle.
    #[serde(default)]
    pub center: Option<Length>,

    #[serde(default = "default_reg_par")]
    pub reg_par: f64,

    #[serde(default = "default_reg_delta")]
    pub reg_delta: f64,

    #[serde(default)]
    pub filter: FilterName,

    /// Cutoff frequency and Butterworth order
    #[serde(default = "default_filter_par")]
    pub filter_par: [f64; 2],

    #[serde(default = "default_relaxation")]
    pub relaxation: f64,

    #[serde(default)]
    pub subset_ordering: SubsetOrdering,

    #[serde(default = "default_kernel_width")]
    pub kernel_width: f64,
}

fn one() -> i64 { 1 }
fn default_reg_par()      -> f64      { ReconParams::default().reg_par }
fn default_reg_delta()    -> f64      { ReconParams::default().reg_delta }
fn default_filter_par()   -> [f64; 2] { ReconParams::default().filter_par }
fn default_relaxation()   -> f64      { ReconParams::default().relaxation }
fn default_kernel_width() -> f64      { ReconParams::default().kernel_width }

fn count(name: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| ReconError::invalid(name, format!("must not be negative, got {value}")))
}

impl Config {

    /// The parameters described by this configuration, validated for its
    /// algorithm
    pub fn params(&self) -> Result<ReconParams> {
        let params = ReconParams {
            num_iter: count("iterations", self.iterations)?,
            num_subset: count("subsets", self.subsets)?,
            center: self.center,
            reg_par: self.reg_par,
            reg_delta: self.reg_delta,
            filter: self.filter,
            filter_par: self.filter_par,
            relaxation: self.relaxation,
            subset_ordering: self.subset_ordering,
            kernel_width: self.kernel_width,
        };
        params.validate(self.algorithm)?;
        Ok(params)
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config> {
    let config = fs::read_to_string(path)?;
    Ok(toml::from_str(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    // ----- Test an example on-disk config file -----------------------------------------
    #[test]
    fn test_config_file() {
        let config = read_config_file("recon-config.toml").unwrap();
        assert_eq!(config.algorithm, Algorithm::OspmlHybrid);
        assert_eq!(config.iterations, 10);
        assert_eq!(config.subsets, 6);
        assert_eq!(config.reg_par, 0.05);
        assert_eq!(config.reg_delta, 0.2);
        assert_eq!(config.subset_ordering, SubsetOrdering::Interleaved);
        let params = config.params().unwrap();
        assert_eq!(params.num_iter, 10);
        assert_eq!(params.num_subset, 6);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_config_file(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ReconError::Io(_))));
    }

    // ----- Some helpers to make the tests more concise ---------------------------------
    fn parse<'d, D: Deserialize<'d>>(input: &'d str) -> D {
        toml::from_str(input).unwrap()
    }
    fn parse_carefully(input: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(input)
    }
    //  ---  Macro for concise assertions about values of parsed fields -------------------
    macro_rules! check {
        ($type:ident($text:expr).$field:ident = $expected:expr) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            assert_eq!(config.$field, $expected);
        };
        ($type:ident($text:expr) fields: $($field:ident = $expected:expr);+$(;)?) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            $(assert_eq!(config.$field, $expected);)*
        }
    }
    // ----- Test deserializing of individual aspects of the Config type ----------------
    #[test]
    fn config_defaults() {
        check!{Config(r#"algorithm = "mlem""#) fields:
               algorithm       = Algorithm::Mlem;
               iterations      = 1;
               subsets         = 1;
               center          = None;
               filter          = FilterName::Shepp;
               filter_par      = [0.5, 2.0];
               relaxation      = 1.0;
               subset_ordering = SubsetOrdering::Interleaved;
               kernel_width    = 4.0;
        }
    }

    #[test]
    fn config_iterations() {
        check!{Config(r#"
                 algorithm = "OSEM"
                 iterations = 4
                 subsets = 20
               "#) fields:
               algorithm  = Algorithm::Osem;
               iterations =  4;
               subsets    = 20
        }
    }

    #[test]
    fn config_filter() {
        check!{Config(r#"
                 algorithm = "fbp"
                 filter = "butterworth"
                 filter_par = [0.3, 4.0]
                 center = 31.5
               "#) fields:
               filter     = FilterName::Butterworth;
               filter_par = [0.3, 4.0];
               center     = Some(31.5)
        }
    }

    #[test]
    fn config_contiguous_subsets() {
        check!(Config(r#"
                 algorithm = "bart"
                 subset_ordering = "contiguous"
               "#).subset_ordering = SubsetOrdering::Contiguous);
    }

    // ----- Make sure that bad input is not accepted -----------------------------------
    #[test]
    fn config_reject_unknown_field() {
        assert!(parse_carefully(r#"
            algorithm = "art"
            unknown_field = 666
        "#).is_err());
    }

    #[test]
    fn config_requires_algorithm() {
        assert!(parse_carefully("iterations = 3").is_err());
    }

    #[test]
    fn config_rejects_unknown_algorithm_and_filter() {
        assert!(parse_carefully(r#"algorithm = "magic""#).is_err());
        assert!(parse_carefully(r#"
            algorithm = "fbp"
            filter = "lanczos"
        "#).is_err());
    }

    #[test]
    fn negative_counts_are_invalid_parameters() {
        let config: Config = parse(r#"
            algorithm = "sirt"
            iterations = -2
        "#);
        assert!(matches!(config.params(), Err(ReconError::InvalidParameter { name: "iterations", .. })));
        let config: Config = parse(r#"
            algorithm = "osem"
            subsets = -1
        "#);
        assert!(matches!(config.params(), Err(ReconError::InvalidParameter { name: "subsets", .. })));
    }

    #[test]
    fn params_are_validated_for_the_algorithm() {
        let config: Config = parse(r#"
            algorithm = "osem"
            subsets = 0
        "#);
        assert!(matches!(config.params(), Err(ReconError::InvalidParameter { name: "num_subset", .. })));
    }
}
