use thiserror::Error;

/// Everything that can make a reconstruction request fail.
///
/// All of these are detected before any slice is touched: a call either
/// returns a complete volume or one of these.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("{what}: expected shape {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    #[error("unknown filter `{0}`")]
    UnknownFilter(String),

    /// The caller's deadline passed before all slices were reconstructed
    #[error("deadline exceeded before all slices were reconstructed")]
    DeadlineExceeded,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;

impl ReconError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn messages_name_the_culprit() {
        let e = ReconError::ShapeMismatch { what: "angles", expected: vec![180], got: vec![179] };
        assert_eq!(e.to_string(), "angles: expected shape [180], got [179]");

        let e = ReconError::UnknownAlgorithm("mart".into());
        assert_eq!(e.to_string(), "unknown algorithm `mart`");

        let e = ReconError::invalid("num_subset", "must be at least 1");
        assert_eq!(e.to_string(), "invalid value for `num_subset`: must be at least 1");
    }
}
