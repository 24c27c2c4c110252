//! Run configuration

use std::path::PathBuf;

use crate::compiler::CompileOptions;
use crate::emit::DEFAULT_SOURCE;
use crate::normalize::{DEFAULT_MAX_COMBINATIONS, DEFAULT_MAX_UNROLL, NormalizeOptions, Strategy};
use crate::sample::SampleOptions;

/// Settings for one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory receiving every artifact
    pub out_dir: PathBuf,
    /// Largest `max - min` of a bounded repeat that may be unrolled
    pub max_unroll: u32,
    /// Largest number of alternatives one expansion may produce
    pub max_combinations: usize,
    /// Draws allowed when sampling a group
    pub sample_attempts: usize,
    /// Accepted draws after which sampling stops
    pub sample_count: usize,
    /// Extra repetitions an unbounded repeat may draw
    pub max_sample_repeat: u32,
    /// Sampling seed
    pub seed: u64,
    /// Origin named in generated file headers
    pub source_name: String,
}

impl Default for Config {
    fn default() -> Self {
        let sample = SampleOptions::default();
        Config {
            out_dir: PathBuf::from("."),
            max_unroll: DEFAULT_MAX_UNROLL,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            sample_attempts: sample.attempts,
            sample_count: sample.count,
            max_sample_repeat: sample.max_repeat,
            seed: sample.seed,
            source_name: DEFAULT_SOURCE.to_string(),
        }
    }
}

impl Config {
    /// Normalizer settings; case folding is set per lexer
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            ignore_case: false,
            max_unroll: self.max_unroll,
            max_combinations: self.max_combinations,
            strategy: Strategy::Expand,
        }
    }

    /// Sampler settings
    pub fn sample_options(&self) -> SampleOptions {
        SampleOptions {
            attempts: self.sample_attempts,
            count: self.sample_count,
            max_repeat: self.max_sample_repeat,
            seed: self.seed,
        }
    }

    /// Compiler settings
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            normalize: self.normalize_options(),
            sample: self.sample_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_components() {
        let config = Config::default();
        assert_eq!(config.compile_options(), CompileOptions::default());
        assert_eq!(config.source_name, "pygments");
    }

    #[test]
    fn test_overrides_flow_through() {
        let config = Config {
            max_combinations: 10,
            seed: 7,
            ..Config::default()
        };
        let options = config.compile_options();
        assert_eq!(options.normalize.max_combinations, 10);
        assert_eq!(options.sample.seed, 7);
    }
}
