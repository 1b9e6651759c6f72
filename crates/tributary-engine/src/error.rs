//! Error types for the generation pipeline
//!
//! Each stage owns one error enum. Failures local to a single type
//! ([`GenerateError`]) never abort a module; scan, parse and output
//! directory failures abort the module they occur in; configuration errors
//! abort the run before any scanning happens.

use std::path::PathBuf;
use thiserror::Error;

use crate::parser::diagnostic::Diagnostic;

/// Result type used throughout the engine
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level engine error
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, reported before scanning
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Module directory could not be enumerated
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Module headers produced parse errors
    #[error(transparent)]
    Parse(#[from] ParseFailure),

    /// Per-type generation failure
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// Output directory or umbrella file failure
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Errors in flags, config files and module descriptors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        /// Config file path
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Exclusion glob could not be compiled
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    Pattern {
        /// The glob as given by the user
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// No module name was given and none could be derived from the root
    #[error("Cannot derive a module name from '{0}'")]
    ModuleName(PathBuf),

    /// A flag or config key carried an unsupported value
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue {
        /// Flag or key name
        key: &'static str,
        /// Rejected value
        value: String,
    },
}

/// Errors while enumerating a module's headers
#[derive(Debug, Error)]
pub enum ScanError {
    /// The module's source directory does not exist
    #[error("Module directory {0} does not exist")]
    MissingDirectory(PathBuf),

    /// The module's source directory could not be read
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// A module's parse produced error-level diagnostics
#[derive(Debug, Error)]
#[error("Parsing module '{module}' failed with {} error(s)", self.error_count())]
pub struct ParseFailure {
    /// Module name
    pub module: String,
    /// Every diagnostic of the parse, not only the errors
    pub diagnostics: Vec<Diagnostic>,
    /// Error diagnostics rendered with source snippets
    pub rendered: String,
}

impl ParseFailure {
    /// Number of error-level diagnostics
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

/// Failures local to one type or one artifact
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Nested members form a cycle back to a type already being emitted
    #[error("Cyclic reflection in '{type_name}': {}", path.join(" -> "))]
    CyclicReflection {
        /// Type whose emission was abandoned
        type_name: String,
        /// The cycle, first and last entry being the same type
        path: Vec<String>,
    },

    /// An artifact file could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Failures while preparing or finishing a module's output directory
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Output directory could not be created or cleared
    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Override directory exists but could not be read
    #[error("Failed to read override directory {path}: {source}")]
    Override {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Umbrella file could not be written
    #[error("Failed to write umbrella file {path}: {source}")]
    Umbrella {
        /// Umbrella file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::token::Span;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = GenerateError::CyclicReflection {
            type_name: "A".to_string(),
            path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic reflection in 'A': A -> B -> A");
    }

    #[test]
    fn test_parse_failure_counts_errors_only() {
        let failure = ParseFailure {
            module: "core".to_string(),
            diagnostics: vec![
                Diagnostic::warning("w", "a.hpp", Span::default()),
                Diagnostic::error("e", "a.hpp", Span::default()),
            ],
            rendered: String::new(),
        };
        assert_eq!(failure.error_count(), 1);
        assert_eq!(failure.to_string(), "Parsing module 'core' failed with 1 error(s)");
    }
}
