//! Tributary Engine
//!
//! Build-time generator of reflection metadata for C++ modules. Given a
//! module's header tree, it decides which aggregate types take part in the
//! runtime reflection facility and emits, per type, a **reflector** (a
//! member-access view over a live instance) and a **prototype** (a detached
//! value snapshot), plus the per-module umbrella files that aggregate them.
//!
//! - **Scan**: header discovery and exclusion patterns (`scan` module)
//! - **Parser**: the syntax tree provider seam and the built-in header
//!   parser (`parser` module)
//! - **Reflect**: source verification, reflectability verdicts, member
//!   classification (`reflect` module)
//! - **Codegen**: reflector/prototype text generation (`codegen` module)
//! - **Aggregate**: per-module umbrella files and overrides (`aggregate` module)
//! - **Pipeline**: the orchestrator driving one module pass (`pipeline` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use tributary_engine::{GeneratorConfig, HeaderParser, ModuleDescriptor, Orchestrator};
//!
//! let config = GeneratorConfig::default();
//! let module = ModuleDescriptor::new("engine/core", None, &config)?;
//! let provider = HeaderParser::new();
//! let summary = Orchestrator::new(&provider, &config).run(&[module]);
//! println!("{} artifacts written", summary.artifacts_written());
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::new_without_default)]

// ============================================================================
// Core Modules
// ============================================================================

/// Generator configuration and module descriptors
pub mod config;

/// Error taxonomy
pub mod error;

/// Logging setup and log capture
pub mod logging;

/// Module scanning and exclusion patterns
pub mod scan;

/// Syntax tree provider and the built-in header parser
pub mod parser;

/// Reflectability resolution and member classification
pub mod reflect;

/// Reflector and prototype code generation
pub mod codegen;

/// Umbrella file aggregation
pub mod aggregate;

/// Module generation pipeline
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use aggregate::ModuleBuildContext;
pub use codegen::{ArtifactKind, GeneratedArtifact};
pub use config::{
    CaseSensitivity, GeneratorConfig, ImplMode, ModuleDescriptor, UnannotatedPolicy,
};
pub use error::{
    AggregateError, ConfigError, Error, GenerateError, ParseFailure, Result, ScanError,
};
pub use parser::{DeclarationTree, HeaderParser, ParseRequest, SyntaxTreeProvider};
pub use pipeline::{ModuleReport, Orchestrator, RunSummary};
pub use reflect::Verdict;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
