//! Reflectability resolution and member classification
//!
//! - `verify`: source-level confirmation of annotations
//! - `resolver`: per-type verdicts and the type index
//! - `classify`: member and base classification of a reflectable type
//! - `cycle`: nested-member cycle detection

pub mod classify;
pub mod cycle;
pub mod resolver;
pub mod verify;

pub use classify::{classify_type, BaseLink, Classification, MemberClass, SkipReason};
pub use cycle::check_nested_cycles;
pub use resolver::{ReflectabilityResolver, TypeIndex, Verdict, Verdicts};
pub use verify::SourceVerifier;
