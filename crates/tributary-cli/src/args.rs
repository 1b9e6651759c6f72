//! Command-line arguments
//!
//! The generator has always been driven by single-dash `-key=value` flags.
//! [`normalize`] rewrites those to clap's long spelling before parsing, so
//! both `-moduleroot=engine` and `--moduleroot=engine` are accepted.

use clap::{Parser, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;
use tributary_engine::{ImplMode, UnannotatedPolicy};

/// Single-dash flags and the long option each one stands for
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("moduleroot", "moduleroot"),
    ("include", "include"),
    ("module", "module"),
    ("ex", "ex"),
    ("v", "verbosity"),
    ("config", "config"),
    ("help", "help"),
];

#[derive(Parser, Debug)]
#[command(name = "tributary")]
#[command(about = "Generate reflection metadata for a C++ module", long_about = None)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Module root; headers are read from <root>/<module>
    #[arg(long = "moduleroot", value_name = "PATH")]
    pub module_root: Option<PathBuf>,

    /// System include path, never generated (repeatable)
    #[arg(long = "include", value_name = "PATH")]
    pub include: Vec<PathBuf>,

    /// Module name (default: last segment of the module root)
    #[arg(long = "module", value_name = "NAME")]
    pub module: Option<String>,

    /// Exclusion glob (repeatable)
    #[arg(long = "ex", visible_alias = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Log level: 0=trace 1=debug 2=info 3=warn 4=error 5=fatal
    #[arg(
        short = 'v',
        long = "verbosity",
        value_name = "LEVEL",
        allow_negative_numbers = true
    )]
    pub verbosity: Option<i64>,

    /// Silence console logging and the summary
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Config file (default: <moduleroot>/tributary.toml when present)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the run log is written to at exit
    #[arg(long = "log-file", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Unannotated struct policy: skip, dummy or reflect
    #[arg(long = "struct-default", value_name = "POLICY")]
    pub struct_default: Option<UnannotatedPolicy>,

    /// Unannotated class policy: skip, dummy or reflect
    #[arg(long = "class-default", value_name = "POLICY")]
    pub class_default: Option<UnannotatedPolicy>,

    /// Match exclusion patterns without regard to case
    #[arg(long = "case-insensitive", conflicts_with = "case_sensitive")]
    pub case_insensitive: bool,

    /// Match exclusion patterns case-sensitively
    #[arg(long = "case-sensitive")]
    pub case_sensitive: bool,

    /// Umbrella implementation unit: cpp or inl
    #[arg(long = "impl-mode", value_name = "MODE")]
    pub impl_mode: Option<ImplMode>,

    /// Summary format
    #[arg(long = "format", value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

impl Cli {
    /// Parse process arguments, legacy spelling included
    pub fn from_env() -> Self {
        Self::parse_from(normalize(std::env::args_os()))
    }
}

/// Rewrite legacy single-dash flags to their long form.
///
/// `-moduleroot=x` becomes `--moduleroot=x`, `-v=3` becomes
/// `--verbosity=3` and `-help` becomes `--help`. Anything else, including
/// the program name and short flags like `-s`, passes through unchanged.
pub fn normalize<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    let mut out: Vec<OsString> = args.next().into_iter().collect();

    for arg in args {
        let rewritten = arg.to_str().and_then(rewrite_legacy);
        out.push(rewritten.map(OsString::from).unwrap_or(arg));
    }
    out
}

fn rewrite_legacy(arg: &str) -> Option<String> {
    let body = arg.strip_prefix('-')?;
    if body.starts_with('-') {
        return None;
    }
    let (key, value) = match body.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (body, None),
    };
    let (_, long) = LEGACY_FLAGS.iter().find(|(legacy, _)| *legacy == key)?;
    Some(match value {
        Some(value) => format!("--{}={}", long, value),
        None => format!("--{}", long),
    })
}
