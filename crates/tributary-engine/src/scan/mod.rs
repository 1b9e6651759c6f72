//! Module scanning
//!
//! Collects the header files of one module: a sorted recursive walk of
//! `<root>/<name>`, keeping files with a header extension whose path matches
//! no exclusion pattern. The module's own generated-output directory is
//! never descended into.

pub mod pattern;

use std::path::{Path, PathBuf};

use crate::config::{ModuleDescriptor, OUTPUT_DIR_NAME};
use crate::error::ScanError;

/// Outcome of scanning one module
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Candidate headers in path order
    pub files: Vec<PathBuf>,
    /// Headers dropped by an exclusion pattern
    pub excluded: Vec<PathBuf>,
    /// Entries that vanished or could not be verified during the walk
    pub missing: Vec<PathBuf>,
}

/// Scan a module's source directory for headers
pub fn scan_module(module: &ModuleDescriptor, extensions: &[String]) -> Result<ScanResult, ScanError> {
    let source_dir = module.source_dir();
    if !source_dir.is_dir() {
        return Err(ScanError::MissingDirectory(source_dir));
    }

    let output_dir = module.output_dir();
    let mut result = ScanResult::default();
    let entries = read_sorted(&source_dir).map_err(|source| ScanError::ReadDir {
        path: source_dir.clone(),
        source,
    })?;

    collect_headers(entries, &output_dir, module, extensions, &mut result);

    tracing::debug!(
        module = %module.name,
        files = result.files.len(),
        excluded = result.excluded.len(),
        "Scanned module"
    );
    Ok(result)
}

fn read_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn collect_headers(
    entries: Vec<PathBuf>,
    output_dir: &Path,
    module: &ModuleDescriptor,
    extensions: &[String],
    result: &mut ScanResult,
) {
    for path in entries {
        if path.is_dir() {
            if path == output_dir || path.file_name().is_some_and(|n| n == OUTPUT_DIR_NAME) {
                continue;
            }
            match read_sorted(&path) {
                Ok(children) => collect_headers(children, output_dir, module, extensions, result),
                Err(err) => {
                    tracing::warn!("Skipping unreadable directory {}: {}", path.display(), err);
                }
            }
            continue;
        }

        if !has_header_extension(&path, extensions) {
            continue;
        }

        if !path.is_file() {
            tracing::warn!("File {} does not exist, skipping", path.display());
            result.missing.push(path);
            continue;
        }

        if let Some(pattern) = module.exclusions.matching(&path) {
            tracing::debug!("Excluded {} (matches '{}')", path.display(), pattern.as_str());
            result.excluded.push(path);
            continue;
        }

        tracing::trace!("Found {}", path.display());
        result.files.push(path);
    }
}

fn has_header_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}
