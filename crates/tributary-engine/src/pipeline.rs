//! Module generation pipeline
//!
//! One module pass: scan, parse, resolve verdicts, then classify, generate
//! and write the artifacts of every emitting type before finishing the
//! umbrella files. Modules of a batch run one after another; a module that
//! aborts leaves the others untouched.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::aggregate::ModuleBuildContext;
use crate::codegen::{ArtifactGenerator, StemAllocator};
use crate::config::{GeneratorConfig, ModuleDescriptor};
use crate::error::Result;
use crate::logging::HIDDEN_TARGET;
use crate::parser::{normalize_lexically, Diagnostic, ParseRequest, Severity, SyntaxTreeProvider};
use crate::reflect::{
    check_nested_cycles, classify_type, Classification, ReflectabilityResolver, TypeIndex,
    Verdict,
};
use crate::scan::scan_module;

/// Counts for one module pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModuleReport {
    pub module: String,
    pub files_scanned: usize,
    pub files_excluded: usize,
    /// Types declared in the module's candidate headers
    pub types_discovered: usize,
    pub reflectable: usize,
    pub dummy: usize,
    pub no_reflect: usize,
    pub overrides: usize,
    pub artifacts_written: usize,
    pub write_failures: usize,
    /// Types abandoned before generation, e.g. on cyclic nesting
    pub type_failures: usize,
    /// Reason the module pass stopped early
    pub aborted: Option<String>,
    pub elapsed_ms: u64,
}

impl ModuleReport {
    fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Aborted, or lost at least one type or artifact
    pub fn has_failures(&self) -> bool {
        self.is_aborted() || self.write_failures > 0 || self.type_failures > 0
    }
}

/// Reports of a batch, in run order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub modules: Vec<ModuleReport>,
}

impl RunSummary {
    pub fn files_scanned(&self) -> usize {
        self.modules.iter().map(|m| m.files_scanned).sum()
    }

    pub fn artifacts_written(&self) -> usize {
        self.modules.iter().map(|m| m.artifacts_written).sum()
    }

    pub fn aborted(&self) -> usize {
        self.modules.iter().filter(|m| m.is_aborted()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.modules.iter().any(ModuleReport::has_failures)
    }
}

/// Drives module passes against one syntax tree provider
pub struct Orchestrator<'a> {
    provider: &'a dyn SyntaxTreeProvider,
    config: &'a GeneratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(provider: &'a dyn SyntaxTreeProvider, config: &'a GeneratorConfig) -> Self {
        Self { provider, config }
    }

    /// Run every module in order
    pub fn run(&self, modules: &[ModuleDescriptor]) -> RunSummary {
        let modules = modules.iter().map(|m| self.run_module(m)).collect();
        RunSummary { modules }
    }

    /// Run one module pass; failures are reported, never propagated
    pub fn run_module(&self, module: &ModuleDescriptor) -> ModuleReport {
        let span = info_span!("module", name = %module.name);
        let _enter = span.enter();
        let started = Instant::now();

        let mut report = ModuleReport::new(&module.name);
        if let Err(e) = self.generate(module, &mut report) {
            error!("Aborting module '{}': {}", module.name, e);
            report.aborted = Some(e.to_string());
        }
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            files = report.files_scanned,
            reflectable = report.reflectable,
            dummy = report.dummy,
            artifacts = report.artifacts_written,
            "Finished module '{}' in {}ms",
            module.name,
            report.elapsed_ms
        );
        report
    }

    fn generate(&self, module: &ModuleDescriptor, report: &mut ModuleReport) -> Result<()> {
        let config = self.config;

        let scan = scan_module(module, &config.scan.extensions)?;
        for path in &scan.missing {
            warn!("Skipping unreadable entry {}", path.display());
        }
        report.files_scanned = scan.files.len();
        report.files_excluded = scan.excluded.len();

        let candidates: FxHashSet<PathBuf> =
            scan.files.iter().map(|f| normalize_lexically(f)).collect();
        let request = ParseRequest {
            module: module.name.clone(),
            files: scan.files,
            include_paths: module.include_paths.clone(),
            system_include_paths: module.system_include_paths.clone(),
        };
        let tree = self.provider.parse(&request).inspect_err(|failure| {
            error!("{}", failure.rendered);
        })?;
        log_diagnostics(&tree.diagnostics);

        let index = TypeIndex::build(&tree);
        let is_candidate = |path: &Path| candidates.contains(path);
        report.types_discovered = index
            .iter()
            .filter(|entry| is_candidate(&entry.decl.path))
            .count();

        let verdicts =
            ReflectabilityResolver::new(&config.policy).resolve_module(&index, is_candidate);
        report.reflectable = verdicts.count(|v| v == Verdict::Reflectable);
        report.dummy = verdicts.count(|v| v == Verdict::DummyRequired);
        report.no_reflect = verdicts.count(Verdict::is_no_reflect);

        let mut context = ModuleBuildContext::new(module, &config.emit, config.output.impl_mode);
        context.prepare()?;
        report.overrides = context.merge_overrides()?;

        let generator = ArtifactGenerator::new(&config.emit, context.output_dir());
        let mut stems = StemAllocator::new(config.scan.case_sensitivity.is_insensitive());

        for (name, verdict) in verdicts.iter() {
            if !verdict.emits_artifacts() {
                continue;
            }
            let Some(decl) = index.decl(name) else {
                continue;
            };

            let classification = if verdict == Verdict::Reflectable {
                if let Err(e) = check_nested_cycles(name, &index) {
                    error!("{}", e);
                    report.type_failures += 1;
                    continue;
                }
                classify_type(decl, &verdicts)
            } else {
                Classification::default()
            };

            let stem = stems.allocate(decl);
            for artifact in generator.generate(decl, verdict, &classification, &stem) {
                match artifact.write() {
                    Ok(()) => {
                        debug!("Wrote {} for '{}'", artifact.kind, name);
                        context.record(&artifact);
                        report.artifacts_written += 1;
                    }
                    Err(e) => {
                        error!("{}", e);
                        report.write_failures += 1;
                    }
                }
            }
        }

        context.finalize()?;
        Ok(())
    }
}

/// Parse diagnostics of a successful parse go to the captured log only,
/// each at its own level
fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.severity {
            Severity::Error => error!(target: HIDDEN_TARGET, "{}", diagnostic),
            Severity::Warning => warn!(target: HIDDEN_TARGET, "{}", diagnostic),
            Severity::Info => info!(target: HIDDEN_TARGET, "{}", diagnostic),
        }
    }
}
