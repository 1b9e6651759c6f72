//! Tributary command-line tool
//!
//! Generates reflector and prototype metadata for one module, or for the
//! batch of modules listed in a config file, and prints a summary.

mod args;
mod output;

use anyhow::Context;
use std::path::{Path, PathBuf};
use tributary_engine::config::{CaseSensitivity, CONFIG_FILE_NAME};
use tributary_engine::logging::{self, LogLevel};
use tributary_engine::{GeneratorConfig, HeaderParser, ModuleDescriptor, Orchestrator};

use args::{Cli, Format};
use output::{resolve_color_choice, StyledOutput};

fn main() -> anyhow::Result<()> {
    let cli = Cli::from_env();

    let level = if cli.silent {
        LogLevel::Silent
    } else {
        cli.verbosity.map(LogLevel::from_verbosity).unwrap_or_default()
    };
    let capture = logging::init(level);

    let (config, config_dir) = load_config(&cli)?;
    let modules = module_descriptors(&cli, &config, config_dir.as_deref())?;

    let provider = HeaderParser::new();
    let summary = Orchestrator::new(&provider, &config).run(&modules);

    match cli.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Format::Text if !cli.silent => {
            let mut out = StyledOutput::stdout(resolve_color_choice());
            if let Err(e) = out.summary(&summary) {
                eprintln!("Error: failed to print summary: {}", e);
            }
        }
        Format::Text => {}
    }

    if let Some(dir) = cli.log_dir.as_ref().or(config.output.log_dir.as_ref()) {
        match capture.write_to_dir(dir) {
            Ok(Some(path)) => tracing::debug!("Log written to {}", path.display()),
            Ok(None) => {}
            Err(e) => eprintln!("Error: failed to write log to {}: {}", dir.display(), e),
        }
    }

    Ok(())
}

/// Load the config file and layer the command-line values over it.
///
/// Returns the merged config and the directory of the file it came from.
fn load_config(cli: &Cli) -> anyhow::Result<(GeneratorConfig, Option<PathBuf>)> {
    let (mut config, source) = match &cli.config {
        Some(path) => {
            let config = GeneratorConfig::load(path)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            (config, Some(path.clone()))
        }
        None => {
            let root = cli.module_root.clone().unwrap_or_else(|| PathBuf::from("."));
            let candidate = root.join(CONFIG_FILE_NAME);
            let config = GeneratorConfig::discover(&root)
                .with_context(|| format!("Invalid config file {}", candidate.display()))?;
            (config, candidate.is_file().then_some(candidate))
        }
    };

    if let Some(policy) = cli.struct_default {
        config.policy.struct_default = policy;
    }
    if let Some(policy) = cli.class_default {
        config.policy.class_default = policy;
    }
    if cli.case_insensitive {
        config.scan.case_sensitivity = CaseSensitivity::Insensitive;
    } else if cli.case_sensitive {
        config.scan.case_sensitivity = CaseSensitivity::Sensitive;
    }
    if let Some(mode) = cli.impl_mode {
        config.output.impl_mode = mode;
    }
    config.scan.exclude.extend(cli.exclude.iter().cloned());

    let config_dir = source.and_then(|path| path.parent().map(Path::to_path_buf));
    Ok((config, config_dir))
}

/// The module from `--moduleroot`, else the config's `[[modules]]`, else
/// the current directory.
fn module_descriptors(
    cli: &Cli,
    config: &GeneratorConfig,
    config_dir: Option<&Path>,
) -> anyhow::Result<Vec<ModuleDescriptor>> {
    let mut modules = Vec::new();

    if cli.module_root.is_none() && !config.modules.is_empty() {
        for entry in &config.modules {
            let root = match config_dir {
                Some(dir) if entry.root.is_relative() => dir.join(&entry.root),
                _ => entry.root.clone(),
            };
            let module =
                ModuleDescriptor::with_exclusions(&root, entry.name.clone(), &entry.exclude, config)
                    .with_context(|| format!("Invalid module entry {}", entry.root.display()))?;
            modules.push(module);
        }
    } else {
        let root = match &cli.module_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Cannot determine the current directory")?,
        };
        let module = ModuleDescriptor::new(&root, cli.module.clone(), config)
            .with_context(|| format!("Invalid module root {}", root.display()))?;
        modules.push(module);
    }

    for module in &mut modules {
        for include in &cli.include {
            module.add_system_include_path(include);
        }
    }
    Ok(modules)
}
