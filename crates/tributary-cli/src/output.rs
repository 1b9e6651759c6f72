//! Colored run summary
//!
//! Uses `termcolor` for cross-platform colored terminal output and respects
//! the `NO_COLOR` environment variable.

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tributary_engine::{ModuleReport, RunSummary};

/// `Never` when `NO_COLOR` is set, auto-detect otherwise
pub fn resolve_color_choice() -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Styled writer over any `WriteColor` sink
pub struct StyledOutput<W> {
    out: W,
}

impl StyledOutput<StandardStream> {
    pub fn stdout(choice: ColorChoice) -> Self {
        Self {
            out: StandardStream::stdout(choice),
        }
    }
}

impl<W: WriteColor> StyledOutput<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&mut self, text: &str, color: Option<Color>, bold: bool) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        self.out.set_color(&spec)?;
        write!(self.out, "{}", text)?;
        self.out.reset()
    }

    /// Green bold text
    pub fn success(&mut self, text: &str) -> io::Result<()> {
        self.styled(text, Some(Color::Green), true)
    }

    /// Red bold text
    pub fn error(&mut self, text: &str) -> io::Result<()> {
        self.styled(text, Some(Color::Red), true)
    }

    /// Yellow bold text
    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        self.styled(text, Some(Color::Yellow), true)
    }

    /// Bold text, default color
    pub fn bold(&mut self, text: &str) -> io::Result<()> {
        self.styled(text, None, true)
    }

    pub fn plain(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{}", text)
    }

    pub fn newline(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// One line per module, then the totals
    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        for report in &summary.modules {
            self.module(report)?;
        }

        self.bold("Scanned ")?;
        self.plain(&format!("{} file(s), ", summary.files_scanned()))?;
        self.bold("wrote ")?;
        self.plain(&format!("{} artifact(s)", summary.artifacts_written()))?;
        if summary.aborted() > 0 {
            self.plain(", ")?;
            self.error(&format!("{} module(s) aborted", summary.aborted()))?;
        }
        self.newline()?;
        self.flush()
    }

    fn module(&mut self, report: &ModuleReport) -> io::Result<()> {
        match &report.aborted {
            Some(_) => self.error(" ABORTED ")?,
            None if report.has_failures() => self.warning(" PARTIAL ")?,
            None => self.success(" OK ")?,
        }
        self.plain(" ")?;
        self.bold(&report.module)?;
        self.plain(&format!(
            ": {} file(s) scanned, {} type(s), {} reflectable, {} dummy, {} skipped, {} artifact(s) written",
            report.files_scanned,
            report.types_discovered,
            report.reflectable,
            report.dummy,
            report.no_reflect,
            report.artifacts_written
        ))?;
        if report.write_failures > 0 {
            self.plain(", ")?;
            self.warning(&format!("{} write failure(s)", report.write_failures))?;
        }
        if report.type_failures > 0 {
            self.plain(", ")?;
            self.warning(&format!("{} type(s) failed", report.type_failures))?;
        }
        self.newline()?;
        if let Some(reason) = &report.aborted {
            self.plain("    ")?;
            self.error(reason)?;
            self.newline()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn render(summary: &RunSummary) -> String {
        let mut out = StyledOutput::new(NoColor::new(Vec::new()));
        out.summary(summary).unwrap();
        String::from_utf8(out.into_inner().into_inner()).unwrap()
    }

    fn report(module: &str) -> ModuleReport {
        ModuleReport {
            module: module.to_string(),
            files_scanned: 2,
            types_discovered: 3,
            reflectable: 2,
            dummy: 1,
            artifacts_written: 12,
            ..ModuleReport::default()
        }
    }

    #[test]
    fn test_summary_lines() {
        let mut aborted = report("audio");
        aborted.aborted = Some("Module directory audio does not exist".into());
        let summary = RunSummary {
            modules: vec![report("core"), aborted],
        };

        let text = render(&summary);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            " OK  core: 2 file(s) scanned, 3 type(s), 2 reflectable, 1 dummy, 0 skipped, 12 artifact(s) written"
        );
        assert!(lines[1].starts_with(" ABORTED  audio"));
        assert_eq!(lines[2], "    Module directory audio does not exist");
        assert_eq!(
            lines[3],
            "Scanned 4 file(s), wrote 24 artifact(s), 1 module(s) aborted"
        );
    }

    #[test]
    fn test_partial_module() {
        let mut partial = report("core");
        partial.write_failures = 1;
        let text = render(&RunSummary {
            modules: vec![partial],
        });
        assert!(text.starts_with(" PARTIAL  core"));
        assert!(text.contains(", 1 write failure(s)"));
    }
}
