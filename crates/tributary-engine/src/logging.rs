//! Logging setup
//!
//! Console output goes through a `tracing-subscriber` fmt layer with an
//! uptime timer; error events go to stderr and everything else to stdout.
//! A second layer captures the same events into memory so the run log can be
//! flushed to a file at exit. Events with target [`HIDDEN_TARGET`] reach
//! only the capture.

use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{self, time::Uptime, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Target for events that are captured but never printed
pub const HIDDEN_TARGET: &str = "tributary::hidden";

/// Log file name prefix
pub const LOG_FILE_PREFIX: &str = "tributary_";

/// Verbosity levels, numbered like the `-v=` flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    #[default]
    Error = 4,
    Fatal = 5,
    Silent = 6,
}

impl LogLevel {
    /// Map a `-v=` number onto a level, clamping out-of-range values
    pub fn from_verbosity(verbosity: i64) -> Self {
        match verbosity {
            i64::MIN..=0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Fatal,
        }
    }

    /// Filter applied to console output
    pub fn console_filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
            LogLevel::Silent => LevelFilter::OFF,
        }
    }

    /// Filter applied to the captured log. Silent runs still capture errors.
    pub fn capture_filter(self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::ERROR,
            other => other.console_filter(),
        }
    }
}

/// Shared in-memory copy of the run log
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured text so far
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Flush the captured log into `dir`.
    ///
    /// Returns `Ok(None)` when nothing was captured.
    pub fn write_to_dir(&self, dir: &Path) -> io::Result<Option<PathBuf>> {
        if self.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(dir)?;
        let path = dir.join(log_file_name(chrono::Local::now()));
        std::fs::write(&path, self.buffer.lock().as_slice())?;
        Ok(Some(path))
    }
}

/// Writer handed out per event by [`LogCapture`]
pub struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// `tributary_<dd-MM-yyyy_HH-mm-ss.ff>.log`
pub fn log_file_name<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let hundredths = now.timestamp_subsec_millis() / 10;
    format!(
        "{}{}.{:02}.log",
        LOG_FILE_PREFIX,
        now.format("%d-%m-%Y_%H-%M-%S"),
        hundredths
    )
}

/// Console and capture layers for `level`, without installing them.
///
/// Events with the [`HIDDEN_TARGET`] target reach only `capture`.
pub fn subscriber(level: LogLevel, capture: &LogCapture) -> impl Subscriber + Send + Sync + 'static {
    let console = fmt::layer()
        .with_timer(Uptime::default())
        .with_target(false)
        .with_writer(io::stderr.with_max_level(Level::ERROR).or_else(io::stdout))
        .with_filter(filter_fn(|meta| meta.target() != HIDDEN_TARGET))
        .with_filter(level.console_filter());

    let captured = fmt::layer()
        .with_timer(Uptime::default())
        .with_target(false)
        .with_ansi(false)
        .with_writer(capture.clone())
        .with_filter(level.capture_filter());

    tracing_subscriber::registry().with(console).with(captured)
}

/// Install the global subscriber and return the capture handle.
///
/// If a subscriber is already installed (tests, embedding), the existing
/// one is kept and the returned capture stays empty.
pub fn init(level: LogLevel) -> LogCapture {
    let capture = LogCapture::new();

    if subscriber(level, &capture).try_init().is_err() {
        tracing::debug!("Global subscriber already installed, log capture disabled");
    }

    capture
}
