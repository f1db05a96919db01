//! Log subscriber setup for programs that drive the map.
//!
//! [`crate::lru_map`] never logs. The scenario runner and the CLI emit
//! `tracing` events, and [`init_logging`] installs one global subscriber for
//! them: a console layer on stderr plus an optional append-only file layer,
//! both in the configured [`LogFormat`]. `RUST_LOG`, when set, replaces the
//! configured level.
//!
//! Field names in use: `scenario`, `capacity`, `step`, `op`, `message`,
//! `steps`, `failures`, `elapsed_ms`.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter, time::SystemTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

pub use crate::config::LogFormat;

/// Set once the global subscriber is in place.
static INSTALLED: OnceLock<LogFormat> = OnceLock::new();

/// `[logging]` section of lrumap.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Append a copy of every event here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    LogLevel::Info.as_str().to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("a global log subscriber is already installed")]
    AlreadyInitialized,

    #[error("unknown log level {0:?}; expected trace, debug, info, warn or error")]
    InvalidLevel(String),

    #[error("cannot open log file {}: {source}", path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("installing the log subscriber failed: {0}")]
    SetSubscriber(#[from] TryInitError),
}

/// Verbosity, most verbose first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [Self; 5] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Warn,
        Self::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("warning") {
            return Ok(Self::Warn);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LogError::InvalidLevel(s.to_string()))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Human-readable lines.
fn pretty_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(ansi)
}

/// One JSON object per line; event fields at the top level, the enclosing
/// span under `span`.
fn json_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_writer(writer)
        .with_timer(SystemTime)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .flatten_event(true)
}

/// Open `path` for appending, creating missing parent directories. On unix
/// new directories are `0o700` and a new file `0o600`.
fn open_log_file(path: &Path) -> Result<File, LogError> {
    let create = || -> io::Result<File> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            let mut builder = DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);
            builder.create(dir)?;
        }
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
        options.open(path)
    };
    create().map_err(|source| LogError::FileCreate {
        path: path.to_path_buf(),
        source,
    })
}

/// Install the global subscriber described by `config`.
///
/// Only the first successful call installs anything; later calls return
/// [`LogError::AlreadyInitialized`].
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    if is_logging_initialized() {
        return Err(LogError::AlreadyInitialized);
    }

    let level: LogLevel = config.level.parse()?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(level).into())
        .from_env_lossy();
    let file = config.file.as_deref().map(open_log_file).transpose()?;

    let (console, copy) = match config.format {
        LogFormat::Pretty => (
            pretty_layer(io::stderr, true).boxed(),
            file.map(|f| pretty_layer(Mutex::new(f), false).boxed()),
        ),
        LogFormat::Json => (
            json_layer(io::stderr).boxed(),
            file.map(|f| json_layer(Mutex::new(f)).boxed()),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(copy)
        .try_init()?;
    let _ = INSTALLED.set(config.format);

    tracing::debug!(
        level = %level,
        format = %config.format,
        file = ?config.file,
        "logging initialized"
    );
    Ok(())
}

pub fn is_logging_initialized() -> bool {
    INSTALLED.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use std::io::Write;
    use std::sync::Arc;

    /// In-memory sink shared between the layer and the test.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        fn make_writer(&self) -> impl for<'w> MakeWriter<'w> + Send + Sync + 'static {
            let shared = self.clone();
            move || shared.clone()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        let cases = [
            ("trace", LogLevel::Trace),
            ("DEBUG", LogLevel::Debug),
            (" info ", LogLevel::Info),
            ("Warning", LogLevel::Warn),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ];
        for (text, level) in cases {
            assert_eq!(text.parse::<LogLevel>().unwrap(), level, "{text}");
        }
        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert!(matches!(err, LogError::InvalidLevel(ref s) if s == "loud"));
        assert!(err.to_string().contains("expected trace, debug"));
    }

    #[test]
    fn levels_order_and_map_to_filters() {
        assert!(LogLevel::Trace < LogLevel::Error);
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        for level in LogLevel::ALL {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn empty_section_uses_defaults() {
        let config: LogConfig = toml::from_str("").unwrap();
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn bad_level_is_rejected_before_install() {
        let config = LogConfig {
            level: "chatty".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(LogError::InvalidLevel(_))
        ));
        assert!(!is_logging_initialized());
    }

    #[test]
    fn json_events_carry_scenario_span() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::DEBUG)
            .with(json_layer(capture.make_writer()));

        tracing::subscriber::with_default(subscriber, || {
            Scenario::demo().unwrap().run(3).unwrap();
        });

        let events: Vec<serde_json::Value> = capture
            .text()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        let steps = events
            .iter()
            .filter(|e| e["message"] == "executing step")
            .count();
        assert_eq!(steps, 11);

        let done = events
            .iter()
            .find(|e| e["message"] == "scenario finished")
            .unwrap();
        assert_eq!(done["steps"], 11);
        assert_eq!(done["failures"], 0);
        assert!(done["elapsed_ms"].is_u64());
        assert!(done.get("timestamp").is_some());
        assert_eq!(done["span"]["scenario"], "demo");
        assert_eq!(done["span"]["capacity"], 3);
    }

    #[test]
    fn file_copy_has_no_ansi() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::INFO)
            .with(pretty_layer(capture.make_writer(), false));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(step = 2, op = "get", "expectation failed");
        });

        let text = capture.text();
        assert!(text.contains("expectation failed"));
        assert!(text.contains("step=2"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn log_file_parent_dirs_are_created() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a").join("b").join("lrumap.log");
        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);
        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn unopenable_log_file_names_the_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let err = open_log_file(&blocker.join("lrumap.log")).unwrap_err();
        assert!(matches!(err, LogError::FileCreate { .. }));
        assert!(err.to_string().contains("not-a-dir"));
    }

    #[cfg(unix)]
    #[test]
    fn log_file_permissions_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("lrumap.log");
        open_log_file(&path).unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&tmp.path().join("logs")), 0o700);
        assert_eq!(mode(&path), 0o600);
    }
}
