//! Diagnostics for the annotation engine.
//!
//! # Responsibility
//! - Route the engine's `event=... module=... status=...` lines to rolling
//!   files under one directory per process.
//! - Turn panics into a single sanitized `panic_captured` event.
//!
//! # Invariants
//! - Log lines carry scope, annotation ids and offsets only. Note bodies and
//!   highlighted text never reach a log file; panic payloads are flattened
//!   and capped because they may echo either.
//! - Repeating `init_logging` with the same level and directory is a no-op;
//!   any other combination is refused once logging runs.
//! - Initialization reports failures as errors and never panics.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "spanote";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoggingConfig {
    level: LevelFilter,
    log_dir: PathBuf,
}

impl LoggingConfig {
    fn parse(level: &str, log_dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: parse_level(level)?,
            log_dir: parse_log_dir(log_dir)?,
        })
    }

    fn ensure_matches(&self, requested: &LoggingConfig) -> Result<(), String> {
        if self.log_dir != requested.log_dir {
            return Err(format!(
                "logging already writes to `{}`; refusing to switch to `{}`",
                self.log_dir.display(),
                requested.log_dir.display()
            ));
        }
        if self.level != requested.level {
            return Err(format!(
                "logging already runs at `{}`; refusing to switch to `{}`",
                self.level, requested.level
            ));
        }
        Ok(())
    }
}

struct ActiveLogger {
    config: LoggingConfig,
    _handle: LoggerHandle,
}

/// Starts file logging for the engine.
///
/// `level` is one of `trace|debug|info|warn|error` (case-insensitive,
/// `warning` accepted); `log_dir` must be absolute.
///
/// # Errors
/// - Unknown level, or `off`.
/// - Blank or relative `log_dir`, or a directory that cannot be created.
/// - Logging already runs with another level or directory.
/// - The flexi_logger backend fails to start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let requested = LoggingConfig::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(requested.clone()))?;
    active.config.ensure_matches(&requested)
}

/// Active `(level, log_dir)`, if logging was started.
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.config.level, active.config.log_dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(config: LoggingConfig) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&config.log_dir).map_err(|err| {
        format!(
            "cannot create log directory `{}`: {err}",
            config.log_dir.display()
        )
    })?;

    let handle = Logger::with(LogSpecification::builder().default(config.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(config.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("cannot start logger: {err}"))?;

    install_panic_hook();

    info!(
        "event=logging_init module=core status=ok version={} os={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        config.level,
        config.log_dir.display()
    );

    Ok(ActiveLogger {
        config,
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let trimmed = level.trim();
    let parsed = if trimmed.eq_ignore_ascii_case("warning") {
        Ok(LevelFilter::Warn)
    } else {
        trimmed.parse::<LevelFilter>()
    };
    match parsed {
        Ok(LevelFilter::Off) | Err(_) => Err(format!(
            "unsupported log level `{trimmed}`; expected trace|debug|info|warn|error"
        )),
        Ok(filter) => Ok(filter),
    }
}

fn parse_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let path = Path::new(log_dir.trim());
    if path.as_os_str().is_empty() {
        return Err("log directory must not be blank".to_string());
    }
    if !path.is_absolute() {
        return Err(format!(
            "log directory must be absolute, got `{}`",
            path.display()
        ));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            flatten_and_cap(payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// One-line, length-capped rendering of free text.
fn flatten_and_cap(value: &str, limit: usize) -> String {
    let mut out: String = value
        .chars()
        .take(limit)
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    if value.chars().nth(limit).is_some() {
        out.push_str("...");
    }
    out
}
