/*
Logging for obbview

- `CompositeLogger` sends records to the env_logger console backend and to a
  `BufferLogger` that keeps the last `MAX_LOG_LINES` crate records in memory.
- `setup_logger()` installs it. `RUST_LOG` wins when set; otherwise the crate
  logs at Debug in debug builds and Error in release builds, raised by `-v`.
  Other crates are filtered off.
- `export_debug_logs()` writes the captured records to debug.log.
- `setup_panic_hook()` dumps the same records to panic.log before the default
  hook runs.
*/

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{error, info, Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;

const MAX_LOG_LINES: usize = 1000;
const CRATE_TARGET: &str = "obbview";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Shared ring buffer of formatted log lines.
pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

static INSTALLED: OnceCell<LogBuffer> = OnceCell::new();

fn lock(buffer: &LogBuffer) -> MutexGuard<'_, VecDeque<String>> {
    // A panic while logging must not take the log buffer down with it.
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct BufferLogger {
    log_buffer: LogBuffer,
}

impl BufferLogger {
    fn new() -> Self {
        Self {
            log_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES))),
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str, line: Option<u32>) {
        let mut buffer = lock(&self.log_buffer);
        if buffer.len() == MAX_LOG_LINES {
            buffer.pop_front();
        }

        let formatted_message = match line {
            Some(line_num) => format!("{target}:{line_num} {message}"),
            None => format!("{target} {message}"),
        };
        buffer.push_back(formatted_message);
    }

    fn get_shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(CRATE_TARGET) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target(), record.line());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

/// Console level for the crate when `RUST_LOG` is unset.
pub fn default_level(verbosity: u8) -> LevelFilter {
    let base = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Error
    };
    let raised = match verbosity {
        0 => base,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    base.max(raised)
}

fn format_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);

    let module_info = match (record.module_path(), record.line()) {
        (Some(module), Some(line)) => format!("{module}:{line}"),
        (Some(module), None) => module.to_string(),
        (None, Some(line)) => format!("line:{line}"),
        (None, None) => "unknown".to_string(),
    };

    let mut level_style = buf.style();
    let mut meta_style = buf.style();

    match record.level() {
        Level::Error => level_style.set_color(Color::Red).set_bold(true),
        Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
        Level::Info => level_style.set_color(Color::Green).set_bold(true),
        Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
        Level::Trace => level_style.set_color(Color::White),
    };

    // Color::Rgb does not render on macOS terminals
    #[cfg(target_os = "macos")]
    meta_style.set_color(Color::Blue);
    #[cfg(not(target_os = "macos"))]
    meta_style.set_color(Color::Rgb(120, 120, 120));

    writeln!(
        buf,
        "{} {} {} {}",
        meta_style.value(timestamp),
        level_style.value(record.level()),
        meta_style.value(module_info),
        record.args()
    )
}

/// Install the composite logger and return its capture buffer.
///
/// Only the first call installs anything; later calls get the same buffer.
pub fn setup_logger(verbosity: u8) -> LogBuffer {
    Arc::clone(INSTALLED.get_or_init(|| install_logger(verbosity)))
}

fn install_logger(verbosity: u8) -> LogBuffer {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter(None, LevelFilter::Off);
        builder.filter(Some(CRATE_TARGET), default_level(verbosity));
    }
    builder.format(format_record);

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger,
    };

    match log::set_boxed_logger(Box::new(composite_logger)) {
        // Filtering happens in the loggers themselves.
        Ok(()) => log::set_max_level(LevelFilter::Trace),
        Err(e) => eprintln!("Logger already installed: {e}"),
    }

    shared_buffer
}

pub fn get_log_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CRATE_TARGET)
        .join("logs")
}

fn write_export(path: &Path, title: &str, entries: &[String]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
    writeln!(file, "{timestamp} [{title}] =====================================")?;
    writeln!(file, "{timestamp} [{title}] obbview {}", crate::build_info::BuildInfo::display_version())?;
    writeln!(file, "{timestamp} [{title}] Entries: {} (last {MAX_LOG_LINES} max)", entries.len())?;
    writeln!(file, "{timestamp} [{title}] =====================================")?;
    writeln!(file)?;

    for entry in entries {
        writeln!(file, "{entry}")?;
    }
    file.flush()
}

/// Write the captured records to `<dir>/debug.log`.
///
/// The buffer is copied before any I/O so logging can continue meanwhile.
pub fn export_debug_logs(dir: &Path, log_buffer: &LogBuffer) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("debug.log");

    let entries: Vec<String> = lock(log_buffer).iter().cloned().collect();
    write_export(&path, "DEBUG EXPORT", &entries)?;

    info!("Debug logs exported to: {}", path.display());
    Ok(path)
}

/// Dump the captured records to panic.log in the log directory before the
/// default hook prints the panic.
pub fn setup_panic_hook(log_buffer: LogBuffer) {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let dir = get_log_directory();
        let mut entries: Vec<String> = lock(&log_buffer).iter().cloned().collect();
        entries.push(format!("PANIC {info}"));

        let written = std::fs::create_dir_all(&dir)
            .and_then(|_| write_export(&dir.join("panic.log"), "PANIC", &entries));
        if let Err(e) = written {
            error!("Failed to write panic log: {e}");
        }
        default_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn record<'a>(target: &'a str, level: Level, args: std::fmt::Arguments<'a>) -> Record<'a> {
        Record::builder()
            .target(target)
            .level(level)
            .line(Some(42))
            .args(args)
            .build()
    }

    #[test]
    fn test_buffer_keeps_crate_records_only() {
        let logger = BufferLogger::new();
        logger.log(&record("obbview::session", Level::Info, format_args!("selected")));
        logger.log(&record("reqwest::connect", Level::Info, format_args!("noise")));
        logger.log(&record("obbview::overlay", Level::Trace, format_args!("too fine")));

        let buffer = lock(&logger.log_buffer);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0], "obbview::session:42 INFO  selected");
    }

    #[test]
    fn test_buffer_is_bounded() {
        let logger = BufferLogger::new();
        for i in 0..MAX_LOG_LINES + 5 {
            logger.log_to_buffer(&format!("line {i}"), "obbview", None);
        }
        let buffer = lock(&logger.log_buffer);
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer[0], "obbview line 5");
    }

    #[test]
    fn test_setup_is_idempotent() {
        let first = setup_logger(0);
        let second = setup_logger(3);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_verbosity_only_raises() {
        assert!(default_level(0) >= LevelFilter::Error);
        assert_eq!(default_level(3), LevelFilter::Trace);
        assert!(default_level(1) >= LevelFilter::Info);
    }

    #[test]
    fn test_export_writes_entries() {
        let logger = BufferLogger::new();
        logger.log_to_buffer("INFO  hello", "obbview::cli", Some(7));

        let dir = std::env::temp_dir().join(format!("obbview-logs-{}", std::process::id()));
        let path = export_debug_logs(&dir, &logger.get_shared_buffer()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Entries: 1"));
        assert!(contents.contains("obbview::cli:7 INFO  hello"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
