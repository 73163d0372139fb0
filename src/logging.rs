/*
================================================================================
                            fp-reviewer Logging
================================================================================

Console logging through the `log` macros plus crash diagnostics.

- `CompositeLogger` sends every record to an env_logger console logger and to
  a `BufferLogger` that keeps the last MAX_LOG_LINES crate entries in memory.
- `setup_logger()` installs it. RUST_LOG wins when set; otherwise debug builds
  show DEBUG and above for this crate, release builds INFO and above. Other
  crates are filtered out.
- `setup_panic_hook()` writes the panic location, the build info, a backtrace and the buffered
  log lines to <data_dir>/fp-reviewer/logs/panic.log and echoes them to stderr.

================================================================================
*/

use std::panic;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use std::path::PathBuf;
use env_logger::fmt::Color;
use log::{LevelFilter, Metadata, Record};
use env_logger::fmt::Formatter;
use chrono::Utc;

use crate::build_info::BuildInfo;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

const MAX_LOG_LINES: usize = 1000;
const LOG_TARGET: &str = "fp_reviewer";

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

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
        if !target.starts_with(LOG_TARGET) {
            return;
        }
        // A poisoned buffer only means a panic happened mid-push; keep logging
        let mut buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if buffer.len() == MAX_LOG_LINES {
            buffer.pop_front();
        }

        let formatted_message = if let Some(line_num) = line {
            format!("{target}:{line_num} {message}")
        } else {
            format!("{target} {message}")
        };

        buffer.push_back(formatted_message);
    }

    fn get_shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(LOG_TARGET) && metadata.level() <= LevelFilter::Debug
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

pub fn setup_logger() -> LogBuffer {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        if cfg!(debug_assertions) {
            builder.filter(Some(LOG_TARGET), LevelFilter::Debug);
        } else {
            builder.filter(Some(LOG_TARGET), LevelFilter::Info);
        }
        // Filter out all other crates' logs
        builder.filter(None, LevelFilter::Off);
    }

    builder.format(|buf: &mut Formatter, record: &Record| {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let module_info = if let (Some(module), Some(line)) = (record.module_path(), record.line()) {
            format!("{module}:{line}")
        } else if let Some(module) = record.module_path() {
            module.to_string()
        } else {
            "unknown".to_string()
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

        #[cfg(target_os = "macos")]
        {
            // Color::Rgb does not work on macOS
            meta_style.set_color(Color::Blue);
        }

        #[cfg(not(target_os = "macos"))]
        {
            meta_style.set_color(Color::Rgb(120, 120, 120));
        }

        writeln!(
            buf,
            "{} {} {} {}",
            meta_style.value(timestamp),
            level_style.value(record.level()),
            meta_style.value(module_info),
            record.args()
        )
    });

    let console_logger = builder.build();

    let composite_logger = CompositeLogger {
        console_logger,
        buffer_logger,
    };

    if let Err(e) = log::set_boxed_logger(Box::new(composite_logger)) {
        eprintln!("Failed to set logger: {e}");
    }

    // Always set the maximum level to Trace so that filtering works correctly
    log::set_max_level(LevelFilter::Trace);

    shared_buffer
}

pub fn get_log_directory(app_name: &str) -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_name).join("logs")
}

pub fn setup_panic_hook(app_name: &str, log_buffer: LogBuffer) {
    let log_file_path = get_log_directory(app_name).join("panic.log");
    if let Some(parent) = log_file_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create log directory {}: {}", parent.display(), e);
        }
    }

    let build_lines = BuildInfo::CURRENT.lines();

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = if let Some(location) = info.location() {
            format!("{}:{}", location.file(), location.line())
        } else {
            "unknown location".to_string()
        };

        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        let log_lines: Vec<String> = match log_buffer.lock() {
            Ok(buffer) => buffer.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        };

        let written = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_file_path)
            .and_then(|mut file| {
                writeln!(file, "{timestamp} {header_msg}")?;
                for line in &build_lines {
                    writeln!(file, "{timestamp} [BUILD] {line}")?;
                }
                writeln!(file, "{timestamp} [PANIC] Backtrace:")?;
                for line in &backtrace_lines {
                    writeln!(file, "{timestamp} {line}")?;
                }
                writeln!(file)?;
                writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
                for log in &log_lines {
                    writeln!(file, "{timestamp} {log}")?;
                }
                file.flush()
            });

        eprintln!("\n\n{header_msg}");
        eprintln!("[PANIC] Backtrace:");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }
        match written {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log {}: {}", log_file_path.display(), e),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_keeps_last_entries() {
        let logger = BufferLogger::new();
        for i in 0..(MAX_LOG_LINES + 5) {
            logger.log_to_buffer(&format!("INFO  entry {i}"), "fp_reviewer::review", Some(10));
        }

        let buffer = logger.get_shared_buffer();
        let buffer = buffer.lock().unwrap();
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer.front().unwrap(), "fp_reviewer::review:10 INFO  entry 5");
    }

    #[test]
    fn test_buffer_ignores_other_crates() {
        let logger = BufferLogger::new();
        logger.log_to_buffer("INFO  noise", "wgpu_core::device", None);
        logger.log_to_buffer("INFO  kept", "fp_reviewer", None);

        let buffer = logger.get_shared_buffer();
        let buffer = buffer.lock().unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0], "fp_reviewer INFO  kept");
    }
}
