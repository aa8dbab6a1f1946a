use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

const SUPPRESS_THRESHOLD: u32 = 10;

// serenity's gateway chatter drowns out command logs at info level
static NOISY_PATTERNS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "do_heartbeat",
        "recv_event",
        "recv;",
        "Heartbeat",
        "dispatching event",
    ]
});

static NOISY_TARGETS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["tracing::span", "rustls", "h2", "hyper"]);

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to set logger: {0}")]
    SetLogger(#[from] log::SetLoggerError),
}

#[derive(Debug)]
struct LoggerState {
    file: Option<File>,
    /// Last line without its timestamp, used to detect repeats.
    last_entry: Option<String>,
    repeat_count: u32,
}

/// stdout + append-only file backend for the `log` facade.
pub struct BotLogger {
    state: Mutex<LoggerState>,
    level: LevelFilter,
}

impl BotLogger {
    pub fn new(log_file: Option<&str>, level: LevelFilter) -> Result<BotLogger, std::io::Error> {
        let file = match log_file {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };

        Ok(BotLogger {
            state: Mutex::new(LoggerState {
                file,
                last_entry: None,
                repeat_count: 0,
            }),
            level,
        })
    }

    pub fn init(log_file: Option<&str>) -> Result<(), LoggerError> {
        let level = LevelFilter::Info;
        let logger = BotLogger::new(log_file, level)?;
        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(level);
        Ok(())
    }

    fn is_noise(record: &Record) -> bool {
        let target = record.target();
        if record.level() > Level::Warn
            && NOISY_TARGETS.iter().any(|prefix| target.starts_with(prefix))
        {
            return true;
        }
        let message = record.args().to_string();
        NOISY_PATTERNS.iter().any(|pattern| message.contains(pattern))
    }

    fn write_line(state: &mut LoggerState, line: &str) {
        let stamped = format!("{} {}", Local::now().format("%Y-%m-%d %H:%M:%S"), line);
        println!("{}", stamped);
        if let Some(file) = state.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", stamped) {
                eprintln!("Failed to write log entry: {}", e);
            }
        }
    }

    fn flush_repeats(state: &mut LoggerState) {
        if state.repeat_count > 0 {
            let summary = format!("(previous message repeated {} times)", state.repeat_count);
            Self::write_line(state, &summary);
            state.repeat_count = 0;
        }
    }
}

impl Log for BotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) || Self::is_noise(record) {
            return;
        }

        let entry = format!("[{}] {}", record.level(), record.args());
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        if state.last_entry.as_deref() == Some(entry.as_str()) {
            state.repeat_count = state.repeat_count.saturating_add(1);
            if state.repeat_count >= SUPPRESS_THRESHOLD {
                Self::flush_repeats(&mut state);
            }
            return;
        }

        Self::flush_repeats(&mut state);
        Self::write_line(&mut state, &entry);
        state.last_entry = Some(entry);
    }

    fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            Self::flush_repeats(&mut state);
            if let Some(file) = state.file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(message: std::fmt::Arguments<'_>) -> Record<'_> {
        Record::builder()
            .level(Level::Info)
            .target("aos_community_bots")
            .args(message)
            .build()
    }

    #[test]
    fn test_logger_writes_to_file() {
        let path = std::env::temp_dir().join(format!("bot-logger-{}.log", std::process::id()));
        let path_str = path.to_string_lossy().into_owned();
        let _ = std::fs::remove_file(&path);

        let logger = BotLogger::new(Some(&path_str), LevelFilter::Info).unwrap();
        logger.log(&info(format_args!("winrates fetched")));
        logger.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[INFO] winrates fetched"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_logger_collapses_repeats() {
        let logger = BotLogger::new(None, LevelFilter::Info).unwrap();
        for _ in 0..6 {
            logger.log(&info(format_args!("same line")));
        }

        let state = logger.state.lock().unwrap();
        assert_eq!(state.last_entry.as_deref(), Some("[INFO] same line"));
        assert_eq!(state.repeat_count, 5);
    }

    #[test]
    fn test_repeat_counter_resets_at_threshold() {
        let logger = BotLogger::new(None, LevelFilter::Info).unwrap();
        for _ in 0..=SUPPRESS_THRESHOLD {
            logger.log(&info(format_args!("loop")));
        }
        assert_eq!(logger.state.lock().unwrap().repeat_count, 0);
    }

    #[test]
    fn test_gateway_noise_is_dropped() {
        let logger = BotLogger::new(None, LevelFilter::Info).unwrap();
        logger.log(&info(format_args!("[Shard] do_heartbeat sent")));
        assert!(logger.state.lock().unwrap().last_entry.is_none());

        let debug = Record::builder()
            .level(Level::Debug)
            .args(format_args!("hidden"))
            .build();
        logger.log(&debug);
        assert!(logger.state.lock().unwrap().last_entry.is_none());
    }
}
