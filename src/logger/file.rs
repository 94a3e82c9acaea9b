/// Daily log file output
///
/// Lines are appended to `logs/metabot_<date>.log`; the file rolls over when the local
/// date changes. Failures to open or write are reported once on stderr and never
/// interrupt the caller.
use super::config::get_logger_config;
use crate::paths::get_logs_directory;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};

struct LogFile {
    date: String,
    writer: BufWriter<File>,
}

static LOG_FILE: Lazy<Mutex<Option<LogFile>>> = Lazy::new(|| Mutex::new(None));
static FILE_ENABLED: AtomicBool = AtomicBool::new(false);
static OPEN_ERROR_REPORTED: AtomicBool = AtomicBool::new(false);

pub fn init_file_logging() {
    FILE_ENABLED.store(get_logger_config().file_logging, Ordering::SeqCst);
}

fn open_for_date(date: &str) -> Option<LogFile> {
    let dir = get_logs_directory();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        report_once(&format!("Logger cannot create {}: {}", dir.display(), e));
        return None;
    }
    let path = dir.join(format!("metabot_{}.log", date));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(LogFile {
            date: date.to_string(),
            writer: BufWriter::new(file),
        }),
        Err(e) => {
            report_once(&format!("Logger cannot open {}: {}", path.display(), e));
            None
        }
    }
}

fn report_once(message: &str) {
    if !OPEN_ERROR_REPORTED.swap(true, Ordering::SeqCst) {
        eprintln!("{}", message);
    }
}

pub fn write_to_file(line: &str) {
    if !FILE_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let today = Local::now().format("%Y-%m-%d").to_string();
    let mut guard = LOG_FILE.lock();

    let needs_rollover = guard.as_ref().map(|f| f.date != today).unwrap_or(true);
    if needs_rollover {
        if let Some(mut old) = guard.take() {
            let _ = old.writer.flush();
        }
        *guard = open_for_date(&today);
    }

    if let Some(file) = guard.as_mut() {
        let _ = writeln!(file.writer, "{}", line);
    }
}

pub fn flush_file_logging() {
    if let Some(file) = LOG_FILE.lock().as_mut() {
        let _ = file.writer.flush();
    }
}
