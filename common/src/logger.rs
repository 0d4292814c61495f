use chrono::Local;
use colored::Colorize;
use fern::Dispatch;
use log::LevelFilter;
use std::fs::{OpenOptions, create_dir_all};
use std::path::Path;
use util::config::AppConfig;

fn level_filter(log_level: &str) -> LevelFilter {
    match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

pub fn init_logger(log_level: &str, log_file_path: &str, log_to_stdout: bool) {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.exists() {
            create_dir_all(parent).expect("Failed to create log directory");
        }
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .expect("Cannot open log file");

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            let level_str = match record.level() {
                log::Level::Error => "ERROR".red(),
                log::Level::Warn => "WARN".yellow(),
                log::Level::Info => "INFO".green(),
                log::Level::Debug => "DEBUG".cyan(),
                log::Level::Trace => "TRACE".normal(),
            };

            out.finish(format_args!(
                "[{}][{}][{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_str,
                record.target(),
                message
            ))
        })
        .level(level_filter(log_level))
        .chain(log_file);

    if log_to_stdout {
        dispatch = dispatch.chain(std::io::stdout());
    }

    dispatch.apply().expect("Failed to initialize logger");
}

/// Initializes logging from the global [`AppConfig`].
pub fn init_logger_from_config() {
    let (level, file, stdout) = {
        let cfg = AppConfig::global();
        (cfg.log_level.clone(), cfg.log_file.clone(), cfg.log_to_stdout)
    };
    init_logger(&level, &file, stdout);
}
