use std::io::Write;
use env_logger::{Builder, Env};
use log::Level;

/// Level names as they appear in the function's CloudWatch log lines.
pub fn level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

/// Installs `env_logger`, filtered by `RUST_LOG` (default `info`), writing
/// `[LEVEL]\t\t: message` lines. Does nothing if a logger is already installed.
pub fn set_up_logging() {
    let _ = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{}]\t\t: {}", level_label(record.level()), record.args()))
        .try_init();
}
