use log::Log;
use log::{Level, LevelFilter};
use log::{Metadata, Record};

use crate::println;

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        use Level::*;
        let color = match record.level() {
            Error => 31,
            Warn => 93,
            Info => 34,
            Debug => 32,
            Trace => 90,
        };

        println!(
            "\u{1B}[{}m[{:<5}] [kernel] {}\u{1B}[0m",
            color,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Installs the serial logger. `LOG=debug` at build time raises the level.
pub fn init() {
    static LOGGER: SerialLogger = SerialLogger;
    if log::set_logger(&LOGGER).is_err() {
        println!("logger already installed");
        return;
    }

    let level = option_env!("LOG")
        .and_then(|s: &'static str| s.parse().ok())
        .unwrap_or(LevelFilter::Info);
    log::set_max_level(level);
}
