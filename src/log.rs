use chrono::Timelike;
use colored::Colorize;
use std::{
    fmt::Display,
    sync::atomic::{AtomicU8, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Log {
    Debug,
    Info,
    Warning,
    Error,
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Log::Info as u8);

impl Log {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Log::Debug,
            1 => Log::Info,
            2 => Log::Warning,
            _ => Log::Error,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "d" => Some(Log::Debug),
            "info" | "i" => Some(Log::Info),
            "warn" | "warning" | "w" => Some(Log::Warning),
            "error" | "e" => Some(Log::Error),
            _ => None,
        }
    }
}

/// Reads `BEATLANE_LOG` once at startup. Unknown values keep the default.
pub fn init_from_env() {
    if let Ok(value) = std::env::var("BEATLANE_LOG") {
        match Log::parse(&value) {
            Some(level) => set_level(level),
            None => log(Log::Warning, format!("unknown BEATLANE_LOG level \"{value}\"")),
        }
    }
}

pub fn set_level(level: Log) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(kind: Log) -> bool {
    kind >= Log::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

pub fn log(kind: Log, msg: impl Display) {
    if !enabled(kind) {
        return;
    }

    let now = chrono::Local::now();
    let h = now.hour();
    let m = now.minute();
    let s = now.second();

    let hms = format!("{h:02}:{m:02}:{s:02}").dimmed();

    let name = match kind {
        Log::Debug => "D".blue(),
        Log::Info => "I".green(),
        Log::Warning => "W".yellow(),
        Log::Error => "E".red(),
    }
    .bold();

    match kind {
        Log::Warning | Log::Error => eprintln!("{name} {hms} {msg}"),
        _ => println!("{name} {hms} {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(Log::parse("WARN"), Some(Log::Warning));
        assert_eq!(Log::parse(" debug "), Some(Log::Debug));
        assert_eq!(Log::parse("loud"), None);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(Log::Error > Log::Warning);
        assert!(Log::Info > Log::Debug);
    }
}
