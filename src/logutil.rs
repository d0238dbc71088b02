//! Logging setup plus a helper that keeps user-supplied text on one log line.

use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::config::LoggingConfig;

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///
/// Strings longer than 300 characters are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Level to use: any verbosity flag wins over the configured level.
pub fn resolve_level(config: &LoggingConfig, verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::from_str(config.level.trim()).unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn line(record: &log::Record<'_>) -> String {
    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!("{} [{}] {}", ts, record.level(), record.args())
}

/// Install the global logger. With a log file configured every line is
/// appended to it, and also echoed to the console when stdout is a TTY.
/// Calling this twice is harmless; the second call does nothing.
pub fn init_logging(config: &LoggingConfig, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(resolve_level(config, verbosity));

    let file = config.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    match file {
        Some(f) => {
            let sink = Arc::new(Mutex::new(f));
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let line = line(record);
                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| writeln!(fmt, "{}", line(record)));
        }
    }
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_newlines_and_truncates() {
        assert_eq!(escape_log("Line1\nLine2\r\tEnd"), "Line1\\nLine2\\r\\tEnd");
        let long = "x".repeat(400);
        let esc = escape_log(&long);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), 301);
        assert_eq!(escape_log("bell\u{7}"), "bell\\x07");
    }

    #[test]
    fn verbosity_overrides_config_level() {
        let config = LoggingConfig {
            level: "warn".into(),
            file: None,
        };
        assert_eq!(resolve_level(&config, 0), log::LevelFilter::Warn);
        assert_eq!(resolve_level(&config, 1), log::LevelFilter::Debug);
        assert_eq!(resolve_level(&config, 3), log::LevelFilter::Trace);
        let junk = LoggingConfig {
            level: "loud".into(),
            file: None,
        };
        assert_eq!(resolve_level(&junk, 0), log::LevelFilter::Info);
    }
}
