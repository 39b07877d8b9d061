use std::io::Write;

use log::LevelFilter;

/// Host name of this node, or `"unknown"` if it cannot be read.
pub fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// One diagnostic line: `GIO:<LEVEL>:<host>:<rank>: <message>`.
pub fn format_line(level: log::Level, host: &str, rank: i32, msg: &std::fmt::Arguments) -> String {
    format!("GIO:{}:{}:{}: {}", level, host, rank, msg)
}

/// Install the stderr logger for this rank.
///
/// `RUST_LOG`, when set, overrides the level chosen by `-v`.
pub fn init_logging(rank: i32, verbosity: u8) {
    let host = hostname();
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_for(verbosity));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder
        .target(env_logger::Target::Stderr)
        .format(move |buf, record| {
            writeln!(buf, "{}", format_line(record.level(), &host, rank, record.args()))
        });
    // A logger may already be installed when running under the test harness.
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line(log::Level::Error, "node07", 12, &format_args!("open failed"));
        assert_eq!(line, "GIO:ERROR:node07:12: open failed");
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn test_hostname_nonempty() {
        assert!(!hostname().is_empty());
    }
}
