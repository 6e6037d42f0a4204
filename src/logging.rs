use slog::Drain;
use std::str::FromStr;

/// Root logger writing to the terminal through an async drain, dropping records below `level`.
pub fn create_root_logger_for_stdout(level: slog::Level) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}

/// Accepts "critical", "error", "warn", "info", "debug" and "trace", in any case.
pub fn parse_level(name: &str) -> Option<slog::Level> {
    if name.eq_ignore_ascii_case("off") {
        return None;
    }
    slog::Level::from_str(name).ok()
}
