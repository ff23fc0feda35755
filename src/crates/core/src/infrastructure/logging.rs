//! Logging level resolution shared by front ends.
//!
//! The library itself only logs through the `log` facade; binaries decide how records are
//! rendered and use these helpers to pick the level.

pub const LOG_LEVEL_ENV: &str = "PARLEY_LOG_LEVEL";

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" | "warning" => Some(log::LevelFilter::Warn),
        "error" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

/// Resolves the effective level: `PARLEY_LOG_LEVEL`, then the configured level, then the
/// debug/info default.
pub fn resolve_log_level(configured: Option<&str>, is_debug: bool) -> log::LevelFilter {
    let env_value = std::env::var(LOG_LEVEL_ENV).ok();
    resolve_from(env_value.as_deref(), configured, is_debug)
}

fn resolve_from(
    env_value: Option<&str>,
    configured: Option<&str>,
    is_debug: bool,
) -> log::LevelFilter {
    for (source, value) in [("env", env_value), ("config", configured)] {
        let Some(value) = value else {
            continue;
        };
        match parse_log_level(value) {
            Some(level) => return level,
            None => eprintln!(
                "Warning: Invalid log level '{}' from {}, falling back to default",
                value, source
            ),
        }
    }

    if is_debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels_case_insensitively() {
        assert_eq!(parse_log_level(" Debug "), Some(log::LevelFilter::Debug));
        assert_eq!(parse_log_level("WARNING"), Some(log::LevelFilter::Warn));
        assert_eq!(parse_log_level("loud"), None);
    }

    #[test]
    fn env_wins_over_config() {
        assert_eq!(
            resolve_from(Some("trace"), Some("error"), false),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn invalid_values_fall_through_to_default() {
        assert_eq!(
            resolve_from(Some("nope"), Some("???"), true),
            log::LevelFilter::Debug
        );
        assert_eq!(resolve_from(None, None, false), log::LevelFilter::Info);
    }
}
