//! Configuration surface defaults (spec §6) and the small duration-parsing
//! helpers `clap` wires in as `value_parser`s on the CLI flags.

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_NUM_CRAWLERS: usize = 1;
pub const DEFAULT_FETCH_TIMEOUT: &str = "5s";
pub const DEFAULT_REINDEX_DURATION: &str = "24h";
pub const DEFAULT_DB_FILE: &str = "brightwave.db";
pub const DEFAULT_SHUTDOWN_TIMEOUT: &str = "30s";

/// Parse a duration string of the form `<integer><unit>` where unit is one
/// of `s`, `m`, `h` (seconds assumed if omitted) into a [`std::time::Duration`].
pub fn parse_std_duration(s: &str) -> Result<std::time::Duration, String> {
    parse_duration_secs(s).map(std::time::Duration::from_secs)
}

/// Same parsing as [`parse_std_duration`] but producing a [`chrono::Duration`]
/// for use against the re-index gate.
pub fn parse_chrono_duration(s: &str) -> Result<chrono::Duration, String> {
    parse_duration_secs(s).map(|secs| chrono::Duration::seconds(secs as i64))
}

fn parse_duration_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let split_at = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num, unit) = s.split_at(split_at);
    let num: u64 = num.parse().map_err(|_| format!("invalid duration: {s}"))?;
    let multiplier: u64 = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        other => return Err(format!("unknown duration unit: {other}")),
    };
    Ok(num * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_seconds() {
        assert_eq!(parse_std_duration("5").unwrap(), std::time::Duration::from_secs(5));
        assert_eq!(parse_std_duration("5s").unwrap(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn parses_hours() {
        let d = parse_chrono_duration("24h").unwrap();
        assert_eq!(d, chrono::Duration::hours(24));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_std_duration("5x").is_err());
    }
}
