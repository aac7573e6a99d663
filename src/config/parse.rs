use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Parses the boolean cell grammar, case-insensitively. An empty cell is
/// `false`; anything unrecognised is `None`.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "1.0" | "t" | "true" | "yes" | "y" => Some(true),
        "0" | "0.0" | "f" | "false" | "no" | "n" | "" => Some(false),
        _ => None,
    }
}

/// Parses a numeric cell where `inf` means unbounded.
pub fn parse_inf_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("inf") || trimmed.eq_ignore_ascii_case("infinity") {
        return Some(f64::INFINITY);
    }
    trimmed.parse().ok()
}

static TIMESTAMP: OnceLock<Regex> = OnceLock::new();

/// Parses a time cell into simulated minutes.
///
/// Accepts either `YYYY?MM?DD?HH?MM?SS` with any single-character
/// separators (converted to minutes since the Unix epoch) or a plain
/// number of minutes from zero.
pub fn parse_time_minutes(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let re = TIMESTAMP.get_or_init(|| {
        Regex::new(r"^(\d{4}).(\d{2}).(\d{2}).(\d{2}).(\d{2}).(\d{2})$")
            .expect("timestamp pattern is well-formed")
    });
    if let Some(caps) = re.captures(trimmed) {
        let field = |i: usize| caps[i].parse::<u32>().ok();
        let date = NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            field(2)?,
            field(3)?,
        )?;
        let datetime = date.and_hms_opt(field(4)?, field(5)?, field(6)?)?;
        return Some(datetime.and_utc().timestamp() as f64 / 60.0);
    }
    trimmed.parse().ok()
}

/// Parses a time cell where `inf` means never, otherwise as
/// [`parse_time_minutes`].
pub fn parse_time_or_inf(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("inf") || trimmed.eq_ignore_ascii_case("infinity") {
        return Some(f64::INFINITY);
    }
    parse_time_minutes(trimmed)
}
