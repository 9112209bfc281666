//! Progress extraction from process output lines.
//!
//! External tools report progress as free-form text; these functions
//! turn single lines into structured counters against caller-supplied
//! patterns, and map counters into a stage's slice of the overall job
//! percentage. All functions are pure so the parsing strategy can be
//! exercised without spawning processes.

use regex::Regex;

/// Extract `(current, total)` from the first match of a two-capture
/// "unit X of Y" pattern, e.g. `PROGRESS: Frame (\d+)/(\d+)`.
pub fn parse_unit_progress(line: &str, pattern: &Regex) -> Option<(u64, u64)> {
    let caps = pattern.captures(line)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// Extract a bare counter from the first match of a single-capture
/// pattern, e.g. FFmpeg's `frame=(\d+)` progress lines, which carry no
/// total of their own.
pub fn parse_counter(line: &str, pattern: &Regex) -> Option<u64> {
    let caps = pattern.captures(line)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Linearly rescale `current/total` into the inclusive percentage band
/// `[lo, hi]`, clamped to that band. A zero `total` maps to `lo`.
pub fn to_percent(current: u64, total: u64, lo: u8, hi: u8) -> u8 {
    if total == 0 || hi <= lo {
        return lo;
    }
    let ratio = (current as f64 / total as f64).clamp(0.0, 1.0);
    let span = (hi - lo) as f64;
    (lo as f64 + ratio * span).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_pattern() -> Regex {
        Regex::new(r"(\d+) of (\d+)").unwrap()
    }

    #[test]
    fn test_parse_unit_progress() {
        let pattern = frame_pattern();
        assert_eq!(
            parse_unit_progress("done 240 of 480 frames", &pattern),
            Some((240, 480))
        );
        assert_eq!(parse_unit_progress("no counters here", &pattern), None);
    }

    #[test]
    fn test_parse_unit_progress_takes_first_match() {
        let pattern = frame_pattern();
        assert_eq!(
            parse_unit_progress("1 of 10 then 5 of 10", &pattern),
            Some((1, 10))
        );
    }

    #[test]
    fn test_parse_counter() {
        let pattern = Regex::new(r"^frame=\s*(\d+)").unwrap();
        assert_eq!(parse_counter("frame=123", &pattern), Some(123));
        assert_eq!(parse_counter("frame=  42", &pattern), Some(42));
        assert_eq!(parse_counter("fps=30.0", &pattern), None);
    }

    #[test]
    fn test_to_percent_band_mapping() {
        assert_eq!(to_percent(240, 480, 10, 80), 45);
        assert_eq!(to_percent(480, 480, 10, 80), 80);
        assert_eq!(to_percent(0, 480, 10, 80), 10);
    }

    #[test]
    fn test_to_percent_clamps_overshoot() {
        // A tool can report more units than it promised.
        assert_eq!(to_percent(500, 480, 10, 80), 80);
    }

    #[test]
    fn test_to_percent_degenerate_inputs() {
        assert_eq!(to_percent(10, 0, 10, 80), 10);
        assert_eq!(to_percent(5, 10, 80, 80), 80);
    }
}
