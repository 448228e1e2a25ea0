//! Downloader progress-line parsing.
//!
//! The downloader rewrites a progress display in place:
//!
//!   `42.5% of ~1553.21 MB @ 12.3 MB/s ETA: 00:10:32 [audio+video]`
//!
//! Chunks can carry several ticks at once; the last parseable line in a
//! chunk is the freshest and wins. Lines that do not match are not
//! progress.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static RE_PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)%").unwrap());
static RE_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"of\s+~?([\d.]+)\s*([KMGT]i?B)\b").unwrap());
static RE_SPEED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\s*([\d.]+\s*[KMGT]i?[Bb]/s)").unwrap());
static RE_ETA: Lazy<Regex> = Lazy::new(|| Regex::new(r"ETA:?\s+([\d:]+)").unwrap());

/// One parsed progress tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f64,
    /// Total (estimated) size in megabytes.
    pub size_mb: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

impl Progress {
    /// Megabytes still to fetch, if the total is known.
    pub fn size_left_mb(&self) -> Option<f64> {
        self.size_mb
            .map(|total| (total * (100.0 - self.percent) / 100.0).max(0.0))
    }
}

/// Parse a single line. `None` when the line carries no percentage.
pub fn parse_progress_line(line: &str) -> Option<Progress> {
    let percent = RE_PERCENT.captures(line)?[1].parse::<f64>().ok()?;
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }

    let size_mb = RE_SIZE.captures(line).and_then(|c| {
        let value = c[1].parse::<f64>().ok()?;
        Some(value * unit_to_mb(&c[2]))
    });

    Some(Progress {
        percent,
        size_mb,
        speed: RE_SPEED.captures(line).map(|c| c[1].trim().to_string()),
        eta: RE_ETA.captures(line).map(|c| c[1].to_string()),
    })
}

/// Parse an output chunk that may contain several ticks; the last match
/// wins.
pub fn parse_progress_chunk(chunk: &str) -> Option<Progress> {
    chunk
        .split(['\r', '\n'])
        .filter_map(parse_progress_line)
        .last()
}

fn unit_to_mb(unit: &str) -> f64 {
    match unit {
        "KB" | "KiB" => 1.0 / 1024.0,
        "MB" | "MiB" => 1.0,
        "GB" | "GiB" => 1024.0,
        "TB" | "TiB" => 1024.0 * 1024.0,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_progress_line() {
        let progress =
            parse_progress_line("42% of ~1.5 GB @ 3.0 MB/s ETA: 00:10:00 [audio+video]").unwrap();
        assert_eq!(progress.percent, 42.0);
        assert_eq!(progress.size_mb, Some(1536.0));
        assert_eq!(progress.speed.as_deref(), Some("3.0 MB/s"));
        assert_eq!(progress.eta.as_deref(), Some("00:10:00"));
    }

    #[test]
    fn test_fractional_percent_and_mb_size() {
        let progress =
            parse_progress_line("5.4% of ~2442.31 MB @ 97.8 Mb/s ETA: 00:03:09").unwrap();
        assert_eq!(progress.percent, 5.4);
        assert_eq!(progress.size_mb, Some(2442.31));
        assert_eq!(progress.speed.as_deref(), Some("97.8 Mb/s"));
    }

    #[test]
    fn test_size_left() {
        let progress = parse_progress_line("75% of ~1000 MB @ 1.0 MB/s ETA: 00:04:10").unwrap();
        assert_eq!(progress.size_left_mb(), Some(250.0));
    }

    #[test]
    fn test_non_progress_line_is_none() {
        assert!(parse_progress_line("INFO: Downloading m0000001").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_out_of_range_percent_rejected() {
        assert!(parse_progress_line("250% of ~1.5 GB").is_none());
    }

    #[test]
    fn test_chunk_last_tick_wins() {
        let chunk = "10% of ~100 MB @ 1.0 MB/s ETA: 00:01:30\r\
                     20% of ~100 MB @ 1.0 MB/s ETA: 00:01:20\r\
                     30% of ~100 MB @ 1.0 MB/s ETA: 00:01:10";
        let progress = parse_progress_chunk(chunk).unwrap();
        assert_eq!(progress.percent, 30.0);
    }

    #[test]
    fn test_chunk_with_no_ticks() {
        assert!(parse_progress_chunk("INFO: a\nINFO: b").is_none());
    }

    #[test]
    fn test_missing_optional_fields() {
        let progress = parse_progress_line("99%").unwrap();
        assert_eq!(progress.percent, 99.0);
        assert_eq!(progress.size_mb, None);
        assert_eq!(progress.speed, None);
        assert_eq!(progress.eta, None);
    }
}
