//! Programme display-title grammar.
//!
//! Catalogue and CLI output carry series/episode structure inside display
//! titles in a handful of layouts:
//!
//!   `Show Title: Series N - Episode Title`
//!   `Show Title - Series N - Episode Title`
//!   `Show Title: Series IV - Episode Title`
//!   `Show Title - Episode Title`
//!   `Show Title S02E05`
//!
//! This module pulls those apart into show, series, episode and episode
//! title, and infers the media kind from what it finds.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::MediaKind;

/// Structured view of a display title.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTitle {
    pub show: String,
    pub series: Option<u32>,
    pub episode: Option<u32>,
    pub episode_title: Option<String>,
}

static RE_SERIES_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:Series|Season)\s+([0-9]+|[IVXLC]+)\s*[-:]?\s*(.*)$").unwrap()
});

static RE_SXXEYY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS([0-9]{1,3})\s*E([0-9]{1,3})\b").unwrap());

static RE_EPISODE_NUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Episode\s+([0-9]+)\b").unwrap());

/// Parse a roman-numeral series label. Catalogue titles use them up to the
/// low tens, so subtractive pairs through `XC` are enough.
pub fn roman_to_u32(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut total: u32 = 0;
    let mut prev: u32 = 0;
    for c in s.chars() {
        let value = match c {
            'I' => 1,
            'V' => 5,
            'X' => 10,
            'L' => 50,
            'C' => 100,
            _ => return None,
        };
        if value > prev && prev > 0 {
            total = total.checked_add(value)?.checked_sub(2 * prev)?;
        } else {
            total = total.checked_add(value)?;
        }
        prev = value;
    }
    Some(total)
}

fn parse_series_number(label: &str) -> Option<u32> {
    label.parse::<u32>().ok().or_else(|| roman_to_u32(label))
}

/// Find an explicit `SxxEyy` token anywhere in a string.
pub fn sxxeyy(text: &str) -> Option<(u32, u32)> {
    let caps = RE_SXXEYY.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Split a display title into show / series / episode structure.
///
/// A `": "` split is tried first, then `" - "`; whatever follows the show
/// name is checked for a `Series N` (or roman-numeral) label before being
/// treated as the episode title. `Episode N` episode titles also yield an
/// episode number.
pub fn parse_display_title(raw: &str) -> ParsedTitle {
    let raw = raw.trim();

    if let Some((series, episode)) = sxxeyy(raw) {
        let show = RE_SXXEYY.replace(raw, "").trim().trim_end_matches(['-', ':']).trim().to_string();
        return ParsedTitle {
            show,
            series: Some(series),
            episode: Some(episode),
            episode_title: None,
        };
    }

    let (show, rest) = if let Some(idx) = raw.find(": ") {
        (raw[..idx].trim(), Some(raw[idx + 2..].trim()))
    } else if let Some(idx) = raw.find(" - ") {
        (raw[..idx].trim(), Some(raw[idx + 3..].trim()))
    } else {
        (raw, None)
    };

    let mut parsed = ParsedTitle {
        show: show.to_string(),
        ..Default::default()
    };

    let Some(rest) = rest else {
        return parsed;
    };

    let episode_title = if let Some(caps) = RE_SERIES_LABEL.captures(rest) {
        parsed.series = parse_series_number(&caps[1]);
        let tail = caps[2].trim();
        if tail.is_empty() {
            None
        } else {
            Some(tail.to_string())
        }
    } else {
        Some(rest.to_string())
    };

    if let Some(title) = &episode_title {
        if let Some(caps) = RE_EPISODE_NUM.captures(title) {
            parsed.episode = caps[1].parse().ok();
        }
    }
    parsed.episode_title = episode_title;
    parsed
}

/// Infer the media kind from parsed structure and the upstream category.
pub fn infer_kind(parsed: &ParsedTitle, category: Option<&str>) -> MediaKind {
    if let Some(category) = category {
        let lower = category.to_lowercase();
        if lower.contains("film") || lower.contains("movie") {
            return MediaKind::Movie;
        }
    }
    if parsed.series.is_some() || parsed.episode.is_some() || parsed.episode_title.is_some() {
        MediaKind::Tv
    } else {
        MediaKind::Unknown
    }
}
