//! Small text helpers shared by the refresh jobs: timestamp formatting,
//! category slugs, editorial leaning normalisation.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_DOUBLE_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(__)+").expect("valid regex"));

/// `YYYY-MM-DD hh:mm:ss` in UTC.
pub fn date_to_nice_text(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Postgres-friendly UTC timestamp text (`YYYY-MM-DD hh:mm:ss.mmm+00`) for epoch millis.
pub fn pg_timestamp_text(epoch_millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(epoch_millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f+00").to_string())
}

// --- Editorial leaning ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaning {
    #[default]
    Blanco,
    Derecha,
    Izquierda,
}

impl fmt::Display for Leaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaning::Blanco => write!(f, "blanco"),
            Leaning::Derecha => write!(f, "derecha"),
            Leaning::Izquierda => write!(f, "izquierda"),
        }
    }
}

/// Case-insensitive; anything unrecognised is `Blanco`.
pub fn normalize_leaning(raw: &str) -> Leaning {
    match raw.trim().to_lowercase().as_str() {
        "derecha" => Leaning::Derecha,
        "izquierda" => Leaning::Izquierda,
        _ => Leaning::Blanco,
    }
}

// --- Slugs ---

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// Lowercase ASCII slug joined by `_`. Returns an empty string when nothing survives.
pub fn table_name(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }
    slug
}

/// Category slug, or `None` when the input is missing or slugs to nothing.
pub fn normalize_category(raw: Option<&str>) -> Option<String> {
    let slug = table_name(raw.unwrap_or_default());
    (!slug.is_empty()).then_some(slug)
}

/// Replace separators with `_`, drop quotes, and fold Spanish accents.
/// Only the accents the outlet names actually use are folded.
pub fn clean_string(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .filter(|c| *c != '"')
        .map(|c| match c {
            ',' | '.' | '-' | '&' | ' ' => '_',
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'È' | 'É' | 'Ê' | 'Ë' => 'E',
            'é' => 'e',
            'Í' => 'I',
            'í' => 'i',
            'Ó' => 'O',
            'ó' => 'o',
            'Ú' => 'U',
            'ú' => 'u',
            'Ñ' => 'N',
            'ñ' => 'n',
            other => other,
        })
        .collect();

    // Apostrophes go after the collapse, so `a '_b` keeps its double underscore.
    RE_DOUBLE_UNDERSCORE
        .replace_all(&folded, "_")
        .replace('\'', "")
}
