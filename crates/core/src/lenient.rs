//! Lenient number fields for form-driven JSON bodies.
//!
//! Browser forms post whatever the input box holds, so a rate may arrive as
//! `40`, `"40"` or `""`. Use with `#[serde(deserialize_with = "...")]`.

use serde::Deserialize;
use serde::de::{Deserializer, Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

/// Accept a JSON number or a numeric string. `null` and blank strings read as 0.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::Text(s)) => parse_text(&s).map_err(D::Error::custom),
    }
}

fn parse_text(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    s.parse::<f64>()
        .map_err(|_| format!("expected a number or numeric string, got \"{s}\""))
}
