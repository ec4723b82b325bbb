//! Leaf decoding: turn the string payload of a property read into a typed value.
//!
//! The declared primitive type picks the parse; nothing is inferred from the
//! payload itself. A `null` payload is always `Blank`; an empty payload is
//! `Blank` for every type except text.

use canvasprobe_common::{Color, FormulaValue, ItemPath, PrimitiveType, ProbeError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn decode_leaf(
    raw: Option<&str>,
    ty: PrimitiveType,
    path: &ItemPath,
) -> Result<FormulaValue, ProbeError> {
    let Some(raw) = raw else {
        return Ok(FormulaValue::Blank);
    };
    if ty == PrimitiveType::String {
        return Ok(FormulaValue::Text(raw.to_string()));
    }
    let text = raw.trim();
    if text.is_empty() {
        return Ok(FormulaValue::Blank);
    }

    let decoded = match ty {
        PrimitiveType::String => unreachable!("handled above"),
        PrimitiveType::Hyperlink => Some(FormulaValue::Hyperlink(text.to_string())),
        PrimitiveType::Number => text
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(FormulaValue::Number),
        PrimitiveType::Boolean => parse_bool(text).map(FormulaValue::Boolean),
        PrimitiveType::Date => parse_date(text).map(FormulaValue::Date),
        PrimitiveType::DateTime => parse_datetime(text).map(FormulaValue::DateTime),
        PrimitiveType::DateTimeNoTimeZone => {
            parse_naive_datetime(text).map(FormulaValue::DateTimeNoTimeZone)
        }
        PrimitiveType::Color => Color::parse(text).map(FormulaValue::Color),
        PrimitiveType::Guid => Uuid::parse_str(text).ok().map(FormulaValue::Guid),
    };

    decoded.ok_or_else(|| ProbeError::Decode {
        path: path.to_string(),
        expected: ty.to_string(),
        raw: raw.to_string(),
    })
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Browser-side dates also arrive as epoch milliseconds.
fn from_epoch_millis(text: &str) -> Option<DateTime<Utc>> {
    let millis = text.parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| parse_naive_datetime(text).map(|dt| dt.date()))
        .or_else(|| from_epoch_millis(text).map(|dt| dt.date_naive()))
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| from_epoch_millis(text))
        .or_else(|| parse_naive_datetime(text).map(|dt| dt.and_utc()))
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
}
