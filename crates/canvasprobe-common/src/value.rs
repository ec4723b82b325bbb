use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::{
    any::Any,
    fmt::{self, Debug, Display},
    sync::Arc,
};
use uuid::Uuid;

use crate::{FormulaType, PrimitiveType, ProbeError, RecordType};

/* ───────────────────────────── Color ───────────────────────────── */

/// RGBA color as reported by control properties. Alpha is in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Accepts `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        let inner = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let channel = |i: usize| {
            let part = parts.get(i)?;
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u8>().ok()
        };
        match parts.len() {
            3 => Some(Self::rgba(channel(0)?, channel(1)?, channel(2)?, 1.0)),
            4 => {
                let a = parts[3].parse::<f64>().ok()?;
                if !(0.0..=1.0).contains(&a) {
                    return None;
                }
                Some(Self::rgba(channel(0)?, channel(1)?, channel(2)?, a))
            }
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, 1.0)),
            8 => Some(Self::rgba(
                byte(0)?,
                byte(2)?,
                byte(4)?,
                f64::from(byte(6)?) / 255.0,
            )),
            _ => None,
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/* ───────────────────── Record / table abstractions ───────────────────── */

/// Structured value whose fields are resolved on demand.
///
/// Implementations carry no cached field values; every `field` call may hit the
/// browser.
pub trait RecordValue: Debug + Send + Sync {
    fn record_type(&self) -> &RecordType;

    /// Display name of the record, `None` for unnamed table rows.
    fn display_name(&self) -> Option<&str> {
        None
    }

    fn field(&self, name: &str) -> Result<FormulaValue, ProbeError>;

    /* down-cast hook for extension functions */
    fn as_any(&self) -> &dyn Any;
}

/// Virtualized sequence of record rows.
pub trait TableValue: Debug + Send + Sync {
    fn row_type(&self) -> &RecordType;

    /// Current number of rows. Not cached between calls.
    fn count(&self) -> Result<usize, ProbeError>;

    fn row(&self, index: usize) -> Result<FormulaValue, ProbeError>;

    /// Enumerate rows `0..count()`, querying the count when enumeration starts.
    ///
    /// Each call starts a fresh enumeration.
    fn iter_rows<'a>(
        &'a self,
    ) -> Result<Box<dyn Iterator<Item = Result<FormulaValue, ProbeError>> + 'a>, ProbeError> {
        let count = self.count()?;
        Ok(Box::new((0..count).map(move |i| self.row(i))))
    }

    fn as_any(&self) -> &dyn Any;
}

/* ───────────────────────────── FormulaValue ───────────────────────────── */

/// Value handed to the formula evaluator.
#[derive(Debug, Clone)]
pub enum FormulaValue {
    Blank,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    DateTimeNoTimeZone(NaiveDateTime),
    Hyperlink(String),
    Color(Color),
    Guid(Uuid),
    Record(Arc<dyn RecordValue>),
    Table(Arc<dyn TableValue>),
}

impl FormulaValue {
    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FormulaValue::Blank => "Blank",
            FormulaValue::Text(_) => "Text",
            FormulaValue::Number(_) => "Number",
            FormulaValue::Boolean(_) => "Boolean",
            FormulaValue::Date(_) => "Date",
            FormulaValue::DateTime(_) => "DateTime",
            FormulaValue::DateTimeNoTimeZone(_) => "DateTimeNoTimeZone",
            FormulaValue::Hyperlink(_) => "Hyperlink",
            FormulaValue::Color(_) => "Color",
            FormulaValue::Guid(_) => "Guid",
            FormulaValue::Record(_) => "Record",
            FormulaValue::Table(_) => "Table",
        }
    }

    /// `true` when this value fits the declared type. Blank fits any type.
    pub fn conforms_to(&self, ty: &FormulaType) -> bool {
        match (self, ty) {
            (FormulaValue::Blank, _) => true,
            (FormulaValue::Record(r), FormulaType::Record(t)) => r.record_type() == t.as_ref(),
            (FormulaValue::Table(r), FormulaType::Table(t)) => r.row_type() == t.as_ref(),
            (v, FormulaType::Primitive(p)) => v.primitive_type() == Some(*p),
            _ => false,
        }
    }

    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            FormulaValue::Text(_) => PrimitiveType::String,
            FormulaValue::Number(_) => PrimitiveType::Number,
            FormulaValue::Boolean(_) => PrimitiveType::Boolean,
            FormulaValue::Date(_) => PrimitiveType::Date,
            FormulaValue::DateTime(_) => PrimitiveType::DateTime,
            FormulaValue::DateTimeNoTimeZone(_) => PrimitiveType::DateTimeNoTimeZone,
            FormulaValue::Hyperlink(_) => PrimitiveType::Hyperlink,
            FormulaValue::Color(_) => PrimitiveType::Color,
            FormulaValue::Guid(_) => PrimitiveType::Guid,
            FormulaValue::Blank | FormulaValue::Record(_) | FormulaValue::Table(_) => return None,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormulaValue::Text(s) | FormulaValue::Hyperlink(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<dyn RecordValue>> {
        match self {
            FormulaValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Arc<dyn TableValue>> {
        match self {
            FormulaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// JSON form sent to the browser when writing a property.
    ///
    /// Records and tables are live views and cannot be written back.
    pub fn to_wire(&self) -> Result<JsonValue, ProbeError> {
        Ok(match self {
            FormulaValue::Blank => JsonValue::Null,
            FormulaValue::Text(s) | FormulaValue::Hyperlink(s) => JsonValue::String(s.clone()),
            FormulaValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .ok_or_else(|| ProbeError::type_mismatch("finite Number", n.to_string()))?,
            FormulaValue::Boolean(b) => JsonValue::Bool(*b),
            FormulaValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            FormulaValue::DateTime(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            FormulaValue::DateTimeNoTimeZone(dt) => {
                JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            FormulaValue::Color(c) => JsonValue::String(c.to_string()),
            FormulaValue::Guid(g) => JsonValue::String(g.to_string()),
            FormulaValue::Record(_) | FormulaValue::Table(_) => {
                return Err(ProbeError::type_mismatch(
                    "a scalar value",
                    self.type_name(),
                ));
            }
        })
    }
}

/// Scalars compare by value; records and tables compare by identity.
impl PartialEq for FormulaValue {
    fn eq(&self, other: &Self) -> bool {
        use FormulaValue::*;
        match (self, other) {
            (Blank, Blank) => true,
            (Text(a), Text(b)) | (Hyperlink(a), Hyperlink(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (DateTimeNoTimeZone(a), DateTimeNoTimeZone(b)) => a == b,
            (Color(a), Color(b)) => a == b,
            (Guid(a), Guid(b)) => a == b,
            (Record(a), Record(b)) => Arc::ptr_eq(a, b),
            (Table(a), Table(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaValue::Blank => Ok(()),
            FormulaValue::Text(s) | FormulaValue::Hyperlink(s) => write!(f, "{s}"),
            FormulaValue::Number(n) => write!(f, "{n}"),
            FormulaValue::Boolean(b) => write!(f, "{b}"),
            FormulaValue::Date(d) => write!(f, "{d}"),
            FormulaValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            FormulaValue::DateTimeNoTimeZone(dt) => write!(f, "{dt}"),
            FormulaValue::Color(c) => write!(f, "{c}"),
            FormulaValue::Guid(g) => write!(f, "{g}"),
            FormulaValue::Record(r) => match r.display_name() {
                Some(name) => write!(f, "Record({name})"),
                None => f.write_str("Record"),
            },
            FormulaValue::Table(t) => write!(f, "Table{}", t.row_type()),
        }
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::Text(s)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::Text(s.to_string())
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_functional_colors() {
        assert_eq!(Color::parse("#00126B"), Some(Color::rgba(0, 18, 107, 1.0)));
        assert_eq!(Color::parse("#FFFFFF00"), Some(Color::rgba(255, 255, 255, 0.0)));
        assert_eq!(
            Color::parse("rgba(56, 96, 178, 0.5)"),
            Some(Color::rgba(56, 96, 178, 0.5))
        );
        assert_eq!(Color::parse("RGB(1,2,3)"), Some(Color::rgba(1, 2, 3, 1.0)));
        assert_eq!(Color::parse("rgba(1,2,3,4)"), None);
        assert_eq!(Color::parse("#12345"), None);
        assert_eq!(Color::parse("blue"), None);
    }

    #[test]
    fn signed_channels_are_rejected() {
        assert_eq!(Color::parse("#+1+2+3"), None);
        assert_eq!(Color::parse("#+1+2+3+4"), None);
        assert_eq!(Color::parse("#-1-2-3"), None);
        assert_eq!(Color::parse("rgb(+1, 2, 3)"), None);
        assert_eq!(Color::parse("#0a0B0c"), Some(Color::rgba(10, 11, 12, 1.0)));
    }

    #[test]
    fn scalar_wire_forms() {
        assert_eq!(FormulaValue::Blank.to_wire().unwrap(), JsonValue::Null);
        assert_eq!(
            FormulaValue::from("hello").to_wire().unwrap(),
            serde_json::json!("hello")
        );
        assert_eq!(
            FormulaValue::Number(2.5).to_wire().unwrap(),
            serde_json::json!(2.5)
        );
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            FormulaValue::Date(date).to_wire().unwrap(),
            serde_json::json!("2024-02-29")
        );
        assert!(FormulaValue::Number(f64::NAN).to_wire().is_err());
    }

    #[test]
    fn blank_conforms_to_everything() {
        let ty = FormulaType::Primitive(PrimitiveType::Number);
        assert!(FormulaValue::Blank.conforms_to(&ty));
        assert!(FormulaValue::Number(1.0).conforms_to(&ty));
        assert!(!FormulaValue::from("1").conforms_to(&ty));
    }
}
