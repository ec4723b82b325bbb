//! Formula type schema for controls.
//!
//! Control properties are described by the browser side with short type codes
//! (`s`, `n`, `b`, ...). [`PrimitiveType`] owns that table; [`RecordType`] and
//! [`FormulaType`] compose primitives into the record/table shapes the formula
//! evaluator understands.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Leaf types a control property can carry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Boolean,
    DateTime,
    Date,
    Hyperlink,
    Color,
    Number,
    DateTimeNoTimeZone,
    Guid,
}

impl PrimitiveType {
    /// Every primitive in code-table order.
    pub const ALL: [PrimitiveType; 9] = [
        PrimitiveType::String,
        PrimitiveType::Boolean,
        PrimitiveType::DateTime,
        PrimitiveType::Date,
        PrimitiveType::Hyperlink,
        PrimitiveType::Color,
        PrimitiveType::Number,
        PrimitiveType::DateTimeNoTimeZone,
        PrimitiveType::Guid,
    ];

    /// Single-letter wire code.
    pub const fn code(self) -> &'static str {
        match self {
            PrimitiveType::String => "s",
            PrimitiveType::Boolean => "b",
            PrimitiveType::DateTime => "d",
            PrimitiveType::Date => "D",
            PrimitiveType::Hyperlink => "h",
            PrimitiveType::Color => "c",
            PrimitiveType::Number => "n",
            PrimitiveType::DateTimeNoTimeZone => "Z",
            PrimitiveType::Guid => "g",
        }
    }

    /// Inverse of [`PrimitiveType::code`]. Codes are case-sensitive (`d` vs `D`).
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrimitiveType::String => "Text",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::DateTime => "DateTime",
            PrimitiveType::Date => "Date",
            PrimitiveType::Hyperlink => "Hyperlink",
            PrimitiveType::Color => "Color",
            PrimitiveType::Number => "Number",
            PrimitiveType::DateTimeNoTimeZone => "DateTimeNoTimeZone",
            PrimitiveType::Guid => "Guid",
        })
    }
}

/// Structural type of a property, a control, or a table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaType {
    Primitive(PrimitiveType),
    Record(Arc<RecordType>),
    /// Table whose rows all share the given record type.
    Table(Arc<RecordType>),
}

impl FormulaType {
    pub fn as_record(&self) -> Option<&Arc<RecordType>> {
        match self {
            FormulaType::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_table_row(&self) -> Option<&Arc<RecordType>> {
        match self {
            FormulaType::Table(r) => Some(r),
            _ => None,
        }
    }
}

impl From<PrimitiveType> for FormulaType {
    fn from(p: PrimitiveType) -> Self {
        FormulaType::Primitive(p)
    }
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaType::Primitive(p) => write!(f, "{p}"),
            FormulaType::Record(r) => write!(f, "Record{r}"),
            FormulaType::Table(r) => write!(f, "Table{r}"),
        }
    }
}

/// Named, typed fields. Field order is not significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordType {
    fields: BTreeMap<String, FormulaType>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, ty: impl Into<FormulaType>) -> Self {
        self.add_field(name, ty);
        self
    }

    /// Insert or replace a field.
    pub fn add_field(&mut self, name: impl Into<String>, ty: impl Into<FormulaType>) {
        self.fields.insert(name.into(), ty.into());
    }

    pub fn field(&self, name: &str) -> Option<&FormulaType> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FormulaType)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Union of two record types; fields of `other` win on name clashes.
    pub fn merged(&self, other: &RecordType) -> RecordType {
        let mut fields = self.fields.clone();
        for (name, ty) in &other.fields {
            fields.insert(name.clone(), ty.clone());
        }
        RecordType { fields }
    }
}

impl FromIterator<(String, FormulaType)> for RecordType {
    fn from_iter<I: IntoIterator<Item = (String, FormulaType)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        f.write_str("}")
    }
}
