//! Row shapes for the three source extracts and the enriched output.

use serde::{Deserialize, Serialize};

/// Unit of measure retained by the transform.
pub const USD: &str = "USD";

/// One filing, from `sub.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Submission {
    pub adsh: String,
    #[serde(default)]
    pub cik: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub filed: String,
}

/// One reported numeric value, from `num.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fact {
    pub adsh: String,
    pub tag: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub coreg: Option<String>,
    pub ddate: i32,
    pub qtrs: i32,
    #[serde(default)]
    pub uom: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub footnote: Option<String>,
}

impl Fact {
    pub fn is_usd(&self) -> bool {
        self.uom == USD
    }
}

/// One XBRL tag definition, from `tag.txt`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TagDefinition {
    pub tag: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub tlabel: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
}

/// Output row: a USD fact joined with its filer and tag metadata.
///
/// Column order is the canonical output schema shared by every driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFact {
    pub adsh: String,
    pub tag: String,
    pub ddate: i32,
    pub qtrs: i32,
    pub value: Option<f64>,
    pub cik: String,
    pub name: String,
    pub form: String,
    pub filed: String,
    pub tlabel: String,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedTable {
    pub rows: Vec<EnrichedFact>,
}

impl EnrichedTable {
    pub fn new(rows: Vec<EnrichedFact>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Concatenates batch results in order.
    pub fn concat(parts: Vec<EnrichedTable>) -> Self {
        let total = parts.iter().map(EnrichedTable::len).sum();
        let mut rows = Vec::with_capacity(total);
        for part in parts {
            rows.extend(part.rows);
        }
        Self { rows }
    }
}
