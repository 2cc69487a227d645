use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ground-truth rule checked against a single page of a source PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: String,
    pub pdf: String,
    pub page: u32,
    #[serde(flatten)]
    pub kind: AssertionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssertionKind {
    Baseline,
    Present {
        text: String,
    },
    Absent {
        text: String,
    },
    Order {
        before: String,
        after: String,
    },
    Table {
        cell: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        up: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        down: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        top_heading: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left_heading: Option<String>,
    },
    Math {
        math: String,
    },
}

impl AssertionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Present { .. } => "present",
            Self::Absent { .. } => "absent",
            Self::Order { .. } => "order",
            Self::Table { .. } => "table",
            Self::Math { .. } => "math",
        }
    }
}

impl Assertion {
    pub fn baseline(pdf: &str, page: u32) -> Self {
        Self {
            id: format!("{pdf}_baseline"),
            pdf: pdf.to_string(),
            page,
            kind: AssertionKind::Baseline,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Rejects records that deserialize but cannot be evaluated.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("assertion id must not be empty");
        }
        if self.pdf.trim().is_empty() {
            bail!("assertion {} has an empty pdf path", self.id);
        }
        if self.page == 0 {
            bail!("assertion {} has page 0; pages are 1-based", self.id);
        }

        let required: Vec<(&str, &str)> = match &self.kind {
            AssertionKind::Baseline => Vec::new(),
            AssertionKind::Present { text } | AssertionKind::Absent { text } => {
                vec![("text", text.as_str())]
            }
            AssertionKind::Order { before, after } => {
                vec![("before", before.as_str()), ("after", after.as_str())]
            }
            AssertionKind::Table { cell, .. } => vec![("cell", cell.as_str())],
            AssertionKind::Math { math } => vec![("math", math.as_str())],
        };
        for (field, value) in required {
            if value.trim().is_empty() {
                bail!(
                    "assertion {} ({}) has an empty `{}` field",
                    self.id,
                    self.type_name(),
                    field
                );
            }
        }

        if let AssertionKind::Table {
            up,
            down,
            left,
            right,
            top_heading,
            left_heading,
            ..
        } = &self.kind
        {
            let relations = [up, down, left, right, top_heading, left_heading];
            if relations
                .iter()
                .any(|value| value.as_deref().is_some_and(|text| text.trim().is_empty()))
            {
                bail!("assertion {} (table) has an empty neighbor field", self.id);
            }
        }

        Ok(())
    }

    /// Fixed display fields per variant, for reporting.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("id", self.id.clone()),
            ("type", self.type_name().to_string()),
            ("pdf", self.pdf.clone()),
            ("page", self.page.to_string()),
        ];

        match &self.kind {
            AssertionKind::Baseline => {}
            AssertionKind::Present { text } | AssertionKind::Absent { text } => {
                fields.push(("text", text.clone()));
            }
            AssertionKind::Order { before, after } => {
                fields.push(("before", before.clone()));
                fields.push(("after", after.clone()));
            }
            AssertionKind::Table {
                cell,
                up,
                down,
                left,
                right,
                top_heading,
                left_heading,
            } => {
                fields.push(("cell", cell.clone()));
                let optional = [
                    ("up", up),
                    ("down", down),
                    ("left", left),
                    ("right", right),
                    ("top_heading", top_heading),
                    ("left_heading", left_heading),
                ];
                for (label, value) in optional {
                    if let Some(value) = value {
                        fields.push((label, value.clone()));
                    }
                }
            }
            AssertionKind::Math { math } => fields.push(("math", math.clone())),
        }

        fields
    }
}

/// An assertion together with the dataset file it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    pub assertion: Assertion,
    pub group: String,
    /// The record as read, including fields `Assertion` does not model.
    pub record: Value,
}
