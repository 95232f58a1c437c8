//! Semantic and structural column classification.
//!
//! Every column gets exactly one [`TypeLabel`]. The label is chosen by an
//! ordered table of [`ClassificationRule`]s where the first rule that
//! fires wins:
//!
//! | order | rule | label |
//! |---|---|---|
//! | 1 | no rows | `Unknown` |
//! | 2 | at most one distinct value | `Constant` |
//! | 3 | text values match a semantic pattern | `Text (<kind>)` |
//! | 4 | two distinct values | `Boolean` |
//! | 5 | datetime column | `Datetime` |
//! | 6 | numeric column | `Categorical (Numeric)` or `Numeric` |
//! | 7 | every row distinct | `Unique ID` |
//! | 8 | distinct/rows above the high-cardinality ratio | `High Cardinality ID` |
//! | 9 | few distinct values | `Categorical` |
//! | - | fallback | `Text (High Cardinality)` |
//!
//! Classification is pure and never fails: malformed input falls through
//! to a later rule.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::table::DeclaredType;

/// Semantic kinds recognized in text columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticKind {
    Email,
    Url,
    IpAddress,
    Phone,
}

impl SemanticKind {
    /// The name shown inside a semantic label, e.g. `Email` in `Text (Email)`.
    pub fn as_str(self) -> &'static str {
        match self {
            SemanticKind::Email => "Email",
            SemanticKind::Url => "Url",
            SemanticKind::IpAddress => "Ip_Address",
            SemanticKind::Phone => "Phone",
        }
    }
}

impl fmt::Display for SemanticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of column type labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeLabel {
    Unknown,
    Constant,
    Semantic(SemanticKind),
    Boolean,
    Datetime,
    CategoricalNumeric,
    Numeric,
    UniqueId,
    HighCardinalityId,
    Categorical,
    HighCardinalityText,
}

impl TypeLabel {
    /// The display label used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeLabel::Unknown => "Unknown",
            TypeLabel::Constant => "Constant",
            TypeLabel::Semantic(SemanticKind::Email) => "Text (Email)",
            TypeLabel::Semantic(SemanticKind::Url) => "Text (Url)",
            TypeLabel::Semantic(SemanticKind::IpAddress) => "Text (Ip_Address)",
            TypeLabel::Semantic(SemanticKind::Phone) => "Text (Phone)",
            TypeLabel::Boolean => "Boolean",
            TypeLabel::Datetime => "Datetime",
            TypeLabel::CategoricalNumeric => "Categorical (Numeric)",
            TypeLabel::Numeric => "Numeric",
            TypeLabel::UniqueId => "Unique ID",
            TypeLabel::HighCardinalityId => "High Cardinality ID",
            TypeLabel::Categorical => "Categorical",
            TypeLabel::HighCardinalityText => "Text (High Cardinality)",
        }
    }

    /// Continuous numeric columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeLabel::Numeric)
    }

    /// Low-cardinality columns suitable for frequency tables and
    /// contingency-based association measures.
    pub fn is_categorical_like(&self) -> bool {
        matches!(
            self,
            TypeLabel::Categorical | TypeLabel::CategoricalNumeric | TypeLabel::Boolean
        )
    }

    /// Every label, in rule order.
    pub fn all() -> [TypeLabel; 14] {
        [
            TypeLabel::Unknown,
            TypeLabel::Constant,
            TypeLabel::Semantic(SemanticKind::Email),
            TypeLabel::Semantic(SemanticKind::Url),
            TypeLabel::Semantic(SemanticKind::IpAddress),
            TypeLabel::Semantic(SemanticKind::Phone),
            TypeLabel::Boolean,
            TypeLabel::Datetime,
            TypeLabel::CategoricalNumeric,
            TypeLabel::Numeric,
            TypeLabel::UniqueId,
            TypeLabel::HighCardinalityId,
            TypeLabel::Categorical,
            TypeLabel::HighCardinalityText,
        ]
    }
}

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeLabel::all()
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown type label '{s}'"))
    }
}

impl From<TypeLabel> for String {
    fn from(label: TypeLabel) -> Self {
        label.as_str().to_string()
    }
}

impl TryFrom<String> for TypeLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Everything the classifier looks at for one column.
#[derive(Debug, Clone)]
pub struct ColumnEvidence<'a> {
    pub name: &'a str,
    pub declared: DeclaredType,
    pub distinct_count: u64,
    pub row_count: u64,
    /// String-coerced sample values; nulls are `None`
    pub sample: &'a [Option<String>],
}

impl<'a> ColumnEvidence<'a> {
    pub fn new(
        name: &'a str,
        declared: DeclaredType,
        distinct_count: u64,
        row_count: u64,
        sample: &'a [Option<String>],
    ) -> Self {
        Self {
            name,
            declared,
            distinct_count,
            row_count,
            sample,
        }
    }

    fn distinct_ratio(&self) -> f64 {
        if self.row_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.row_count as f64
        }
    }
}

/// A semantic pattern. A pattern that fails to compile never matches.
struct SemanticRule {
    kind: SemanticKind,
    pattern: &'static Lazy<Option<Regex>>,
}

static EMAIL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());
static URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").ok());
static IP_ADDRESS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").ok());
static PHONE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").ok());

static SEMANTIC_RULES: [SemanticRule; 4] = [
    SemanticRule {
        kind: SemanticKind::Email,
        pattern: &EMAIL,
    },
    SemanticRule {
        kind: SemanticKind::Url,
        pattern: &URL,
    },
    SemanticRule {
        kind: SemanticKind::IpAddress,
        pattern: &IP_ADDRESS,
    },
    SemanticRule {
        kind: SemanticKind::Phone,
        pattern: &PHONE,
    },
];

impl SemanticRule {
    fn match_ratio(&self, values: &[&str]) -> f64 {
        let Some(regex) = self.pattern.as_ref() else {
            return 0.0;
        };
        if values.is_empty() {
            return 0.0;
        }
        let matches = values.iter().filter(|v| regex.is_match(v)).count();
        matches as f64 / values.len() as f64
    }
}

type RuleFn = fn(&ColumnEvidence<'_>, &ClassifierConfig) -> Option<TypeLabel>;

/// One entry of the precedence table.
pub struct ClassificationRule {
    pub name: &'static str,
    predicate: RuleFn,
}

static RULES: [ClassificationRule; 9] = [
    ClassificationRule {
        name: "empty",
        predicate: |e, _| (e.row_count == 0).then_some(TypeLabel::Unknown),
    },
    ClassificationRule {
        name: "constant",
        predicate: |e, _| (e.distinct_count <= 1).then_some(TypeLabel::Constant),
    },
    ClassificationRule {
        name: "semantic",
        predicate: semantic_label,
    },
    ClassificationRule {
        name: "boolean",
        predicate: |e, _| (e.distinct_count == 2).then_some(TypeLabel::Boolean),
    },
    ClassificationRule {
        name: "datetime",
        predicate: |e, _| (e.declared == DeclaredType::Datetime).then_some(TypeLabel::Datetime),
    },
    ClassificationRule {
        name: "numeric",
        predicate: |e, c| {
            e.declared.is_numeric().then(|| {
                if e.distinct_count <= c.categorical_threshold {
                    TypeLabel::CategoricalNumeric
                } else {
                    TypeLabel::Numeric
                }
            })
        },
    },
    ClassificationRule {
        name: "unique_id",
        predicate: |e, _| (e.distinct_count == e.row_count).then_some(TypeLabel::UniqueId),
    },
    ClassificationRule {
        name: "high_cardinality_id",
        predicate: |e, c| {
            (e.distinct_ratio() > c.high_cardinality_ratio).then_some(TypeLabel::HighCardinalityId)
        },
    },
    ClassificationRule {
        name: "categorical",
        predicate: |e, c| {
            (e.distinct_count <= c.categorical_threshold).then_some(TypeLabel::Categorical)
        },
    },
];

fn semantic_label(evidence: &ColumnEvidence<'_>, config: &ClassifierConfig) -> Option<TypeLabel> {
    if !evidence.declared.is_text() {
        return None;
    }
    let values: Vec<&str> = evidence
        .sample
        .iter()
        .flatten()
        .map(|v| v.trim())
        .take(config.semantic_sample_size)
        .collect();

    SEMANTIC_RULES
        .iter()
        .find(|rule| rule.match_ratio(&values) > config.semantic_match_ratio)
        .map(|rule| TypeLabel::Semantic(rule.kind))
}

/// Assigns [`TypeLabel`]s to columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnClassifier {
    config: ClassifierConfig,
}

impl ColumnClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies one column.
    pub fn classify(&self, evidence: &ColumnEvidence<'_>) -> TypeLabel {
        self.explain(evidence).1
    }

    /// Classifies one column and names the rule that decided it.
    pub fn explain(&self, evidence: &ColumnEvidence<'_>) -> (&'static str, TypeLabel) {
        RULES
            .iter()
            .find_map(|rule| (rule.predicate)(evidence, &self.config).map(|label| (rule.name, label)))
            .unwrap_or(("fallback", TypeLabel::HighCardinalityText))
    }

    /// Rule names in precedence order.
    pub fn rule_names() -> Vec<&'static str> {
        RULES.iter().map(|r| r.name).collect()
    }
}
