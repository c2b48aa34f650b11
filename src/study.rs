//! Study definitions - the declarative configuration for one analysis
//!
//! A study names the fields it expects, the plausibility rules, the
//! deduplication key, winsorization and completeness settings, per-field
//! transforms and the correlation pairs to report. Studies are loaded from
//! JSON, validated once and never modified afterwards.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::parse_bool;

/// Semantic type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Categorical,
    Boolean,
    Identifier,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Categorical => "categorical",
            FieldKind::Boolean => "boolean",
            FieldKind::Identifier => "identifier",
        };
        f.write_str(name)
    }
}

/// Declared schema of one input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Human-readable label used in the Markdown report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Plausible inclusive range `[lo, hi]` (numeric fields only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    /// Allowed value set (categorical, boolean and identifier fields)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// Required by the study's core completeness filter
    #[serde(default)]
    pub key: bool,
    /// Count field: negative values are implausible
    #[serde(default)]
    pub count: bool,
    /// Field-specific codes that mean "no answer" (e.g. 77 = refused)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_codes: Vec<String>,
}

impl FieldSchema {
    /// Rules implied by the schema itself (range, allowed set, non-negativity)
    pub fn implied_rules(&self) -> Vec<Rule> {
        let mut rules = Vec::new();
        if let Some([min, max]) = self.range {
            rules.push(Rule::Range {
                field: self.name.clone(),
                min,
                max,
            });
        }
        if let Some(values) = &self.allowed {
            rules.push(Rule::AllowedValues {
                field: self.name.clone(),
                values: values.clone(),
            });
        }
        if self.count {
            rules.push(Rule::NonNegative {
                field: self.name.clone(),
            });
        }
        rules
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// A plausibility predicate. Failing values are marked missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// Value must lie in `[min, max]`, bounds inclusive
    Range { field: String, min: f64, max: f64 },
    /// Value must be zero or positive
    NonNegative { field: String },
    /// Value must be one of `values`
    AllowedValues { field: String, values: Vec<String> },
    /// `field` must not exceed `reference` in the same record
    NotGreaterThan { field: String, reference: String },
    /// `field` is implausible unless boolean `flag` equals `expected`
    RequiresFlag {
        field: String,
        flag: String,
        #[serde(default = "default_expected_flag")]
        expected: bool,
    },
}

fn default_expected_flag() -> bool {
    true
}

impl Rule {
    /// Field whose values the rule may invalidate
    pub fn target(&self) -> &str {
        match self {
            Rule::Range { field, .. }
            | Rule::NonNegative { field }
            | Rule::AllowedValues { field, .. }
            | Rule::NotGreaterThan { field, .. }
            | Rule::RequiresFlag { field, .. } => field,
        }
    }

    /// Every field the rule reads
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Rule::NotGreaterThan { field, reference } => vec![field, reference],
            Rule::RequiresFlag { field, flag, .. } => vec![field, flag],
            other => vec![other.target()],
        }
    }

    pub fn is_cross_field(&self) -> bool {
        matches!(self, Rule::NotGreaterThan { .. } | Rule::RequiresFlag { .. })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Range { field, min, max } => write!(f, "{} in [{}, {}]", field, min, max),
            Rule::NonNegative { field } => write!(f, "{} >= 0", field),
            Rule::AllowedValues { field, values } => {
                write!(f, "{} in {{{}}}", field, values.join(", "))
            }
            Rule::NotGreaterThan { field, reference } => write!(f, "{} <= {}", field, reference),
            Rule::RequiresFlag {
                field,
                flag,
                expected,
            } => write!(f, "{} requires {} = {}", field, flag, expected),
        }
    }
}

/// Percentile clipping for one numeric field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinsorizeSpec {
    pub field: String,
    #[serde(default = "default_lower_pct")]
    pub lower: f64,
    #[serde(default = "default_upper_pct")]
    pub upper: f64,
}

fn default_lower_pct() -> f64 {
    1.0
}

fn default_upper_pct() -> f64 {
    99.0
}

/// Required-field conditions. All conditions are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletenessSpec {
    #[serde(default)]
    pub required_all: Vec<String>,
    /// Each group needs at least one non-missing field
    #[serde(default)]
    pub required_any: Vec<Vec<String>>,
}

/// Named per-column transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[serde(alias = "zscore")]
    ZScore,
    #[serde(alias = "minmax")]
    MinMax,
    Log1p,
}

impl TransformKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            TransformKind::ZScore => "z",
            TransformKind::MinMax => "minmax",
            TransformKind::Log1p => "log1p",
        }
    }

    /// Name of the column derived from `field`
    pub fn output_name(&self, field: &str) -> String {
        format!("{}_{}", field, self.suffix())
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformKind::ZScore => "z-score",
            TransformKind::MinMax => "min-max",
            TransformKind::Log1p => "log1p",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub field: String,
    pub transforms: Vec<TransformKind>,
}

/// Two numeric columns to correlate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub x: String,
    pub y: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CorrelationPair {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            label: None,
        }
    }

    pub fn name(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("{} ~ {}", self.x, self.y))
    }
}

/// Tokens read as missing in every column unless a study overrides them
pub fn default_na_values() -> Vec<String> {
    ["", "NA", "N/A", "NaN", "null", "."]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The full declarative bundle for one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldSchema>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Identity of a record, e.g. survey year + subject id
    #[serde(default)]
    pub dedup_keys: Vec<String>,
    #[serde(default)]
    pub winsorize: Vec<WinsorizeSpec>,
    #[serde(default)]
    pub completeness: CompletenessSpec,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    #[serde(default)]
    pub correlations: Vec<CorrelationPair>,
    /// Normalize raw header names before matching declared fields
    #[serde(default)]
    pub normalize_headers: bool,
    #[serde(default = "default_na_values")]
    pub na_values: Vec<String>,
}

impl Study {
    /// Parse and validate a study from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let study: Study = serde_json::from_str(json)?;
        study.validate()?;
        Ok(study)
    }

    /// Read, parse and validate a study definition file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Schema-implied rules followed by the explicit rules
    pub fn all_rules(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.fields.iter().flat_map(|f| f.implied_rules()).collect();
        rules.extend(self.rules.iter().cloned());
        rules
    }

    /// Explicit required-all fields plus every key field, without duplicates
    pub fn required_all(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.completeness
            .required_all
            .iter()
            .map(String::as_str)
            .chain(self.fields.iter().filter(|f| f.key).map(|f| f.name.as_str()))
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Names of all transform-derived columns in application order
    pub fn derived_columns(&self) -> Vec<String> {
        self.transforms
            .iter()
            .flat_map(|spec| spec.transforms.iter().map(|t| t.output_name(&spec.field)))
            .collect()
    }

    /// Check internal consistency of the definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("study name is empty"));
        }
        if self.fields.is_empty() {
            return Err(invalid("study declares no fields"));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
            if let Some([lo, hi]) = field.range {
                if field.kind != FieldKind::Numeric {
                    return Err(invalid(format!(
                        "range declared on non-numeric field '{}'",
                        field.name
                    )));
                }
                if !lo.is_finite() || !hi.is_finite() || lo > hi {
                    return Err(invalid(format!(
                        "range [{}, {}] of field '{}' is not a valid interval",
                        lo, hi, field.name
                    )));
                }
            }
            if field.allowed.is_some() && field.kind == FieldKind::Numeric {
                return Err(invalid(format!(
                    "allowed values declared on numeric field '{}'; use a range",
                    field.name
                )));
            }
            if let (FieldKind::Boolean, Some(values)) = (field.kind, &field.allowed) {
                check_boolean_tokens(&field.name, values)?;
            }
            if field.count && field.kind != FieldKind::Numeric {
                return Err(invalid(format!(
                    "count flag declared on non-numeric field '{}'",
                    field.name
                )));
            }
        }

        for rule in &self.rules {
            self.validate_rule(rule)?;
        }

        for spec in &self.winsorize {
            self.expect_kind(&spec.field, FieldKind::Numeric, "winsorization")?;
            let valid_pct = |p: f64| (0.0..=100.0).contains(&p);
            if !valid_pct(spec.lower) || !valid_pct(spec.upper) || spec.lower >= spec.upper {
                return Err(invalid(format!(
                    "winsorization percentiles for '{}' must satisfy 0 <= lower < upper <= 100, got {} and {}",
                    spec.field, spec.lower, spec.upper
                )));
            }
        }

        for name in &self.completeness.required_all {
            self.expect_declared(name, "completeness filter")?;
        }
        for group in &self.completeness.required_any {
            if group.is_empty() {
                return Err(invalid("empty required_any group"));
            }
            for name in group {
                self.expect_declared(name, "completeness filter")?;
            }
        }

        for spec in &self.transforms {
            self.expect_kind(&spec.field, FieldKind::Numeric, "transform")?;
        }
        let mut derived = HashSet::new();
        for column in self.derived_columns() {
            if names.contains(column.as_str()) || self.dedup_keys.contains(&column) {
                return Err(invalid(format!(
                    "derived column '{}' collides with an input column",
                    column
                )));
            }
            if !derived.insert(column.clone()) {
                return Err(invalid(format!("transform '{}' declared twice", column)));
            }
        }

        for pair in &self.correlations {
            if pair.x == pair.y {
                return Err(invalid(format!(
                    "correlation pair uses '{}' twice",
                    pair.x
                )));
            }
            for name in [&pair.x, &pair.y] {
                if derived.contains(name) {
                    continue;
                }
                self.expect_kind(name, FieldKind::Numeric, "correlation")?;
            }
        }

        Ok(())
    }

    fn validate_rule(&self, rule: &Rule) -> Result<()> {
        match rule {
            Rule::Range { field, min, max } => {
                self.expect_kind(field, FieldKind::Numeric, "range rule")?;
                if min > max {
                    return Err(invalid(format!(
                        "range rule on '{}' has min {} > max {}",
                        field, min, max
                    )));
                }
            }
            Rule::NonNegative { field } => {
                self.expect_kind(field, FieldKind::Numeric, "non-negative rule")?;
            }
            Rule::AllowedValues { field, values } => {
                let schema = self.expect_declared(field, "allowed-values rule")?;
                if schema.kind == FieldKind::Numeric {
                    return Err(invalid(format!(
                        "allowed-values rule on numeric field '{}'",
                        field
                    )));
                }
                if schema.kind == FieldKind::Boolean {
                    check_boolean_tokens(field, values)?;
                }
            }
            Rule::NotGreaterThan { field, reference } => {
                self.expect_kind(field, FieldKind::Numeric, "cross-field rule")?;
                self.expect_kind(reference, FieldKind::Numeric, "cross-field rule")?;
            }
            Rule::RequiresFlag { field, flag, .. } => {
                self.expect_declared(field, "cross-field rule")?;
                self.expect_kind(flag, FieldKind::Boolean, "cross-field rule")?;
            }
        }
        Ok(())
    }

    fn expect_declared(&self, name: &str, usage: &str) -> Result<&FieldSchema> {
        self.field(name).ok_or_else(|| {
            invalid(format!(
                "{} references undeclared field '{}'",
                usage, name
            ))
        })
    }

    fn expect_kind(&self, name: &str, kind: FieldKind, usage: &str) -> Result<&FieldSchema> {
        let schema = self.expect_declared(name, usage)?;
        if schema.kind != kind {
            return Err(invalid(format!(
                "{} needs {} field, but '{}' is {}",
                usage, kind, name, schema.kind
            )));
        }
        Ok(schema)
    }
}

/// Allowed tokens of a boolean field must be readable as booleans
fn check_boolean_tokens(field: &str, values: &[String]) -> Result<()> {
    match values.iter().find(|v| parse_bool(v).is_none()) {
        Some(token) => Err(invalid(format!(
            "allowed value '{}' of boolean field '{}' is not a boolean",
            token, field
        ))),
        None => Ok(()),
    }
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidStudy(message.into())
}
