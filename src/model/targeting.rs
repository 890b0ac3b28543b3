//! Targeting building blocks shared by segments and flag environments.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::null_as_default;
use crate::error::{ProviderError, ProviderResult};
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, AttributeValidator, Block, NestedBlock,
};

/// Rollout weights are thousandths of a percent and must add up to this.
pub const ROLLOUT_TOTAL: i64 = 100_000;

/// Type of every value in a clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Text, sent verbatim.
    #[default]
    String,
    /// Integer or float.
    Number,
    /// `true` or `false`.
    Boolean,
}

impl ValueType {
    /// Accepted spellings.
    pub const NAMES: [&'static str; 3] = ["string", "number", "boolean"];

    /// Schema spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Parse a declarative text value into its wire scalar.
    pub fn parse(&self, text: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(text.to_string())),
            Self::Boolean => text.trim().parse::<bool>().ok().map(Value::Bool),
            Self::Number => {
                let text = text.trim();
                if let Ok(int) = text.parse::<i64>() {
                    return Some(Value::Number(int.into()));
                }
                text.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            },
        }
    }

    /// The type a list of wire scalars decodes as. Mixed lists are text.
    pub fn infer(values: &[Value]) -> Self {
        if !values.is_empty() && values.iter().all(Value::is_boolean) {
            Self::Boolean
        } else if !values.is_empty() && values.iter().all(Value::is_number) {
            Self::Number
        } else {
            Self::String
        }
    }

    /// Whether two declarative texts denote the same wire value.
    pub fn same(&self, a: &str, b: &str) -> bool {
        match (self.parse(a), self.parse(b)) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Render a wire scalar as declarative text, without quotes or a trailing `.0`.
    pub fn render(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                    format!("{}", f as i64)
                },
                _ => n.to_string(),
            },
            other => other.to_string(),
        }
    }
}

/// Clause operators understood by the evaluation engine.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    EndsWith,
    StartsWith,
    Matches,
    Contains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Before,
    After,
    SegmentMatch,
    SemVerEqual,
    SemVerLessThan,
    SemVerGreaterThan,
}

impl Operator {
    /// Wire spellings, in declaration order.
    pub const NAMES: [&'static str; 15] = [
        "in",
        "endsWith",
        "startsWith",
        "matches",
        "contains",
        "lessThan",
        "lessThanOrEqual",
        "greaterThan",
        "greaterThanOrEqual",
        "before",
        "after",
        "segmentMatch",
        "semVerEqual",
        "semVerLessThan",
        "semVerGreaterThan",
    ];

    const ALL: [Operator; 15] = [
        Self::In,
        Self::EndsWith,
        Self::StartsWith,
        Self::Matches,
        Self::Contains,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::Before,
        Self::After,
        Self::SegmentMatch,
        Self::SemVerEqual,
        Self::SemVerLessThan,
        Self::SemVerGreaterThan,
    ];

    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        let index = Self::ALL.iter().position(|op| op == self).unwrap_or(0);
        Self::NAMES[index]
    }

    /// Parse a wire spelling.
    pub fn parse(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|index| Self::ALL[index])
    }
}

/// A single targeting condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// User attribute to test.
    pub attribute: String,
    /// Comparison.
    pub op: Operator,
    /// Operands as text; typed by `value_type`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<String>,
    /// How `values` are typed on the wire.
    #[serde(default, deserialize_with = "null_as_default")]
    pub value_type: ValueType,
    /// Invert the match.
    #[serde(default, deserialize_with = "null_as_default")]
    pub negate: bool,
}

impl Clause {
    /// Every value must parse as the declared type.
    pub fn validate(&self) -> ProviderResult<()> {
        for value in &self.values {
            if self.value_type.parse(value).is_none() {
                return Err(ProviderError::Validation(format!(
                    "clause on '{}' has value {:?} that is not a valid {}",
                    self.attribute,
                    value,
                    self.value_type.as_str()
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn schema() -> NestedBlock {
        NestedBlock::list(
            Block::new()
                .with_attribute("attribute", Attribute::required_string())
                .with_attribute(
                    "op",
                    Attribute::required_string()
                        .with_validator(AttributeValidator::one_of(&Operator::NAMES)),
                )
                .with_attribute(
                    "values",
                    Attribute::new(
                        AttributeType::list(AttributeType::String),
                        AttributeFlags::required(),
                    ),
                )
                .with_attribute(
                    "value_type",
                    Attribute::optional_string()
                        .with_default(Value::String(ValueType::String.as_str().to_string()))
                        .with_validator(AttributeValidator::one_of(&ValueType::NAMES)),
                )
                .with_attribute(
                    "negate",
                    Attribute::optional_bool().with_default(Value::Bool(false)),
                ),
        )
    }
}

/// Check a rollout: each weight within range, and the total exactly [`ROLLOUT_TOTAL`].
pub fn validate_rollout(weights: &[i64]) -> ProviderResult<()> {
    if let Some(weight) = weights.iter().find(|w| !(0..=ROLLOUT_TOTAL).contains(*w)) {
        return Err(ProviderError::Validation(format!(
            "rollout weight {} must be between 0 and {}",
            weight, ROLLOUT_TOTAL
        )));
    }
    let total: i64 = weights.iter().sum();
    if total != ROLLOUT_TOTAL {
        return Err(ProviderError::Validation(format!(
            "rollout weights must sum to {}, got {}",
            ROLLOUT_TOTAL, total
        )));
    }
    Ok(())
}

fn validate_variation_or_rollout(
    context: &str,
    variation: Option<i64>,
    rollout_weights: &[i64],
    bucket_by: Option<&str>,
) -> ProviderResult<()> {
    if variation.is_some() && !rollout_weights.is_empty() {
        return Err(ProviderError::Validation(format!(
            "{}: variation and rollout_weights are mutually exclusive",
            context
        )));
    }
    if bucket_by.is_some() && rollout_weights.is_empty() {
        return Err(ProviderError::Validation(
            "cannot use bucket_by argument with variation, only with rollout_weights".to_string(),
        ));
    }
    match variation {
        Some(index) if index < 0 => Err(ProviderError::Validation(format!(
            "{}: variation must not be negative, got {}",
            context, index
        ))),
        Some(_) => Ok(()),
        None if rollout_weights.is_empty() => Err(ProviderError::Validation(format!(
            "{}: one of variation or rollout_weights is required",
            context
        ))),
        None => validate_rollout(rollout_weights),
    }
}

fn serve_block() -> Block {
    Block::new()
        .with_attribute(
            "variation",
            Attribute::optional_int64().with_validator(AttributeValidator::IntAtLeast(0)),
        )
        .with_attribute(
            "rollout_weights",
            Attribute::new(
                AttributeType::list(AttributeType::Int64),
                AttributeFlags::optional(),
            )
            .with_validator(AttributeValidator::IntBetween(0, ROLLOUT_TOTAL)),
        )
        .with_attribute("bucket_by", Attribute::optional_string())
}

/// What a flag serves when targeting is on and no rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fallthrough {
    /// Fixed variation index.
    #[serde(default)]
    pub variation: Option<i64>,
    /// Weight per variation, by position.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rollout_weights: Vec<i64>,
    /// Attribute hashed to pick a bucket.
    #[serde(default)]
    pub bucket_by: Option<String>,
}

impl Fallthrough {
    /// Exactly one of `variation` / `rollout_weights`; `bucket_by` only with a rollout.
    pub fn validate(&self) -> ProviderResult<()> {
        validate_variation_or_rollout(
            "flag_fallthrough",
            self.variation,
            &self.rollout_weights,
            self.bucket_by.as_deref(),
        )
    }

    pub(crate) fn schema() -> NestedBlock {
        NestedBlock::single(serve_block()).with_computed()
    }
}

/// A flag targeting rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRule {
    /// All must match.
    #[serde(default, deserialize_with = "null_as_default")]
    pub clauses: Vec<Clause>,
    /// Fixed variation index.
    #[serde(default)]
    pub variation: Option<i64>,
    /// Weight per variation, by position.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rollout_weights: Vec<i64>,
    /// Attribute hashed to pick a bucket.
    #[serde(default)]
    pub bucket_by: Option<String>,
}

impl FlagRule {
    /// Same serve rules as the fallthrough, plus per-clause value typing.
    pub fn validate(&self) -> ProviderResult<()> {
        validate_variation_or_rollout(
            "rules",
            self.variation,
            &self.rollout_weights,
            self.bucket_by.as_deref(),
        )?;
        self.clauses.iter().try_for_each(Clause::validate)
    }

    pub(crate) fn schema() -> NestedBlock {
        NestedBlock::list(serve_block().with_block("clauses", Clause::schema()))
    }
}

/// A flag that must serve `variation` before this one is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Key of the prerequisite flag in the same project.
    pub flag_key: String,
    /// Variation index it must serve.
    pub variation: i64,
}

impl Prerequisite {
    pub(crate) fn schema() -> NestedBlock {
        NestedBlock::list(
            Block::new()
                .with_attribute("flag_key", Attribute::required_string())
                .with_attribute(
                    "variation",
                    Attribute::required_int64().with_validator(AttributeValidator::IntAtLeast(0)),
                ),
        )
    }
}

/// Users individually targeted to the variation at this position.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserTarget {
    /// User keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: BTreeSet<String>,
}

impl UserTarget {
    pub(crate) fn schema() -> NestedBlock {
        NestedBlock::list(Block::new().with_attribute("values", Attribute::optional_string_set()))
    }
}
