//! Query specification wire types
//!
//! A `Specification` is the structured request a dashboard sends. It is
//! validated and canonicalized by the compiler; nothing here interprets it.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::CompileError;

/// Structured filter/group/aggregate query over one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Specification {
    pub dataset_id: u64,
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<AggregateSpec>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl Specification {
    /// Empty specification selecting every column
    pub fn new(dataset_id: u64) -> Self {
        Self {
            dataset_id,
            select: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

/// Single `column <operator> value` predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    #[serde(alias = "col")]
    pub column: String,
    #[serde(alias = "op")]
    pub operator: String,
    #[serde(deserialize_with = "deserialize_value")]
    pub value: String,
}

impl Filter {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Aggregate request; `alias` defaults to `<func>_<column>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    pub func: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl AggregateSpec {
    pub fn new(func: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            func: func.into(),
            column: column.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ASC")]
    Asc,
    #[serde(alias = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Body of a run request: exactly one of `spec` or `raw_sql`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunQueryBody {
    pub dataset_id: u64,
    #[serde(default)]
    pub spec: Option<Specification>,
    #[serde(default)]
    pub raw_sql: Option<String>,
}

/// What a run request asks the engine to execute
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySource {
    Spec(Specification),
    RawSql(String),
}

/// Validated run request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub dataset_id: u64,
    pub source: QuerySource,
}

impl QueryRequest {
    pub fn spec(spec: Specification) -> Self {
        Self {
            dataset_id: spec.dataset_id,
            source: QuerySource::Spec(spec),
        }
    }

    pub fn raw_sql(dataset_id: u64, text: impl Into<String>) -> Self {
        Self {
            dataset_id,
            source: QuerySource::RawSql(text.into()),
        }
    }
}

impl TryFrom<RunQueryBody> for QueryRequest {
    type Error = CompileError;

    fn try_from(body: RunQueryBody) -> Result<Self, Self::Error> {
        let source = match (body.spec, body.raw_sql) {
            (Some(spec), None) => {
                if spec.dataset_id != body.dataset_id {
                    return Err(CompileError::invalid(format!(
                        "spec.dataset_id {} does not match dataset_id {}",
                        spec.dataset_id, body.dataset_id
                    )));
                }
                QuerySource::Spec(spec)
            }
            (None, Some(text)) => QuerySource::RawSql(text),
            (Some(_), Some(_)) => {
                return Err(CompileError::invalid(
                    "provide either spec or raw_sql, not both",
                ))
            }
            (None, None) => {
                return Err(CompileError::invalid("one of spec or raw_sql is required"))
            }
        };

        Ok(Self {
            dataset_id: body.dataset_id,
            source,
        })
    }
}

/// Accepts a filter value given as a JSON string, number or boolean.
fn deserialize_value<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(ValueVisitor)
}
