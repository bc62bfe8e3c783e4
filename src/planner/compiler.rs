//! Query compiler
//!
//! Turns a `Specification` into canonical plan text plus a fingerprint.
//!
//! Canonical ordering (so equivalent specs give byte-identical text):
//! 1. Plain columns sorted and de-duplicated
//! 2. Group-by columns sorted and de-duplicated
//! 3. Filters sorted by (column, operator, rendered predicate) and de-duplicated
//! 4. Aggregates sorted by alias
//!
//! `order_by` is semantic and keeps its given order. When grouping without
//! an explicit order, rows are ordered by the group columns.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ast::{
    AggregateFunc, Comparison, Literal, OrderItem, Predicate, Projection, SelectPlan,
};
use super::errors::{CompileError, CompileResult};
use super::spec::{AggregateSpec, Filter, SortDirection, Specification};
use crate::dataset::{ColumnType, Dataset, Schema};

/// Name the dataset is registered under for every execution
pub const TABLE_NAME: &str = "dataset";

/// Placeholder substituted with the table name in raw-text plans
pub const TABLE_PLACEHOLDER: &str = "{{table}}";

const FINGERPRINT_SEPARATOR: char = '\u{1f}';

/// How a plan was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    Structured,
    Raw,
}

impl PlanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanMode::Structured => "structured",
            PlanMode::Raw => "raw",
        }
    }
}

/// Hex SHA-256 identifying a plan against one dataset version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes `dataset_id ␟ content_version ␟ plan_text`.
    pub fn compute(dataset: &Dataset, plan_text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(dataset.id.to_string().as_bytes());
        hasher.update(FINGERPRINT_SEPARATOR.to_string().as_bytes());
        hasher.update(dataset.content_version.as_bytes());
        hasher.update(FINGERPRINT_SEPARATOR.to_string().as_bytes());
        hasher.update(plan_text.as_bytes());
        Fingerprint(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Executable plan text and its cache identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPlan {
    pub text: String,
    pub fingerprint: Fingerprint,
    pub mode: PlanMode,
}

/// Stateless compiler from specifications to plans
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCompiler;

impl QueryCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Validates `spec` against `dataset` and renders the canonical plan.
    pub fn compile(&self, spec: &Specification, dataset: &Dataset) -> CompileResult<CompiledPlan> {
        let plan = self.plan(spec, dataset)?;
        let text = plan.render();
        Ok(CompiledPlan {
            fingerprint: Fingerprint::compute(dataset, &text),
            text,
            mode: PlanMode::Structured,
        })
    }

    /// Passes raw plan text through with `{{table}}` substituted.
    ///
    /// No structural validation is done here. Callers gate this mode.
    pub fn compile_raw(&self, text: &str, dataset: &Dataset) -> CompileResult<CompiledPlan> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CompileError::invalid("raw_sql must not be empty"));
        }

        let text = trimmed.replace(TABLE_PLACEHOLDER, &super::escape::quote_ident(TABLE_NAME));
        Ok(CompiledPlan {
            fingerprint: Fingerprint::compute(dataset, &text),
            text,
            mode: PlanMode::Raw,
        })
    }

    /// `SELECT * ... LIMIT rows`; used for previews.
    pub fn preview(&self, dataset: &Dataset, rows: u64) -> CompiledPlan {
        let text = SelectPlan::wildcard(TABLE_NAME, Some(rows)).render();
        CompiledPlan {
            fingerprint: Fingerprint::compute(dataset, &text),
            text,
            mode: PlanMode::Structured,
        }
    }

    /// Builds the canonical plan without rendering it.
    pub fn plan(&self, spec: &Specification, dataset: &Dataset) -> CompileResult<SelectPlan> {
        if spec.dataset_id != dataset.id {
            return Err(CompileError::invalid(format!(
                "spec.dataset_id {} does not match dataset {}",
                spec.dataset_id, dataset.id
            )));
        }
        if !dataset.has_schema() {
            return Err(CompileError::invalid(format!(
                "dataset {} has no schema; refresh it before querying",
                dataset.id
            )));
        }
        if spec.limit == Some(0) {
            return Err(CompileError::invalid("limit must be greater than zero"));
        }

        let schema = &dataset.schema;
        let explicit_wildcard = spec.select.iter().any(|c| c == "*");
        if explicit_wildcard && spec.select.len() > 1 {
            return Err(CompileError::invalid(
                "'*' cannot be combined with other columns",
            ));
        }
        if explicit_wildcard && (!spec.aggregates.is_empty() || !spec.group_by.is_empty()) {
            return Err(CompileError::invalid(
                "'*' cannot be combined with aggregates or group_by",
            ));
        }

        let select = if explicit_wildcard {
            Vec::new()
        } else {
            canonical_columns(schema, &spec.select)?
        };
        let group_by = canonical_columns(schema, &spec.group_by)?;
        let aggregates = canonical_aggregates(schema, &spec.aggregates)?;
        let grouping = !aggregates.is_empty() || !group_by.is_empty();

        if grouping {
            if let Some(col) = select.iter().find(|c| !group_by.contains(c)) {
                return Err(CompileError::ungrouped_column(col.clone()));
            }
        }

        // Plain projection: explicit select, else group keys when grouping
        let plain = if select.is_empty() && grouping {
            group_by.clone()
        } else {
            select
        };

        for (_, _, alias) in &aggregates {
            if plain.contains(alias) {
                return Err(CompileError::invalid_field(
                    alias.clone(),
                    format!("alias '{}' collides with a selected column", alias),
                ));
            }
        }

        let mut projection: Vec<Projection> = if plain.is_empty() && !grouping {
            vec![Projection::Wildcard]
        } else {
            plain.iter().cloned().map(Projection::Column).collect()
        };
        projection.extend(aggregates.into_iter().map(|(func, arg, alias)| {
            Projection::Aggregate { func, arg, alias }
        }));

        let predicates = canonical_predicates(schema, &spec.filters)?;

        let output: Vec<&str> = if matches!(projection.as_slice(), [Projection::Wildcard]) {
            schema.columns().iter().map(|c| c.name.as_str()).collect()
        } else {
            projection.iter().filter_map(Projection::output_name).collect()
        };

        let mut order_by = Vec::with_capacity(spec.order_by.len());
        for item in &spec.order_by {
            if !output.contains(&item.column.as_str()) {
                return Err(CompileError::invalid_field(
                    item.column.clone(),
                    format!("order_by column '{}' is not in the projection", item.column),
                ));
            }
            order_by.push(OrderItem {
                column: item.column.clone(),
                direction: item.direction,
            });
        }
        if order_by.is_empty() && !group_by.is_empty() {
            order_by = group_by
                .iter()
                .map(|c| OrderItem {
                    column: c.clone(),
                    direction: SortDirection::Asc,
                })
                .collect();
        }

        Ok(SelectPlan {
            table: TABLE_NAME.to_string(),
            projection,
            predicates,
            group_by,
            order_by,
            limit: spec.limit,
        })
    }
}

fn check_column(schema: &Schema, name: &str) -> CompileResult<ColumnType> {
    if name.trim().is_empty() {
        return Err(CompileError::invalid("column names must not be empty"));
    }
    schema
        .column_type(name)
        .ok_or_else(|| CompileError::unknown_column(name))
}

fn canonical_columns(schema: &Schema, columns: &[String]) -> CompileResult<Vec<String>> {
    for column in columns {
        check_column(schema, column)?;
    }
    let mut out = columns.to_vec();
    out.sort();
    out.dedup();
    Ok(out)
}

fn canonical_aggregates(
    schema: &Schema,
    aggregates: &[AggregateSpec],
) -> CompileResult<Vec<(AggregateFunc, Option<String>, String)>> {
    let mut out = Vec::with_capacity(aggregates.len());

    for agg in aggregates {
        let func = AggregateFunc::parse(&agg.func)
            .ok_or_else(|| CompileError::unsupported_aggregate(agg.func.clone()))?;

        let arg = if agg.column == "*" {
            if func != AggregateFunc::Count {
                return Err(CompileError::invalid_field(
                    "*",
                    format!("'*' is only valid for count, not {}", func.as_str()),
                ));
            }
            None
        } else {
            let column_type = check_column(schema, &agg.column)?;
            if func.is_numeric_only() && !column_type.is_numeric() {
                return Err(CompileError::invalid_field(
                    agg.column.clone(),
                    format!(
                        "{} requires a numeric column, '{}' is {}",
                        func.as_str(),
                        agg.column,
                        column_type
                    ),
                ));
            }
            Some(agg.column.clone())
        };

        let alias = match &agg.alias {
            Some(alias) if alias.trim().is_empty() => {
                return Err(CompileError::invalid("aggregate alias must not be empty"))
            }
            Some(alias) => alias.clone(),
            None => match &arg {
                Some(column) => format!("{}_{}", func.as_str(), column),
                None => "count_all".to_string(),
            },
        };

        out.push((func, arg, alias));
    }

    out.sort_by(|a, b| a.2.cmp(&b.2));
    if let Some(pair) = out.windows(2).find(|w| w[0].2 == w[1].2) {
        return Err(CompileError::invalid_field(
            pair[0].2.clone(),
            format!("duplicate aggregate alias '{}'", pair[0].2),
        ));
    }

    Ok(out)
}

fn canonical_predicates(schema: &Schema, filters: &[Filter]) -> CompileResult<Vec<Predicate>> {
    let mut keyed = Vec::with_capacity(filters.len());

    for filter in filters {
        let column_type = check_column(schema, &filter.column)?;
        let op = Comparison::parse(&filter.operator)
            .ok_or_else(|| CompileError::unsupported_operator(filter.operator.clone()))?;

        let value = if op.is_pattern() {
            if !column_type.is_text() {
                return Err(CompileError::invalid_field(
                    filter.column.clone(),
                    format!(
                        "operator '{}' requires a string column, '{}' is {}",
                        op.as_str(),
                        filter.column,
                        column_type
                    ),
                ));
            }
            Literal::Text(filter.value.clone())
        } else {
            parse_literal(&filter.column, column_type, &filter.value)?
        };

        let predicate = Predicate {
            column: filter.column.clone(),
            op,
            value,
        };
        // Keyed on rendered text so " 10" and "10" collapse on numeric columns
        keyed.push((filter.column.clone(), op.as_str(), predicate.render(), predicate));
    }

    keyed.sort_by(|a, b| (&a.0, a.1, &a.2).cmp(&(&b.0, b.1, &b.2)));
    keyed.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1 && a.2 == b.2);

    Ok(keyed.into_iter().map(|(_, _, _, p)| p).collect())
}

fn parse_literal(column: &str, column_type: ColumnType, raw: &str) -> CompileResult<Literal> {
    let value = raw.trim();
    let mismatch = || {
        CompileError::invalid_field(
            column,
            format!("value '{}' is not a valid {} for '{}'", raw, column_type, column),
        )
    };

    match column_type {
        ColumnType::String => Ok(Literal::Text(raw.to_string())),
        ColumnType::Integer => {
            if let Ok(i) = value.parse::<i64>() {
                Ok(Literal::Integer(i))
            } else {
                parse_float(value).map(Literal::Float).ok_or_else(mismatch)
            }
        }
        ColumnType::Float => parse_float(value).map(Literal::Float).ok_or_else(mismatch),
        ColumnType::Boolean => match value.to_ascii_lowercase().as_str() {
            "true" => Ok(Literal::Boolean(true)),
            "false" => Ok(Literal::Boolean(false)),
            _ => Err(mismatch()),
        },
        ColumnType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|_| Literal::Date(value.to_string()))
            .map_err(|_| mismatch()),
        ColumnType::Timestamp => {
            let ok = DateTime::parse_from_rfc3339(value).is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok();
            if ok {
                Ok(Literal::Timestamp(value.to_string()))
            } else {
                Err(mismatch())
            }
        }
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|f| f.is_finite())
}
