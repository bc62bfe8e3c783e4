//! Plan AST
//!
//! A validated, canonical `SELECT` over the single registered table. The
//! compiler builds a `SelectPlan` and renders it exactly once; rendering is
//! a pure function of the plan, so equal plans give equal text.

use super::escape::{escape_like_pattern, quote_ident, quote_literal};
use super::spec::SortDirection;

/// Comparison operators, in canonical spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Contains,
    StartsWith,
    EndsWith,
}

impl Comparison {
    /// Parses an operator, accepting common aliases case-insensitively.
    pub fn parse(op: &str) -> Option<Self> {
        let op = op.trim().to_ascii_lowercase();
        let parsed = match op.as_str() {
            "=" | "==" | "eq" => Comparison::Eq,
            "!=" | "<>" | "ne" => Comparison::NotEq,
            ">" | "gt" => Comparison::Gt,
            "<" | "lt" => Comparison::Lt,
            ">=" | "gte" | "ge" => Comparison::GtEq,
            "<=" | "lte" | "le" => Comparison::LtEq,
            "contains" => Comparison::Contains,
            "startswith" | "starts_with" => Comparison::StartsWith,
            "endswith" | "ends_with" => Comparison::EndsWith,
            _ => return None,
        };
        Some(parsed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::NotEq => "!=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::GtEq => ">=",
            Comparison::LtEq => "<=",
            Comparison::Contains => "contains",
            Comparison::StartsWith => "startswith",
            Comparison::EndsWith => "endswith",
        }
    }

    /// Text-matching operators compile to LIKE
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Comparison::Contains | Comparison::StartsWith | Comparison::EndsWith
        )
    }
}

/// Typed literal; rendering depends on the column type it was parsed for
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(String),
    Timestamp(String),
}

impl Literal {
    pub fn render(&self) -> String {
        match self {
            Literal::Text(s) => quote_literal(s),
            Literal::Integer(i) => i.to_string(),
            Literal::Float(f) => format!("{:?}", f),
            Literal::Boolean(true) => "TRUE".to_string(),
            Literal::Boolean(false) => "FALSE".to_string(),
            Literal::Date(s) => format!("CAST({} AS DATE)", quote_literal(s)),
            Literal::Timestamp(s) => format!("CAST({} AS TIMESTAMP)", quote_literal(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: Comparison,
    pub value: Literal,
}

impl Predicate {
    pub fn render(&self) -> String {
        let column = quote_ident(&self.column);
        if self.op.is_pattern() {
            let raw = match &self.value {
                Literal::Text(s) => s.clone(),
                other => other.render(),
            };
            let escaped = escape_like_pattern(&raw);
            let pattern = match self.op {
                Comparison::Contains => format!("%{}%", escaped),
                Comparison::StartsWith => format!("{}%", escaped),
                _ => format!("%{}", escaped),
            };
            format!("{} LIKE {}", column, quote_literal(&pattern))
        } else {
            format!("{} {} {}", column, self.op.as_str(), self.value.render())
        }
    }
}

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateFunc {
    pub fn parse(func: &str) -> Option<Self> {
        match func.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(AggregateFunc::Sum),
            "avg" => Some(AggregateFunc::Avg),
            "count" => Some(AggregateFunc::Count),
            "min" => Some(AggregateFunc::Min),
            "max" => Some(AggregateFunc::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunc::Sum => "sum",
            AggregateFunc::Avg => "avg",
            AggregateFunc::Count => "count",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        }
    }

    /// Requires a numeric argument
    pub fn is_numeric_only(&self) -> bool {
        matches!(self, AggregateFunc::Sum | AggregateFunc::Avg)
    }
}

/// One item of the projection list
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Wildcard,
    Column(String),
    /// `arg` of `None` is `*` (count only)
    Aggregate {
        func: AggregateFunc,
        arg: Option<String>,
        alias: String,
    },
}

impl Projection {
    pub fn render(&self) -> String {
        match self {
            Projection::Wildcard => "*".to_string(),
            Projection::Column(name) => quote_ident(name),
            Projection::Aggregate { func, arg, alias } => {
                let arg = arg.as_deref().map(quote_ident).unwrap_or_else(|| "*".into());
                format!(
                    "{}({}) AS {}",
                    func.as_str().to_ascii_uppercase(),
                    arg,
                    quote_ident(alias)
                )
            }
        }
    }

    /// Output column name, `None` for the wildcard
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Projection::Wildcard => None,
            Projection::Column(name) => Some(name),
            Projection::Aggregate { alias, .. } => Some(alias),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub column: String,
    pub direction: SortDirection,
}

/// Canonical single-table SELECT
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub table: String,
    pub projection: Vec<Projection>,
    pub predicates: Vec<Predicate>,
    pub group_by: Vec<String>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
}

impl SelectPlan {
    /// `SELECT * FROM <table>` with an optional limit
    pub fn wildcard(table: impl Into<String>, limit: Option<u64>) -> Self {
        Self {
            table: table.into(),
            projection: vec![Projection::Wildcard],
            predicates: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit,
        }
    }

    pub fn render(&self) -> String {
        let projection: Vec<String> = self.projection.iter().map(Projection::render).collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            projection.join(", "),
            quote_ident(&self.table)
        );

        if !self.predicates.is_empty() {
            let predicates: Vec<String> = self.predicates.iter().map(Predicate::render).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if !self.group_by.is_empty() {
            let columns: Vec<String> = self.group_by.iter().map(|c| quote_ident(c)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }

        if !self.order_by.is_empty() {
            let items: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{} {}", quote_ident(&o.column), o.direction.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_aliases() {
        assert_eq!(Comparison::parse("=="), Some(Comparison::Eq));
        assert_eq!(Comparison::parse("<>"), Some(Comparison::NotEq));
        assert_eq!(Comparison::parse("GTE"), Some(Comparison::GtEq));
        assert_eq!(Comparison::parse("starts_with"), Some(Comparison::StartsWith));
        assert_eq!(Comparison::parse("regex"), None);
    }

    #[test]
    fn test_literal_render() {
        assert_eq!(Literal::Integer(10).render(), "10");
        assert_eq!(Literal::Float(2.5).render(), "2.5");
        assert_eq!(Literal::Float(10.0).render(), "10.0");
        assert_eq!(Literal::Boolean(true).render(), "TRUE");
        assert_eq!(Literal::Text("it's".into()).render(), "'it''s'");
        assert_eq!(
            Literal::Date("2024-01-01".into()).render(),
            "CAST('2024-01-01' AS DATE)"
        );
    }

    #[test]
    fn test_pattern_predicate_escapes_wildcards() {
        let pred = Predicate {
            column: "code".into(),
            op: Comparison::Contains,
            value: Literal::Text("50%_off'".into()),
        };
        assert_eq!(pred.render(), "\"code\" LIKE '%50\\%\\_off''%'");

        let pred = Predicate {
            column: "code".into(),
            op: Comparison::EndsWith,
            value: Literal::Text("x".into()),
        };
        assert_eq!(pred.render(), "\"code\" LIKE '%x'");
    }

    #[test]
    fn test_render_full_plan() {
        let plan = SelectPlan {
            table: "dataset".into(),
            projection: vec![
                Projection::Column("region".into()),
                Projection::Aggregate {
                    func: AggregateFunc::Sum,
                    arg: Some("sales".into()),
                    alias: "total".into(),
                },
            ],
            predicates: vec![Predicate {
                column: "sales".into(),
                op: Comparison::Gt,
                value: Literal::Integer(0),
            }],
            group_by: vec!["region".into()],
            order_by: vec![OrderItem {
                column: "total".into(),
                direction: SortDirection::Desc,
            }],
            limit: Some(10),
        };

        assert_eq!(
            plan.render(),
            "SELECT \"region\", SUM(\"sales\") AS \"total\" FROM \"dataset\" \
             WHERE \"sales\" > 0 GROUP BY \"region\" ORDER BY \"total\" DESC LIMIT 10"
        );
    }

    #[test]
    fn test_count_star() {
        let proj = Projection::Aggregate {
            func: AggregateFunc::Count,
            arg: None,
            alias: "count_all".into(),
        };
        assert_eq!(proj.render(), "COUNT(*) AS \"count_all\"");
        assert_eq!(proj.output_name(), Some("count_all"));
    }

    #[test]
    fn test_wildcard_plan() {
        let plan = SelectPlan::wildcard("dataset", Some(50));
        assert_eq!(plan.render(), "SELECT * FROM \"dataset\" LIMIT 50");
    }
}
