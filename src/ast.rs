//! Structured query models.
//!
//! These are the inputs of the clause compiler. Every model is a closed sum
//! type tagged by `mode`, so malformed external input fails at
//! deserialization instead of deep inside a compile call.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregate functions usable in SELECT and HAVING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFn::Count => "COUNT",
            AggregateFn::Sum => "SUM",
            AggregateFn::Avg => "AVG",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }

    /// Functions that only make sense over numbers.
    pub fn requires_numeric(&self) -> bool {
        matches!(self, AggregateFn::Sum | AggregateFn::Avg)
    }
}

impl FromStr for AggregateFn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COUNT" => Ok(AggregateFn::Count),
            "SUM" => Ok(AggregateFn::Sum),
            "AVG" => Ok(AggregateFn::Avg),
            "MIN" => Ok(AggregateFn::Min),
            "MAX" => Ok(AggregateFn::Max),
            other => Err(format!("Unsupported aggregate function: {}", other)),
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a SELECT list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SelectItem {
    Column {
        column: String,
        #[serde(default)]
        alias: Option<String>,
    },
    Aggregate {
        #[serde(alias = "fn")]
        function: AggregateFn,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        distinct: bool,
        #[serde(default)]
        alias: Option<String>,
    },
    Custom {
        expression: String,
        #[serde(default)]
        alias: Option<String>,
    },
}

impl SelectItem {
    pub fn column(name: impl Into<String>) -> Self {
        SelectItem::Column {
            column: name.into(),
            alias: None,
        }
    }

    pub fn aggregate(function: AggregateFn, field: Option<&str>) -> Self {
        SelectItem::Aggregate {
            function,
            field: field.map(str::to_string),
            distinct: false,
            alias: None,
        }
    }
}

/// How conditions inside a group combine, and how a group attaches to the
/// previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

impl FromStr for LogicalOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(LogicalOp::And),
            "OR" => Ok(LogicalOp::Or),
            other => Err(format!("Unsupported filter type: {}", other)),
        }
    }
}

/// Operators accepted by column-mode conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    Like,
    NotLike,
    Contains,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// SQL symbol for plain comparisons.
    pub fn comparison(&self) -> Option<&'static str> {
        match self {
            Operator::Equal => Some("="),
            Operator::NotEqual => Some("!="),
            Operator::Greater => Some(">"),
            Operator::Less => Some("<"),
            Operator::GreaterEqual => Some(">="),
            Operator::LessEqual => Some("<="),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "EQUAL",
            Operator::NotEqual => "NOT_EQUAL",
            Operator::Greater => "GREATER",
            Operator::Less => "LESS",
            Operator::GreaterEqual => "GREATER_EQUAL",
            Operator::LessEqual => "LESS_EQUAL",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::Contains => "CONTAINS",
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT_BETWEEN",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    /// Accepts `EQUAL`, `equal`, `NOT BETWEEN`, `not_between` and the
    /// `GREATER_THAN`/`LESS_THAN` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "EQUAL" | "EQ" | "=" => Ok(Operator::Equal),
            "NOT_EQUAL" | "NE" | "!=" | "<>" => Ok(Operator::NotEqual),
            "GREATER" | "GREATER_THAN" | ">" => Ok(Operator::Greater),
            "LESS" | "LESS_THAN" | "<" => Ok(Operator::Less),
            "GREATER_EQUAL" | ">=" => Ok(Operator::GreaterEqual),
            "LESS_EQUAL" | "<=" => Ok(Operator::LessEqual),
            "LIKE" => Ok(Operator::Like),
            "NOT_LIKE" => Ok(Operator::NotLike),
            "CONTAINS" => Ok(Operator::Contains),
            "IN" => Ok(Operator::In),
            "NOT_IN" => Ok(Operator::NotIn),
            "BETWEEN" => Ok(Operator::Between),
            "NOT_BETWEEN" => Ok(Operator::NotBetween),
            "IS_NULL" => Ok(Operator::IsNull),
            "IS_NOT_NULL" => Ok(Operator::IsNotNull),
            _ => Err(format!("Unsupported operator \"{}\"", s)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = String;
            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> String {
                v.as_str().to_string()
            }
        }
    )*};
}

string_conversions!(AggregateFn, LogicalOp, Operator, SortDirection);

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WhereCondition {
    Column {
        #[serde(alias = "field")]
        column: String,
        operator: Operator,
        #[serde(default)]
        value: serde_json::Value,
        #[serde(default, deserialize_with = "deserialize_values")]
        values: Vec<serde_json::Value>,
    },
    ColumnIn {
        #[serde(alias = "field")]
        column: String,
        #[serde(default, deserialize_with = "deserialize_values")]
        values: Vec<serde_json::Value>,
    },
    ColumnNotIn {
        #[serde(alias = "field")]
        column: String,
        #[serde(default, deserialize_with = "deserialize_values")]
        values: Vec<serde_json::Value>,
    },
    Between {
        #[serde(alias = "field")]
        column: String,
        #[serde(default, deserialize_with = "deserialize_values")]
        values: Vec<serde_json::Value>,
    },
    NotBetween {
        #[serde(alias = "field")]
        column: String,
        #[serde(default, deserialize_with = "deserialize_values")]
        values: Vec<serde_json::Value>,
    },
    Exists {
        #[serde(alias = "existsQuery")]
        sql: String,
    },
    NotExists {
        #[serde(alias = "existsQuery")]
        sql: String,
    },
    Expression {
        #[serde(alias = "expression")]
        sql: String,
    },
}

impl WhereCondition {
    pub fn column(column: impl Into<String>, operator: Operator, value: serde_json::Value) -> Self {
        WhereCondition::Column {
            column: column.into(),
            operator,
            value,
            values: Vec::new(),
        }
    }
}

/// `values` arrive either as a JSON array or as a comma-separated string.
fn deserialize_values<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Values {
        List(Vec<serde_json::Value>),
        Csv(String),
        Nothing(()),
    }

    Ok(match Values::deserialize(deserializer)? {
        Values::List(list) => list,
        Values::Csv(s) if s.trim().is_empty() => Vec::new(),
        Values::Csv(s) => s
            .split(',')
            .map(|v| serde_json::Value::String(v.trim().to_string()))
            .collect(),
        Values::Nothing(()) => Vec::new(),
    })
}

/// A group of conditions combined by `filter_type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhereGroup {
    #[serde(default)]
    pub filter_type: LogicalOp,
    #[serde(default)]
    pub conditions: Vec<WhereCondition>,
}

impl WhereGroup {
    pub fn new(filter_type: LogicalOp, conditions: Vec<WhereCondition>) -> Self {
        Self {
            filter_type,
            conditions,
        }
    }
}

/// GROUP BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GroupByItem {
    Column { column: String },
    Expression { expression: String },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(format!("Unsupported sort direction: {}", other)),
        }
    }
}

/// ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OrderByItem {
    Column {
        column: String,
        #[serde(default)]
        direction: SortDirection,
    },
    Expression {
        expression: String,
        #[serde(default)]
        direction: Option<SortDirection>,
    },
}

/// HAVING entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HavingItem {
    Aggregate {
        #[serde(alias = "fn")]
        function: AggregateFn,
        #[serde(default, alias = "column")]
        field: Option<String>,
        operator: Operator,
        #[serde(default)]
        value: serde_json::Value,
    },
    Expression {
        expression: String,
    },
}

/// A complete declarative SELECT over one table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    #[serde(default)]
    pub select: Vec<SelectItem>,
    #[serde(default, alias = "where")]
    pub filters: Vec<WhereGroup>,
    #[serde(default)]
    pub group_by: Vec<GroupByItem>,
    #[serde(default)]
    pub having: Vec<HavingItem>,
    #[serde(default)]
    pub order_by: Vec<OrderByItem>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl QueryModel {
    /// Parse a model from JSON. Unknown modes and operators are shape errors.
    pub fn from_json(json: &str) -> crate::error::SqlPipeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
