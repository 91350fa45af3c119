//! Query-string language for collection listings.
//!
//! `?select=title,tuition&sort=-tuition&page=2&limit=10&tuition[lte]=10000&minimumSkill=beginner`
//!
//! `select`, `sort`, `page` and `limit` are reserved; every other key is a filter on a field
//! of the model's [`Schema`], optionally qualified with `[gt]`, `[gte]`, `[lt]`, `[lte]` or
//! `[in]` (comma separated list).

use std::cmp::Ordering;

use axum::{extract::Query, http::Uri};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 25;

const RESERVED: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Unknown field `{0}` in query")]
    UnknownField(String),
    #[error("Unknown operator `{op}` on field `{field}`")]
    UnknownOperator { field: String, op: String },
    #[error("Invalid value `{value}` for field `{field}`: expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
    #[error("Malformed query string: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Timestamp,
    Uuid,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "a number",
            FieldKind::Bool => "true or false",
            FieldKind::Timestamp => "an RFC 3339 timestamp or YYYY-MM-DD date",
            FieldKind::Uuid => "a UUID",
        }
    }

    /// Parses a raw query-string value into a typed value of this kind.
    pub fn parse(self, raw: &str) -> Option<FilterValue> {
        match self {
            FieldKind::Text => Some(FilterValue::Text(raw.to_string())),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FilterValue::Number),
            FieldKind::Bool => raw.parse::<bool>().ok().map(FilterValue::Bool),
            FieldKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|dt| dt.and_utc())
                })
                .map(FilterValue::Timestamp),
            FieldKind::Uuid => Uuid::parse_str(raw).ok().map(FilterValue::Uuid),
        }
    }

    /// Reads the value of this kind out of a serialized document field.
    pub fn from_json(self, value: &Value) -> Option<FilterValue> {
        match self {
            FieldKind::Number => value.as_f64().map(FilterValue::Number),
            FieldKind::Bool => value.as_bool().map(FilterValue::Bool),
            _ => value.as_str().and_then(|s| self.parse(s)),
        }
    }
}

/// A queryable field: its JSON name, its storage column and its type.
#[derive(Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

/// Schema
///
/// What a listing endpoint may filter, sort and select on.
#[derive(Debug)]
pub struct Schema {
    pub table: &'static str,
    pub fields: &'static [Field],
    /// Sort used when the query has none, in `sort=` syntax.
    pub default_sort: &'static str,
}

impl Schema {
    pub fn field(&'static self, name: &str) -> Result<&'static Field, QueryError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| QueryError::UnknownField(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl PartialOrd for FilterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => a.partial_cmp(b),
            (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
            (FilterValue::Bool(a), FilterValue::Bool(b)) => a.partial_cmp(b),
            (FilterValue::Timestamp(a), FilterValue::Timestamp(b)) => a.partial_cmp(b),
            (FilterValue::Uuid(a), FilterValue::Uuid(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "in" => Some(FilterOp::In),
            _ => None,
        }
    }

    /// SQL comparison operator. `In` is rendered separately.
    pub fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq | FilterOp::In => " = ",
            FilterOp::Gt => " > ",
            FilterOp::Gte => " >= ",
            FilterOp::Lt => " < ",
            FilterOp::Lte => " <= ",
        }
    }
}

/// One condition. `values` holds exactly one entry except for `In`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static Field,
    pub op: FilterOp,
    pub values: Vec<FilterValue>,
}

impl Filter {
    /// Evaluates the condition against a serialized document.
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(actual) = doc
            .get(self.field.name)
            .and_then(|v| self.field.kind.from_json(v))
        else {
            return false;
        };

        self.values.iter().any(|expected| {
            let ord = actual.partial_cmp(expected);
            match self.op {
                FilterOp::Eq | FilterOp::In => ord == Some(Ordering::Equal),
                FilterOp::Gt => ord == Some(Ordering::Greater),
                FilterOp::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
                FilterOp::Lt => ord == Some(Ordering::Less),
                FilterOp::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: &'static Field,
    pub descending: bool,
}

impl SortKey {
    /// Orders two serialized documents by this key. Missing values sort last.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let kind = self.field.kind;
        let a = a.get(self.field.name).and_then(|v| kind.from_json(v));
        let b = b.get(self.field.name).and_then(|v| kind.from_json(v));
        let ord = match (a, b) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if self.descending { ord.reverse() } else { ord }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageRef {
    pub page: u32,
    pub limit: u32,
}

/// Links to the neighbouring pages, present only when those pages exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// ListQuery
///
/// A parsed, schema-checked listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub select: Option<Vec<&'static Field>>,
    pub sort: Vec<SortKey>,
    pub page: u32,
    pub limit: u32,
    pub filters: Vec<Filter>,
}

impl ListQuery {
    /// Parses the query string of `uri` against `schema`.
    pub fn from_uri(uri: &Uri, schema: &'static Schema) -> Result<Self, QueryError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|e| QueryError::Malformed(e.body_text()))?;
        Self::parse(&pairs, schema)
    }

    pub fn parse(pairs: &[(String, String)], schema: &'static Schema) -> Result<Self, QueryError> {
        let mut select = None;
        let mut sort = None;
        let mut page = DEFAULT_PAGE;
        let mut limit = DEFAULT_LIMIT;
        let mut filters = Vec::new();

        for (key, raw) in pairs {
            match key.as_str() {
                "select" => {
                    let fields = split_list(raw)
                        .map(|name| schema.field(name))
                        .collect::<Result<Vec<_>, _>>()?;
                    select = Some(fields);
                }
                "sort" => sort = Some(parse_sort(raw, schema)?),
                "page" => page = parse_positive(raw).unwrap_or(DEFAULT_PAGE),
                "limit" => limit = parse_positive(raw).unwrap_or(DEFAULT_LIMIT),
                _ => filters.push(parse_filter(key, raw, schema)?),
            }
        }

        let sort = match sort {
            Some(keys) if !keys.is_empty() => keys,
            _ => parse_sort(schema.default_sort, schema)?,
        };

        Ok(Self {
            select,
            sort,
            page,
            limit,
            filters,
        })
    }

    /// Number of records before the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        let end = u64::from(self.page) * u64::from(self.limit);
        Pagination {
            // No next link past the last addressable page.
            next: self
                .page
                .checked_add(1)
                .filter(|_| end < total)
                .map(|page| PageRef {
                    page,
                    limit: self.limit,
                }),
            prev: (self.page > 1).then(|| PageRef {
                page: self.page - 1,
                limit: self.limit,
            }),
        }
    }

    /// True when `doc` satisfies every filter.
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Populate
///
/// Which reference to resolve and which of the referenced record's fields to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Populate {
    pub path: &'static str,
    pub select: Vec<&'static str>,
}

impl Populate {
    /// `select` is space separated, e.g. `"name description"`.
    pub fn new(path: &'static str, select: &'static str) -> Self {
        Self {
            path,
            select: select.split_whitespace().collect(),
        }
    }
}

/// Keeps only the listed keys of a JSON object. Non-objects are left untouched.
pub fn retain_fields(doc: &mut Value, keep: &[&str]) {
    if let Value::Object(map) = doc {
        map.retain(|key, _| keep.contains(&key.as_str()));
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}

fn parse_sort(raw: &str, schema: &'static Schema) -> Result<Vec<SortKey>, QueryError> {
    split_list(raw)
        .map(|item| {
            let (name, descending) = match item.strip_prefix('-') {
                Some(name) => (name, true),
                None => (item, false),
            };
            Ok(SortKey {
                field: schema.field(name)?,
                descending,
            })
        })
        .collect()
}

fn parse_filter(key: &str, raw: &str, schema: &'static Schema) -> Result<Filter, QueryError> {
    let (name, op) = match key.split_once('[') {
        Some((name, rest)) => {
            let op = rest
                .strip_suffix(']')
                .ok_or_else(|| QueryError::Malformed(key.to_string()))?;
            let parsed = FilterOp::parse(op).ok_or_else(|| QueryError::UnknownOperator {
                field: name.to_string(),
                op: op.to_string(),
            })?;
            (name, parsed)
        }
        None => (key, FilterOp::Eq),
    };

    if RESERVED.contains(&name) {
        return Err(QueryError::UnknownField(key.to_string()));
    }

    let field = schema.field(name)?;
    let raws: Vec<&str> = match op {
        FilterOp::In => split_list(raw).collect(),
        _ => vec![raw],
    };

    let values = raws
        .into_iter()
        .map(|r| {
            field
                .kind
                .parse(r)
                .ok_or_else(|| QueryError::InvalidValue {
                    field: name.to_string(),
                    value: r.to_string(),
                    expected: field.kind.expected(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.is_empty() {
        return Err(QueryError::InvalidValue {
            field: name.to_string(),
            value: raw.to_string(),
            expected: "a non-empty list",
        });
    }

    Ok(Filter { field, op, values })
}
