//! Query builder and evaluation
//!
//! A [`Query`] is a consuming builder. It records a key prefix, an optional
//! device scope, a chain of field predicates with combinators, ordering and
//! a limit. Nothing is validated while building; [`Query::compile`] checks
//! the chain and produces a [`CompiledQuery`] the store evaluates.
//!
//! Field predicates address values that are JSON documents stored as
//! STRING values. Fields are written `$.a.b` or `a.b`. An entry whose value
//! is not a JSON object never satisfies a predicate.
//!
//! Precedence: adjacent predicates without a combinator are AND-ed, and AND
//! binds tighter than OR.

use distkv_core::limits::MAX_QUERY_LENGTH;
use distkv_core::{Entry, Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A literal compared against a document field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// JSON number
    Number(f64),
    /// JSON string
    String(String),
    /// JSON boolean
    Bool(bool),
}

impl FieldValue {
    fn render(&self) -> String {
        match self {
            FieldValue::Number(n) => format!("{}", n),
            FieldValue::String(s) => format!("'{}'", s.replace('\'', "''")),
            FieldValue::Bool(b) => b.to_string(),
        }
    }

    fn compare(&self, field: &serde_json::Value) -> Option<Ordering> {
        match (field, self) {
            (serde_json::Value::Number(n), FieldValue::Number(f)) => n.as_f64()?.partial_cmp(f),
            (serde_json::Value::String(s), FieldValue::String(f)) => Some(s.as_str().cmp(f)),
            (serde_json::Value::Bool(b), FieldValue::Bool(f)) => Some(b.cmp(f)),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    EqualTo(FieldValue),
    NotEqualTo(FieldValue),
    GreaterThan(FieldValue),
    LessThan(FieldValue),
    GreaterThanOrEqualTo(FieldValue),
    LessThanOrEqualTo(FieldValue),
    IsNull,
    IsNotNull,
    In(Vec<FieldValue>),
    NotIn(Vec<FieldValue>),
    Like(String),
    Unlike(String),
}

impl Condition {
    fn render(&self, field: &str) -> String {
        let list = |values: &[FieldValue]| {
            values
                .iter()
                .map(FieldValue::render)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            Condition::EqualTo(v) => format!("{} = {}", field, v.render()),
            Condition::NotEqualTo(v) => format!("{} <> {}", field, v.render()),
            Condition::GreaterThan(v) => format!("{} > {}", field, v.render()),
            Condition::LessThan(v) => format!("{} < {}", field, v.render()),
            Condition::GreaterThanOrEqualTo(v) => format!("{} >= {}", field, v.render()),
            Condition::LessThanOrEqualTo(v) => format!("{} <= {}", field, v.render()),
            Condition::IsNull => format!("{} IS NULL", field),
            Condition::IsNotNull => format!("{} IS NOT NULL", field),
            Condition::In(values) => format!("{} IN ({})", field, list(values)),
            Condition::NotIn(values) => format!("{} NOT IN ({})", field, list(values)),
            Condition::Like(p) => format!("{} LIKE {}", field, FieldValue::from(p.as_str()).render()),
            Condition::Unlike(p) => {
                format!("{} NOT LIKE {}", field, FieldValue::from(p.as_str()).render())
            }
        }
    }

    /// Evaluate against the field's value, `None` when the field is absent.
    fn eval(&self, field: Option<&serde_json::Value>) -> bool {
        let present = field.filter(|v| !v.is_null());
        match self {
            Condition::IsNull => present.is_none(),
            Condition::IsNotNull => present.is_some(),
            other => present.map_or(false, |v| other.eval_present(v)),
        }
    }

    fn eval_present(&self, v: &serde_json::Value) -> bool {
        match self {
            Condition::EqualTo(f) => f.compare(v) == Some(Ordering::Equal),
            Condition::NotEqualTo(f) => f.compare(v) != Some(Ordering::Equal),
            Condition::GreaterThan(f) => f.compare(v) == Some(Ordering::Greater),
            Condition::LessThan(f) => f.compare(v) == Some(Ordering::Less),
            Condition::GreaterThanOrEqualTo(f) => {
                matches!(f.compare(v), Some(Ordering::Greater | Ordering::Equal))
            }
            Condition::LessThanOrEqualTo(f) => {
                matches!(f.compare(v), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::In(values) => values
                .iter()
                .any(|f| f.compare(v) == Some(Ordering::Equal)),
            Condition::NotIn(values) => values
                .iter()
                .all(|f| f.compare(v) != Some(Ordering::Equal)),
            Condition::Like(p) => v.as_str().map_or(false, |s| like_match(p, s)),
            Condition::Unlike(p) => v.as_str().map_or(false, |s| !like_match(p, s)),
            Condition::IsNull => false,
            Condition::IsNotNull => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Predicate { field: String, condition: Condition },
    And,
    Or,
    BeginGroup,
    EndGroup,
}

/// Query builder
///
/// # Example
///
/// ```
/// use distkv_engine::Query;
///
/// let query = Query::new()
///     .prefix_key("user_")
///     .greater_than("$.age", 18)
///     .or()
///     .equal_to("$.role", "admin");
/// assert!(query.compile().is_ok());
/// assert!(!query.get_sql_like().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    prefix: Option<String>,
    device_id: Option<String>,
    tokens: Vec<Token>,
    order: Vec<(String, bool)>,
    limit: Option<(usize, usize)>,
    suggest_index: Option<String>,
}

impl Query {
    /// Create an empty query, matching every entry
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything built so far
    pub fn reset(self) -> Self {
        Self::default()
    }

    fn predicate(mut self, field: &str, condition: Condition) -> Self {
        self.tokens.push(Token::Predicate {
            field: field.to_string(),
            condition,
        });
        self
    }

    /// Field equals value
    pub fn equal_to(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::EqualTo(value.into()))
    }

    /// Field is present and differs from value
    pub fn not_equal_to(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::NotEqualTo(value.into()))
    }

    /// Field is greater than value
    pub fn greater_than(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::GreaterThan(value.into()))
    }

    /// Field is less than value
    pub fn less_than(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::LessThan(value.into()))
    }

    /// Field is greater than or equal to value
    pub fn greater_than_or_equal_to(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::GreaterThanOrEqualTo(value.into()))
    }

    /// Field is less than or equal to value
    pub fn less_than_or_equal_to(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.predicate(field, Condition::LessThanOrEqualTo(value.into()))
    }

    /// Field is absent or null
    pub fn is_null(self, field: &str) -> Self {
        self.predicate(field, Condition::IsNull)
    }

    /// Field is present and not null
    pub fn is_not_null(self, field: &str) -> Self {
        self.predicate(field, Condition::IsNotNull)
    }

    /// Field is one of the numbers
    pub fn in_number(self, field: &str, values: Vec<f64>) -> Self {
        let values = values.into_iter().map(FieldValue::Number).collect();
        self.predicate(field, Condition::In(values))
    }

    /// Field is one of the strings
    pub fn in_string(self, field: &str, values: Vec<String>) -> Self {
        let values = values.into_iter().map(FieldValue::String).collect();
        self.predicate(field, Condition::In(values))
    }

    /// Field is present and none of the numbers
    pub fn not_in_number(self, field: &str, values: Vec<f64>) -> Self {
        let values = values.into_iter().map(FieldValue::Number).collect();
        self.predicate(field, Condition::NotIn(values))
    }

    /// Field is present and none of the strings
    pub fn not_in_string(self, field: &str, values: Vec<String>) -> Self {
        let values = values.into_iter().map(FieldValue::String).collect();
        self.predicate(field, Condition::NotIn(values))
    }

    /// String field matches a `%`/`_` pattern
    pub fn like(self, field: &str, pattern: &str) -> Self {
        self.predicate(field, Condition::Like(pattern.to_string()))
    }

    /// String field does not match a `%`/`_` pattern
    pub fn unlike(self, field: &str, pattern: &str) -> Self {
        self.predicate(field, Condition::Unlike(pattern.to_string()))
    }

    /// AND combinator
    pub fn and(mut self) -> Self {
        self.tokens.push(Token::And);
        self
    }

    /// OR combinator
    pub fn or(mut self) -> Self {
        self.tokens.push(Token::Or);
        self
    }

    /// Open a parenthesized group
    pub fn begin_group(mut self) -> Self {
        self.tokens.push(Token::BeginGroup);
        self
    }

    /// Close a parenthesized group
    pub fn end_group(mut self) -> Self {
        self.tokens.push(Token::EndGroup);
        self
    }

    /// Sort ascending by a field
    pub fn order_by_asc(mut self, field: &str) -> Self {
        self.order.push((field.to_string(), false));
        self
    }

    /// Sort descending by a field
    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order.push((field.to_string(), true));
        self
    }

    /// Return at most `total` results after skipping `offset`
    pub fn limit(mut self, total: usize, offset: usize) -> Self {
        self.limit = Some((total, offset));
        self
    }

    /// Restrict to keys starting with `prefix`
    pub fn prefix_key(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Record an index hint. Evaluation ignores it.
    pub fn set_suggest_index(mut self, index: &str) -> Self {
        self.suggest_index = Some(index.to_string());
        self
    }

    /// Restrict to one device's entries (device-collaboration stores)
    pub fn device_id(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// The device scope, if any
    pub fn get_device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Diagnostic rendering of the query; `""` for an empty query.
    pub fn get_sql_like(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(device) = &self.device_id {
            parts.push(format!("DEVICE_ID {}", FieldValue::from(device.as_str()).render()));
        }
        if let Some(prefix) = &self.prefix {
            parts.push(format!("PREFIX_KEY {}", FieldValue::from(prefix.as_str()).render()));
        }
        for token in &self.tokens {
            parts.push(match token {
                Token::Predicate { field, condition } => condition.render(field),
                Token::And => "AND".to_string(),
                Token::Or => "OR".to_string(),
                Token::BeginGroup => "(".to_string(),
                Token::EndGroup => ")".to_string(),
            });
        }
        for (field, desc) in &self.order {
            parts.push(format!(
                "ORDER BY {} {}",
                field,
                if *desc { "DESC" } else { "ASC" }
            ));
        }
        if let Some((total, offset)) = self.limit {
            parts.push(format!("LIMIT {} OFFSET {}", total, offset));
        }
        if let Some(index) = &self.suggest_index {
            parts.push(format!("SUGGEST INDEX {}", index));
        }
        parts.join(" ")
    }

    /// Validate the predicate chain and produce an evaluator
    pub fn compile(&self) -> Result<CompiledQuery> {
        let sql_len = self.get_sql_like().len();
        if sql_len > MAX_QUERY_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "query is {} bytes, limit is {}",
                sql_len, MAX_QUERY_LENGTH
            )));
        }
        if let Some(device) = &self.device_id {
            if device.is_empty() {
                return Err(Error::invalid_argument("query device id must not be empty"));
            }
        }
        let filter = if self.tokens.is_empty() {
            None
        } else {
            let mut parser = Parser {
                tokens: &self.tokens,
                pos: 0,
            };
            let expr = parser.parse_or()?;
            if parser.pos < self.tokens.len() {
                return Err(Error::invalid_argument("unbalanced endGroup in query"));
            }
            Some(expr)
        };
        let order = self
            .order
            .iter()
            .map(|(field, desc)| Ok((parse_path(field)?, *desc)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledQuery {
            prefix: self.prefix.clone().unwrap_or_default(),
            device_id: self.device_id.clone(),
            filter,
            order,
            limit: self.limit,
        })
    }
}

fn parse_path(field: &str) -> Result<Vec<String>> {
    let trimmed = field.strip_prefix("$.").unwrap_or(field);
    if trimmed.is_empty() || trimmed.split('.').any(str::is_empty) {
        return Err(Error::InvalidArgument(format!(
            "invalid field name '{}'",
            field
        )));
    }
    Ok(trimmed.split('.').map(str::to_string).collect())
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Predicate {
        path: Vec<String>,
        condition: Condition,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    fn eval(&self, doc: &serde_json::Value) -> bool {
        match self {
            Expr::Predicate { path, condition } => condition.eval(lookup(doc, path)),
            Expr::And(parts) => parts.iter().all(|e| e.eval(doc)),
            Expr::Or(parts) => parts.iter().any(|e| e.eval(doc)),
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut terms = vec![self.parse_and()?];
        while let Some(Token::Or) = self.peek() {
            self.pos += 1;
            terms.push(self.parse_and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut factors = vec![self.parse_factor()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.pos += 1;
                    factors.push(self.parse_factor()?);
                }
                Some(Token::Predicate { .. }) | Some(Token::BeginGroup) => {
                    factors.push(self.parse_factor()?);
                }
                _ => break,
            }
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            Expr::And(factors)
        })
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let token = self
            .peek()
            .ok_or_else(|| Error::invalid_argument("query ends with a dangling combinator"))?;
        self.pos += 1;
        match token {
            Token::Predicate { field, condition } => Ok(Expr::Predicate {
                path: parse_path(field)?,
                condition: condition.clone(),
            }),
            Token::BeginGroup => {
                let inner = self.parse_or()?;
                match self.peek() {
                    Some(Token::EndGroup) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(Error::invalid_argument("unbalanced beginGroup in query")),
                }
            }
            Token::And | Token::Or => Err(Error::invalid_argument(
                "combinator without a left-hand predicate",
            )),
            Token::EndGroup => Err(Error::invalid_argument("empty or unbalanced group in query")),
        }
    }
}

fn lookup<'v>(doc: &'v serde_json::Value, path: &[String]) -> Option<&'v serde_json::Value> {
    path.iter().try_fold(doc, |node, segment| node.get(segment))
}

fn order_rank(v: Option<&serde_json::Value>) -> u8 {
    match v {
        None | Some(serde_json::Value::Null) => 0,
        Some(serde_json::Value::Bool(_)) => 1,
        Some(serde_json::Value::Number(_)) => 2,
        Some(serde_json::Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn order_cmp(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    let rank = order_rank(a).cmp(&order_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(serde_json::Value::Bool(x)), Some(serde_json::Value::Bool(y))) => x.cmp(y),
        (Some(serde_json::Value::Number(x)), Some(serde_json::Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(serde_json::Value::String(x)), Some(serde_json::Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn parse_document(value: &Value) -> Option<serde_json::Value> {
    let text = value.as_str()?;
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .filter(serde_json::Value::is_object)
}

/// A validated query
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    prefix: String,
    device_id: Option<String>,
    filter: Option<Expr>,
    order: Vec<(Vec<String>, bool)>,
    limit: Option<(usize, usize)>,
}

impl CompiledQuery {
    /// Key prefix; empty matches every key
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Device scope
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// True if the entry satisfies the prefix and the predicates
    pub fn matches(&self, entry: &Entry) -> bool {
        if !entry.key.starts_with(&self.prefix) {
            return false;
        }
        match &self.filter {
            None => true,
            Some(expr) => parse_document(&entry.value).map_or(false, |doc| expr.eval(&doc)),
        }
    }

    /// Filter, order and limit candidate entries given in key order
    pub fn apply(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let mut matched: Vec<Entry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        if !self.order.is_empty() {
            let mut keyed: Vec<(Option<serde_json::Value>, Entry)> = matched
                .into_iter()
                .map(|e| (parse_document(&e.value), e))
                .collect();
            keyed.sort_by(|(da, _), (db, _)| {
                for (path, desc) in &self.order {
                    let fa = da.as_ref().and_then(|d| lookup(d, path));
                    let fb = db.as_ref().and_then(|d| lookup(d, path));
                    let ord = order_cmp(fa, fb);
                    let ord = if *desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            matched = keyed.into_iter().map(|(_, e)| e).collect();
        }
        if let Some((total, offset)) = self.limit {
            matched = matched.into_iter().skip(offset).take(total).collect();
        }
        matched
    }
}

/// SQL `LIKE` matching: `%` matches any run of characters, `_` exactly one.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;
    while ti < t.len() {
        if pi < p.len() && p[pi] != '%' && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
