use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use std::fmt::Display;

use crate::models::Movie;

/// Fields recognized in catalog queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PrimaryTitle,
    StartYear,
    AverageRating,
    Genres,
    AllPeople,
    StreamingServices,
    RuntimeMinutes,
    IsAdult,
    Tropes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    TextList,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::PrimaryTitle,
        Field::StartYear,
        Field::AverageRating,
        Field::Genres,
        Field::AllPeople,
        Field::StreamingServices,
        Field::RuntimeMinutes,
        Field::IsAdult,
        Field::Tropes,
    ];

    /// Field name in catalog documents
    pub fn document_name(&self) -> &'static str {
        match self {
            Field::PrimaryTitle => "primaryTitle",
            Field::StartYear => "startYear",
            Field::AverageRating => "averageRating",
            Field::Genres => "genres",
            Field::AllPeople => "AllPeople",
            Field::StreamingServices => "StreamingServices",
            Field::RuntimeMinutes => "runtimeMinutes",
            Field::IsAdult => "isAdult",
            Field::Tropes => "Tropes",
        }
    }

    /// Column name in the relational catalog
    pub fn column(&self) -> &'static str {
        match self {
            Field::PrimaryTitle => "primary_title",
            Field::StartYear => "start_year",
            Field::AverageRating => "average_rating",
            Field::Genres => "genres",
            Field::AllPeople => "all_people",
            Field::StreamingServices => "streaming_services",
            Field::RuntimeMinutes => "runtime_minutes",
            Field::IsAdult => "is_adult",
            Field::Tropes => "tropes",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::PrimaryTitle => FieldKind::Text,
            Field::StartYear | Field::AverageRating | Field::RuntimeMinutes | Field::IsAdult => {
                FieldKind::Number
            }
            Field::Genres | Field::AllPeople | Field::StreamingServices | Field::Tropes => {
                FieldKind::TextList
            }
        }
    }

    /// Looks up a field by its document name
    pub fn from_document_name(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.document_name() == name)
    }

    fn value_of<'a>(&self, movie: &'a Movie) -> FieldValue<'a> {
        match self {
            Field::PrimaryTitle => FieldValue::Text(&movie.primary_title),
            Field::StartYear => FieldValue::Number(movie.start_year as f64),
            Field::AverageRating => FieldValue::Number(movie.average_rating),
            Field::RuntimeMinutes => FieldValue::Number(movie.runtime_minutes as f64),
            Field::IsAdult => FieldValue::Number(movie.is_adult as f64),
            Field::Genres => FieldValue::List(&movie.genres),
            Field::AllPeople => FieldValue::List(&movie.all_people),
            Field::StreamingServices => FieldValue::List(&movie.streaming_services),
            Field::Tropes => FieldValue::List(&movie.tropes),
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.document_name())
    }
}

enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    List(&'a [String]),
}

/// A literal compared against a field
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(f64),
}

impl Scalar {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            Scalar::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Number(n) => number_json(*n),
        }
    }
}

/// Inclusive and exclusive numeric bounds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
}

impl Range {
    pub fn at_least(value: f64) -> Self {
        Self {
            gte: Some(value),
            ..Default::default()
        }
    }

    pub fn at_most(value: f64) -> Self {
        Self {
            lte: Some(value),
            ..Default::default()
        }
    }

    fn contains(&self, value: f64) -> bool {
        self.gt.map_or(true, |b| value > b)
            && self.gte.map_or(true, |b| value >= b)
            && self.lt.map_or(true, |b| value < b)
            && self.lte.map_or(true, |b| value <= b)
    }

    fn is_empty(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }
}

/// A condition on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Scalar equality, or membership for list fields
    Eq(Scalar),
    /// Any of the values (intersection for list fields)
    In(Vec<Scalar>),
    /// None of the values
    Nin(Vec<Scalar>),
    /// Every value (list fields)
    All(Vec<Scalar>),
    Range(Range),
    Regex(Pattern),
}

/// A `$regex` operand, compiled once at validation
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, FilterError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source_err| FilterError::InvalidRegex {
                pattern: source.to_string(),
                source: source_err,
            })?;

        Ok(Self {
            source: source.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

/// A validated catalog filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Conjunction; an empty conjunction matches everything
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Field(Field, Predicate),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::match_all()
    }
}

/// Errors raised when an LLM-provided filter document is malformed
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    #[error("malformed value for `{field}`: {reason}")]
    Malformed { field: String, reason: String },

    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("`{0}` requires a non-empty list of clauses")]
    EmptyClause(String),
}

impl Filter {
    pub fn match_all() -> Self {
        Filter::And(Vec::new())
    }

    pub fn field(field: Field, predicate: Predicate) -> Self {
        Filter::Field(field, predicate)
    }

    /// Combines `other` conjunctively, extending a top-level conjunction in place
    pub fn and(self, other: Filter) -> Filter {
        match self {
            Filter::And(mut clauses) => {
                clauses.push(other);
                Filter::And(clauses)
            }
            single => Filter::And(vec![single, other]),
        }
    }

    /// Returns true when any clause constrains `field`
    pub fn constrains(&self, field: Field) -> bool {
        match self {
            Filter::And(clauses) | Filter::Or(clauses) => {
                clauses.iter().any(|clause| clause.constrains(field))
            }
            Filter::Field(f, _) => *f == field,
        }
    }

    /// Returns a copy with every constraint on `fields` removed
    ///
    /// A removed constraint is treated as always true, so a disjunction with a
    /// removed branch disappears entirely. The result is never narrower than
    /// the original.
    pub fn without_fields(&self, fields: &[Field]) -> Filter {
        self.strip(fields).unwrap_or_else(Filter::match_all)
    }

    fn strip(&self, fields: &[Field]) -> Option<Filter> {
        match self {
            Filter::Field(field, _) if fields.contains(field) => None,
            Filter::Field(..) => Some(self.clone()),
            Filter::And(clauses) => {
                let kept: Vec<Filter> = clauses.iter().filter_map(|c| c.strip(fields)).collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(Filter::And(kept))
                }
            }
            Filter::Or(clauses) => {
                let mut kept = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    kept.push(clause.strip(fields)?);
                }
                Some(Filter::Or(kept))
            }
        }
    }

    /// Evaluates the filter against a movie
    pub fn matches(&self, movie: &Movie) -> bool {
        match self {
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(movie)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(movie)),
            Filter::Field(field, predicate) => predicate_matches(predicate, field.value_of(movie)),
        }
    }

    /// Renders the filter in catalog document syntax
    pub fn to_document(&self) -> Value {
        match self {
            Filter::Field(field, predicate) => {
                let mut doc = Map::new();
                doc.insert(field.document_name().to_string(), predicate_json(predicate));
                Value::Object(doc)
            }
            Filter::Or(clauses) => {
                json!({ "$or": clauses.iter().map(Filter::to_document).collect::<Vec<_>>() })
            }
            Filter::And(clauses) => {
                let docs: Vec<Value> = clauses.iter().map(Filter::to_document).collect();
                merge_conjunction(&docs)
                    .map(Value::Object)
                    .unwrap_or_else(|| json!({ "$and": docs }))
            }
        }
    }

    /// Validates a filter document into a typed filter
    ///
    /// Documents use the catalog's query syntax
    /// (`{"genres": {"$in": [...]}, "$and": [...]}`). Unknown fields and
    /// operators are dropped; malformed values on known fields are rejected.
    pub fn from_document(doc: &Map<String, Value>) -> Result<Filter, FilterError> {
        let mut clauses = Vec::new();

        for (key, value) in doc {
            match key.as_str() {
                "$and" | "$or" => {
                    let items = value.as_array().filter(|items| !items.is_empty());
                    let Some(items) = items else {
                        return Err(FilterError::EmptyClause(key.clone()));
                    };

                    let mut nested = Vec::with_capacity(items.len());
                    for item in items {
                        let map = item.as_object().ok_or_else(|| FilterError::Malformed {
                            field: key.clone(),
                            reason: "clauses must be objects".to_string(),
                        })?;
                        nested.push(Filter::from_document(map)?);
                    }

                    clauses.push(if key == "$and" {
                        Filter::And(nested)
                    } else {
                        Filter::Or(nested)
                    });
                }
                _ => match Field::from_document_name(key) {
                    Some(field) => clauses.extend(
                        parse_predicates(field, value)?
                            .into_iter()
                            .map(|p| Filter::Field(field, p)),
                    ),
                    None => {
                        tracing::warn!(field = %key, "Dropping unrecognized filter field");
                    }
                },
            }
        }

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Filter::And(clauses),
        })
    }
}

fn parse_predicates(field: Field, value: &Value) -> Result<Vec<Predicate>, FilterError> {
    match value {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            parse_operators(field, ops)
        }
        // A bare list reads as "any of these"
        Value::Array(items) => Ok(vec![Predicate::In(parse_scalars(field, items)?)]),
        other => Ok(vec![Predicate::Eq(parse_scalar(field, other)?)]),
    }
}

fn parse_operators(field: Field, ops: &Map<String, Value>) -> Result<Vec<Predicate>, FilterError> {
    let mut predicates = Vec::new();
    let mut range = Range::default();

    for (op, operand) in ops {
        match op.as_str() {
            "$eq" => predicates.push(Predicate::Eq(parse_scalar(field, operand)?)),
            "$in" => predicates.push(Predicate::In(parse_list(field, op, operand)?)),
            "$nin" => predicates.push(Predicate::Nin(parse_list(field, op, operand)?)),
            "$all" => predicates.push(Predicate::All(parse_list(field, op, operand)?)),
            "$gt" => range.gt = Some(parse_bound(field, op, operand)?),
            "$gte" => range.gte = Some(parse_bound(field, op, operand)?),
            "$lt" => range.lt = Some(parse_bound(field, op, operand)?),
            "$lte" => range.lte = Some(parse_bound(field, op, operand)?),
            "$regex" => {
                if field != Field::PrimaryTitle {
                    tracing::warn!(field = %field, "Dropping regex on field other than primaryTitle");
                    continue;
                }
                let pattern = operand.as_str().ok_or_else(|| malformed(field, "$regex must be a string"))?;
                let case_insensitive = ops
                    .get("$options")
                    .and_then(Value::as_str)
                    .is_some_and(|options| options.contains('i'));

                predicates.push(Predicate::Regex(Pattern::new(pattern, case_insensitive)?));
            }
            "$options" => {}
            unknown => {
                tracing::warn!(field = %field, operator = %unknown, "Dropping unsupported filter operator");
            }
        }
    }

    if !range.is_empty() {
        predicates.push(Predicate::Range(range));
    }

    Ok(predicates)
}

fn parse_list(field: Field, op: &str, operand: &Value) -> Result<Vec<Scalar>, FilterError> {
    let items = operand
        .as_array()
        .ok_or_else(|| malformed(field, &format!("{} requires a list", op)))?;
    parse_scalars(field, items)
}

fn parse_scalars(field: Field, items: &[Value]) -> Result<Vec<Scalar>, FilterError> {
    items.iter().map(|item| parse_scalar(field, item)).collect()
}

fn parse_scalar(field: Field, value: &Value) -> Result<Scalar, FilterError> {
    match (field.kind(), value) {
        (FieldKind::Text | FieldKind::TextList, Value::String(s)) => Ok(Scalar::Text(s.clone())),
        (FieldKind::Number, Value::Number(n)) => n
            .as_f64()
            .map(Scalar::Number)
            .ok_or_else(|| malformed(field, "number out of range")),
        // isAdult is stored as 0/1
        (FieldKind::Number, Value::Bool(b)) if field == Field::IsAdult => {
            Ok(Scalar::Number(if *b { 1.0 } else { 0.0 }))
        }
        (kind, other) => Err(malformed(
            field,
            &format!("expected {:?} value, got {}", kind, other),
        )),
    }
}

fn parse_bound(field: Field, op: &str, operand: &Value) -> Result<f64, FilterError> {
    if field.kind() != FieldKind::Number {
        return Err(malformed(field, &format!("{} requires a numeric field", op)));
    }
    operand
        .as_f64()
        .ok_or_else(|| malformed(field, &format!("{} requires a number", op)))
}

fn malformed(field: Field, reason: &str) -> FilterError {
    FilterError::Malformed {
        field: field.document_name().to_string(),
        reason: reason.to_string(),
    }
}

fn predicate_matches(predicate: &Predicate, value: FieldValue<'_>) -> bool {
    match predicate {
        Predicate::Eq(scalar) => scalar_matches(scalar, &value),
        Predicate::In(scalars) => scalars.iter().any(|s| scalar_matches(s, &value)),
        Predicate::Nin(scalars) => !scalars.iter().any(|s| scalar_matches(s, &value)),
        Predicate::All(scalars) => {
            !scalars.is_empty() && scalars.iter().all(|s| scalar_matches(s, &value))
        }
        Predicate::Range(range) => match value {
            FieldValue::Number(n) => range.contains(n),
            _ => false,
        },
        Predicate::Regex(pattern) => match value {
            FieldValue::Text(text) => pattern.is_match(text),
            FieldValue::List(items) => items.iter().any(|item| pattern.is_match(item)),
            FieldValue::Number(_) => false,
        },
    }
}

fn scalar_matches(scalar: &Scalar, value: &FieldValue<'_>) -> bool {
    match (scalar, value) {
        (Scalar::Text(expected), FieldValue::Text(actual)) => expected == actual,
        (Scalar::Text(expected), FieldValue::List(items)) => items.iter().any(|i| i == expected),
        (Scalar::Number(expected), FieldValue::Number(actual)) => expected == actual,
        _ => false,
    }
}

fn predicate_json(predicate: &Predicate) -> Value {
    let list = |scalars: &[Scalar]| Value::Array(scalars.iter().map(Scalar::to_json).collect());

    match predicate {
        Predicate::Eq(scalar) => scalar.to_json(),
        Predicate::In(scalars) => json!({ "$in": list(scalars) }),
        Predicate::Nin(scalars) => json!({ "$nin": list(scalars) }),
        Predicate::All(scalars) => json!({ "$all": list(scalars) }),
        Predicate::Range(range) => {
            let mut ops = Map::new();
            let bounds = [
                ("$gt", range.gt),
                ("$gte", range.gte),
                ("$lt", range.lt),
                ("$lte", range.lte),
            ];
            for (op, bound) in bounds {
                if let Some(b) = bound {
                    ops.insert(op.to_string(), number_json(b));
                }
            }
            Value::Object(ops)
        }
        Predicate::Regex(pattern) => {
            if pattern.is_case_insensitive() {
                json!({ "$regex": pattern.as_str(), "$options": "i" })
            } else {
                json!({ "$regex": pattern.as_str() })
            }
        }
    }
}

/// Merges conjunct documents into one object when no keys collide
fn merge_conjunction(docs: &[Value]) -> Option<Map<String, Value>> {
    let mut merged = Map::new();
    for doc in docs {
        for (key, value) in doc.as_object()? {
            if key.starts_with('$') || merged.contains_key(key) {
                return None;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    Some(merged)
}

/// Whole numbers render as integers so `startYear` reads naturally
fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}
