use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use chrono::NaiveDate;
use crate::core::errors::NewsvecError;
use super::schema::{Location, MetadataRecord};

/// Exact-match record attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Source,
    Hostname,
    Tld,
    Tag,
    Category,
}

/// Free-text record attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Text,
    Title,
}

pub type Predicate = Arc<dyn Fn(&MetadataRecord) -> bool + Send + Sync>;

/// Filter operators for metadata queries.
#[derive(Clone)]
pub enum FilterOp {
    Equals(Field, String),
    /// Case-insensitive substring match.
    Contains(TextField, String),
    /// Mentions a location, compared by normalized name.
    Location(String),
    NutsPrefix(String),
    /// Publication date within the inclusive bounds.
    Published(Option<NaiveDate>, Option<NaiveDate>),
    Custom(Predicate),
}

impl FilterOp {
    /// Apply filter to metadata.
    pub fn matches(&self, record: &MetadataRecord) -> bool {
        match self {
            FilterOp::Equals(field, value) => match field {
                Field::Source => record.source == *value,
                Field::Hostname => record.hostname.as_deref() == Some(value.as_str()),
                Field::Tld => record.tld() == Some(value.as_str()),
                Field::Tag => record.tags.iter().any(|t| t == value),
                Field::Category => record.categories.iter().any(|c| c == value),
            },
            FilterOp::Contains(field, needle) => {
                let haystack = match field {
                    TextField::Text => Some(record.text.as_str()),
                    TextField::Title => record.title.as_deref(),
                };
                haystack.map_or(false, |h| h.to_lowercase().contains(&needle.to_lowercase()))
            }
            FilterOp::Location(name) => {
                let name = Location::normalize_name(name);
                record.locations.iter().any(|l| l.name == name)
            }
            FilterOp::NutsPrefix(prefix) => record
                .locations
                .iter()
                .filter_map(|l| l.nuts.as_deref())
                .any(|nuts| nuts.starts_with(prefix.as_str())),
            FilterOp::Published(from, to) => record.published.map_or(false, |date| {
                from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
            }),
            FilterOp::Custom(predicate) => predicate(record),
        }
    }
}

impl fmt::Debug for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Equals(field, value) => write!(f, "Equals({:?}, {:?})", field, value),
            FilterOp::Contains(field, value) => write!(f, "Contains({:?}, {:?})", field, value),
            FilterOp::Location(name) => write!(f, "Location({:?})", name),
            FilterOp::NutsPrefix(prefix) => write!(f, "NutsPrefix({:?})", prefix),
            FilterOp::Published(from, to) => write!(f, "Published({:?}, {:?})", from, to),
            FilterOp::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn parse_date(s: &str) -> Result<Option<NaiveDate>, NewsvecError> {
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| NewsvecError::InvalidQuery(format!("invalid date '{}': {}", s, e)))
}

/// Parses one condition: `source=`, `hostname=`, `tld=`, `tag=`,
/// `category=`, `location=`, `nuts^=`, `text~`, `title~`, and
/// `published=FROM..TO` with either bound optional.
impl FromStr for FilterOp {
    type Err = NewsvecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The earliest operator wins, so values may contain `~`, `=` or `^=`.
        let (key, op, value) = ["^=", "~", "="]
            .iter()
            .filter_map(|op| s.find(op).map(|at| (at, *op)))
            .min_by_key(|(at, _)| *at)
            .map(|(at, op)| (&s[..at], op, &s[at + op.len()..]))
            .ok_or_else(|| NewsvecError::InvalidQuery(format!("malformed filter '{}'", s)))?;

        if op == "~" {
            let field = match key.trim() {
                "text" => TextField::Text,
                "title" => TextField::Title,
                other => {
                    return Err(NewsvecError::InvalidQuery(format!(
                        "unknown text field '{}'",
                        other
                    )))
                }
            };
            return Ok(FilterOp::Contains(field, value.to_string()));
        }
        if op == "^=" {
            return match key.trim() {
                "nuts" => Ok(FilterOp::NutsPrefix(value.trim().to_string())),
                other => Err(NewsvecError::InvalidQuery(format!(
                    "prefix match unsupported on '{}'",
                    other
                ))),
            };
        }
        let value = value.trim().to_string();
        let field = match key.trim() {
            "source" => Field::Source,
            "hostname" => Field::Hostname,
            "tld" => Field::Tld,
            "tag" => Field::Tag,
            "category" => Field::Category,
            "location" => return Ok(FilterOp::Location(value)),
            "published" => {
                let (from, to) = value.split_once("..").unwrap_or((value.as_str(), value.as_str()));
                return Ok(FilterOp::Published(parse_date(from)?, parse_date(to)?));
            }
            other => {
                return Err(NewsvecError::InvalidQuery(format!("unknown filter field '{}'", other)))
            }
        };
        Ok(FilterOp::Equals(field, value))
    }
}

/// Filter builder.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    conditions: Vec<FilterOp>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        FilterBuilder {
            conditions: vec![],
        }
    }

    pub fn equals(mut self, field: Field, value: impl Into<String>) -> Self {
        self.conditions.push(FilterOp::Equals(field, value.into()));
        self
    }

    pub fn contains(mut self, field: TextField, substring: impl Into<String>) -> Self {
        self.conditions.push(FilterOp::Contains(field, substring.into()));
        self
    }

    pub fn location(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(FilterOp::Location(name.into()));
        self
    }

    pub fn nuts_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.conditions.push(FilterOp::NutsPrefix(prefix.into()));
        self
    }

    pub fn published(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.conditions.push(FilterOp::Published(from, to));
        self
    }

    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MetadataRecord) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(FilterOp::Custom(Arc::new(predicate)));
        self
    }

    pub fn condition(mut self, op: FilterOp) -> Self {
        self.conditions.push(op);
        self
    }

    pub fn build(self) -> Filter {
        Filter {
            conditions: self.conditions,
        }
    }
}

/// Compiled filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub conditions: Vec<FilterOp>,
}

impl Filter {
    /// Apply filter to metadata (AND all conditions).
    pub fn matches(&self, record: &MetadataRecord) -> bool {
        self.conditions.iter().all(|cond| cond.matches(record))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
