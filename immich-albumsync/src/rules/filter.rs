use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::asset::{Asset, MediaType, Scalar};

const KEY_PEOPLE: &str = "people";
const KEY_FAVORITE: &str = "isFavorite";
const KEY_MEDIA_TYPE: &str = "mediaType";
const KEY_MEDIA_TYPE_ALIAS: &str = "type";

#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("filter key is empty")]
    EmptyKey,
    #[error("unknown operator {0:?} (expected OR, AND, NOT or ONLY)")]
    UnknownOperator(String),
    #[error("both `operator` and `match_all` are set")]
    ConflictingOperator,
    #[error("`people` expects a list of person ids/names or null, got {0}")]
    InvalidPeople(Value),
    #[error("`isFavorite` expects true or false, got {0}")]
    InvalidFavorite(Value),
    #[error("`mediaType` expects photo, video or other, got {0}")]
    InvalidMediaType(Value),
    #[error("metadata field {key:?} expects a scalar or null, got {value}")]
    InvalidMetadata { key: String, value: Value },
}

/// Set semantics for the multi-valued `people` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeopleOperator {
    #[default]
    Or,
    And,
    Not,
    Only,
}

impl FromStr for PeopleOperator {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OR" => Ok(Self::Or),
            "AND" => Ok(Self::And),
            "NOT" => Ok(Self::Not),
            "ONLY" => Ok(Self::Only),
            _ => Err(FilterError::UnknownOperator(value.to_string())),
        }
    }
}

impl fmt::Display for PeopleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Not => "NOT",
            Self::Only => "ONLY",
        };
        f.write_str(name)
    }
}

impl PeopleOperator {
    /// OR over an empty set matches nothing; AND and NOT over an empty set match
    /// everything; ONLY over an empty set matches assets without people.
    pub fn matches(self, wanted: &BTreeSet<String>, present: &BTreeSet<String>) -> bool {
        match self {
            Self::Or => !wanted.is_disjoint(present),
            Self::And => wanted.is_subset(present),
            Self::Not => wanted.is_disjoint(present),
            Self::Only => wanted == present,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeopleMatch {
    /// `value: null`: the asset has no detected people, whatever the operator.
    Nobody,
    Set {
        operator: PeopleOperator,
        ids: BTreeSet<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    People(PeopleMatch),
    Favorite(bool),
    MediaType(MediaType),
    /// `value: None` matches assets where the field is absent.
    Metadata { key: String, value: Option<Scalar> },
}

/// Filter as written in the rules file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFilter {
    pub key: String,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default, alias = "val")]
    pub value: Value,
    #[serde(default)]
    pub match_all: Option<bool>,
}

impl Filter {
    pub fn parse(rule: &str, raw: RawFilter) -> Result<Self, FilterError> {
        let key = raw.key.trim();
        if key.is_empty() {
            return Err(FilterError::EmptyKey);
        }
        let operator = match (raw.operator.as_deref(), raw.match_all) {
            (Some(_), Some(_)) => return Err(FilterError::ConflictingOperator),
            (Some(op), None) => Some(op.parse::<PeopleOperator>()?),
            (None, Some(true)) => Some(PeopleOperator::And),
            (None, Some(false)) => Some(PeopleOperator::Or),
            (None, None) => None,
        };

        if key == KEY_PEOPLE {
            return parse_people(rule, operator.unwrap_or_default(), raw.value);
        }

        if let Some(op) = operator.filter(|op| *op != PeopleOperator::Or) {
            tracing::warn!(rule, key, operator = %op, "operator ignored on single-valued key");
        }

        match key {
            KEY_FAVORITE => match raw.value {
                Value::Bool(v) => Ok(Filter::Favorite(v)),
                other => Err(FilterError::InvalidFavorite(other)),
            },
            KEY_MEDIA_TYPE | KEY_MEDIA_TYPE_ALIAS => {
                let media_type = raw.value.as_str().and_then(MediaType::parse);
                media_type
                    .map(Filter::MediaType)
                    .ok_or(FilterError::InvalidMediaType(raw.value))
            }
            _ => {
                let value = match &raw.value {
                    Value::Null => None,
                    other => Some(Scalar::from_json(other).ok_or_else(|| {
                        FilterError::InvalidMetadata {
                            key: key.to_string(),
                            value: raw.value.clone(),
                        }
                    })?),
                };
                Ok(Filter::Metadata {
                    key: key.to_string(),
                    value,
                })
            }
        }
    }

    pub fn evaluate(&self, asset: &Asset) -> bool {
        match self {
            Filter::People(PeopleMatch::Nobody) => asset.people.is_empty(),
            Filter::People(PeopleMatch::Set { operator, ids }) => {
                operator.matches(ids, &asset.people)
            }
            Filter::Favorite(expected) => asset.is_favorite == *expected,
            Filter::MediaType(expected) => asset.media_type == *expected,
            Filter::Metadata { key, value } => asset.metadata(key) == value.as_ref(),
        }
    }

    pub fn people_ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Filter::People(PeopleMatch::Set { ids, .. }) => Some(ids),
            _ => None,
        }
    }

    pub(crate) fn people_ids_mut(&mut self) -> Option<&mut BTreeSet<String>> {
        match self {
            Filter::People(PeopleMatch::Set { ids, .. }) => Some(ids),
            _ => None,
        }
    }
}

fn parse_people(rule: &str, operator: PeopleOperator, value: Value) -> Result<Filter, FilterError> {
    let items = match value {
        Value::Null => return Ok(Filter::People(PeopleMatch::Nobody)),
        Value::Array(items) => items,
        other => return Err(FilterError::InvalidPeople(other)),
    };
    let mut ids = BTreeSet::new();
    for item in &items {
        match item {
            Value::String(id) => {
                ids.insert(id.clone());
            }
            _ => return Err(FilterError::InvalidPeople(Value::Array(items.clone()))),
        }
    }
    if ids.is_empty() {
        tracing::warn!(rule, operator = %operator, "people filter has an empty set");
    }
    Ok(Filter::People(PeopleMatch::Set { operator, ids }))
}
