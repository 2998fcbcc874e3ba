use std::collections::{BTreeSet, HashMap};

use immich_core::{AssetRecord, AssetType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
    Other,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "photo" | "image" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "other" | "audio" => Some(Self::Other),
            _ => None,
        }
    }
}

impl From<AssetType> for MediaType {
    fn from(value: AssetType) -> Self {
        match value {
            AssetType::Image => Self::Photo,
            AssetType::Video => Self::Video,
            AssetType::Audio | AssetType::Other => Self::Other,
        }
    }
}

/// A single comparable metadata value.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Number(a), Scalar::Number(b)) => a == b,
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Scalar {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(Scalar::Bool(*v)),
            Value::Number(v) => v.as_f64().map(Scalar::Number),
            Value::String(v) => Some(Scalar::Text(v.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Per-run, read-only view of one catalog asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: String,
    pub media_type: MediaType,
    pub is_favorite: bool,
    pub people: BTreeSet<String>,
    metadata: HashMap<String, Scalar>,
}

impl Asset {
    pub fn new(id: impl Into<String>, media_type: MediaType, is_favorite: bool) -> Self {
        Self {
            id: id.into(),
            media_type,
            is_favorite,
            people: BTreeSet::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_people<I, S>(mut self, people: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.people = people.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&Scalar> {
        self.metadata.get(key)
    }
}

impl From<&AssetRecord> for Asset {
    fn from(record: &AssetRecord) -> Self {
        let people = record
            .people
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|person| person.id.clone())
            .collect();
        let mut metadata = HashMap::new();
        flatten_into(&mut metadata, None, &record.extra);
        Self {
            id: record.id.clone(),
            media_type: record.asset_type.into(),
            is_favorite: record.is_favorite,
            people,
            metadata,
        }
    }
}

fn flatten_into(out: &mut HashMap<String, Scalar>, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(out, Some(&path), nested),
            other => {
                if let Some(scalar) = Scalar::from_json(other) {
                    out.insert(path, scalar);
                }
            }
        }
    }
}
