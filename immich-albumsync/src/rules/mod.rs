mod asset;
mod filter;
mod people;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use asset::{Asset, MediaType, Scalar};
pub use filter::{Filter, FilterError, PeopleMatch, PeopleOperator, RawFilter};
pub use people::{PeopleDirectory, resolve_people};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rules: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("rule #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("album name {0:?} is used by more than one rule")]
    DuplicateName(String),
    #[error("{0} is not set")]
    MissingSetting(&'static str),
    #[error("rule {rule:?}, filter #{index}: {source}")]
    Filter {
        rule: String,
        index: usize,
        #[source]
        source: FilterError,
    },
}

/// One smart album: an asset belongs to it when every filter matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRule {
    pub name: String,
    pub filters: Vec<Filter>,
}

impl SyncRule {
    pub fn matches(&self, asset: &Asset) -> bool {
        self.filters.iter().all(|filter| filter.evaluate(asset))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(alias = "sync_configs")]
    albums: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    name: String,
    #[serde(default)]
    filters: Vec<RawFilter>,
}

pub fn load_rules(path: &Path) -> Result<Vec<SyncRule>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rules(&text)
}

pub fn parse_rules(text: &str) -> Result<Vec<SyncRule>, ConfigError> {
    let file: RulesFile = serde_json::from_str(text)?;
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(file.albums.len());
    for (index, raw) in file.albums.into_iter().enumerate() {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateName(name));
        }
        let filters = raw
            .filters
            .into_iter()
            .enumerate()
            .map(|(index, filter)| {
                Filter::parse(&name, filter).map_err(|source| ConfigError::Filter {
                    rule: name.clone(),
                    index,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if filters.is_empty() {
            tracing::warn!(rule = %name, "rule has no filters and will match every asset");
        }
        rules.push(SyncRule { name, filters });
    }
    Ok(rules)
}
