use crate::utils::resolver::{UnitResolver, normalize};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const UNIT_INDEX_FILE: &str = "unit_faction_index.json";
pub const RULES_FILE: &str = "blob.json";
pub const ALIASES_FILE: &str = "unit_aliases.json";

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct UnitIndex {
    #[serde(default)]
    units: Vec<UnitIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct UnitIndexEntry {
    unit: Option<String>,
}

/// An alias may point at one unit or at several.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AliasTarget {
    One(String),
    Many(Vec<String>),
}

/// A unit object from the rules blob together with the faction it came from.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub faction: String,
    pub data: Value,
}

impl UnitRecord {
    pub fn name(&self) -> &str {
        unit_display_name(&self.data).unwrap_or("(unknown)")
    }
}

/// Unit tables loaded once at start-up and shared read-only afterwards.
#[derive(Debug, Default)]
pub struct ReferenceData {
    pub unit_names: Vec<String>,
    /// faction -> units
    pub armies: BTreeMap<String, Vec<Value>>,
    pub resolver: UnitResolver,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReferenceError> {
    let content = fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReferenceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Missing optional tables become empty; broken ones are reported.
fn read_optional<T: serde::de::DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        log::warn!("Reference file {} not found, using an empty table", path.display());
        return T::default();
    }
    match read_json(path) {
        Ok(value) => value,
        Err(e) => {
            log::error!("{}", e);
            T::default()
        }
    }
}

impl ReferenceData {
    pub fn load(data_dir: &Path) -> Self {
        let index: Option<UnitIndex> = read_optional(&data_dir.join(UNIT_INDEX_FILE));
        let rules: Value = read_optional(&data_dir.join(RULES_FILE));
        let aliases: HashMap<String, AliasTarget> = read_optional(&data_dir.join(ALIASES_FILE));

        let unit_names = index
            .map(|idx| idx.units.into_iter().filter_map(|u| u.unit).collect())
            .unwrap_or_default();
        let aliases = aliases
            .into_iter()
            .map(|(alias, target)| {
                let targets = match target {
                    AliasTarget::One(name) => vec![name],
                    AliasTarget::Many(names) => names,
                };
                (alias, targets)
            })
            .collect();

        let data = Self::from_parts(unit_names, &rules, &aliases);
        if data.resolver.is_empty() {
            log::warn!(
                "No unit names under {}; unit questions will not resolve",
                data_dir.display()
            );
        } else {
            log::info!(
                "Loaded {} unit names across {} factions from {}",
                data.unit_names.len(),
                data.armies.len(),
                data_dir.display()
            );
        }
        data
    }

    pub fn from_parts(
        mut unit_names: Vec<String>,
        rules: &Value,
        aliases: &HashMap<String, Vec<String>>,
    ) -> Self {
        unit_names.sort();
        unit_names.dedup();
        let resolver = UnitResolver::new(unit_names.iter().cloned(), aliases);
        Self {
            unit_names,
            armies: build_armies(rules),
            resolver,
        }
    }

    /// Find a unit object by name across all factions.
    pub fn unit(&self, name: &str) -> Option<UnitRecord> {
        let wanted = normalize(name);
        self.armies.iter().find_map(|(faction, units)| {
            units
                .iter()
                .find(|unit| unit_display_name(unit).is_some_and(|n| normalize(n) == wanted))
                .map(|unit| UnitRecord {
                    faction: faction.clone(),
                    data: unit.clone(),
                })
        })
    }
}

fn unit_display_name(unit: &Value) -> Option<&str> {
    ["name", "unitName", "displayName"]
        .iter()
        .filter_map(|key| unit.get(*key).and_then(Value::as_str))
        .find(|name| !name.is_empty())
}

/// Flatten `armies` into faction -> unit objects. Units stored as a map take
/// their key as the name when they have none.
fn build_armies(rules: &Value) -> BTreeMap<String, Vec<Value>> {
    let mut out = BTreeMap::new();
    let Some(armies) = rules.as_object().and_then(|root| {
        root.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("armies"))
            .and_then(|(_, armies)| armies.as_object())
    }) else {
        return out;
    };

    for (faction, faction_obj) in armies {
        let mut units = Vec::new();
        match faction_obj.get("units") {
            Some(Value::Array(items)) => {
                for item in items {
                    units.push(match item {
                        Value::Object(_) => item.clone(),
                        other => named(&value_text(other)),
                    });
                }
            }
            Some(Value::Object(items)) => {
                for (key, item) in items {
                    units.push(match item {
                        Value::Object(obj) if obj.contains_key("name") => item.clone(),
                        Value::Object(obj) => {
                            let mut obj = obj.clone();
                            obj.insert("name".to_string(), Value::String(key.clone()));
                            Value::Object(obj)
                        }
                        Value::Null => named(key),
                        other => {
                            let text = value_text(other);
                            named(if text.is_empty() { key } else { &text })
                        }
                    });
                }
            }
            _ => {}
        }
        out.insert(faction.clone(), units);
    }
    out
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn named(name: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("name".to_string(), Value::String(name.to_string()));
    Value::Object(obj)
}
