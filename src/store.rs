//! Small persistent key-value store (`store.json`).
//!
//! Holds the last used character name and a short history of names. Values
//! are arbitrary JSON; a missing or unreadable file starts an empty store.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

pub const LAST_CHARACTER_KEY: &str = "last_character";
pub const CHARACTER_HISTORY_KEY: &str = "character_history";
pub const MAX_HISTORY: usize = 10;

#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Store {
    /// An empty store that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: Map::new(),
        }
    }

    /// Open the store at `path`. A corrupt file is logged and replaced with
    /// an empty store on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("No store file at {:?}, starting fresh", path);
            return Self::empty(path);
        }

        let values = match fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str::<Map<String, Value>>(&s).map_err(anyhow::Error::from))
        {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Store at {:?} is unreadable, starting fresh: {}", path, e);
                Map::new()
            }
        };
        Self { path, values }
    }

    /// Typed read. Values of the wrong shape read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Store key '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).context(format!("Failed to serialize store key '{}'", key))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let json = serde_json::to_string_pretty(&self.values).context("Failed to serialize store")?;
        fs::write(&self.path, json).context(format!("Failed to write store file: {:?}", self.path))?;
        tracing::debug!("Store saved to {:?}", self.path);
        Ok(())
    }

    pub fn last_character(&self) -> Option<String> {
        self.get(LAST_CHARACTER_KEY)
    }

    /// Most recent first.
    pub fn character_history(&self) -> Vec<String> {
        self.get(CHARACTER_HISTORY_KEY).unwrap_or_default()
    }

    /// Record `name` as the last used character and move it to the front of
    /// the history, keeping at most [`MAX_HISTORY`] entries.
    pub fn remember_character(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        let mut history = self.character_history();
        history.retain(|n| !n.eq_ignore_ascii_case(name));
        history.insert(0, name.to_string());
        history.truncate(MAX_HISTORY);

        self.set(LAST_CHARACTER_KEY, &name)?;
        self.set(CHARACTER_HISTORY_KEY, &history)
    }
}
