//! Live, path-addressed configuration.
//!
//! The whole configuration is one JSON document. Nothing is cached: every
//! lookup walks the document, so `set`/`reload` take effect on the very next
//! query. Per-arena lookups fall back to the `arenas.default` template.
//!
//! Missing or malformed values never fail a lookup; the typed helpers return
//! the caller's default instead.

use std::fs;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// Arena key that only serves as a template for the others.
pub const TEMPLATE_ARENA: &str = "default";

pub struct Settings {
    doc: RwLock<Value>,
}

impl Settings {
    pub fn new(doc: Value) -> Self {
        Self {
            doc: RwLock::new(doc),
        }
    }

    /// Built-in defaults: global settings plus the `default` arena template.
    pub fn defaults() -> Self {
        Self::new(default_document())
    }

    /// Load a JSON configuration file. Keys missing from the file are taken
    /// from the built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let doc: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        let mut merged = default_document();
        merge(&mut merged, doc);
        Ok(Self::new(merged))
    }

    /// Replace the whole document (e.g. after the file changed on disk).
    pub fn replace(&self, doc: Value) {
        let mut merged = default_document();
        merge(&mut merged, doc);
        *self.doc.write().expect("settings poisoned") = merged;
    }

    /// The value at a dotted path such as `arenas.arena1.useReady`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let doc = self.doc.read().expect("settings poisoned");
        lookup(&doc, path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn bool(&self, path: &str, default: bool) -> bool {
        self.get(path).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn u64(&self, path: &str, default: u64) -> u64 {
        self.get(path).and_then(|v| v.as_u64()).unwrap_or(default)
    }

    pub fn string(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Deserialize the value at `path`; malformed values count as missing.
    pub fn typed<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get(path)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring malformed setting '{}': {}", path, e);
                None
            }
        }
    }

    /// Set the value at `path`, creating intermediate objects as needed.
    pub fn set(&self, path: &str, value: Value) {
        let mut doc = self.doc.write().expect("settings poisoned");
        let mut node = &mut *doc;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Some(map) = node.as_object_mut() else {
                return;
            };
            if parts.peek().is_none() {
                map.insert(part.to_string(), value);
                return;
            }
            node = map.entry(part).or_insert_with(|| Value::Object(Map::new()));
        }
    }

    /// Remove and return the value at `path`.
    pub fn remove(&self, path: &str) -> Option<Value> {
        let mut doc = self.doc.write().expect("settings poisoned");
        let (parent, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (lookup_mut(&mut doc, parent)?, key),
            None => (&mut *doc, path),
        };
        parent.as_object_mut()?.remove(key)
    }

    /// Ids of all configured arenas, without the template.
    pub fn arena_ids(&self) -> Vec<String> {
        let doc = self.doc.read().expect("settings poisoned");
        match lookup(&doc, "arenas").and_then(Value::as_object) {
            Some(arenas) => arenas
                .keys()
                .filter(|k| k.as_str() != TEMPLATE_ARENA)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Value of `key` for arena `id`, falling back to the template arena.
    pub fn arena_value(&self, id: &str, key: &str) -> Option<Value> {
        self.get(&format!("arenas.{}.{}", id, key))
            .or_else(|| self.get(&format!("arenas.{}.{}", TEMPLATE_ARENA, key)))
    }

    pub fn arena_bool(&self, id: &str, key: &str, default: bool) -> bool {
        self.arena_value(id, key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn arena_u64(&self, id: &str, key: &str, default: u64) -> u64 {
        self.arena_value(id, key)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }

    pub fn arena_typed<T: DeserializeOwned>(&self, id: &str, key: &str) -> Option<T> {
        let value = self.arena_value(id, key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring malformed setting 'arenas.{}.{}': {}", id, key, e);
                None
            }
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, part| node.get(part))
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.').try_fold(doc, |node, part| node.get_mut(part))
}

/// Deep-merge `overlay` into `base`; objects merge key by key, anything else replaces.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn default_document() -> Value {
    json!({
        "settings": {
            "updateNotificationOnLogin": true,
            "updateTimeoutSecs": 10,
            "ticksPerSecond": 20,
            "snapshotDir": "snapshots"
        },
        "arenas": {
            "default": {
                "enabled": true,
                "maxPlayers": 0,
                "minPlayers": 2,
                "useReady": false,
                "readyBlock": 35,
                "readyAutoStart": true,
                "countdown": 10,
                "teams": [],
                "allowedBlocks": [],
                "instantDig": false,
                "dissolveTicks": 0
            }
        }
    })
}
