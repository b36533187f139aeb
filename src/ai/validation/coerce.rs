//! Schema Key Coercion
//!
//! Maps a model-produced object onto a fixed key set. Models rename and
//! misspell requested fields ("Summary", "public-contracts", "ris risks"),
//! so keys are matched exactly, then by canonical form, then by canonical
//! substring.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

/// Lowercase, ASCII alphanumeric only
pub fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Coerces objects onto one required key set. Build once per schema.
#[derive(Debug, Clone)]
pub struct KeyCoercer {
    required: Vec<String>,
    /// Canonical form → required key
    canonical: HashMap<String, String>,
}

impl KeyCoercer {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let required: Vec<String> = required.into_iter().map(Into::into).collect();
        let mut canonical = HashMap::new();
        for key in &required {
            let ck = canonical_key(key);
            if !ck.is_empty() {
                canonical.entry(ck).or_insert_with(|| key.clone());
            }
        }
        Self {
            required,
            canonical,
        }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Coerce `obj` onto the required keys.
    ///
    /// Unknown keys are dropped. Missing keys are filled from `defaults`,
    /// else with an empty string. The result always has exactly the
    /// required key set.
    pub fn coerce(&self, obj: &Map<String, Value>, defaults: &Map<String, Value>) -> Map<String, Value> {
        let mut filled: HashMap<&str, &Value> = HashMap::new();
        let mut consumed: HashSet<&str> = HashSet::new();

        // Exact
        for key in &self.required {
            if let Some(v) = obj.get(key.as_str()) {
                filled.insert(key.as_str(), v);
                consumed.insert(key.as_str());
            }
        }

        // Canonical
        for (k, v) in obj {
            if consumed.contains(k.as_str()) {
                continue;
            }
            if let Some(target) = self.canonical.get(&canonical_key(k))
                && !filled.contains_key(target.as_str())
            {
                filled.insert(target.as_str(), v);
                consumed.insert(k.as_str());
            }
        }

        // Substring: longest required key contained in the incoming key
        for (k, v) in obj {
            if consumed.contains(k.as_str()) {
                continue;
            }
            let ck = canonical_key(k);
            if ck.is_empty() {
                continue;
            }
            let best = self
                .canonical
                .iter()
                .filter(|(rc, rk)| ck.contains(rc.as_str()) && !filled.contains_key(rk.as_str()))
                .max_by(|(a, ak), (b, bk)| a.len().cmp(&b.len()).then_with(|| bk.cmp(ak)));
            if let Some((_, target)) = best {
                filled.insert(target.as_str(), v);
                consumed.insert(k.as_str());
            }
        }

        self.required
            .iter()
            .map(|key| {
                let value = filled
                    .get(key.as_str())
                    .map(|v| (*v).clone())
                    .or_else(|| defaults.get(key).cloned())
                    .unwrap_or_else(|| Value::String(String::new()));
                (key.clone(), value)
            })
            .collect()
    }

    /// Coerce a value that should be an object. Non-objects coerce as empty.
    pub fn coerce_value(&self, value: &Value, defaults: &Map<String, Value>) -> Map<String, Value> {
        match value {
            Value::Object(obj) => self.coerce(obj, defaults),
            _ => self.coerce(&Map::new(), defaults),
        }
    }
}
