//! Layered parameter source.
//!
//! An unlocked own-map sits in front of appended layers, scanned in registration order. Locked
//! layers hold caller-owned arguments: their keys survive `remove`/`clear` (cleared values become
//! null) and their values are never overwritten through the merged view.

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;

use super::SqlArgSource;

#[derive(Debug, Clone, Default)]
struct Layer {
    values: BTreeMap<String, Value>,
    locked: bool,
}

/// Own-map plus appended locked/unlocked layers.
#[derive(Debug, Clone, Default)]
pub struct MergedSource {
    own: BTreeMap<String, Value>,
    layers: Vec<Layer>,
}

impl MergedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional method-style arguments: a locked layer holding `arg0..argN`, plus `aliases[i]`
    /// for each value that has a declared name.
    pub fn with_args<I, V>(values: I, aliases: &[&str]) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut layer = BTreeMap::new();
        for (i, value) in values.into_iter().enumerate() {
            let value = value.into();
            if let Some(alias) = aliases.get(i).filter(|a| !a.is_empty()) {
                layer.insert((*alias).to_string(), value.clone());
            }
            layer.insert(format!("arg{i}"), value);
        }
        let mut merged = Self::new();
        merged.append(layer, true);
        merged
    }

    /// Append a layer behind the own-map and any earlier layers.
    pub fn append<I, K, V>(&mut self, values: I, locked: bool) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.layers.push(Layer {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            locked,
        });
        self
    }

    pub fn append_locked<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.append(values, true)
    }

    pub fn append_unlocked<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.append(values, false)
    }

    /// First map containing `key`: own-map, then layers in order.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.own
            .get(key)
            .or_else(|| self.layers.iter().find_map(|l| l.values.get(key)))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.own.contains_key(key) || self.layers.iter().any(|l| l.values.contains_key(key))
    }

    /// Store `value` in the map that holds `key`, or the own-map for new keys.
    ///
    /// Returns `false` (leaving the old value) when the key belongs to a locked layer.
    pub fn put(&mut self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if let Some(slot) = self.own.get_mut(key) {
            *slot = value;
            return true;
        }
        if let Some(layer) = self.layers.iter_mut().find(|l| l.values.contains_key(key)) {
            if layer.locked {
                tracing::warn!(
                    target: "dynsql.registry",
                    key,
                    "refusing to overwrite a locked parameter"
                );
                return false;
            }
            layer.values.insert(key.to_string(), value);
            return true;
        }
        self.own.insert(key.to_string(), value);
        true
    }

    /// Remove `key` from the map holding it. Locked layers keep their keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if let Some(v) = self.own.remove(key) {
            return Some(v);
        }
        let layer = self.layers.iter_mut().find(|l| l.values.contains_key(key))?;
        if layer.locked {
            return None;
        }
        layer.values.remove(key)
    }

    /// Empty the own-map and unlocked layers; locked layers keep their keys with null values.
    pub fn clear(&mut self) {
        self.own.clear();
        for layer in &mut self.layers {
            if layer.locked {
                layer.values.values_mut().for_each(|v| *v = Value::Null);
            } else {
                layer.values.clear();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.key_set().len()
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.layers.iter().all(|l| l.values.is_empty())
    }

    fn key_set(&self) -> BTreeSet<&str> {
        self.own
            .keys()
            .chain(self.layers.iter().flat_map(|l| l.values.keys()))
            .map(String::as_str)
            .collect()
    }
}

impl SqlArgSource for MergedSource {
    fn has_value(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get_value(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn put_value(&mut self, name: &str, value: Value) -> bool {
        self.put(name, value)
    }

    fn names(&self) -> Vec<String> {
        self.key_set().into_iter().map(str::to_string).collect()
    }
}
