use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

use super::SqlArgSource;

/// A source backed by the fields of any `Serialize` struct (or map).
///
/// Field names follow the struct's serde representation, so `#[serde(rename)]` applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeanSource {
    fields: BTreeMap<String, Value>,
}

impl BeanSource {
    pub fn new<T: Serialize + ?Sized>(bean: &T) -> TemplateResult<Self> {
        match Value::from_serialize(bean)? {
            Value::Map(fields) => Ok(Self { fields }),
            other => Err(TemplateError::conversion(format!(
                "bean must serialize to an object, got {}",
                other.kind()
            ))),
        }
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl SqlArgSource for BeanSource {
    fn has_value(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    fn get_value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn put_value(&mut self, name: &str, value: Value) -> bool {
        self.fields.insert(name.to_string(), value);
        true
    }

    fn names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}
