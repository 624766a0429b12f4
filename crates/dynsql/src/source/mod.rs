//! Parameter sources presented to the binder.
//!
//! A source is a named key/value view. Plain maps, serialized structs ([`BeanSource`]) and the
//! layered [`MergedSource`] all implement [`SqlArgSource`].

mod bean;
mod merged;
mod path;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};

use crate::value::Value;

pub use bean::BeanSource;
pub use merged::MergedSource;
pub use path::{PathStep, PropertyPath, resolve, root_name};

/// Named parameter lookup used while binding a template.
pub trait SqlArgSource {
    /// Whether `name` is present (a present key may hold [`Value::Null`]).
    fn has_value(&self, name: &str) -> bool;

    fn get_value(&self, name: &str) -> Option<&Value>;

    /// Store a value. Returns `false` when the source refuses the write.
    fn put_value(&mut self, name: &str, value: Value) -> bool;

    fn names(&self) -> Vec<String>;
}

impl SqlArgSource for BTreeMap<String, Value> {
    fn has_value(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get_value(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn put_value(&mut self, name: &str, value: Value) -> bool {
        self.insert(name.to_string(), value);
        true
    }

    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }
}

impl SqlArgSource for HashMap<String, Value> {
    fn has_value(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get_value(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }

    fn put_value(&mut self, name: &str, value: Value) -> bool {
        self.insert(name.to_string(), value);
        true
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A source with no parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl SqlArgSource for EmptySource {
    fn has_value(&self, _name: &str) -> bool {
        false
    }

    fn get_value(&self, _name: &str) -> Option<&Value> {
        None
    }

    fn put_value(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    fn names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Build a `BTreeMap<String, Value>` parameter source.
///
/// ```ignore
/// let source = dynsql::params! { "id" => 5, "names" => vec!["a", "b"] };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::collections::BTreeMap::<::std::string::String, $crate::Value>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::<::std::string::String, $crate::Value>::new();
        $(map.insert(::std::string::String::from($key), $crate::Value::from($value));)+
        map
    }};
}

/// Positional values as `arg0, arg1, ...`.
pub fn positional<I, V>(values: I) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (format!("arg{i}"), v.into()))
        .collect()
}
