//! Insertion-ordered integer parameter maps.
//!
//! Analyzers expose their tunables as a [`CustomParameters`] map. Display order
//! follows insertion order, so the map keeps entries in a vector rather than a
//! hash table. Parameter sets are small (a handful of entries), which keeps the
//! linear lookups cheap.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered mapping from parameter name to integer value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomParameters {
    entries: Vec<(String, i32)>,
}

impl CustomParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a parameter.
    ///
    /// Overwriting keeps the original position. Returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: i32) -> Option<i32> {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: i32) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    /// Parameter names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, i32)> for CustomParameters {
    fn from_iter<I: IntoIterator<Item = (S, i32)>>(iter: I) -> Self {
        let mut params = CustomParameters::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl fmt::Display for CustomParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

impl Serialize for CustomParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct CustomParametersVisitor;

impl<'de> Visitor<'de> for CustomParametersVisitor {
    type Value = CustomParameters;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map of parameter names to integers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut params = CustomParameters::new();
        while let Some((name, value)) = access.next_entry::<String, i32>()? {
            params.insert(name, value);
        }
        Ok(params)
    }
}

impl<'de> Deserialize<'de> for CustomParameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CustomParametersVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_preserved() {
        let params = CustomParameters::new()
            .with("threshold", 120)
            .with("box_size", 2)
            .with("alpha", 7);

        let names: Vec<&str> = params.names().collect();
        assert_eq!(names, vec!["threshold", "box_size", "alpha"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut params = CustomParameters::new().with("a", 1).with("b", 2);
        assert_eq!(params.insert("a", 10), Some(1));

        let entries: Vec<(&str, i32)> = params.iter().collect();
        assert_eq!(entries, vec![("a", 10), ("b", 2)]);
    }

    #[test]
    fn test_missing_key() {
        let params = CustomParameters::new().with("a", 1);
        assert_eq!(params.get("b"), None);
        assert!(!params.contains("b"));
    }

    #[test]
    fn test_json_keeps_order() {
        let params = CustomParameters::new().with("zeta", 1).with("alpha", 2);
        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":2}"#);

        let back: CustomParameters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_display() {
        let params: CustomParameters = [("threshold", 10), ("box_size", 3)].into_iter().collect();
        assert_eq!(params.to_string(), "{threshold: 10, box_size: 3}");
    }
}
