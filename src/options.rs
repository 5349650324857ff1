//! Request options shared by every backend call.
//!
//! An `ObjectFS` carries one immutable `Options` value for its lifetime and
//! merges per-call overrides over it with [`Options::merged`]:
//! maps merge recursively, lists concatenate, and any other override
//! replaces the instance value.

use std::collections::BTreeMap;

use crate::model::fs::Visibility;

pub mod keys {
    /// Map of request headers.
    pub const HEADERS: &str = "headers";
    /// Canned ACL header, read from the `headers` map.
    pub const OBJECT_ACL: &str = "x-amz-acl";
    /// Page size for listing calls.
    pub const MAX_KEYS: &str = "max-keys";
    pub const CONTENT_TYPE: &str = "content-type";
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<OptionValue>),
    Map(Options),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Int(value.into())
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<OptionValue>> for OptionValue {
    fn from(value: Vec<OptionValue>) -> Self {
        OptionValue::List(value)
    }
}

impl From<Options> for OptionValue {
    fn from(value: Options) -> Self {
        OptionValue::Map(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options(BTreeMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(OptionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_map(&self, key: &str) -> Option<&Options> {
        match self.0.get(key) {
            Some(OptionValue::Map(m)) => Some(m),
            _ => None,
        }
    }

    /// Looks up `name` in the `headers` map.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.get_map(keys::HEADERS)
            .and_then(|headers| headers.get_str(name))
    }

    /// Returns `self` with `overrides` merged on top.
    pub fn merged(&self, overrides: &Options) -> Options {
        let mut out = self.clone();
        for (key, value) in &overrides.0 {
            let merged = match (out.0.remove(key), value) {
                (Some(OptionValue::Map(base)), OptionValue::Map(over)) => {
                    OptionValue::Map(base.merged(over))
                }
                (Some(OptionValue::List(mut base)), OptionValue::List(over)) => {
                    base.extend(over.iter().cloned());
                    OptionValue::List(base)
                }
                (_, value) => value.clone(),
            };
            out.0.insert(key.clone(), merged);
        }

        out
    }
}

/// Per-call settings for operations that create objects.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub visibility: Option<Visibility>,
    /// Merged over the instance options for this call only.
    pub options: Options,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_scalar_override_wins() {
        let base = Options::new().with(keys::MAX_KEYS, 100).with("region", "eu");
        let over = Options::new().with(keys::MAX_KEYS, 5);

        let result = base.merged(&over);

        assert_eq!(result.get_int(keys::MAX_KEYS), Some(5));
        assert_eq!(result.get_str("region"), Some("eu"));
    }

    #[test]
    fn test_merged_lists_concatenate() {
        let base = Options::new().with("tags", vec![OptionValue::from("a")]);
        let over = Options::new().with("tags", vec![OptionValue::from("b")]);

        let result = base.merged(&over);

        assert_eq!(
            result.get("tags"),
            Some(&OptionValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_merged_maps_recurse() {
        let base = Options::new().with(
            keys::HEADERS,
            Options::new()
                .with("Cache-Control", "no-cache")
                .with(keys::OBJECT_ACL, "private"),
        );
        let over = Options::new().with(
            keys::HEADERS,
            Options::new().with(keys::OBJECT_ACL, "public-read"),
        );

        let result = base.merged(&over);

        assert_eq!(result.header("Cache-Control"), Some("no-cache"));
        assert_eq!(result.header(keys::OBJECT_ACL), Some("public-read"));
    }

    #[test]
    fn test_merged_leaves_base_untouched() {
        let base = Options::new().with("region", "eu");
        let _ = base.merged(&Options::new().with("region", "us"));

        assert_eq!(base.get_str("region"), Some("eu"));
    }

    #[test]
    fn test_merged_type_mismatch_takes_override() {
        let base = Options::new().with(keys::HEADERS, Options::new().with("a", "b"));
        let over = Options::new().with(keys::HEADERS, "none");

        let result = base.merged(&over);

        assert_eq!(result.get_str(keys::HEADERS), Some("none"));
    }
}
