//! Read-only environment lookup
//!
//! Interpolation and bare `KEY` entries in `environment` both consult the
//! invoking environment. They do so through [`EnvLookup`] so callers can hand
//! in the real process environment or a fixed table.

use std::collections::{BTreeMap, HashMap};

/// Read-only key/value lookup against an environment table
pub trait EnvLookup {
    /// Value of `key`, or `None` if it is not set
    fn lookup(&self, key: &str) -> Option<String>;

    /// Value of `key`, or an empty string if it is not set
    fn get_or_empty(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }
}

/// The environment of the running process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvLookup for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: EnvLookup + ?Sized> EnvLookup for &T {
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_lookup() {
        let mut env = HashMap::new();
        env.insert("SET".to_string(), "value".to_string());
        env.insert("EMPTY".to_string(), String::new());

        assert_eq!(env.lookup("SET").as_deref(), Some("value"));
        assert_eq!(env.lookup("EMPTY").as_deref(), Some(""));
        assert_eq!(env.lookup("MISSING"), None);
        assert_eq!(env.get_or_empty("MISSING"), "");
    }

    #[test]
    fn test_lookup_through_reference() {
        let mut env = BTreeMap::new();
        env.insert("TAG".to_string(), "1.0".to_string());
        let by_ref: &dyn EnvLookup = &env;

        assert_eq!(by_ref.get_or_empty("TAG"), "1.0");
    }
}
