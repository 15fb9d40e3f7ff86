//! The per-request view of a session.

use crate::error::SessionResult;
use crate::options::CookieOptions;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Key flash messages are stored under when no key is given.
pub const FLASHES_KEY: &str = "_flash";

/// A named session: its id, values and cookie options.
///
/// The id is empty until the first save assigns one. Values are arbitrary
/// JSON and are persisted as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub values: HashMap<String, Value>,
    pub options: CookieOptions,
    pub is_new: bool,
    name: String,
}

impl SessionRecord {
    /// Create an unsaved session with no id.
    pub fn new(name: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            id: String::new(),
            values: HashMap::new(),
            options,
            is_new: true,
            name: name.into(),
        }
    }

    /// Cookie name this session is issued under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a value, deserialized into `T`.
    ///
    /// Returns `None` if the key is missing or holds a different type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Append a flash message under `key`, or [`FLASHES_KEY`] by default.
    pub fn add_flash<T: Serialize>(&mut self, value: T, key: Option<&str>) -> SessionResult<()> {
        let value = serde_json::to_value(value)?;
        let key = key.unwrap_or(FLASHES_KEY);
        match self.values.get_mut(key) {
            Some(Value::Array(flashes)) => flashes.push(value),
            _ => {
                self.values
                    .insert(key.to_string(), Value::Array(vec![value]));
            }
        }
        Ok(())
    }

    /// Remove and return the flash messages under `key`.
    pub fn flashes(&mut self, key: Option<&str>) -> Vec<Value> {
        match self.values.remove(key.unwrap_or(FLASHES_KEY)) {
            Some(Value::Array(flashes)) => flashes,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn test_new_record() {
        let record = SessionRecord::new("sid", CookieOptions::default());
        assert!(record.is_new);
        assert!(record.id.is_empty());
        assert!(record.is_empty());
        assert_eq!(record.name(), "sid");
    }

    #[test]
    fn test_typed_values() {
        let mut record = SessionRecord::new("sid", CookieOptions::default());
        let user = User {
            id: 1,
            name: "Alice".to_string(),
        };
        record.set("user", &user).unwrap();
        record.set("count", 3).unwrap();

        assert_eq!(record.get::<User>("user"), Some(user));
        assert_eq!(record.get::<i64>("count"), Some(3));
        assert_eq!(record.get::<String>("count"), None);
        assert_eq!(record.get::<i64>("missing"), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut record = SessionRecord::new("sid", CookieOptions::default());
        record.set("a", 1).unwrap();
        record.set("b", 2).unwrap();

        assert_eq!(record.remove("a"), Some(json!(1)));
        assert!(!record.contains("a"));
        record.clear();
        assert!(record.is_empty());
    }

    #[test]
    fn test_flashes_default_key() {
        let mut record = SessionRecord::new("sid", CookieOptions::default());
        record.add_flash("saved", None).unwrap();
        record.add_flash("again", None).unwrap();

        assert_eq!(record.flashes(None), vec![json!("saved"), json!("again")]);
        assert!(record.flashes(None).is_empty());
        assert!(!record.contains(FLASHES_KEY));
    }

    #[test]
    fn test_flashes_custom_key() {
        let mut record = SessionRecord::new("sid", CookieOptions::default());
        record.add_flash(json!({"level": "error"}), Some("errors")).unwrap();

        assert!(record.flashes(None).is_empty());
        assert_eq!(record.flashes(Some("errors")), vec![json!({"level": "error"})]);
    }
}
