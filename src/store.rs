// 🗄️ Option Store - external key/value persistence
//
// Values are keyed by (uid, subject kind, subject id, optional scope id).
// The store knows nothing about counters: it holds JSON values and the
// counter decides what a value means.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::CounterError;
use crate::subject::{Subject, SubjectKind};

// ============================================================================
// OPTION KEY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionKey {
    /// Object UID, doubles as the option name (e.g. "login_counter")
    pub uid: String,

    pub subject_kind: SubjectKind,

    /// User id or role name, as produced by [`Subject::id`]
    pub subject_id: String,

    /// Optional sub-id narrowing the option further
    pub scope_id: Option<String>,
}

impl OptionKey {
    pub fn new(uid: &str, subject: &Subject, scope_id: Option<&str>) -> Self {
        OptionKey {
            uid: uid.to_string(),
            subject_kind: subject.kind(),
            subject_id: subject.id(),
            scope_id: scope_id.map(str::to_string),
        }
    }

    /// Key of a single user's raw option, bypassing any object
    pub fn for_user(uid: &str, user_id: u64) -> Self {
        OptionKey::new(uid, &Subject::user(user_id), None)
    }
}

// ============================================================================
// OPTION STORE
// ============================================================================

/// Persistence collaborator. Synchronous, best effort, last write wins.
pub trait OptionStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`
    fn read(&self, key: &OptionKey) -> Result<Option<Value>>;

    /// Unconditionally overwrite whatever is stored under `key`
    fn write(&self, key: &OptionKey, value: Value) -> Result<()>;
}

impl<S: OptionStore + ?Sized> OptionStore for Arc<S> {
    fn read(&self, key: &OptionKey) -> Result<Option<Value>> {
        (**self).read(key)
    }

    fn write(&self, key: &OptionKey, value: Value) -> Result<()> {
        (**self).write(key, value)
    }
}

// ============================================================================
// SCALAR COERCION
// ============================================================================

/// Numbers, strings and booleans are scalar. Null, arrays and objects are not.
pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_) | Value::Bool(_))
}

/// Integer reading of a stored value. Anything unreadable counts as 0.
///
/// Floats truncate, negatives clamp to 0, strings contribute their leading
/// integer digits ("12abc" is 12).
pub fn scalar_to_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                v
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    f.trunc() as u64
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => leading_integer(s),
        Value::Bool(true) => 1,
        _ => 0,
    }
}

fn leading_integer(s: &str) -> u64 {
    let trimmed = s.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned.starts_with('-') {
        return 0;
    }

    let digits: String = unsigned.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().unwrap_or(if digits.is_empty() { 0 } else { u64::MAX })
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Option store held in memory. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryOptionStore {
    options: Arc<RwLock<HashMap<OptionKey, Value>>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.options.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OptionStore for MemoryOptionStore {
    fn read(&self, key: &OptionKey) -> Result<Option<Value>> {
        let options = self
            .options
            .read()
            .map_err(|_| CounterError::LockPoisoned("option store"))?;
        Ok(options.get(key).cloned())
    }

    fn write(&self, key: &OptionKey, value: Value) -> Result<()> {
        let mut options = self
            .options
            .write()
            .map_err(|_| CounterError::LockPoisoned("option store"))?;
        options.insert(key.clone(), value);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_key_from_subject() {
        let key = OptionKey::new("login_counter", &Subject::role("editor"), Some("7"));
        assert_eq!(key.uid, "login_counter");
        assert_eq!(key.subject_kind, SubjectKind::Role);
        assert_eq!(key.subject_id, "editor");
        assert_eq!(key.scope_id.as_deref(), Some("7"));

        assert_eq!(
            OptionKey::for_user("login_counter", 3),
            OptionKey::new("login_counter", &Subject::user(3), None)
        );
    }

    #[test]
    fn test_is_scalar() {
        assert!(is_scalar(&json!(3)));
        assert!(is_scalar(&json!("3")));
        assert!(is_scalar(&json!(false)));
        assert!(!is_scalar(&json!(null)));
        assert!(!is_scalar(&json!([1, 2])));
        assert!(!is_scalar(&json!({"count": 1})));
    }

    #[test]
    fn test_scalar_to_count() {
        assert_eq!(scalar_to_count(&json!(5)), 5);
        assert_eq!(scalar_to_count(&json!(-4)), 0);
        assert_eq!(scalar_to_count(&json!(2.9)), 2);
        assert_eq!(scalar_to_count(&json!("12")), 12);
        assert_eq!(scalar_to_count(&json!(" 8 logins")), 8);
        assert_eq!(scalar_to_count(&json!("abc")), 0);
        assert_eq!(scalar_to_count(&json!("-3")), 0);
        assert_eq!(scalar_to_count(&json!(true)), 1);
        assert_eq!(scalar_to_count(&json!(false)), 0);
        assert_eq!(scalar_to_count(&json!(null)), 0);
        assert_eq!(scalar_to_count(&json!([4])), 0);
    }

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryOptionStore::new();
        let key = OptionKey::for_user("login_counter", 1);

        assert_eq!(store.read(&key).unwrap(), None);
        assert!(store.is_empty());

        store.write(&key, json!(1)).unwrap();
        store.write(&key, json!(9)).unwrap();

        assert_eq!(store.read(&key).unwrap(), Some(json!(9)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryOptionStore::new();
        let clone = store.clone();
        let key = OptionKey::for_user("login_counter", 2);

        clone.write(&key, json!(4)).unwrap();
        assert_eq!(store.read(&key).unwrap(), Some(json!(4)));
    }

    #[test]
    fn test_scope_id_is_part_of_key() {
        let store = MemoryOptionStore::new();
        let subject = Subject::user(5);

        store
            .write(&OptionKey::new("login_counter", &subject, Some("blog-2")), json!(3))
            .unwrap();

        assert_eq!(
            store.read(&OptionKey::new("login_counter", &subject, None)).unwrap(),
            None
        );
    }
}
