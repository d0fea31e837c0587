// 🔢 Login Counter - how many times each user has logged in
//
// A user's counter lives in the option store. A role has no slot of its own:
// its counter is the sum of its current members' raw counters, recomputed on
// every `init`, and it is read-only.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;

use crate::directory::SubjectProvider;
use crate::error::CounterError;
use crate::object::ControlObject;
use crate::store::{is_scalar, scalar_to_count, OptionKey, OptionStore};
use crate::subject::Subject;

pub struct LoginCounter {
    subject: Subject,
    store: Arc<dyn OptionStore>,
    directory: Arc<dyn SubjectProvider>,
    option: u64,
}

impl LoginCounter {
    /// Object UID, also the option name the counter is stored under
    pub const UID: &'static str = "login_counter";

    pub fn new(
        subject: Subject,
        store: Arc<dyn OptionStore>,
        directory: Arc<dyn SubjectProvider>,
    ) -> Self {
        LoginCounter {
            subject,
            store,
            directory,
            option: 0,
        }
    }

    /// Current count
    pub fn count(&self) -> u64 {
        self.option
    }

    /// Set the count from a raw stored value. Non-scalars become 0.
    pub fn set_option(&mut self, option: &Value) {
        self.option = if is_scalar(option) {
            scalar_to_count(option)
        } else {
            0
        };
    }

    /// Add one login and persist it immediately.
    ///
    /// Rejected for roles: a role count is derived, there is nothing to write.
    pub fn increment(&mut self) -> Result<()> {
        if !self.subject.is_user() {
            return Err(CounterError::unsupported("increment", &self.subject).into());
        }

        let Some(next) = self.option.checked_add(1) else {
            return Err(CounterError::CounterOverflow {
                subject: self.subject.to_string(),
            }
            .into());
        };

        self.option = next;
        self.save()
    }

    /// Raw counter of one user, read straight from the store.
    fn raw_count(&self, key: &OptionKey) -> Value {
        match self.store.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    subject_kind = %key.subject_kind,
                    subject_id = %key.subject_id,
                    "Failed to read login counter, treating as absent"
                );
                Value::Null
            }
        }
    }

    fn aggregate(&self) -> Result<u64> {
        let members = self
            .subject
            .members(self.directory.as_ref())
            .with_context(|| format!("Failed to list members of {}", self.subject))?;

        let mut total: u64 = 0;
        let mut count = 0usize;
        for member in members {
            let Some(user_id) = member.user_id() else {
                continue;
            };
            let raw = self.raw_count(&OptionKey::for_user(Self::UID, user_id));
            total = total.saturating_add(scalar_to_count(&raw));
            count += 1;
        }

        tracing::debug!(subject = %self.subject, members = count, total, "Aggregated login counter");
        Ok(total)
    }
}

impl ControlObject for LoginCounter {
    fn uid(&self) -> &'static str {
        Self::UID
    }

    fn subject(&self) -> &Subject {
        &self.subject
    }

    fn init(&mut self, scope_id: Option<&str>) -> Result<()> {
        match &self.subject {
            Subject::User { .. } => {
                let raw = self.raw_count(&OptionKey::new(Self::UID, &self.subject, scope_id));
                self.set_option(&raw);
            }
            Subject::Role { .. } => {
                self.option = self.aggregate()?;
            }
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if !self.subject.is_user() {
            return Err(CounterError::unsupported("save", &self.subject).into());
        }

        let key = OptionKey::new(Self::UID, &self.subject, None);
        if let Err(e) = self.store.write(&key, json!(self.option)) {
            tracing::error!(error = %e, subject = %self.subject, count = self.option, "Failed to save login counter");
            return Err(e.context(format!("Failed to save login counter for {}", self.subject)));
        }

        tracing::debug!(subject = %self.subject, count = self.option, "Saved login counter");
        Ok(())
    }

    /// Never cached: the value moves on every login and a stale copy under-counts.
    fn cache_object(&self) -> bool {
        false
    }

    fn option(&self) -> Value {
        json!(self.option)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
