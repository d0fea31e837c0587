// 🧭 Feature declaration - who may see the login counter panel
//
// Static data for the host's feature list plus the view the panel shows for
// a selected subject. Rendering is the host's job.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::counter::LoginCounter;
use crate::registry::ObjectRegistry;
use crate::subject::{Subject, SubjectKind};

pub const FEATURE_ID: &str = "login_counter";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub uid: &'static str,
    /// Ordering among the host's features, lower first
    pub position: u32,
    pub title: &'static str,
    /// Subject kinds the panel is shown for. Visitors are never counted.
    pub subjects: Vec<SubjectKind>,
    /// Capability a viewer needs
    pub capability: String,
}

/// What the panel shows for one subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterView {
    pub subject: Subject,
    pub kind: SubjectKind,
    pub count: u64,
    pub cacheable: bool,
}

impl Feature {
    pub fn login_counter(config: &Config) -> Self {
        Feature {
            uid: FEATURE_ID,
            position: 150,
            title: "Login Counter",
            subjects: vec![SubjectKind::Role, SubjectKind::User],
            capability: config.capability_for(FEATURE_ID).to_string(),
        }
    }

    pub fn supports(&self, kind: SubjectKind) -> bool {
        self.subjects.contains(&kind)
    }

    /// Whether `capabilities` include the one this feature requires
    pub fn allows(&self, capabilities: &[&str]) -> bool {
        capabilities.contains(&self.capability.as_str())
    }

    /// Shown for `kind` to a viewer holding `capabilities`
    pub fn is_visible(&self, kind: SubjectKind, capabilities: &[&str]) -> bool {
        self.supports(kind) && self.allows(capabilities)
    }

    /// Current count for `subject`. `Ok(None)` when the counter is not registered.
    pub fn content(&self, subject: &Subject, registry: &ObjectRegistry) -> Result<Option<CounterView>> {
        let Some(object) = registry.get_object(LoginCounter::UID, None, subject)? else {
            return Ok(None);
        };

        let count = match object.downcast_ref::<LoginCounter>() {
            Some(counter) => counter.count(),
            None => crate::store::scalar_to_count(&object.option()),
        };

        Ok(Some(CounterView {
            subject: subject.clone(),
            kind: subject.kind(),
            count,
            cacheable: object.cache_object(),
        }))
    }
}
