// 🗂️ Object Registry - resolve a string UID to an object bound to a subject
//
// Resolution is a filter chain. Each resolver sees the resolution so far and
// either returns a new object (when it recognizes the UID) or passes the input
// through. `None` is the "unresolved" marker. New object kinds plug in by
// registering a resolver; the registry itself knows no kinds.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::counter::LoginCounter;
use crate::directory::SubjectProvider;
use crate::object::ControlObject;
use crate::store::OptionStore;
use crate::subject::Subject;

/// Resolution carried along the chain. `None` means nobody claimed the UID yet.
pub type Resolution = Option<Box<dyn ControlObject>>;

/// `(current, requested_uid, scope_id, subject) -> resolution`
pub type Resolver =
    Box<dyn Fn(Resolution, &str, Option<&str>, &Subject) -> Resolution + Send + Sync>;

#[derive(Default)]
pub struct ObjectRegistry {
    resolvers: Vec<Resolver>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the login counter already registered
    pub fn with_login_counter(
        store: Arc<dyn OptionStore>,
        directory: Arc<dyn SubjectProvider>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(login_counter_resolver(store, directory));
        registry
    }

    /// Append a resolver to the end of the chain
    pub fn register(&mut self, resolver: Resolver) {
        self.resolvers.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Run the chain for `uid`. The returned object is not initialized.
    pub fn resolve(&self, uid: &str, scope_id: Option<&str>, subject: &Subject) -> Resolution {
        let mut resolution: Resolution = None;
        for resolver in &self.resolvers {
            resolution = resolver(resolution, uid, scope_id, subject);
        }

        if resolution.is_none() {
            tracing::debug!(uid, subject = %subject, "No resolver claimed object");
        }

        resolution
    }

    /// Resolve and initialize. `Ok(None)` when the object is not available.
    pub fn get_object(
        &self,
        uid: &str,
        scope_id: Option<&str>,
        subject: &Subject,
    ) -> Result<Resolution> {
        let Some(mut object) = self.resolve(uid, scope_id, subject) else {
            return Ok(None);
        };

        object
            .init(scope_id)
            .with_context(|| format!("Failed to initialize {} for {}", uid, subject))?;

        Ok(Some(object))
    }
}

/// Box a closure as a [`Resolver`]
pub fn resolver<F>(f: F) -> Resolver
where
    F: Fn(Resolution, &str, Option<&str>, &Subject) -> Resolution + Send + Sync + 'static,
{
    Box::new(f)
}

/// Resolver claiming [`LoginCounter::UID`].
///
/// Only claims while the resolution is still unresolved, so an earlier
/// registrant for the same UID keeps it.
pub fn login_counter_resolver(
    store: Arc<dyn OptionStore>,
    directory: Arc<dyn SubjectProvider>,
) -> Resolver {
    resolver(move |current, uid, _scope_id, subject| {
        if current.is_none() && uid == LoginCounter::UID {
            Some(Box::new(LoginCounter::new(
                subject.clone(),
                Arc::clone(&store),
                Arc::clone(&directory),
            )) as Box<dyn ControlObject>)
        } else {
            current
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use crate::store::{MemoryOptionStore, OptionKey};
    use serde_json::{json, Value};
    use std::any::Any;

    /// Second object kind used to exercise the chain
    struct Banner {
        subject: Subject,
        text: String,
    }

    impl ControlObject for Banner {
        fn uid(&self) -> &'static str {
            "banner"
        }
        fn subject(&self) -> &Subject {
            &self.subject
        }
        fn init(&mut self, _scope_id: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn save(&mut self) -> Result<()> {
            Ok(())
        }
        fn cache_object(&self) -> bool {
            true
        }
        fn option(&self) -> Value {
            json!(self.text)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn banner_resolver(text: &'static str, claims: &'static str) -> Resolver {
        resolver(move |current, uid, _scope, subject| {
            if current.is_none() && uid == claims {
                Some(Box::new(Banner {
                    subject: subject.clone(),
                    text: text.to_string(),
                }) as Box<dyn ControlObject>)
            } else {
                current
            }
        })
    }

    fn registry(store: &MemoryOptionStore) -> ObjectRegistry {
        ObjectRegistry::with_login_counter(Arc::new(store.clone()), Arc::new(MemoryDirectory::new()))
    }

    #[test]
    fn test_resolve_login_counter() {
        let store = MemoryOptionStore::new();
        let registry = registry(&store);

        let object = registry
            .resolve(LoginCounter::UID, None, &Subject::user(1))
            .expect("login counter should resolve");

        assert_eq!(object.uid(), LoginCounter::UID);
        assert_eq!(object.subject(), &Subject::user(1));
        assert!(object.downcast_ref::<LoginCounter>().is_some());
    }

    #[test]
    fn test_unrelated_uid_passes_through() {
        let store = MemoryOptionStore::new();
        let registry = registry(&store);

        assert!(registry.resolve("menu", None, &Subject::user(1)).is_none());
        assert!(registry
            .get_object("menu", None, &Subject::user(1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_chain_composes_kinds() {
        let store = MemoryOptionStore::new();
        let mut registry = registry(&store);
        registry.register(banner_resolver("hello", "banner"));
        assert_eq!(registry.len(), 2);

        let banner = registry.resolve("banner", None, &Subject::role("editor")).unwrap();
        assert_eq!(banner.option(), json!("hello"));

        let counter = registry.resolve(LoginCounter::UID, None, &Subject::user(3)).unwrap();
        assert_eq!(counter.uid(), LoginCounter::UID);
    }

    #[test]
    fn test_first_registrant_wins() {
        let mut registry = ObjectRegistry::new();
        registry.register(banner_resolver("first", "banner"));
        registry.register(banner_resolver("second", "banner"));

        let banner = registry.resolve("banner", None, &Subject::user(1)).unwrap();
        assert_eq!(banner.option(), json!("first"));
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = ObjectRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.resolve(LoginCounter::UID, None, &Subject::user(1)).is_none());
    }

    #[test]
    fn test_get_object_initializes() {
        let store = MemoryOptionStore::new();
        store
            .write(&OptionKey::for_user(LoginCounter::UID, 1), json!(3))
            .unwrap();
        let registry = registry(&store);

        let object = registry
            .get_object(LoginCounter::UID, None, &Subject::user(1))
            .unwrap()
            .unwrap();

        assert_eq!(object.option(), json!(3));
        assert!(!object.cache_object());
    }
}
