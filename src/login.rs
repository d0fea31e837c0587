// 🔑 Login Hook - count every successful login
//
// On each login event the hook resolves the logged-in user's counter through
// the registry, initializes it and increments it. It only ever targets the
// user, never a role.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::counter::LoginCounter;
use crate::directory::SubjectProvider;
use crate::registry::ObjectRegistry;
use crate::subject::Subject;

/// A successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEvent {
    pub login_name: String,
    pub user_id: u64,
}

impl LoginEvent {
    pub fn new(login_name: impl Into<String>, user_id: u64) -> Self {
        LoginEvent {
            login_name: login_name.into(),
            user_id,
        }
    }
}

pub type LoginHandler = Box<dyn Fn(&LoginEvent) -> Result<()> + Send + Sync>;

/// Anything that announces successful logins
pub trait LoginEventSource {
    fn subscribe(&mut self, handler: LoginHandler);
}

/// In-process event source. Handlers run synchronously, in subscription order.
#[derive(Default)]
pub struct LoginDispatcher {
    handlers: Vec<LoginHandler>,
}

impl LoginDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver `event` to every handler. Stops at the first failure.
    pub fn fire(&self, event: &LoginEvent) -> Result<()> {
        for handler in &self.handlers {
            handler(event)?;
        }
        Ok(())
    }
}

impl LoginEventSource for LoginDispatcher {
    fn subscribe(&mut self, handler: LoginHandler) {
        self.handlers.push(handler);
    }
}

/// Drives the login counter from login events
pub struct LoginHook {
    registry: Arc<ObjectRegistry>,
    directory: Arc<dyn SubjectProvider>,
}

impl LoginHook {
    pub fn new(registry: Arc<ObjectRegistry>, directory: Arc<dyn SubjectProvider>) -> Self {
        LoginHook {
            registry,
            directory,
        }
    }

    /// Subscribe to `source`. Consumes the hook so it can only be bound once.
    pub fn bind(self, source: &mut dyn LoginEventSource) {
        source.subscribe(Box::new(move |event: &LoginEvent| self.on_login(event)));
    }

    pub fn on_login(&self, event: &LoginEvent) -> Result<()> {
        let subject = self
            .directory
            .user_for_login(&event.login_name, event.user_id)
            .with_context(|| format!("Failed to look up user {}", event.login_name))?
            .unwrap_or_else(|| Subject::user(event.user_id));

        let Some(mut object) = self.registry.get_object(LoginCounter::UID, None, &subject)? else {
            tracing::warn!(subject = %subject, "Login counter is not registered, login not counted");
            return Ok(());
        };

        let uid = object.uid();
        let Some(counter) = object.downcast_mut::<LoginCounter>() else {
            tracing::warn!(subject = %subject, uid, "Resolved object is not a login counter");
            return Ok(());
        };

        counter.increment()?;

        tracing::info!(
            login = %event.login_name,
            subject = %subject,
            count = counter.count(),
            "Login counted"
        );
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use crate::store::{MemoryOptionStore, OptionKey, OptionStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (MemoryOptionStore, MemoryDirectory, LoginHook) {
        let store = MemoryOptionStore::new();
        let directory = MemoryDirectory::new();
        let registry = ObjectRegistry::with_login_counter(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
        );
        let hook = LoginHook::new(Arc::new(registry), Arc::new(directory.clone()));
        (store, directory, hook)
    }

    fn stored(store: &MemoryOptionStore, user_id: u64) -> Option<serde_json::Value> {
        store
            .read(&OptionKey::for_user(LoginCounter::UID, user_id))
            .unwrap()
    }

    #[test]
    fn test_login_increments_user_counter() {
        let (store, directory, hook) = setup();
        directory.add_user(1, "alice").unwrap();
        store
            .write(&OptionKey::for_user(LoginCounter::UID, 1), json!(3))
            .unwrap();

        hook.on_login(&LoginEvent::new("alice", 1)).unwrap();

        assert_eq!(stored(&store, 1), Some(json!(4)));
    }

    #[test]
    fn test_unknown_user_falls_back_to_event_id() {
        let (store, _directory, hook) = setup();

        hook.on_login(&LoginEvent::new("ghost", 12)).unwrap();

        assert_eq!(stored(&store, 12), Some(json!(1)));
    }

    #[test]
    fn test_login_name_resolves_user() {
        let (store, directory, hook) = setup();
        directory.add_user(5, "erin").unwrap();

        hook.on_login(&LoginEvent::new("erin", 0)).unwrap();

        assert_eq!(stored(&store, 5), Some(json!(1)));
        assert_eq!(stored(&store, 0), None);
    }

    #[test]
    fn test_double_fire_double_counts() {
        let (store, _directory, hook) = setup();
        let event = LoginEvent::new("bob", 2);

        hook.on_login(&event).unwrap();
        hook.on_login(&event).unwrap();

        assert_eq!(stored(&store, 2), Some(json!(2)));
    }

    #[test]
    fn test_missing_registration_is_not_an_error() {
        let store = MemoryOptionStore::new();
        let hook = LoginHook::new(Arc::new(ObjectRegistry::new()), Arc::new(MemoryDirectory::new()));

        hook.on_login(&LoginEvent::new("alice", 1)).unwrap();

        assert!(store.is_empty());
    }

    #[test]
    fn test_bind_subscribes_once() {
        let (store, _directory, hook) = setup();
        let mut dispatcher = LoginDispatcher::new();

        hook.bind(&mut dispatcher);
        assert_eq!(dispatcher.handler_count(), 1);

        dispatcher.fire(&LoginEvent::new("alice", 1)).unwrap();
        assert_eq!(stored(&store, 1), Some(json!(1)));
    }

    #[test]
    fn test_dispatcher_runs_handlers_in_order_and_stops_on_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = LoginDispatcher::new();

        let first = Arc::clone(&calls);
        dispatcher.subscribe(Box::new(move |_: &LoginEvent| -> Result<()> {
            first.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("handler failed"))
        }));
        let second = Arc::clone(&calls);
        dispatcher.subscribe(Box::new(move |_: &LoginEvent| -> Result<()> {
            second.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }));

        assert!(dispatcher.fire(&LoginEvent::new("alice", 1)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
