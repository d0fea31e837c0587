// 🧩 Control Object - the abstract object every feature kind implements
//
// An object is bound to one subject, reads itself from the option store in
// `init` and writes itself back in `save`. The registry hands objects out as
// `Box<dyn ControlObject>`; callers that need kind-specific operations
// downcast through `as_any_mut`.

use anyhow::Result;
use serde_json::Value;
use std::any::Any;

use crate::subject::Subject;

pub trait ControlObject: Any + Send {
    /// Fixed identifier of the object kind, used for registry dispatch
    fn uid(&self) -> &'static str;

    fn subject(&self) -> &Subject;

    /// Populate the in-memory value from storage
    fn init(&mut self, scope_id: Option<&str>) -> Result<()>;

    /// Persist the in-memory value
    fn save(&mut self) -> Result<()>;

    /// Whether an external caching layer may serve this object from cache
    fn cache_object(&self) -> bool;

    /// Current value as JSON
    fn option(&self) -> Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn ControlObject {
    pub fn downcast_ref<T: ControlObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: ControlObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl std::fmt::Debug for dyn ControlObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlObject")
            .field("uid", &self.uid())
            .field("subject", self.subject())
            .field("option", &self.option())
            .finish()
    }
}
