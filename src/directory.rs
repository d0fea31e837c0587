// 📇 Directory - users and their roles
//
// The counter never stores membership. It asks a SubjectProvider at the moment
// it aggregates, so a role count always reflects who is in the role right now.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::CounterError;
use crate::subject::Subject;

/// Source of users and role memberships.
pub trait SubjectProvider: Send + Sync {
    /// Ids of the users currently holding `role`, ascending
    fn role_members(&self, role: &str) -> Result<Vec<u64>>;

    /// Subject of the user that just authenticated, if the directory knows it
    fn user_for_login(&self, login_name: &str, user_id: u64) -> Result<Option<Subject>>;
}

impl<P: SubjectProvider + ?Sized> SubjectProvider for Arc<P> {
    fn role_members(&self, role: &str) -> Result<Vec<u64>> {
        (**self).role_members(role)
    }

    fn user_for_login(&self, login_name: &str, user_id: u64) -> Result<Option<Subject>> {
        (**self).user_for_login(login_name, user_id)
    }
}

#[derive(Default)]
struct DirectoryState {
    /// user id -> login name
    users: BTreeMap<u64, String>,
    /// role name -> member ids
    roles: BTreeMap<String, BTreeSet<u64>>,
}

/// In-memory directory. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: u64, login_name: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CounterError::LockPoisoned("directory"))?;
        state.users.insert(id, login_name.to_string());
        Ok(())
    }

    pub fn assign_role(&self, user_id: u64, role: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CounterError::LockPoisoned("directory"))?;
        state.roles.entry(role.to_string()).or_default().insert(user_id);
        Ok(())
    }

    pub fn remove_role(&self, user_id: u64, role: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CounterError::LockPoisoned("directory"))?;
        if let Some(members) = state.roles.get_mut(role) {
            members.remove(&user_id);
        }
        Ok(())
    }
}

impl SubjectProvider for MemoryDirectory {
    fn role_members(&self, role: &str) -> Result<Vec<u64>> {
        let state = self
            .state
            .read()
            .map_err(|_| CounterError::LockPoisoned("directory"))?;
        Ok(state
            .roles
            .get(role)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }

    fn user_for_login(&self, login_name: &str, user_id: u64) -> Result<Option<Subject>> {
        let state = self
            .state
            .read()
            .map_err(|_| CounterError::LockPoisoned("directory"))?;

        if state.users.contains_key(&user_id) {
            return Ok(Some(Subject::user(user_id)));
        }

        Ok(state
            .users
            .iter()
            .find(|(_, name)| name.as_str() == login_name)
            .map(|(id, _)| Subject::user(*id)))
    }
}
