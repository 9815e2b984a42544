// SPDX-License-Identifier: MIT OR Apache-2.0

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::rc::Rc;

use crate::memory::MemoryStore;
use crate::roles::RoleStore;
#[cfg(any(test, feature = "test_utils"))]
use crate::roles::RoleTestExt;
use crate::types::{Role, RoleId};

#[derive(Clone, Debug, Default)]
pub(crate) struct RoleTable {
    roles: BTreeMap<RoleId, Role>,
    last_id: i64,
}

impl RoleTable {
    pub(crate) fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct RoleMemoryStore {
    pub(crate) inner: Rc<RefCell<RoleTable>>,
}

impl RoleMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleStore for MemoryStore {
    async fn insert_role(&self, name: &str, slug: &str) -> Result<Option<Role>, Infallible> {
        let mut table = self.roles.inner.borrow_mut();
        if table.roles.values().any(|role| role.slug == slug) {
            return Ok(None);
        }

        table.last_id += 1;
        let role = Role {
            id: RoleId(table.last_id),
            name: name.to_owned(),
            slug: slug.to_owned(),
        };
        table.roles.insert(role.id, role.clone());

        Ok(Some(role))
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, Infallible> {
        Ok(self.roles.inner.borrow().roles.get(&id).cloned())
    }

    async fn get_role_by_slug(&self, slug: &str) -> Result<Option<Role>, Infallible> {
        let table = self.roles.inner.borrow();
        Ok(table.roles.values().find(|role| role.slug == slug).cloned())
    }

    async fn missing_roles(&self, ids: &[RoleId]) -> Result<Vec<RoleId>, Infallible> {
        let table = self.roles.inner.borrow();
        Ok(ids.iter().filter(|id| !table.contains(id)).copied().collect())
    }

    async fn delete_role(&self, id: RoleId) -> Result<Option<u64>, Infallible> {
        if self.roles.inner.borrow_mut().roles.remove(&id).is_none() {
            return Ok(None);
        }

        let removed_direct = self.edges.remove_touching(id);
        self.members.remove_role(id);

        Ok(Some(removed_direct))
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl RoleTestExt for MemoryStore {
    async fn delete_role_without_cascade(&self, id: RoleId) -> bool {
        self.roles.inner.borrow_mut().roles.remove(&id).is_some()
    }
}
