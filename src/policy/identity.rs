use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::dynamo::{ServiceError, ServiceResult};

/// Account identity and role management.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Account id of the credentials in use.
    async fn caller_account_id(&self) -> ServiceResult<String>;

    async fn role_exists(&self, role_name: &str) -> ServiceResult<bool>;

    /// Create `role_name` with the given trust (assume-role) policy document.
    async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> ServiceResult<()>;

    /// Create or replace the inline policy `policy_name` on `role_name`.
    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> ServiceResult<()>;
}

/// A role held by [`MemoryIdentity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryRole {
    pub assume_role_policy: String,
    /// Inline policy documents by policy name.
    pub inline_policies: BTreeMap<String, String>,
}

/// In-memory identity service (for testing).
pub struct MemoryIdentity {
    account_id: String,
    roles: DashMap<String, MemoryRole>,
    roles_created: AtomicUsize,
}

impl MemoryIdentity {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            roles: DashMap::new(),
            roles_created: AtomicUsize::new(0),
        }
    }

    /// Seed an existing role with an empty trust policy.
    pub fn with_role(self, role_name: impl Into<String>) -> Self {
        self.roles.insert(role_name.into(), MemoryRole::default());
        self
    }

    pub fn role(&self, role_name: &str) -> Option<MemoryRole> {
        self.roles.get(role_name).map(|r| r.value().clone())
    }

    /// Number of `create_role` calls that succeeded.
    pub fn roles_created(&self) -> usize {
        self.roles_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn caller_account_id(&self) -> ServiceResult<String> {
        Ok(self.account_id.clone())
    }

    async fn role_exists(&self, role_name: &str) -> ServiceResult<bool> {
        Ok(self.roles.contains_key(role_name))
    }

    async fn create_role(&self, role_name: &str, assume_role_policy: &str) -> ServiceResult<()> {
        if self.roles.contains_key(role_name) {
            return Err(ServiceError::Conflict(format!(
                "Role already exists: {role_name}"
            )));
        }

        self.roles.insert(
            role_name.to_string(),
            MemoryRole {
                assume_role_policy: assume_role_policy.to_string(),
                inline_policies: BTreeMap::new(),
            },
        );
        self.roles_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_role_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> ServiceResult<()> {
        let mut role = self
            .roles
            .get_mut(role_name)
            .ok_or_else(|| ServiceError::NotFound(format!("Role not found: {role_name}")))?;

        role.inline_policies
            .insert(policy_name.to_string(), document.to_string());
        Ok(())
    }
}
