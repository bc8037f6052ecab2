//! Wires the authentication services over the in-memory stores.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;

use keystone_auth::permissions::admin;
use keystone_auth::{
    AccountService, AuthConfig, CredentialDirectory, FanOut, LoginStateMachine, NewUser,
    PermissionRegistry, PermissionStore, RoleRegistry, RoleStore, SessionGuard, TokenService,
    UserChanges, UserStatus,
};

use crate::config::BootstrapConfig;
use crate::directory::{InMemoryCredentialDirectory, LockoutPolicy};
use crate::rbac_store::{InMemoryPermissionStore, InMemoryRoleStore};

/// Every service of the subsystem, sharing one set of stores.
#[derive(Clone)]
pub struct AuthSystem {
    pub config: AuthConfig,
    pub directory: Arc<dyn CredentialDirectory>,
    pub tokens: Arc<TokenService>,
    pub permissions: Arc<PermissionRegistry>,
    pub roles: Arc<RoleRegistry>,
    pub login: Arc<LoginStateMachine>,
    pub guard: Arc<SessionGuard>,
    pub accounts: Arc<AccountService>,
}

impl AuthSystem {
    pub fn in_memory(config: AuthConfig) -> Self {
        let directory: Arc<dyn CredentialDirectory> = Arc::new(InMemoryCredentialDirectory::new(
            LockoutPolicy::from_config(&config),
        ));
        let permission_store: Arc<dyn PermissionStore> = Arc::new(InMemoryPermissionStore::new());
        let role_store: Arc<dyn RoleStore> = Arc::new(InMemoryRoleStore::new());
        Self::new(config, directory, permission_store, role_store)
    }

    pub fn new(
        config: AuthConfig,
        directory: Arc<dyn CredentialDirectory>,
        permission_store: Arc<dyn PermissionStore>,
        role_store: Arc<dyn RoleStore>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(&config, directory.clone()));
        let fan_out = FanOut::new(directory.clone(), tokens.clone());

        let permissions = Arc::new(PermissionRegistry::new(
            permission_store.clone(),
            role_store.clone(),
            fan_out.clone(),
        ));
        let roles = Arc::new(RoleRegistry::new(
            role_store,
            permission_store,
            directory.clone(),
            tokens.clone(),
            fan_out,
        ));
        let login = Arc::new(LoginStateMachine::new(
            directory.clone(),
            roles.clone(),
            tokens.clone(),
        ));
        let guard = Arc::new(SessionGuard::new(
            directory.clone(),
            roles.clone(),
            config.inactivity_threshold(),
        ));
        let accounts = Arc::new(AccountService::new(
            directory.clone(),
            roles.clone(),
            tokens.clone(),
        ));

        Self {
            config,
            directory,
            tokens,
            permissions,
            roles,
            login,
            guard,
            accounts,
        }
    }

    /// Seed the built-in admin permissions, the admin role, and (when a
    /// password is configured) an active administrator. Safe to run again.
    pub fn bootstrap(&self, bootstrap: &BootstrapConfig, now: DateTime<Utc>) -> anyhow::Result<()> {
        let seeded = self
            .permissions
            .upsert_many(admin::builtin())
            .context("seeding built-in permissions")?;
        let ids: Vec<_> = seeded.iter().map(|p| p.id).collect();

        match self.roles.find_role_by_name(&bootstrap.admin_role) {
            Ok(_) => {
                self.roles
                    .set_role_permissions(&bootstrap.admin_role, &ids)
                    .context("updating admin role")?;
            }
            Err(_) => {
                self.roles
                    .create_role(
                        &bootstrap.admin_role,
                        Some("Full administrative access".to_string()),
                        &ids,
                    )
                    .context("creating admin role")?;
            }
        }

        let Some(password) = bootstrap.admin_password.as_deref() else {
            return Ok(());
        };
        let existing = self
            .directory
            .find_by_username(&bootstrap.admin_username)
            .context("looking up bootstrap admin")?;
        if existing.is_some() {
            return Ok(());
        }

        self.accounts
            .create_user(
                NewUser {
                    username: bootstrap.admin_username.clone(),
                    email: bootstrap.admin_email.clone(),
                    nickname: None,
                    password: Some(password.to_string()),
                    roles: vec![bootstrap.admin_role.clone()],
                },
                now,
            )
            .context("creating bootstrap admin")?;
        self.accounts
            .modify_user(
                &bootstrap.admin_username,
                UserChanges {
                    status: Some(UserStatus::Active),
                    ..UserChanges::default()
                },
            )
            .context("activating bootstrap admin")?;

        info!(user = %bootstrap.admin_username, "bootstrap administrator created");
        Ok(())
    }
}
