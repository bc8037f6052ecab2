//! Service wiring for the HTTP layer.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;

use keystone_infra::{AppConfig, AuthSystem};

pub type AppServices = AuthSystem;

/// Build the in-memory subsystem and run the idempotent bootstrap.
pub fn build_services(config: &AppConfig) -> anyhow::Result<Arc<AppServices>> {
    config
        .auth
        .validate()
        .context("invalid auth configuration")?;

    let system = AuthSystem::in_memory(config.auth.clone());
    system
        .bootstrap(&config.bootstrap, Utc::now())
        .context("bootstrapping built-in roles")?;
    Ok(Arc::new(system))
}
