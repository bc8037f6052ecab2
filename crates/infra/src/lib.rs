//! Infrastructure layer: in-memory stores, password hashing, config loading
//! and service wiring.

pub mod config;
pub mod directory;
pub mod password;
pub mod rbac_store;
pub mod system;

mod integration_tests;

pub use config::{AppConfig, BootstrapConfig, ConfigLoadError, LogConfig, LogFormat, ServerConfig};
pub use directory::{InMemoryCredentialDirectory, LockoutPolicy};
pub use password::PasswordHasher;
pub use rbac_store::{InMemoryPermissionStore, InMemoryRoleStore};
pub use system::AuthSystem;
