//! `keystone-core`: identifiers and storage primitives shared by every crate.
//!
//! Nothing in here knows about tokens, HTTP or passwords.

pub mod error;
pub mod id;
pub mod stamp;

pub use error::{StoreError, StoreResult};
pub use id::{PermissionId, RoleId, TokenId, UserId};
pub use stamp::Stamp;
