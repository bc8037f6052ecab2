//! `keystone-auth`: session tokens, login, session guard and RBAC.
//!
//! Pure logic over the store traits in [`directory`]; no HTTP and no storage
//! engine. Time is always passed in by the caller.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod config;
pub mod directory;
pub mod error;
pub mod guard;
pub mod login;
pub mod permissions;
pub mod principal;
pub mod registry;
pub mod revocation;
pub mod roles;
pub mod token;
pub mod user;

pub use account::{AccountService, NewUser, UserAccount, UserChanges};
pub use authorize::{AuthorizationExplanation, DenialKind, explain_authorization};
pub use claims::{Hs256Jwt, JwtClaims, TokenValidationError, validate_claims};
pub use config::{AuthConfig, ConfigError};
pub use directory::{CredentialDirectory, PasswordVerification, PermissionStore, RoleStore};
pub use error::{AuthError, AuthResult, ErrorBody, Fault, LoginFailure};
pub use guard::SessionGuard;
pub use login::{Credentials, LoginStateMachine, LoginSuccess};
pub use permissions::{Permission, PermissionType};
pub use principal::{Identity, Principal};
pub use registry::{PermissionRegistry, RoleRegistry};
pub use revocation::FanOut;
pub use roles::{PrivilegeRef, Role, RoleDiff, RolePrivilege, RoleView, diff_roles};
pub use token::{IssuedToken, TokenService};
pub use user::{TokenInvalidationReason, User, UserStatus};
