//! Integration tests for the full authentication pipeline.
//!
//! Tests: Login → TokenService → SessionGuard → RoleRegistry, plus the
//! revocation side effects of privilege edits.
//!
//! Verifies:
//! - Tokens are only honoured while their stamp matches the user record
//! - Account status is checked before the password
//! - Inactivity timeout boundary
//! - Role/permission edits revoke exactly the affected users

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{DateTime, Duration, Utc};

    use keystone_auth::{
        AuthConfig, AuthError, CredentialDirectory, Credentials, FanOut, Hs256Jwt, LoginFailure,
        NewUser, PasswordVerification, Permission, PermissionType, Principal,
        TokenInvalidationReason, User, UserChanges, UserStatus,
    };
    use keystone_core::{PermissionId, StoreResult, UserId};

    use crate::directory::InMemoryCredentialDirectory;
    use crate::rbac_store::{InMemoryPermissionStore, InMemoryRoleStore};
    use crate::system::AuthSystem;

    const PASSWORD: &str = "correct horse";

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_key: "0123456789abcdef0123456789abcdef".to_string(),
            ..AuthConfig::default()
        }
    }

    fn setup() -> AuthSystem {
        AuthSystem::in_memory(config())
    }

    fn t0() -> DateTime<Utc> {
        Utc::now()
    }

    /// Create an ACTIVE user with a password and the given roles.
    fn active_user(sys: &AuthSystem, name: &str, roles: &[&str], now: DateTime<Utc>) -> User {
        sys.accounts
            .create_user(
                NewUser {
                    username: name.to_string(),
                    email: format!("{name}@example.com"),
                    password: Some(PASSWORD.to_string()),
                    roles: roles.iter().map(|r| r.to_string()).collect(),
                    ..NewUser::default()
                },
                now,
            )
            .unwrap();
        sys.accounts
            .modify_user(
                name,
                UserChanges {
                    status: Some(UserStatus::Active),
                    ..UserChanges::default()
                },
            )
            .unwrap()
            .user
    }

    fn login(sys: &AuthSystem, name: &str, password: &str, now: DateTime<Utc>) -> Result<String, AuthError> {
        sys.login
            .login(
                &Credentials {
                    username: name.to_string(),
                    password: password.to_string(),
                },
                now,
            )
            .map(|ok| ok.token.token)
    }

    fn permission(sys: &AuthSystem, name: &str) -> PermissionId {
        sys.permissions
            .upsert(Permission::new(name, None, PermissionType::SERVER))
            .unwrap()
            .id
    }

    fn stamp_of(sys: &AuthSystem, user: &User) -> keystone_core::Stamp {
        sys.directory
            .find_by_id(user.id)
            .unwrap()
            .unwrap()
            .valid_token_stamp
    }

    // ─────────────────────────────────────────────────────────────────────
    // Login and tokens
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn login_then_validate_then_guard() {
        let sys = setup();
        let now = t0();
        let read = permission(&sys, "READ_REPORTS");
        sys.roles.create_role("viewer", None, &[read]).unwrap();
        active_user(&sys, "alice", &["viewer"], now);

        let ok = sys
            .login
            .login(
                &Credentials {
                    username: "alice".into(),
                    password: PASSWORD.into(),
                },
                now,
            )
            .unwrap();
        assert_eq!(ok.roles.len(), 1);
        assert!(ok.roles[0].grants_named("READ_REPORTS"));

        let principal = sys.tokens.validate(&ok.token.token, now);
        assert!(principal.is_authenticated());

        let user = sys
            .guard
            .check(&principal, Some("READ_REPORTS"), now + Duration::minutes(1))
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn login_token_carries_the_subject_and_current_stamp() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "alice", &[], now);

        let ok = sys
            .login
            .login(
                &Credentials {
                    username: "alice".into(),
                    password: PASSWORD.into(),
                },
                now,
            )
            .unwrap();
        assert_eq!(ok.user.id, user.id);
        assert_eq!(ok.user.last_request_time, now);

        let cfg = config();
        let jwt = Hs256Jwt::new(cfg.jwt_key.as_bytes(), &cfg.jwt_issuer, &cfg.jwt_audience);
        let claims = jwt.verify(&ok.token.token, now).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.nameid, user.id);
        assert_eq!(claims.unique_name, "alice");
        assert_eq!(claims.stamp, stamp_of(&sys, &user));
        assert_eq!(claims.exp - claims.iat, Duration::days(1).num_seconds());
        assert_eq!(claims.iss, cfg.jwt_issuer);
        assert_eq!(claims.jti, ok.token.token_id);
    }

    #[test]
    fn issue_does_not_touch_the_user_record() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "alice", &[], now);
        let before = sys.directory.find_by_id(user.id).unwrap().unwrap();

        sys.tokens.issue("alice", &before, now).unwrap();

        assert_eq!(sys.directory.find_by_id(user.id).unwrap().unwrap(), before);
    }

    #[test]
    fn revoked_token_is_anonymous_with_reason() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "bob", &[], now);
        let token = login(&sys, "bob", PASSWORD, now).unwrap();

        let new_stamp = sys
            .tokens
            .revoke(&user, TokenInvalidationReason::RoleModified)
            .unwrap();
        assert_eq!(new_stamp, stamp_of(&sys, &user));

        let principal = sys.tokens.validate(&token, now);
        assert_eq!(
            principal,
            Principal::revoked(Some(TokenInvalidationReason::RoleModified))
        );

        let err = sys.guard.check(&principal, None, now).unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(
            err.technical_message(),
            "TECHNICAL_MESSAGE_TOKEN_INVALIDATED_ROLE_MODIFIED"
        );

        // A fresh login picks up the new stamp.
        let token = login(&sys, "bob", PASSWORD, now).unwrap();
        assert!(sys.tokens.validate(&token, now).is_authenticated());
    }

    #[test]
    fn token_of_a_deleted_or_unknown_subject_is_anonymous() {
        let sys = setup();
        let now = t0();
        let stranger = User::new("ghost", "ghost@example.com", now);
        let token = sys.tokens.issue("ghost", &stranger, now).unwrap();
        assert_eq!(sys.tokens.validate(&token.token, now), Principal::anonymous());
    }

    #[test]
    fn expired_token_is_anonymous() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "carol", &[], now);
        let token = login(&sys, "carol", PASSWORD, now).unwrap();
        let later = now + Duration::days(2);
        assert!(!sys.tokens.validate(&token, later).is_authenticated());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Login state machine
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn unknown_user_and_missing_password_are_reported() {
        let sys = setup();
        let now = t0();
        let err = login(&sys, "nobody", PASSWORD, now).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidLogin(LoginFailure::UserNotFound(_))
        ));

        sys.accounts
            .create_user(
                NewUser {
                    username: "pending".into(),
                    email: "pending@example.com".into(),
                    ..NewUser::default()
                },
                now,
            )
            .unwrap();
        let err = login(&sys, "pending", PASSWORD, now).unwrap_err();
        assert_eq!(err, AuthError::InvalidLogin(LoginFailure::AccountNotConfirmed));
        assert_eq!(err.status_code(), 412);
    }

    #[test]
    fn empty_credentials_are_a_bad_request() {
        let sys = setup();
        let err = login(&sys, "", PASSWORD, t0()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn status_is_checked_before_the_password() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "dave", &[], now);
        sys.accounts
            .modify_user(
                "dave",
                UserChanges {
                    status: Some(UserStatus::Locked),
                    ..UserChanges::default()
                },
            )
            .unwrap();

        let err = login(&sys, "dave", "wrong password", now).unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidLogin(LoginFailure::AccountStatusError(UserStatus::Locked))
        );
        let stored = sys.directory.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.access_failed_count, 0);
    }

    #[test]
    fn third_failed_attempt_locks_the_account() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "erin", &[], now);

        for _ in 0..2 {
            assert_eq!(
                login(&sys, "erin", "nope", now).unwrap_err(),
                AuthError::InvalidLogin(LoginFailure::InvalidCredentials)
            );
        }
        assert_eq!(
            login(&sys, "erin", "nope", now).unwrap_err(),
            AuthError::InvalidLogin(LoginFailure::AccountLockedOut)
        );

        let stored = sys.directory.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Locked);
        assert!(stored.lockout_end.is_some());

        // Even the right password now stops at the status gate.
        assert_eq!(
            login(&sys, "erin", PASSWORD, now).unwrap_err(),
            AuthError::InvalidLogin(LoginFailure::AccountStatusError(UserStatus::Locked))
        );
    }

    #[test]
    fn unlocking_clears_the_lockout() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "frank", &[], now);
        for _ in 0..3 {
            let _ = login(&sys, "frank", "nope", now);
        }

        let account = sys
            .accounts
            .modify_user(
                "frank",
                UserChanges {
                    status: Some(UserStatus::Active),
                    ..UserChanges::default()
                },
            )
            .unwrap();
        assert!(account.user.lockout_end.is_none());
        assert_eq!(
            account.user.token_invalidation_reason,
            Some(TokenInvalidationReason::UserModified)
        );
        assert!(login(&sys, "frank", PASSWORD, now).is_ok());
        assert_eq!(
            sys.directory.find_by_id(user.id).unwrap().unwrap().status,
            UserStatus::Active
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session guard
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn inactivity_boundary() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "gina", &[], now);
        let token = login(&sys, "gina", PASSWORD, now).unwrap();

        let first = now + Duration::minutes(5) + Duration::seconds(59);
        let principal = sys.tokens.validate(&token, first);
        let user = sys.guard.validate_user(&principal, first).unwrap();
        assert_eq!(user.last_request_time, first);

        let too_late = first + Duration::minutes(6) + Duration::seconds(1);
        let principal = sys.tokens.validate(&token, too_late);
        assert_eq!(
            sys.guard.validate_user(&principal, too_late).unwrap_err(),
            AuthError::LoginTimeout
        );
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "hank", &[], now);
        let token = login(&sys, "hank", PASSWORD, now).unwrap();
        let principal = sys.tokens.validate(&token, now);

        let err = sys.guard.check(&principal, Some("DELETE_ALL"), now).unwrap_err();
        assert_eq!(err.status_code(), 403);
        // A session-only check still passes.
        assert!(sys.guard.check(&principal, None, now).is_ok());
    }

    #[test]
    fn deactivated_user_fails_the_guard_with_account_status() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "ivy", &[], now);
        let token = login(&sys, "ivy", PASSWORD, now).unwrap();
        let principal = sys.tokens.validate(&token, now);

        let mut stored = sys.directory.find_by_id(user.id).unwrap().unwrap();
        stored.status = UserStatus::Expired;
        sys.directory.update(stored).unwrap();

        assert_eq!(
            sys.guard.validate_user(&principal, now).unwrap_err(),
            AuthError::InvalidLogin(LoginFailure::AccountStatusError(UserStatus::Expired))
        );
    }

    #[test]
    fn locked_user_fails_on_status_before_the_permission_check() {
        let sys = setup();
        let now = t0();
        let read = permission(&sys, "READ_REPORTS");
        sys.roles.create_role("viewer", None, &[read]).unwrap();
        let user = active_user(&sys, "jude", &["viewer"], now);
        let token = login(&sys, "jude", PASSWORD, now).unwrap();
        let principal = sys.tokens.validate(&token, now);

        sys.directory.set_status(user.id, UserStatus::Locked).unwrap();

        // Token is still valid and the role still grants the permission.
        assert!(sys.tokens.validate(&token, now).is_authenticated());
        assert!(sys.roles.has_permission(user.id, "READ_REPORTS").unwrap());
        assert_eq!(
            sys.guard
                .check(&principal, Some("READ_REPORTS"), now)
                .unwrap_err(),
            AuthError::InvalidLogin(LoginFailure::AccountStatusError(UserStatus::Locked))
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registries and fan-out
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn swapping_a_role_revokes_once() {
        let sys = setup();
        let now = t0();
        for role in ["A", "B", "C"] {
            sys.roles.create_role(role, None, &[]).unwrap();
        }
        let user = active_user(&sys, "jack", &["A", "B"], now);
        let before = stamp_of(&sys, &user);

        let roles = sys
            .roles
            .modify_user_roles(&user, &["B".to_string(), "C".to_string()])
            .unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);

        let after = sys.directory.find_by_id(user.id).unwrap().unwrap();
        assert_ne!(after.valid_token_stamp, before);
        assert_eq!(
            after.token_invalidation_reason,
            Some(TokenInvalidationReason::RoleModified)
        );
    }

    #[test]
    fn adding_a_role_does_not_revoke() {
        let sys = setup();
        let now = t0();
        for role in ["A", "B", "C"] {
            sys.roles.create_role(role, None, &[]).unwrap();
        }
        let user = active_user(&sys, "kate", &["A", "B"], now);
        let before = stamp_of(&sys, &user);

        sys.roles
            .modify_user_roles(&user, &["A".into(), "B".into(), "C".into()])
            .unwrap();
        assert_eq!(stamp_of(&sys, &user), before);
    }

    #[test]
    fn unknown_role_is_not_found() {
        let sys = setup();
        let now = t0();
        let user = active_user(&sys, "liam", &[], now);
        let err = sys
            .roles
            .modify_user_roles(&user, &["nope".into()])
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn permission_upsert_is_idempotent_by_name() {
        let sys = setup();
        let now = t0();
        let id = permission(&sys, "EXPORT");
        sys.roles.create_role("exporter", None, &[id]).unwrap();
        let user = active_user(&sys, "mia", &["exporter"], now);
        let before = stamp_of(&sys, &user);

        // Same record again: same id, nobody revoked.
        assert_eq!(permission(&sys, "EXPORT"), id);
        assert_eq!(stamp_of(&sys, &user), before);
        assert_eq!(sys.permissions.list().unwrap().len(), 1);

        // Changed record: same id, holders revoked.
        let changed = sys
            .permissions
            .upsert(Permission::new(
                "EXPORT",
                Some("now client-side too".into()),
                PermissionType::SERVER | PermissionType::CLIENT,
            ))
            .unwrap();
        assert_eq!(changed.id, id);
        let after = sys.directory.find_by_id(user.id).unwrap().unwrap();
        assert_ne!(after.valid_token_stamp, before);
        assert_eq!(
            after.token_invalidation_reason,
            Some(TokenInvalidationReason::PermissionModified)
        );
    }

    #[test]
    fn deleting_a_permission_detaches_it_and_revokes_holders() {
        let sys = setup();
        let now = t0();
        let p = permission(&sys, "AUDIT");
        let q = permission(&sys, "REPORT");
        sys.roles.create_role("auditor", None, &[p, q]).unwrap();
        let holder = active_user(&sys, "noah", &["auditor"], now);
        let bystander = active_user(&sys, "olga", &[], now);
        let bystander_stamp = stamp_of(&sys, &bystander);

        sys.permissions.delete(p).unwrap();

        let role = sys.roles.find_role_by_name("auditor").unwrap();
        let names: Vec<_> = role.permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["REPORT"]);
        assert_eq!(
            sys.directory
                .find_by_id(holder.id)
                .unwrap()
                .unwrap()
                .token_invalidation_reason,
            Some(TokenInvalidationReason::PermissionModified)
        );
        assert_eq!(stamp_of(&sys, &bystander), bystander_stamp);
    }

    #[test]
    fn fan_out_revokes_each_user_once() {
        let sys = setup();
        let now = t0();
        sys.roles.create_role("A", None, &[]).unwrap();
        sys.roles.create_role("B", None, &[]).unwrap();
        active_user(&sys, "pam", &["A", "B"], now);
        active_user(&sys, "quinn", &["B"], now);
        active_user(&sys, "rex", &[], now);

        let fan_out = FanOut::new(sys.directory.clone(), sys.tokens.clone());
        let affected = HashSet::from(["A".to_string(), "B".to_string()]);
        let revoked = fan_out
            .revoke_role_holders(&affected, TokenInvalidationReason::RoleModified)
            .unwrap();
        assert_eq!(revoked, 2);
    }

    #[test]
    fn narrowing_a_role_revokes_holders_but_widening_does_not() {
        let sys = setup();
        let now = t0();
        let p = permission(&sys, "P");
        let q = permission(&sys, "Q");
        sys.roles.create_role("ops", None, &[p]).unwrap();
        let user = active_user(&sys, "sam", &["ops"], now);
        let before = stamp_of(&sys, &user);

        sys.roles.set_role_permissions("ops", &[p, q]).unwrap();
        assert_eq!(stamp_of(&sys, &user), before);

        let view = sys.roles.set_role_permissions("ops", &[q]).unwrap();
        assert_eq!(view.permissions.len(), 1);
        assert_ne!(stamp_of(&sys, &user), before);

        // The unlinked permission itself survives.
        assert!(sys.permissions.get(p).is_ok());
    }

    #[test]
    fn unknown_permission_id_is_rejected_on_reconcile() {
        let sys = setup();
        sys.roles.create_role("ops", None, &[]).unwrap();
        let err = sys
            .roles
            .set_role_permissions("ops", &[PermissionId::new()])
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn deleting_a_role_revokes_holders_and_keeps_permissions() {
        let sys = setup();
        let now = t0();
        let p = permission(&sys, "P");
        sys.roles.create_role("temp", None, &[p]).unwrap();
        let user = active_user(&sys, "tina", &["temp"], now);
        let before = stamp_of(&sys, &user);

        sys.roles.delete_role("temp").unwrap();

        assert_ne!(stamp_of(&sys, &user), before);
        assert!(sys.roles.roles_for_user(user.id).unwrap().is_empty());
        assert!(sys.permissions.get(p).is_ok());
        assert_eq!(sys.roles.find_role_by_name("temp").unwrap_err().status_code(), 404);
    }

    #[test]
    fn duplicate_role_is_a_bad_request() {
        let sys = setup();
        sys.roles.create_role("ops", None, &[]).unwrap();
        assert_eq!(
            sys.roles.create_role("ops", None, &[]).unwrap_err().status_code(),
            400
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accounts and bootstrap
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn new_accounts_start_expired_and_reject_duplicates() {
        let sys = setup();
        let now = t0();
        let account = sys
            .accounts
            .create_user(
                NewUser {
                    username: "uma".into(),
                    email: "uma@example.com".into(),
                    ..NewUser::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(account.user.status, UserStatus::Expired);

        let dup_name = sys.accounts.create_user(
            NewUser {
                username: "uma".into(),
                email: "other@example.com".into(),
                ..NewUser::default()
            },
            now,
        );
        assert_eq!(
            dup_name.unwrap_err().user_message(),
            "USER_MESSAGE_USER_NAME_ALREADY_EXISTS"
        );

        let dup_email = sys.accounts.create_user(
            NewUser {
                username: "vic".into(),
                email: "uma@example.com".into(),
                ..NewUser::default()
            },
            now,
        );
        assert_eq!(
            dup_email.unwrap_err().user_message(),
            "USER_MESSAGE_EMAIL_ALREADY_USE"
        );
    }

    #[test]
    fn rejected_email_change_keeps_sessions_alive() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "alma", &[], now);
        active_user(&sys, "bert", &[], now);
        let token = login(&sys, "alma", PASSWORD, now).unwrap();

        let err = sys
            .accounts
            .modify_user(
                "alma",
                UserChanges {
                    email: Some("bert@example.com".into()),
                    ..UserChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.user_message(), "USER_MESSAGE_EMAIL_ALREADY_USE");

        assert!(sys.tokens.validate(&token, now).is_authenticated());
        let stored = sys.accounts.find_user_by_name("alma").unwrap().user;
        assert_eq!(stored.email, "alma@example.com");
    }

    #[test]
    fn unknown_role_in_modify_changes_nothing() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "cleo", &[], now);
        let token = login(&sys, "cleo", PASSWORD, now).unwrap();

        let err = sys
            .accounts
            .modify_user(
                "cleo",
                UserChanges {
                    status: Some(UserStatus::Locked),
                    nickname: Some("cc".into()),
                    roles: Some(vec!["nope".into()]),
                    ..UserChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let stored = sys.accounts.find_user_by_name("cleo").unwrap().user;
        assert_eq!(stored.status, UserStatus::Active);
        assert_eq!(stored.nickname, None);
        assert!(sys.tokens.validate(&token, now).is_authenticated());
    }

    #[test]
    fn password_change_revokes_outstanding_tokens() {
        let sys = setup();
        let now = t0();
        active_user(&sys, "walt", &[], now);
        let token = login(&sys, "walt", PASSWORD, now).unwrap();

        let user = sys.accounts.set_password("walt", "new password", now).unwrap();
        assert_eq!(user.last_password_changed_time, Some(now));
        assert_eq!(
            sys.tokens.validate(&token, now).invalidation_reason(),
            Some(TokenInvalidationReason::UserModified)
        );
        assert!(login(&sys, "walt", "new password", now).is_ok());
    }

    #[test]
    fn bootstrap_is_repeatable_and_grants_admin_permissions() {
        let sys = setup();
        let now = t0();
        let bootstrap = crate::config::BootstrapConfig {
            admin_password: Some("admin password".into()),
            ..Default::default()
        };
        sys.bootstrap(&bootstrap, now).unwrap();
        sys.bootstrap(&bootstrap, now).unwrap();

        assert_eq!(sys.permissions.list().unwrap().len(), 3);
        let ok = sys
            .login
            .login(
                &Credentials {
                    username: "admin".into(),
                    password: "admin password".into(),
                },
                now,
            )
            .unwrap();
        assert!(ok.roles[0].grants_named("USER_MANAGEMENT"));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Revocation racing with other writes
    // ─────────────────────────────────────────────────────────────────────

    /// Directory that, once armed, lands a `ROLE_MODIFIED` revocation right
    /// after the next `find_by_id` read, so the caller holds a stale copy.
    struct RevokeAfterRead {
        inner: InMemoryCredentialDirectory,
        armed: AtomicBool,
    }

    impl RevokeAfterRead {
        fn new() -> Self {
            Self {
                inner: InMemoryCredentialDirectory::default(),
                armed: AtomicBool::new(false),
            }
        }

        fn arm(&self) {
            self.armed.store(true, Ordering::SeqCst);
        }
    }

    impl CredentialDirectory for RevokeAfterRead {
        fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
            self.inner.find_by_username(username)
        }
        fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_by_email(email)
        }
        fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
            let found = self.inner.find_by_id(id)?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.inner
                    .rotate_stamps(id, TokenInvalidationReason::RoleModified)?;
            }
            Ok(found)
        }
        fn list_users(&self) -> StoreResult<Vec<User>> {
            self.inner.list_users()
        }
        fn create(&self, user: User) -> StoreResult<User> {
            self.inner.create(user)
        }
        fn update(&self, user: User) -> StoreResult<User> {
            self.inner.update(user)
        }
        fn rotate_stamps(&self, id: UserId, reason: TokenInvalidationReason) -> StoreResult<User> {
            self.inner.rotate_stamps(id, reason)
        }
        fn touch(&self, id: UserId, now: DateTime<Utc>) -> StoreResult<User> {
            self.inner.touch(id, now)
        }
        fn set_status(&self, id: UserId, status: UserStatus) -> StoreResult<User> {
            self.inner.set_status(id, status)
        }
        fn set_password(&self, id: UserId, plaintext: &str, now: DateTime<Utc>) -> StoreResult<User> {
            self.inner.set_password(id, plaintext, now)
        }
        fn verify_password(
            &self,
            id: UserId,
            plaintext: &str,
            now: DateTime<Utc>,
        ) -> StoreResult<PasswordVerification> {
            self.inner.verify_password(id, plaintext, now)
        }
        fn roles_for_user(&self, id: UserId) -> StoreResult<Vec<String>> {
            self.inner.roles_for_user(id)
        }
        fn add_to_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()> {
            self.inner.add_to_roles(id, roles)
        }
        fn remove_from_roles(&self, id: UserId, roles: &[String]) -> StoreResult<()> {
            self.inner.remove_from_roles(id, roles)
        }
        fn remove_role_everywhere(&self, role: &str) -> StoreResult<Vec<UserId>> {
            self.inner.remove_role_everywhere(role)
        }
    }

    fn racing_setup() -> (AuthSystem, Arc<RevokeAfterRead>) {
        let directory = Arc::new(RevokeAfterRead::new());
        let sys = AuthSystem::new(
            config(),
            directory.clone(),
            Arc::new(InMemoryPermissionStore::new()),
            Arc::new(InMemoryRoleStore::new()),
        );
        (sys, directory)
    }

    #[test]
    fn guard_refresh_does_not_undo_a_concurrent_revocation() {
        let (sys, directory) = racing_setup();
        let now = t0();
        active_user(&sys, "olga", &[], now);
        let token = login(&sys, "olga", PASSWORD, now).unwrap();
        let principal = sys.tokens.validate(&token, now);
        assert!(principal.is_authenticated());

        directory.arm();
        sys.guard
            .validate_user(&principal, now + Duration::minutes(1))
            .unwrap();

        let after = sys.tokens.validate(&token, now + Duration::minutes(2));
        assert!(!after.is_authenticated());
        assert_eq!(
            after.invalidation_reason(),
            Some(TokenInvalidationReason::RoleModified)
        );
    }

    #[test]
    fn modify_on_a_stale_copy_fails_instead_of_restoring_stamps() {
        let (sys, directory) = racing_setup();
        let now = t0();
        let user = active_user(&sys, "pete", &[], now);

        directory.arm();
        let err = sys
            .accounts
            .modify_user(
                "pete",
                UserChanges {
                    status: Some(UserStatus::Locked),
                    ..UserChanges::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.status_code(), 500);

        let stored = sys.directory.find_by_id(user.id).unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Active);
        assert_eq!(
            stored.token_invalidation_reason,
            Some(TokenInvalidationReason::RoleModified)
        );
    }
}
