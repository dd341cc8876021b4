//! Account flows: registration, email verification, forgot/reset password,
//! login and profile refresh.
//!
//! Each flow returns an `AuthError` tag on failure; handlers turn it into a
//! response. Notification failures are logged and never fail the flow.

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    catalog::RoleName,
    dto::{RegisterRequest, UserProfile},
    password::{hash_password, verify_password},
    rbac::ResolvedAccess,
    repo::StoreError,
    repo_types::{NewUser, User},
    tokens::{is_expired, TokenPolicy},
};
use crate::{
    error::{AuthError, AuthResult},
    state::AppState,
};

pub const REGISTERED_MESSAGE: &str =
    "Registration successful. Please check your email to verify your account.";
pub const VERIFIED_MESSAGE: &str = "Email verified successfully";
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with this email, you will receive a password reset link.";
pub const RESET_MESSAGE: &str =
    "Password reset successful. You can now log in with your new password.";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A freshly created account awaiting email verification.
#[derive(Debug, Clone, Copy)]
pub struct Registered {
    pub user_id: Uuid,
}

/// Signed session token plus the profile it was issued for.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub profile: UserProfile,
}

/// Column widths of `users.first_name`/`last_name` and `users.phone`.
pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_PHONE_CHARS: usize = 20;

fn too_long(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

fn open_session(state: &AppState, user: &User) -> AuthResult<Session> {
    let access = ResolvedAccess::resolve(&user.roles);
    let token = state.keys.issue(user, &access)?;
    Ok(Session {
        token,
        profile: UserProfile::build(user, &access),
    })
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(state: &AppState, req: RegisterRequest) -> AuthResult<Registered> {
    if req.email.trim().is_empty()
        || req.password.is_empty()
        || req.first_name.trim().is_empty()
        || req.last_name.trim().is_empty()
    {
        return Err(AuthError::Validation(
            "Email, password, first name, and last name are required".into(),
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if too_long(&req.first_name, MAX_NAME_CHARS) || too_long(&req.last_name, MAX_NAME_CHARS) {
        return Err(AuthError::Validation(format!(
            "First and last name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    if req.phone.as_deref().is_some_and(|p| too_long(p, MAX_PHONE_CHARS)) {
        return Err(AuthError::Validation(format!(
            "Phone must be at most {MAX_PHONE_CHARS} characters"
        )));
    }
    state.policy.validate(&req.password)?;

    if state.store.find_by_email(&req.email).await?.is_some() {
        warn!("email already registered");
        return Err(AuthError::Conflict("User with this email already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let (token, expiry) = TokenPolicy::Verification.issue()?;
    let role = state
        .store
        .find_role(RoleName::DEFAULT)
        .await?
        .ok_or_else(|| anyhow::anyhow!("default role '{}' is not seeded", RoleName::DEFAULT))?;

    let new = NewUser {
        email: req.email,
        password_hash,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone.unwrap_or_default(),
        email_verified: false,
        verification_token: Some(token.clone()),
        verification_expiry: Some(expiry),
        organization_id: req.organization_id,
        role_ids: vec![role.id],
    };
    let user = match state.store.create_user(new).await {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => {
            warn!("email registered concurrently");
            return Err(AuthError::Conflict("User with this email already exists".into()));
        }
        Err(StoreError::Other(e)) => return Err(e.into()),
    };

    if let Err(e) = state.notifier.send_verification(&user.email, &token).await {
        warn!(error = %e, user_id = %user.id, "verification email failed");
    }

    info!(user_id = %user.id, "user registered");
    Ok(Registered { user_id: user.id })
}

#[instrument(skip_all)]
pub async fn verify_email(state: &AppState, token: &str) -> AuthResult<Session> {
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let Some(mut user) = state.store.find_by_verification_token(token).await? else {
        warn!("unknown verification token");
        return Err(AuthError::InvalidToken);
    };
    if is_expired(user.verification_expiry) {
        warn!(user_id = %user.id, "verification token expired");
        return Err(AuthError::InvalidToken);
    }

    let now = OffsetDateTime::now_utc();
    if !state
        .store
        .consume_verification_token(user.id, token, now)
        .await?
    {
        warn!(user_id = %user.id, "verification token already redeemed");
        return Err(AuthError::InvalidToken);
    }
    user.email_verified = true;
    user.verification_token = None;
    user.verification_expiry = None;
    user.last_login_at = Some(now);

    if let Err(e) = state
        .notifier
        .send_welcome(&user.email, &user.first_name)
        .await
    {
        warn!(error = %e, user_id = %user.id, "welcome email failed");
    }

    let session = open_session(state, &user)?;
    info!(user_id = %user.id, "email verified");
    Ok(session)
}

/// Always yields the same message whether or not the account exists.
#[instrument(skip_all)]
pub async fn forgot_password(state: &AppState, email: &str) -> AuthResult<&'static str> {
    match state.store.find_by_email(email).await? {
        None => debug!("password reset requested for unknown email"),
        Some(user) => {
            let (token, expiry) = TokenPolicy::Reset.issue()?;
            state.store.set_reset_token(user.id, &token, expiry).await?;
            if let Err(e) = state.notifier.send_password_reset(&user.email, &token).await {
                warn!(error = %e, user_id = %user.id, "reset email failed");
            }
            info!(user_id = %user.id, "password reset requested");
        }
    }
    Ok(FORGOT_PASSWORD_MESSAGE)
}

/// Does not open a session; the user logs in with the new password.
#[instrument(skip_all)]
pub async fn reset_password(state: &AppState, token: &str, new_password: &str) -> AuthResult<()> {
    if token.is_empty() {
        return Err(AuthError::InvalidToken);
    }
    let Some(user) = state.store.find_by_reset_token(token).await? else {
        warn!("unknown reset token");
        return Err(AuthError::InvalidToken);
    };
    if is_expired(user.reset_expiry) {
        warn!(user_id = %user.id, "reset token expired");
        return Err(AuthError::InvalidToken);
    }
    state.policy.validate(new_password)?;

    let password_hash = hash_password(new_password)?;
    if !state
        .store
        .consume_reset_token(user.id, token, &password_hash, OffsetDateTime::now_utc())
        .await?
    {
        warn!(user_id = %user.id, "reset token already redeemed");
        return Err(AuthError::InvalidToken);
    }
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Account status gates run before `verify` is called, so an unverified or
/// inactive account never reaches the hasher. `Err` carries the log reason.
fn authenticate<V>(user: &User, password: &str, verify: V) -> Result<(), &'static str>
where
    V: FnOnce(&str, &str) -> bool,
{
    if !user.email_verified {
        return Err("unverified account");
    }
    if !user.is_active {
        return Err("inactive account");
    }
    if !verify(password, &user.password_hash) {
        return Err("invalid password");
    }
    Ok(())
}

/// Every rejection carries the same message; the log records which check
/// failed. Order: existence, verified, active, password.
#[instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> AuthResult<Session> {
    let Some(mut user) = state.store.find_by_email(email).await? else {
        warn!("login unknown email");
        return Err(AuthError::invalid_credentials());
    };
    if let Err(reason) = authenticate(&user, password, verify_password) {
        warn!(user_id = %user.id, reason, "login rejected");
        return Err(AuthError::invalid_credentials());
    }

    let now = OffsetDateTime::now_utc();
    state.store.touch_last_login(user.id, now).await?;
    user.last_login_at = Some(now);

    let session = open_session(state, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(session)
}

/// Rebuilds the profile from the store; token claims are not reused.
#[instrument(skip(state))]
pub async fn profile(state: &AppState, user_id: Uuid) -> AuthResult<UserProfile> {
    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".into()))?;
    let access = ResolvedAccess::resolve(&user.roles);
    Ok(UserProfile::build(&user, &access))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::{
        auth::memory::InMemoryIdentityStore, config::AppConfig, notify::Notifier,
        seed::seed_identity, state::AppState,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Verification { to: String, token: String },
        Reset { to: String, token: String },
        Welcome { to: String },
    }

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Sent>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        fn record(&self, msg: Sent) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(msg);
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            Ok(())
        }

        pub fn all(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last_verification_token(&self) -> Option<String> {
            self.all().into_iter().rev().find_map(|m| match m {
                Sent::Verification { token, .. } => Some(token),
                _ => None,
            })
        }

        pub fn last_reset_token(&self) -> Option<String> {
            self.all().into_iter().rev().find_map(|m| match m {
                Sent::Reset { token, .. } => Some(token),
                _ => None,
            })
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_verification(&self, to: &str, token: &str) -> anyhow::Result<()> {
            self.record(Sent::Verification {
                to: to.into(),
                token: token.into(),
            })
        }
        async fn send_password_reset(&self, to: &str, token: &str) -> anyhow::Result<()> {
            self.record(Sent::Reset {
                to: to.into(),
                token: token.into(),
            })
        }
        async fn send_welcome(&self, to: &str, _first_name: &str) -> anyhow::Result<()> {
            self.record(Sent::Welcome { to: to.into() })
        }
    }

    pub struct Harness {
        pub state: AppState,
        pub store: Arc<InMemoryIdentityStore>,
        pub notifier: Arc<RecordingNotifier>,
    }

    pub async fn harness_with(notifier: RecordingNotifier) -> Harness {
        let store = Arc::new(InMemoryIdentityStore::new());
        seed_identity(store.as_ref(), None).await.expect("seed");
        let notifier = Arc::new(notifier);
        let state = AppState::from_parts(AppConfig::for_tests(), store.clone(), notifier.clone());
        Harness {
            state,
            store,
            notifier,
        }
    }

    pub async fn harness() -> Harness {
        harness_with(RecordingNotifier::default()).await
    }
}
