use std::sync::Arc;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::{claims::SessionClaims, rbac::ResolvedAccess, repo_types::User};
use crate::{config::SessionConfig, state::AppState};

/// Signing material built once at startup. Cloning shares the keys.
#[derive(Clone)]
pub struct SessionKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("issuer", &self.inner.issuer)
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
                decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
                issuer: cfg.issuer.clone(),
                ttl: Duration::hours(cfg.ttl_hours),
            }),
        }
    }

    /// Signs claims for `user` using the role/permission snapshot in `access`.
    pub fn issue(&self, user: &User, access: &ResolvedAccess) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.inner.ttl;
        let claims = SessionClaims {
            user_id: user.id,
            email: user.email.clone(),
            roles: access.roles.clone(),
            permissions: access.permissions.iter().cloned().collect(),
            organization_id: user.organization_id,
            iss: self.inner.issuer.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &SessionClaims) -> anyhow::Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.inner.encoding)?;
        debug!(user_id = %claims.user_id, "session token signed");
        Ok(token)
    }

    /// Checks signature, issuer and expiry only; claims are not compared with
    /// the store.
    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(std::slice::from_ref(&self.inner.issuer));
        validation.leeway = 0;
        let data = decode::<SessionClaims>(token, &self.inner.decoding, &validation)?;
        debug!(user_id = %data.claims.user_id, "session token verified");
        Ok(data.claims)
    }
}
