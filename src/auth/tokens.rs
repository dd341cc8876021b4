use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// Random bytes per single-use token; hex-encoded to twice as many chars.
pub const TOKEN_BYTES: usize = 32;

/// Lifetime policies for single-use action tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    Verification,
    Reset,
}

impl TokenPolicy {
    pub fn ttl(self) -> Duration {
        match self {
            TokenPolicy::Verification => Duration::hours(24),
            TokenPolicy::Reset => Duration::hours(1),
        }
    }

    /// Fresh token plus its absolute expiry.
    pub fn issue(self) -> anyhow::Result<(String, OffsetDateTime)> {
        let token = generate_token(TOKEN_BYTES)?;
        Ok((token, OffsetDateTime::now_utc() + self.ttl()))
    }
}

/// Opaque hex token from the OS entropy source.
pub fn generate_token(byte_len: usize) -> anyhow::Result<String> {
    let mut buf = vec![0u8; byte_len];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(hex::encode(buf))
}

/// A missing expiry counts as expired.
pub fn is_expired(expiry: Option<OffsetDateTime>) -> bool {
    is_expired_at(expiry, OffsetDateTime::now_utc())
}

pub fn is_expired_at(expiry: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match expiry {
        Some(at) => now > at,
        None => true,
    }
}
