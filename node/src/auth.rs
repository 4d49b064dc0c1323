//! HMAC-SHA-based RPC auth token layer (spec §6).
//!
//! Tokens are `hex(payload) || "." || hex(HMAC-SHA256(secret, payload))`,
//! where `payload` is the JSON encoding of [`Claims`]. Grounded on the
//! teacher's `JWT_PRIVATE_KEY_NAME`/admin-token handling in
//! `fil_actors_runtime`'s test harness style of "a permission set attached to
//! a signed token", simplified to a single symmetric secret since this
//! engine has one operator, not a DID-issued key set.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "Allow")]
    pub allow: Vec<Permission>,
}

impl Claims {
    pub fn allows(&self, perm: Permission) -> bool {
        self.allow.contains(&perm)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature does not match")]
    BadMac,
    #[error("token payload is not valid JSON")]
    BadPayload,
}

/// Issues a token authorizing `claims`, signed with `secret`.
pub fn issue(secret: &[u8], claims: &Claims) -> String {
    let payload = serde_json::to_vec(claims).expect("Claims always serializes");
    let payload_hex = hex::encode(&payload);
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&payload);
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("{}.{}", payload_hex, sig)
}

/// Verifies `token` against `secret` and returns its claims.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims, AuthError> {
    let (payload_hex, sig_hex) = token.split_once('.').ok_or(AuthError::Malformed)?;
    let payload = hex::decode(payload_hex).map_err(|_| AuthError::Malformed)?;
    let expected_sig = hex::decode(sig_hex).map_err(|_| AuthError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&payload);
    mac.verify_slice(&expected_sig).map_err(|_| AuthError::BadMac)?;

    serde_json::from_slice(&payload).map_err(|_| AuthError::BadPayload)
}

/// Gate attached to the RPC handler. `None` (no configured secret) means
/// every method is reachable, per spec §6 ("When disabled, all methods are
/// reachable").
pub enum AuthGate {
    Disabled,
    Enabled { secret: Vec<u8> },
}

impl AuthGate {
    pub fn disabled() -> Self {
        AuthGate::Disabled
    }

    pub fn enabled(secret: impl Into<Vec<u8>>) -> Self {
        AuthGate::Enabled { secret: secret.into() }
    }

    pub fn check(&self, token: Option<&str>, required: Permission) -> Result<(), AuthError> {
        match self {
            AuthGate::Disabled => Ok(()),
            AuthGate::Enabled { secret } => {
                let token = token.ok_or(AuthError::Malformed)?;
                let claims = verify(secret, token)?;
                if claims.allows(required) {
                    Ok(())
                } else {
                    Err(AuthError::BadMac)
                }
            }
        }
    }
}
