//! Signed form-link tokens.
//!
//! A token is `base64url(claims) "." base64url(hmac_sha256(base64url(claims)))`.
//! It binds a link to one input request and expires with the request's
//! deadline, so a leaked link cannot be replayed against a later pause.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a form token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormClaims {
    /// Input request id.
    pub rid: Uuid,
    /// Execution id.
    pub eid: Uuid,
    pub step: u32,
    /// Expiry as unix seconds.
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed form token")]
    Malformed,

    #[error("form token signature is invalid")]
    BadSignature,

    #[error("form token has expired")]
    Expired,
}

/// Issues and verifies form tokens with one HMAC key.
#[derive(Clone)]
pub struct FormTokenSigner {
    secret: SecretString,
}

impl FormTokenSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    /// Token for request `rid` of execution `eid`, valid until `expires_at`.
    pub fn sign(
        &self,
        rid: Uuid,
        eid: Uuid,
        step: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = FormClaims {
            rid,
            eid,
            step,
            exp: expires_at.timestamp(),
        };
        let json = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Check signature first, then expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<FormClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: FormClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if now.timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for FormTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormTokenSigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signer(secret: &str) -> FormTokenSigner {
        FormTokenSigner::new(SecretString::from(secret.to_string()))
    }

    #[test]
    fn test_sign_and_verify() {
        let s = signer("k1");
        let (rid, eid) = (Uuid::now_v7(), Uuid::now_v7());
        let token = s.sign(rid, eid, 2, Utc::now() + Duration::minutes(5)).unwrap();

        let claims = s.verify(&token, Utc::now()).unwrap();
        assert_eq!(claims.rid, rid);
        assert_eq!(claims.eid, eid);
        assert_eq!(claims.step, 2);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = signer("k1")
            .sign(Uuid::now_v7(), Uuid::now_v7(), 1, Utc::now() + Duration::minutes(5))
            .unwrap();
        assert_eq!(
            signer("k2").verify(&token, Utc::now()).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let s = signer("k1");
        let token = s
            .sign(Uuid::now_v7(), Uuid::now_v7(), 1, Utc::now() + Duration::minutes(5))
            .unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = FormClaims {
            rid: Uuid::now_v7(),
            eid: Uuid::now_v7(),
            step: 1,
            exp: i64::MAX,
        };
        let forged = format!(
            "{}.{sig}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap())
        );
        assert_eq!(s.verify(&forged, Utc::now()).unwrap_err(), TokenError::BadSignature);
        assert_eq!(s.verify("garbage", Utc::now()).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_expired_token() {
        let s = signer("k1");
        let token = s
            .sign(Uuid::now_v7(), Uuid::now_v7(), 1, Utc::now() - Duration::seconds(5))
            .unwrap();
        assert_eq!(s.verify(&token, Utc::now()).unwrap_err(), TokenError::Expired);
    }
}
