use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use std::time::Duration;

use crate::claims::{
    AccessClaims, ISSUER, RefreshClaims, Subject, TOKEN_TYPE_BEARER, TokenPair, new_jti,
};
use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: DeserializeOwned>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn split_token(token: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = token.split('.');
    let header = parts.next().ok_or(Error::Malformed)?;
    let claims = parts.next().ok_or(Error::Malformed)?;
    let signature = parts.next().ok_or(Error::Malformed)?;
    if parts.next().is_some() {
        return Err(Error::Malformed);
    }
    Ok((header, claims, signature))
}

fn sign_hs256<T: Serialize>(key: &[u8], claims: &T) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    let tag = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(tag.as_slice());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify the HS256 signature and return the raw claims document.
///
/// Any `alg` other than HS256 is rejected before signature work; an
/// attacker-supplied header never selects the verification algorithm.
fn verify_hs256(token: &str, key: &[u8]) -> Result<serde_json::Value, Error> {
    let (header_b64, claims_b64, sig_b64) = split_token(token)?;

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::WrongAlgorithm(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| Error::InvalidKey)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature).map_err(|_| Error::BadSignature)?;

    b64d_json(claims_b64)
}

/// Enforce `nbf <= now < exp` on a verified claims document.
fn enforce_window(claims: &serde_json::Value, now: i64, leeway: i64) -> Result<(), Error> {
    let exp = claims
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or(Error::Malformed)?;
    if exp <= now - leeway {
        return Err(Error::Expired);
    }
    if let Some(nbf) = claims.get("nbf").and_then(serde_json::Value::as_i64)
        && nbf > now + leeway
    {
        return Err(Error::NotYetValid);
    }
    Ok(())
}

/// Signs and verifies the gateway's access/refresh token pair.
///
/// The two lifetimes use independent secret keys; sharing them would let a
/// refresh token masquerade as an access token.
pub struct TokenSigner {
    access_key: Vec<u8>,
    refresh_key: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    audience: String,
}

impl TokenSigner {
    #[must_use]
    pub fn new(
        access_key: impl Into<Vec<u8>>,
        refresh_key: impl Into<Vec<u8>>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        audience: String,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            refresh_key: refresh_key.into(),
            access_ttl,
            refresh_ttl,
            audience,
        }
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issue an access/refresh pair for an authenticated subject.
    ///
    /// Both tokens are stamped `iat = nbf = now` and carry a fresh `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if claim encoding or signing fails.
    pub fn issue_pair(&self, subject: &Subject, now: i64) -> Result<TokenPair, Error> {
        let access_exp = now + i64::try_from(self.access_ttl.as_secs()).unwrap_or(i64::MAX);
        let refresh_exp = now + i64::try_from(self.refresh_ttl.as_secs()).unwrap_or(i64::MAX);

        let access = AccessClaims {
            user_id: subject.user_id,
            boddle_uid: subject.boddle_uid.clone(),
            email: subject.email.clone(),
            name: subject.name.clone(),
            meta_type: subject.meta_type.clone(),
            meta_id: subject.meta_id,
            iss: ISSUER.to_string(),
            sub: subject.user_id.to_string(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: access_exp,
            jti: new_jti(),
        };

        let refresh = RefreshClaims {
            iss: ISSUER.to_string(),
            sub: subject.user_id.to_string(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: refresh_exp,
            jti: new_jti(),
        };

        Ok(TokenPair {
            access_token: sign_hs256(&self.access_key, &access)?,
            refresh_token: sign_hs256(&self.refresh_key, &refresh)?,
            expires_at: access_exp,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    /// Verify an access token and return its decoded claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, carries a non-HS256
    /// algorithm, fails signature verification, or is outside its
    /// `nbf..exp` validity window (`leeway` widens the window on both ends).
    pub fn verify_access(
        &self,
        token: &str,
        now: i64,
        leeway: Duration,
    ) -> Result<AccessClaims, Error> {
        let value = verify_hs256(token, &self.access_key)?;
        enforce_window(&value, now, i64::try_from(leeway.as_secs()).unwrap_or(0))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Verify a refresh token against the refresh signing key.
    ///
    /// # Errors
    ///
    /// Same failure set as [`verify_access`](Self::verify_access).
    pub fn verify_refresh(
        &self,
        token: &str,
        now: i64,
        leeway: Duration,
    ) -> Result<RefreshClaims, Error> {
        let value = verify_hs256(token, &self.refresh_key)?;
        enforce_window(&value, now, i64::try_from(leeway.as_secs()).unwrap_or(0))?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Decode access claims without verifying the signature.
///
/// Only for flows that accept unsigned data, like recovering the `jti` of a
/// token that is being revoked anyway.
///
/// # Errors
///
/// Returns an error if the token cannot be parsed into the access claim set.
pub fn peek_access_claims(token: &str) -> Result<AccessClaims, Error> {
    let (_, claims_b64, _) = split_token(token)?;
    b64d_json(claims_b64)
}
