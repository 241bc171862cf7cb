//! Signed bearer token codec for the Boddle authentication gateway.
//!
//! Two token lifetimes, two keys, one algorithm family: access and refresh
//! tokens are compact HS256 JWTs signed with independent secrets. A separate
//! ES256 signer produces the short-lived client assertion Apple requires at
//! its token endpoint.
//!
//! Verification rejects any signing algorithm other than the expected one
//! before looking at the signature, which closes the classic `alg`-swap
//! family of JWT attacks.

mod assertion;
mod claims;
mod error;
mod jwt;

pub use assertion::{AssertionClaims, AssertionSigner, MAX_ASSERTION_TTL_SECONDS};
pub use claims::{
    AccessClaims, ISSUER, RefreshClaims, Subject, TOKEN_TYPE_BEARER, TokenPair, new_jti,
};
pub use error::Error;
pub use jwt::{TokenHeader, TokenSigner, peek_access_claims};
