//! Email normalization and password verification.
//!
//! The directory stores cost-10 bcrypt digests; verification goes through
//! the bcrypt comparison, which is constant-time over the digest. Shape
//! checks here are pragmatic: they exist to reject junk before a directory
//! read, not to validate RFC 5322.

use regex::Regex;

pub const MIN_PASSWORD_LENGTH: usize = 3;
const MAX_EMAIL_LENGTH: usize = 254;

/// Normalize an email for lookups: trim surrounding whitespace, case-fold.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check on already-normalized input: one `@`, a dot in the domain,
/// no spaces.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Passwords are only checked for presence and a minimum length; the
/// directory's hashing function dictates everything else.
#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LENGTH
}

/// Compare a candidate password against a stored bcrypt digest.
///
/// Malformed digests and mismatches both read as "no": the caller must not
/// be able to distinguish a missing subject from a bad password.
#[must_use]
pub fn verify_digest(password: &str, digest: &str) -> bool {
    bcrypt::verify(password, digest).unwrap_or(false)
}
