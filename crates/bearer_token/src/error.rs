use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed token")]
    Malformed,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unexpected signing algorithm: {0}")]
    WrongAlgorithm(String),
    #[error("invalid signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("invalid signing key")]
    InvalidKey,
    #[error("failed to parse private key")]
    KeyParse,
}
