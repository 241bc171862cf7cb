//! Authentication flows and the downstream validator contract.

pub mod legacy;
pub mod magic_link;
pub mod password;
mod session;
mod validator;

pub use legacy::{LegacyAuthenticator, LegacySubject, NoopLegacyAuthenticator};
pub use session::{LoginError, LoginOutcome, MagicLinkError, SessionService};
pub use validator::{CLOCK_SKEW, TokenValidator, ValidateError, extract_bearer};
