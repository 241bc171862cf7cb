//! Auth route handlers.

pub mod login;
pub mod logout;
pub mod magic_link;
pub mod me;
pub mod oauth;
pub mod types;
