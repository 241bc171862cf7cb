//! Key-value store adapters and the structures the gateway keeps in them.

mod backend;
mod blacklist;
mod memory;
mod rate_limit;
mod redis;

pub use backend::{KvBackend, KvError};
pub use blacklist::{Blacklist, Revocation};
pub use memory::MemoryStore;
pub use rate_limit::{
    Admission, DEFAULT_LOCKOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW, LimiterKey, RateLimiter,
};
pub use self::redis::RedisStore;
