//! Credential-keyed session pool.
//!
//! Sessions are created lazily on first use of a credential, authenticated,
//! wired to the listener dispatcher and kept until they sit idle past the
//! configured threshold or are destroyed explicitly.

pub mod pool;

pub use pool::{PoolConfig, SessionPool};
