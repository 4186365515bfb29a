//! Type-safe Key-Value persistence for storefront session state.
//!
//! Provides a JSON-serializing [`Cache`] over a pluggable [`KvBackend`]
//! (in-memory on native targets, Spin's Key-Value Store on `wasm32`) and a
//! versioned [`SessionStore`] that keeps concurrent writers, such as two
//! browser tabs sharing one cart, from overwriting each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_cache::{Cache, SessionId, SessionStore};
//!
//! let store = SessionStore::<CartState>::new(Cache::in_memory(), "cart");
//! let session = SessionId::generate();
//!
//! // Read on session start
//! let cart = store.load_or_default(&session)?;
//!
//! // Write on every mutation
//! store.update(&session, |cart| {
//!     cart.lines.clear();
//!     Ok::<_, CacheError>(())
//! })?;
//!
//! // Drop on logout
//! store.delete(&session)?;
//! ```

mod error;
mod kv;
mod session;

pub use error::CacheError;
#[cfg(target_arch = "wasm32")]
pub use kv::SpinBackend;
pub use kv::{Cache, KvBackend, MemoryBackend};
pub use session::{SessionId, SessionRecord, SessionStore, MAX_UPDATE_RETRIES};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{Cache, CacheError, KvBackend, MemoryBackend, SessionId, SessionStore};
}
