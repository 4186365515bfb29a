//! Session-scoped, versioned state on top of the Key-Value store.

use crate::{cache_key, Cache, CacheError};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum retry attempts for optimistic concurrency control.
pub const MAX_UPDATE_RETRIES: u32 = 3;

/// A unique session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new session ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random session ID.
    pub fn generate() -> Self {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
        use rand::Rng;

        let bytes: [u8; 18] = rand::thread_rng().gen();
        Self(format!("sess_{}", URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Get the session ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A stored value together with its write version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord<T> {
    /// The session the value belongs to.
    pub id: SessionId,
    /// User-defined session data.
    pub data: T,
    /// Incremented on every successful write; 0 means "never written".
    pub version: u64,
    /// When the record was first written (Unix timestamp).
    pub created_at: u64,
    /// When the record was last written (Unix timestamp).
    pub updated_at: u64,
}

/// Versioned store for one kind of session data.
///
/// Values are kept under `"{namespace}:{session_id}"`. Writers go through
/// [`SessionStore::update_with`], which re-reads the latest record, applies
/// the caller's change and writes it back only if nobody else wrote in
/// between; otherwise the change is replayed on the newer record.
///
/// # Example
///
/// ```rust,ignore
/// let store = SessionStore::<CartState>::new(Cache::in_memory(), "cart");
/// let id = SessionId::generate();
/// let (record, ()) = store.update(&id, |cart| {
///     cart.lines.clear();
///     Ok::<_, CacheError>(())
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct SessionStore<T> {
    cache: Cache,
    namespace: String,
    _phantom: std::marker::PhantomData<fn() -> T>,
}

impl<T> SessionStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Create a store that keeps its records under `namespace`.
    pub fn new(cache: Cache, namespace: impl Into<String>) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            _phantom: std::marker::PhantomData,
        }
    }

    /// The key namespace of this store.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Load the record for a session, if one was ever written.
    pub fn load(&self, id: &SessionId) -> Result<Option<SessionRecord<T>>, CacheError> {
        self.cache.get(&self.key(id))
    }

    /// Delete a session's record.
    pub fn delete(&self, id: &SessionId) -> Result<(), CacheError> {
        debug!(session = %id, namespace = %self.namespace, "deleting session record");
        self.cache.delete(&self.key(id))
    }

    /// Check if a session has a stored record.
    pub fn exists(&self, id: &SessionId) -> Result<bool, CacheError> {
        self.cache.exists(&self.key(id))
    }

    /// Apply `f` to the latest value with optimistic concurrency control.
    ///
    /// `init` supplies the value when the session has no record yet. If `f`
    /// returns an error nothing is written. On a version conflict `f` is run
    /// again against the newer value, up to [`MAX_UPDATE_RETRIES`] times.
    ///
    /// # Returns
    /// - `Ok((record, output))` - the record as written and `f`'s output
    /// - `Err(e)` - `f`'s error, or `CacheError::ConcurrentModification`
    ///   (converted into `E`) once all retries failed
    pub fn update_with<R, E, I, F>(
        &self,
        id: &SessionId,
        init: I,
        mut f: F,
    ) -> Result<(SessionRecord<T>, R), E>
    where
        I: Fn() -> T,
        F: FnMut(&mut T) -> Result<R, E>,
        E: From<CacheError>,
    {
        let key = self.key(id);

        for attempt in 0..MAX_UPDATE_RETRIES {
            let raw = self.cache.get_raw(&key)?;
            let current: Option<SessionRecord<T>> = match raw.as_deref() {
                Some(bytes) => Some(serde_json::from_slice(bytes).map_err(CacheError::from)?),
                None => None,
            };

            let now = current_timestamp();
            let (mut data, version, created_at) = match current {
                Some(record) => (record.data, record.version, record.created_at),
                None => (init(), 0, now),
            };

            let output = f(&mut data)?;

            let record = SessionRecord {
                id: id.clone(),
                data,
                version: version + 1,
                created_at,
                updated_at: now,
            };

            if self.cache.set_if_unchanged(&key, raw.as_deref(), &record)? {
                return Ok((record, output));
            }

            warn!(
                session = %id,
                namespace = %self.namespace,
                attempt,
                "concurrent session write detected, replaying update"
            );
        }

        Err(CacheError::ConcurrentModification {
            key,
            attempts: MAX_UPDATE_RETRIES,
        }
        .into())
    }

    fn key(&self, id: &SessionId) -> String {
        cache_key!(self.namespace.as_str(), id)
    }
}

impl<T> SessionStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Default,
{
    /// Load a session's value, or the default when nothing is stored.
    pub fn load_or_default(&self, id: &SessionId) -> Result<T, CacheError> {
        Ok(self.load(id)?.map(|record| record.data).unwrap_or_default())
    }

    /// [`SessionStore::update_with`] starting from `T::default()`.
    pub fn update<R, E, F>(&self, id: &SessionId, f: F) -> Result<(SessionRecord<T>, R), E>
    where
        F: FnMut(&mut T) -> Result<R, E>,
        E: From<CacheError>,
    {
        self.update_with(id, T::default, f)
    }
}

/// Get current Unix timestamp.
fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
