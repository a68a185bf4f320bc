use thiserror::Error;

/// Errors surfaced by the object pool and the trie's serialized-form writer.
///
/// The `Cache` trait's CRUD surface deliberately does *not* use this type:
/// on an empty or cancelled operation, writes/reads resolve to `false`/empty
/// results rather than an `Err`. See the crate docs for the full
/// propagation policy.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("object pool is not initialized")]
    PoolNotInitialized,
    #[error("object pool initialized without a factory")]
    NilFactory,
    #[error("nil node passed to the trie writer")]
    NilNode,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
