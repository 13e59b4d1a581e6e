//! Consolidation of successive poll payloads into one held value

use std::sync::Arc;

/// Merge function: `(new payload, previously held value) -> new held value`
pub type Resolver<T> = Arc<dyn Fn(T, Option<&T>) -> T + Send + Sync>;

/// Applies the configured resolver, or hands the payload through unchanged
pub struct Consolidator<T> {
    resolve: Option<Resolver<T>>,
}

impl<T> Consolidator<T> {
    pub fn identity() -> Self {
        Self { resolve: None }
    }

    pub fn new(resolve: Option<Resolver<T>>) -> Self {
        Self { resolve }
    }

    /// Invoked on every success, including the first (`previous` is `None` then)
    pub fn merge(&self, data: T, previous: Option<&T>) -> T {
        match &self.resolve {
            Some(resolve) => resolve(data, previous),
            None => data,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.resolve.is_none()
    }
}

impl<T> Clone for Consolidator<T> {
    fn clone(&self) -> Self {
        Self { resolve: self.resolve.clone() }
    }
}

impl<T> std::fmt::Debug for Consolidator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("identity", &self.is_identity())
            .finish()
    }
}

/// Wrap a closure as a [`Resolver`]
pub fn resolver<T, F>(f: F) -> Resolver<T>
where
    F: Fn(T, Option<&T>) -> T + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Two resolvers are the same when they point at the same closure
pub(crate) fn same_resolver<T>(a: &Option<Resolver<T>>, b: &Option<Resolver<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
