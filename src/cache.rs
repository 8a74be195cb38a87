//! Once-resolved values
//!
//! Some values come from a remote lookup that only needs to happen once per
//! process (the ODFI's ledger account ID). [`OnceResolver`] runs the lookup
//! on first use and hands out the stored value afterwards. A failed lookup
//! stores nothing, so the next caller tries again.

use std::future::Future;
use tokio::sync::OnceCell;

#[derive(Debug)]
pub struct OnceResolver<T> {
    cell: OnceCell<T>,
}

impl<T> Default for OnceResolver<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T: Clone> OnceResolver<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already resolved value, if any.
    pub fn get(&self) -> Option<T> {
        self.cell.get().cloned()
    }

    /// Return the stored value or run `resolve` to produce it. Concurrent
    /// callers wait for a single in-flight resolution.
    pub async fn get_or_resolve<F, Fut, E>(&self, resolve: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(resolve).await.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_resolves_once() {
        let resolver = OnceResolver::<String>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = resolver
                .get_or_resolve(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("acct-1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "acct-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.get().as_deref(), Some("acct-1"));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let resolver = OnceResolver::<u64>::new();

        let err = resolver
            .get_or_resolve(|| async { Err::<u64, _>("unavailable") })
            .await
            .unwrap_err();
        assert_eq!(err, "unavailable");
        assert!(resolver.get().is_none());

        let value = resolver
            .get_or_resolve(|| async { Ok::<_, &str>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
