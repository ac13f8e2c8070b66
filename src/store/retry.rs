use std::cell::RefCell;
use std::thread::sleep;
use std::time::Duration;

use tracing::warn;

use super::{Blob, BlobStore, StoreError};

/// Wrapper that retries unavailable-backend errors with exponential backoff.
///
/// The delay starts at `base_delay` and doubles after each failed attempt.
/// Conflicts and malformed data are returned immediately.
pub struct RetryingStore<S> {
    inner: RefCell<S>,
    max_retries: u32,
    base_delay: Duration,
}

impl<S> RetryingStore<S> {
    /// Create a new `RetryingStore` wrapping `inner`.
    pub fn new(inner: S, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner: RefCell::new(inner),
            max_retries,
            base_delay,
        }
    }

    fn with_retry<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut S) -> Result<T, StoreError>,
    {
        let mut attempt = 0;
        loop {
            let result = op(&mut self.inner.borrow_mut());
            match result {
                Ok(val) => return Ok(val),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let factor = 2f64.powi(attempt as i32);
                    let delay = self.base_delay.mul_f64(factor);
                    warn!(attempt, ?delay, error = %e, "Store call failed, retrying");
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: BlobStore> BlobStore for RetryingStore<S> {
    fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        self.with_retry(|inner| inner.get(path))
    }

    fn put(
        &mut self,
        path: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<String, StoreError> {
        self.with_retry(|inner| inner.put(path, content, expected_version))
    }
}
