//! Bounded, failure-isolated adapter fan-out.
//!
//! Each call runs as its own task. At most `max_concurrency` calls of one
//! fan-out run at once, every call has its own deadline, and one call's
//! failure or timeout never cancels its siblings. Spawned calls keep running
//! if the caller stops waiting, so an external event is never left
//! half-created by a dropped request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use calbook_providers::{ProviderError, ProviderResult};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::config::FanOutSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    max_concurrency: usize,
    call_timeout: Duration,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::from_settings(&FanOutSettings::default())
    }
}

impl FanOut {
    pub fn new(max_concurrency: usize, call_timeout: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            call_timeout,
        }
    }

    pub fn from_settings(settings: &FanOutSettings) -> Self {
        Self::new(settings.max_concurrency, settings.adapter_timeout())
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Runs `call` for every item and returns the results in item order.
    pub async fn run<I, F, Fut, T>(&self, items: I, mut call: F) -> Vec<ProviderResult<T>>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = ProviderResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let call_timeout = self.call_timeout;

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let fut = call(item);
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| ProviderError::internal("fan-out pool closed"))?;
                    match tokio::time::timeout(call_timeout, fut).await {
                        Ok(result) => result,
                        Err(_) => Err(ProviderError::timeout(format!(
                            "no response within {}s",
                            call_timeout.as_secs_f64()
                        ))),
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "adapter task aborted");
                Err(ProviderError::internal(format!("adapter task aborted: {}", e)))
            }));
        }
        results
    }
}
