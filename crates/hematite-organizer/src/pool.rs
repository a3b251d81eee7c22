//! Dedicated worker pool for CPU-bound validation.
//!
//! Validation runs on its own runtime so block checking cannot starve
//! network dispatch. Awaiting a task returns the caller to its own
//! runtime at completion, which keeps the validation workers free and
//! bounds recursion depth across the organize pipeline.

use std::io;

use crate::config::OrganizerConfig;
use crate::domain::error::{OrganizeError, OrganizeResult};

/// A fixed-size runtime for validation work.
#[derive(Debug)]
pub struct ValidationPool {
    runtime: Option<tokio::runtime::Runtime>,
}

impl ValidationPool {
    /// Build a pool sized by the configured cores policy.
    pub fn new(config: &OrganizerConfig) -> io::Result<Self> {
        let name = if config.priority {
            "validation-priority"
        } else {
            "validation"
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.validation_cores())
            .thread_name(name)
            .build()?;

        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Run a CPU-bound task to completion on the pool.
    pub async fn run<F, T>(&self, task: F) -> OrganizeResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => runtime
                .spawn(async move { task() })
                .await
                .map_err(|_| OrganizeError::OperationFailed),
            None => Err(OrganizeError::ServiceStopped),
        }
    }
}

impl Drop for ValidationPool {
    fn drop(&mut self) {
        // The pool may be dropped from async context, where a blocking
        // runtime shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
