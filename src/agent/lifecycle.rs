//! Lifecycle hook guards.
//!
//! Start and stop hook bodies run in their own task so a panic inside a hook
//! surfaces as a `JoinError` instead of unwinding the caller. The stop guard
//! always requests a process-wide shutdown afterwards, giving the supervisor
//! loop a chance to roll back whatever the hooks left behind.

use std::future::Future;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("panic occurred during the agent start hook")]
    StartPanic,
    #[error("panic occurred during the agent stop hook")]
    StopPanic,
    #[error("shutdown request failed after the agent stop hook")]
    ShutdownPanic,
}

/// Runs a start hook, translating a panic into [`LifecycleError::StartPanic`].
pub async fn guarded_start<F>(hook: F) -> Result<(), LifecycleError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::spawn(hook).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_panic() => {
            error!(%err, "start hook panicked");
            Err(LifecycleError::StartPanic)
        }
        // Cancelled: the runtime is already going away.
        Err(_) => Ok(()),
    }
}

/// Runs a stop hook, translating a panic into [`LifecycleError::StopPanic`].
///
/// Whatever the hook did, a process shutdown is requested on `shutdown`
/// afterwards; an undeliverable request is reported as
/// [`LifecycleError::ShutdownPanic`].
pub async fn guarded_stop<F>(
    hook: F,
    shutdown: &broadcast::Sender<()>,
) -> Result<(), LifecycleError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let result = match tokio::spawn(hook).await {
        Ok(()) => Ok(()),
        Err(err) if err.is_panic() => {
            error!(%err, "stop hook panicked");
            Err(LifecycleError::StopPanic)
        }
        Err(_) => Ok(()),
    };

    if shutdown.send(()).is_err() {
        error!("shutdown request could not be delivered, no listener remains");
        return Err(LifecycleError::ShutdownPanic);
    }

    result
}
