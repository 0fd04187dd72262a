//! Downstream event callback.

use crate::error::ListenerError;

/// Application-side consumer of inbound events.
///
/// Called from worker threads; the originating tenant is available through
/// [`TenantFlow::current`](crate::TenantFlow::current) for the duration of
/// the call.
pub trait EventListener: Send + Sync {
    fn on_event(&self, payload: &str) -> Result<(), ListenerError>;
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F>(pub F);

impl<F> EventListener for FnListener<F>
where
    F: Fn(&str) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, payload: &str) -> Result<(), ListenerError> {
        (self.0)(payload)
    }
}
