//! Extension trait for `axum::Router` to layer the Treblle middleware.

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::Treblle;
use crate::middleware::treblle_middleware;

/// Extension trait for `axum::`[`Router`] for layering the Treblle middleware.
pub trait RouterExt<S> {
    /// Layers the Treblle observation middleware.
    ///
    /// Only routes added before this call are observed, following
    /// [`Router::layer`] semantics. Unmatched requests reaching the default
    /// fallback are observed as well.
    fn with_treblle(self, treblle: Treblle) -> Self;
}

impl<S> RouterExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_treblle(self, treblle: Treblle) -> Self {
        self.layer(from_fn_with_state(treblle, treblle_middleware))
    }
}
