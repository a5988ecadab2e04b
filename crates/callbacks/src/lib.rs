//! Callbacks triggered by signs drawn next to a plate.
//!
//! Only `review` has an implementation; `db` and `bucket` are recognised
//! names that resolve to "not found" until they get one.

pub mod mailer;
pub mod review;

use colonylab_core::callback::CallbackRegistry;
use std::sync::Arc;

pub use mailer::{Email, Mailer, ResendMailer};
pub use review::{ReviewCallback, ReviewSettings};

/// The registry the service runs with.
pub fn default_registry(review: ReviewCallback) -> CallbackRegistry {
    let mut registry = CallbackRegistry::new();
    registry.register(Arc::new(review));
    registry
}
