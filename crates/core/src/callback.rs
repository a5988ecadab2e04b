//! Callback trait: actions triggered by signs drawn next to a plate.
//!
//! The sign detector reports shapes of type `callback` with a name (first
//! line inside the shape) and key/value parameters (remaining lines). Each
//! name maps to a [`Callback`] in the [`CallbackRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::error::CallbackError;

/// The callback names a sign may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    /// Ask a team member to review the report
    Review,
    /// Record the result in the database
    Db,
    /// Store the result in a bucket
    Bucket,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Db => "db",
            Self::Bucket => "bucket",
        }
    }
}

impl std::fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallbackKind {
    type Err = CallbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "review" => Ok(Self::Review),
            "db" => Ok(Self::Db),
            "bucket" => Ok(Self::Bucket),
            other => Err(CallbackError::NotFound(other.to_string())),
        }
    }
}

/// Everything a callback receives when a sign fires it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackInvocation {
    /// Key/value pairs read from the sign
    pub parameters: BTreeMap<String, String>,

    /// The report produced for the image
    pub data: String,
}

/// What a callback did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackOutcome {
    pub name: CallbackKind,

    #[serde(default)]
    pub data: serde_json::Value,
}

#[async_trait]
pub trait Callback: Send + Sync {
    fn kind(&self) -> CallbackKind;

    async fn execute(&self, invocation: CallbackInvocation) -> Result<CallbackOutcome, CallbackError>;
}

/// Registered callbacks, keyed by kind.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<CallbackKind, Arc<dyn Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Arc<dyn Callback>) {
        self.callbacks.insert(callback.kind(), callback);
    }

    /// Resolve a name reported by the model. Names outside the known
    /// vocabulary and known names without an implementation both fail.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Callback>, CallbackError> {
        let kind: CallbackKind = name.parse()?;
        self.callbacks
            .get(&kind)
            .cloned()
            .ok_or_else(|| CallbackError::NotFound(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<CallbackKind> {
        let mut kinds: Vec<_> = self.callbacks.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopReview;

    #[async_trait]
    impl Callback for NoopReview {
        fn kind(&self) -> CallbackKind {
            CallbackKind::Review
        }

        async fn execute(&self, invocation: CallbackInvocation) -> Result<CallbackOutcome, CallbackError> {
            Ok(CallbackOutcome {
                name: CallbackKind::Review,
                data: serde_json::json!({ "chars": invocation.data.len() }),
            })
        }
    }

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!("Review".parse::<CallbackKind>().unwrap(), CallbackKind::Review);
        assert_eq!(" db ".parse::<CallbackKind>().unwrap(), CallbackKind::Db);
        assert!("email".parse::<CallbackKind>().is_err());
    }

    #[tokio::test]
    async fn registry_resolves_registered_callbacks() {
        let mut registry = CallbackRegistry::new();
        registry.register(Arc::new(NoopReview));

        let callback = registry.resolve("review").unwrap();
        let outcome = callback
            .execute(CallbackInvocation { data: "report".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(outcome.name, CallbackKind::Review);
        assert_eq!(outcome.data["chars"], 6);
    }

    #[test]
    fn known_but_unregistered_kind_is_not_found() {
        let registry = CallbackRegistry::new();
        let err = registry.resolve("bucket").err().unwrap();
        assert!(matches!(err, CallbackError::NotFound(ref n) if n == "bucket"));
        assert_eq!(err.to_string(), "Callback bucket not found");
    }
}
