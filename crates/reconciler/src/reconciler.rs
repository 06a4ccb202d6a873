//! Reconciler contract and host lifecycle adapter.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use xsoar_core::{Diagnostics, ObjectKind};

use crate::error::Result;

/// Create/read/update/delete/import for one object kind.
///
/// The host runs at most one operation per object at a time; every
/// operation works on value snapshots and returns fresh canonical state.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Desired configuration.
    type Spec: Send + Sync;
    /// Canonical state.
    type State: Send + Sync;

    fn kind(&self) -> ObjectKind;

    /// Create the remote object and return its canonical state.
    async fn create(&self, desired: &Self::Spec) -> Result<Self::State>;

    /// Re-read the object. `Error::NotFound` means it is gone.
    async fn read(&self, last: &Self::State) -> Result<Self::State>;

    /// Apply the planned in-place writes, then re-read.
    async fn update(&self, desired: &Self::Spec, last: &Self::State) -> Result<Self::State>;

    /// Delete the object; already-absent is success.
    async fn delete(&self, last: &Self::State) -> Result<()>;

    /// Discover an existing object by its external identifier.
    async fn import(&self, id: &str) -> Result<Self::State>;
}

/// A lifecycle operation requested by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation<S, T> {
    Create(S),
    Read(T),
    Update { desired: S, last: T },
    Delete(T),
    Import { id: String },
}

impl<S, T> Operation<S, T> {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Read(_) => "read",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
            Self::Import { .. } => "import",
        }
    }
}

/// What the host should do with its tracked state.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Store this state.
    State(T),
    /// Drop the object from tracked state.
    Removed,
    /// Keep the previous state and report.
    Failed(Diagnostics),
}

impl<T> Outcome<T> {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub const fn state(&self) -> Option<&T> {
        match self {
            Self::State(state) => Some(state),
            Self::Removed | Self::Failed(_) => None,
        }
    }
}

/// Run one host operation and translate the result.
pub async fn drive<R>(reconciler: &R, operation: Operation<R::Spec, R::State>) -> Outcome<R::State>
where
    R: Reconcile + ?Sized,
{
    let kind = reconciler.kind();
    let name = operation.name();
    debug!(%kind, resource = kind.type_name(), operation = name, "Reconciling");

    let result = match operation {
        Operation::Create(desired) => reconciler.create(&desired).await.map(Some),
        Operation::Read(last) => match reconciler.read(&last).await {
            Err(err) if err.is_not_found() => {
                info!(%kind, error = %err, "Object is gone, removing from state");
                Ok(None)
            }
            other => other.map(Some),
        },
        Operation::Update { desired, last } => reconciler.update(&desired, &last).await.map(Some),
        Operation::Delete(last) => reconciler.delete(&last).await.map(|()| None),
        Operation::Import { id } => reconciler.import(&id).await.map(Some),
    };

    match result {
        Ok(Some(state)) => Outcome::State(state),
        Ok(None) => Outcome::Removed,
        Err(err) => {
            warn!(%kind, resource = kind.type_name(), operation = name, error = %err, "Reconcile failed");
            Outcome::Failed(err.to_diagnostic().into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Counter objects keyed by name; `missing` never exists.
    struct Counters;

    #[async_trait]
    impl Reconcile for Counters {
        type Spec = String;
        type State = String;

        fn kind(&self) -> ObjectKind {
            ObjectKind::Classifier
        }

        async fn create(&self, desired: &String) -> Result<String> {
            Ok(desired.clone())
        }

        async fn read(&self, last: &String) -> Result<String> {
            if last == "missing" {
                Err(Error::not_found(self.kind(), last))
            } else {
                Ok(last.clone())
            }
        }

        async fn update(&self, _desired: &String, _last: &String) -> Result<String> {
            Err(Error::replacement_required(self.kind(), vec!["name"]))
        }

        async fn delete(&self, _last: &String) -> Result<()> {
            Ok(())
        }

        async fn import(&self, id: &str) -> Result<String> {
            Err(Error::not_found(self.kind(), id))
        }
    }

    #[tokio::test]
    async fn test_read_not_found_removes() {
        let outcome = drive(&Counters, Operation::Read("missing".to_string())).await;
        assert_eq!(outcome, Outcome::Removed);
    }

    #[tokio::test]
    async fn test_read_found_returns_state() {
        let outcome = drive(&Counters, Operation::Read("a".to_string())).await;
        assert_eq!(outcome.state().map(String::as_str), Some("a"));
    }

    #[tokio::test]
    async fn test_delete_removes() {
        let outcome = drive(&Counters, Operation::Delete("a".to_string())).await;
        assert_eq!(outcome, Outcome::Removed);
    }

    #[tokio::test]
    async fn test_errors_become_diagnostics() {
        let outcome = drive(
            &Counters,
            Operation::Update {
                desired: "b".to_string(),
                last: "a".to_string(),
            },
        )
        .await;
        assert!(outcome.is_failed());

        let outcome = drive(&Counters, Operation::Import { id: "x".to_string() }).await;
        assert!(matches!(outcome, Outcome::Failed(d) if d.has_error()));
    }
}
