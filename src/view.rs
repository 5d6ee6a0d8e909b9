use crate::credentials::{CredentialBundle, LoadError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

/// What the page currently shows. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Error { message: String },
    Ready(CredentialBundle),
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Error { .. } => "error",
            ViewState::Ready(_) => "ready",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid view transition from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

/// Result of a write attempt that passed the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The page was unmounted before the write; nothing changed.
    Discarded,
}

/// Liveness flag captured when a request starts. Cleared on unmount.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Shared slot holding one page's [`ViewState`].
///
/// Every write takes the state lock and re-checks liveness while holding it;
/// `unmount` clears liveness under the same lock, so once it returns no
/// further write can land.
#[derive(Debug, Clone)]
pub struct ViewSlot {
    state: Arc<Mutex<ViewState>>,
    alive: Arc<AtomicBool>,
}

impl Default for ViewSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewSlot {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ViewState::Loading)),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn liveness(&self) -> Liveness {
        Liveness(self.alive.clone())
    }

    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.lock().await.clone()
    }

    /// Applies the loader's single result: `Loading -> Ready | Error`.
    pub async fn settle(
        &self,
        liveness: &Liveness,
        result: Result<CredentialBundle, LoadError>,
    ) -> Result<WriteOutcome, TransitionError> {
        let mut state = self.state.lock().await;
        if !liveness.is_alive() {
            return Ok(WriteOutcome::Discarded);
        }
        let next = match result {
            Ok(bundle) => ViewState::Ready(bundle),
            Err(err) => ViewState::Error {
                message: err.to_string(),
            },
        };
        if *state != ViewState::Loading {
            return Err(TransitionError {
                from: state.name(),
                to: next.name(),
            });
        }
        *state = next;
        Ok(WriteOutcome::Applied)
    }

    /// Records a widget-reported failure: `Ready -> Error`.
    pub async fn fail_widget(
        &self,
        message: impl Into<String>,
    ) -> Result<WriteOutcome, TransitionError> {
        let mut state = self.state.lock().await;
        if !self.is_mounted() {
            return Ok(WriteOutcome::Discarded);
        }
        if !matches!(*state, ViewState::Ready(_)) {
            return Err(TransitionError {
                from: state.name(),
                to: "error",
            });
        }
        *state = ViewState::Error {
            message: message.into(),
        };
        Ok(WriteOutcome::Applied)
    }

    pub async fn unmount(&self) {
        let _state = self.state.lock().await;
        self.alive.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> CredentialBundle {
        CredentialBundle {
            token: "t".into(),
            embed_url: "u".into(),
            report_id: "r".into(),
        }
    }

    #[tokio::test]
    async fn starts_loading_and_settles_ready() {
        let slot = ViewSlot::new();
        assert_eq!(slot.snapshot().await, ViewState::Loading);
        let outcome = slot.settle(&slot.liveness(), Ok(bundle())).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Applied);
        assert_eq!(slot.snapshot().await, ViewState::Ready(bundle()));
    }

    #[tokio::test]
    async fn load_failure_becomes_error() {
        let slot = ViewSlot::new();
        slot.settle(&slot.liveness(), Err(LoadError::MissingField("reportId")))
            .await
            .unwrap();
        assert_eq!(
            slot.snapshot().await,
            ViewState::Error {
                message: "No reportId returned from /embed-token".into()
            }
        );
    }

    #[tokio::test]
    async fn loader_settles_only_once() {
        let slot = ViewSlot::new();
        let liveness = slot.liveness();
        slot.settle(&liveness, Ok(bundle())).await.unwrap();
        let err = slot
            .settle(&liveness, Err(LoadError::MissingField("embedUrl")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: "ready",
                to: "error"
            }
        );
        assert_eq!(slot.snapshot().await, ViewState::Ready(bundle()));
    }

    #[tokio::test]
    async fn widget_failure_requires_ready() {
        let slot = ViewSlot::new();
        assert!(slot.fail_widget("boom").await.is_err());

        slot.settle(&slot.liveness(), Ok(bundle())).await.unwrap();
        slot.fail_widget("boom").await.unwrap();
        assert_eq!(
            slot.snapshot().await,
            ViewState::Error {
                message: "boom".into()
            }
        );
        // Error is terminal.
        assert!(slot.fail_widget("again").await.is_err());
    }

    #[tokio::test]
    async fn writes_after_unmount_are_discarded() {
        let slot = ViewSlot::new();
        let liveness = slot.liveness();
        slot.unmount().await;
        assert!(!liveness.is_alive());
        let outcome = slot.settle(&liveness, Ok(bundle())).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Discarded);
        assert_eq!(slot.snapshot().await, ViewState::Loading);
    }
}
