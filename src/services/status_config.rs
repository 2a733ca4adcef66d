use crate::error::Result;
use crate::models::PreferenceConfig;
use crate::state_machine::guards::{classify, TransitionValidator, TransitionVerdict};
use crate::state_machine::persistence::StatusConfigStore;
use crate::state_machine::states::ApplicationStatus;
use std::sync::Arc;
use tracing::instrument;

/// A status the application could move to next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailableTransition {
    pub status: ApplicationStatus,
    /// Backward move: needs `confirm_backward` (and possibly a note) on update
    pub requires_confirmation: bool,
}

/// Read-only view of flow templates and owner preferences
pub struct StatusConfigService<C: StatusConfigStore + ?Sized> {
    store: Arc<C>,
    validator: TransitionValidator<C>,
}

impl<C: StatusConfigStore + ?Sized> StatusConfigService<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self {
            validator: TransitionValidator::new(Arc::clone(&store)),
            store,
        }
    }

    /// Every status the validator would not deny from `current`, in vocabulary order
    #[instrument(skip(self))]
    pub async fn available_transitions(
        &self,
        owner_id: i64,
        current: ApplicationStatus,
    ) -> Result<Vec<AvailableTransition>> {
        let graph = self.validator.active_graph(owner_id).await?;

        Ok(ApplicationStatus::ALL
            .iter()
            .filter_map(|&candidate| match classify(graph.as_ref(), Some(current), candidate) {
                Ok(verdict) => Some(AvailableTransition {
                    status: candidate,
                    requires_confirmation: verdict == TransitionVerdict::Backward,
                }),
                Err(_) => None,
            })
            .collect())
    }

    /// The owner's stored preferences, or the defaults when none are stored
    #[instrument(skip(self))]
    pub async fn user_preferences(&self, owner_id: i64) -> Result<PreferenceConfig> {
        Ok(self
            .store
            .get_user_preferences(owner_id)
            .await?
            .map(|stored| stored.config)
            .unwrap_or_default())
    }
}
