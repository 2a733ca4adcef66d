use super::errors::{GuardError, GuardResult};
use super::persistence::FlowTemplateStore;
use super::states::ApplicationStatus;
use crate::constants::DIRECT_ADVANCES;
use crate::error::{Result, TrackerError};
use crate::models::TransitionGraph;
use std::sync::Arc;
use tracing::debug;

/// Why a transition was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedBy {
    /// The application has no prior status
    Creation,
    /// An edge of the active flow template
    Template,
    /// One of the built-in interview advances
    DirectAdvance,
}

/// Outcome of classifying a proposed status change. Denials are returned as [`GuardError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionVerdict {
    Allowed(AllowedBy),
    /// Not permitted by the template but regresses to an earlier stage; subject to
    /// [`BackwardPolicy`]
    Backward,
}

impl TransitionVerdict {
    pub fn is_backward(self) -> bool {
        matches!(self, Self::Backward)
    }
}

pub fn is_direct_advance(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    DIRECT_ADVANCES.contains(&(from, to))
}

/// Classify `from -> to` against an optional transition graph.
///
/// Pure: no I/O, no policy. The caller decides what to do with a `Backward` verdict.
pub fn classify(
    graph: Option<&TransitionGraph>,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
) -> GuardResult<TransitionVerdict> {
    let Some(from) = from else {
        return Ok(TransitionVerdict::Allowed(AllowedBy::Creation));
    };

    if from == to {
        return Err(GuardError::NoOp { status: from });
    }

    if graph.is_some_and(|g| g.allows(from, to)) {
        return Ok(TransitionVerdict::Allowed(AllowedBy::Template));
    }

    if is_direct_advance(from, to) {
        return Ok(TransitionVerdict::Allowed(AllowedBy::DirectAdvance));
    }

    if from.is_backward_to(to) {
        return Ok(TransitionVerdict::Backward);
    }

    Err(GuardError::NotPermitted { from, to })
}

/// Engine-level rules for moving an application back to an earlier stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackwardPolicy {
    pub allow_backward: bool,
}

impl BackwardPolicy {
    pub fn new(allow_backward: bool) -> Self {
        Self { allow_backward }
    }

    /// Checks run in order: globally disabled, caller confirmation, note for terminal states
    pub fn check(
        &self,
        from: ApplicationStatus,
        to: ApplicationStatus,
        confirm_backward: bool,
        note: Option<&str>,
    ) -> GuardResult<()> {
        if !self.allow_backward {
            return Err(GuardError::BackwardDisabled { from, to });
        }
        if !confirm_backward {
            return Err(GuardError::BackwardConfirmRequired { from, to });
        }
        if from.requires_note_for_backward() && note.map_or(true, |n| n.trim().is_empty()) {
            return Err(GuardError::NoteRequiredForBackward { from });
        }
        Ok(())
    }
}

impl Default for BackwardPolicy {
    fn default() -> Self {
        Self::new(crate::constants::defaults::ALLOW_BACKWARD)
    }
}

/// Resolves the owner's active flow template and classifies transitions against it
pub struct TransitionValidator<T: FlowTemplateStore + ?Sized> {
    templates: Arc<T>,
}

impl<T: FlowTemplateStore + ?Sized> Clone for TransitionValidator<T> {
    fn clone(&self) -> Self {
        Self {
            templates: Arc::clone(&self.templates),
        }
    }
}

impl<T: FlowTemplateStore + ?Sized> TransitionValidator<T> {
    pub fn new(templates: Arc<T>) -> Self {
        Self { templates }
    }

    /// The graph that governs `owner_id`, if any template applies
    pub async fn active_graph(&self, owner_id: i64) -> Result<Option<TransitionGraph>> {
        let template = self
            .templates
            .get_active_template(owner_id)
            .await
            .map_err(TrackerError::from)?;

        if let Some(template) = &template {
            debug!(
                owner_id = owner_id,
                template_id = template.id,
                template = %template.name,
                "Resolved active flow template"
            );
        }
        Ok(template.map(|t| t.graph))
    }

    /// Load the owner's template and classify one transition, attributing denials to `entity_id`
    pub async fn validate(
        &self,
        owner_id: i64,
        entity_id: i64,
        from: Option<ApplicationStatus>,
        to: ApplicationStatus,
    ) -> Result<TransitionVerdict> {
        let graph = self.active_graph(owner_id).await?;
        classify(graph.as_ref(), from, to).map_err(|e| TrackerError::from_guard(entity_id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    fn graph() -> TransitionGraph {
        TransitionGraph::new()
            .with_edge(Applied, ResumeScreening)
            .with_edge(ResumeScreening, WrittenTest)
            .with_edge(OfferReceived, WrittenTest)
    }

    #[test]
    fn test_creation_is_allowed() {
        assert_eq!(
            classify(None, None, FirstInterview),
            Ok(TransitionVerdict::Allowed(AllowedBy::Creation))
        );
    }

    #[test]
    fn test_same_status_is_noop() {
        assert_eq!(
            classify(Some(&graph()), Some(Applied), Applied),
            Err(GuardError::NoOp { status: Applied })
        );
    }

    #[test]
    fn test_template_edge_is_allowed() {
        assert_eq!(
            classify(Some(&graph()), Some(Applied), ResumeScreening),
            Ok(TransitionVerdict::Allowed(AllowedBy::Template))
        );
    }

    #[test]
    fn test_template_edge_wins_over_rank() {
        // Regresses in rank but the template lists it explicitly
        assert_eq!(
            classify(Some(&graph()), Some(OfferReceived), WrittenTest),
            Ok(TransitionVerdict::Allowed(AllowedBy::Template))
        );
    }

    #[test]
    fn test_direct_advance_without_template() {
        assert_eq!(
            classify(None, Some(WrittenTest), FirstInterview),
            Ok(TransitionVerdict::Allowed(AllowedBy::DirectAdvance))
        );
        assert_eq!(
            classify(None, Some(ThirdInterview), HrInterview),
            Ok(TransitionVerdict::Allowed(AllowedBy::DirectAdvance))
        );
    }

    #[test]
    fn test_backward_and_denied() {
        assert_eq!(
            classify(Some(&graph()), Some(ProcessFinished), WrittenTest),
            Ok(TransitionVerdict::Backward)
        );
        assert_eq!(
            classify(Some(&graph()), Some(Applied), OfferAccepted),
            Err(GuardError::NotPermitted {
                from: Applied,
                to: OfferAccepted
            })
        );
        // Same stage is not backward
        assert_eq!(
            classify(None, Some(FirstFail), FirstInterview),
            Err(GuardError::NotPermitted {
                from: FirstFail,
                to: FirstInterview
            })
        );
    }

    #[test]
    fn test_backward_policy_order() {
        let disabled = BackwardPolicy::new(false);
        assert_eq!(
            disabled.check(Rejected, Applied, true, Some("note")),
            Err(GuardError::BackwardDisabled {
                from: Rejected,
                to: Applied
            })
        );

        let policy = BackwardPolicy::default();
        assert_eq!(
            policy.check(Rejected, Applied, false, None),
            Err(GuardError::BackwardConfirmRequired {
                from: Rejected,
                to: Applied
            })
        );
        assert_eq!(
            policy.check(Rejected, Applied, true, Some("   ")),
            Err(GuardError::NoteRequiredForBackward { from: Rejected })
        );
        assert_eq!(policy.check(Rejected, Applied, true, Some("重新推进")), Ok(()));
        assert_eq!(policy.check(HrInterview, WrittenTest, true, None), Ok(()));
    }

    #[test]
    fn test_validator_uses_owner_template() {
        use crate::database::InMemoryStore;
        use crate::models::FlowTemplate;
        use chrono::Utc;

        let store = Arc::new(InMemoryStore::new());
        store.insert_template(FlowTemplate {
            id: 1,
            name: "mine".to_string(),
            description: None,
            graph: graph(),
            is_default: true,
            is_active: true,
            owner_id: Some(7),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        let validator = TransitionValidator::new(store);

        let verdict = tokio_test::block_on(validator.validate(7, 1, Some(Applied), ResumeScreening));
        assert_eq!(verdict, Ok(TransitionVerdict::Allowed(AllowedBy::Template)));

        // Another owner has no template, so the same edge is not a direct advance
        let err = tokio_test::block_on(validator.validate(8, 1, Some(Applied), ResumeScreening))
            .unwrap_err();
        assert!(matches!(
            err,
            TrackerError::TransitionDenied {
                entity_id: 1,
                from: Applied,
                to: ResumeScreening,
                ..
            }
        ));
    }
}
