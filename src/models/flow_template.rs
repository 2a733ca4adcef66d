use crate::state_machine::states::ApplicationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Problems found while parsing a stored `{"transitions": {...}}` flow configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowConfigError {
    #[error("missing 'transitions' field")]
    MissingTransitions,

    #[error("'transitions' must be an object")]
    TransitionsNotObject,

    #[error("invalid source status: {0}")]
    InvalidSource(String),

    #[error("transitions for status '{0}' must be an array")]
    TargetsNotArray(String),

    #[error("transition target must be a string (source '{0}')")]
    TargetNotString(String),

    #[error("invalid target status: {0}")]
    InvalidTarget(String),
}

/// Directed graph of permitted status changes.
///
/// Both keys and members are drawn from the closed status vocabulary, so a parsed graph can
/// never reference an unknown status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionGraph {
    transitions: BTreeMap<ApplicationStatus, BTreeSet<ApplicationStatus>>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style edge insertion
    pub fn with_edge(mut self, from: ApplicationStatus, to: ApplicationStatus) -> Self {
        self.add_edge(from, to);
        self
    }

    pub fn add_edge(&mut self, from: ApplicationStatus, to: ApplicationStatus) {
        self.transitions.entry(from).or_default().insert(to);
    }

    pub fn allows(&self, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        self.transitions
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Targets configured for `from`, in vocabulary order
    pub fn targets(&self, from: ApplicationStatus) -> impl Iterator<Item = ApplicationStatus> + '_ {
        self.transitions.get(&from).into_iter().flatten().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = (ApplicationStatus, ApplicationStatus)> + '_ {
        self.transitions
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |to| (*from, *to)))
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.values().all(BTreeSet::is_empty)
    }

    /// Parse and validate a flow configuration document
    pub fn from_flow_config(config: &Value) -> Result<Self, FlowConfigError> {
        let transitions = config
            .get("transitions")
            .ok_or(FlowConfigError::MissingTransitions)?
            .as_object()
            .ok_or(FlowConfigError::TransitionsNotObject)?;

        let mut graph = Self::new();
        for (source, targets) in transitions {
            let from: ApplicationStatus = source
                .parse()
                .map_err(|_| FlowConfigError::InvalidSource(source.clone()))?;
            let targets = targets
                .as_array()
                .ok_or_else(|| FlowConfigError::TargetsNotArray(source.clone()))?;

            // A source with an empty list is kept so it round-trips
            graph.transitions.entry(from).or_default();
            for target in targets {
                let target = target
                    .as_str()
                    .ok_or_else(|| FlowConfigError::TargetNotString(source.clone()))?;
                let to: ApplicationStatus = target
                    .parse()
                    .map_err(|_| FlowConfigError::InvalidTarget(target.to_string()))?;
                graph.add_edge(from, to);
            }
        }
        Ok(graph)
    }

    pub fn to_flow_config(&self) -> Value {
        serde_json::json!({ "transitions": self.transitions })
    }
}

/// A named transition graph, either owned by one user or shared globally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub graph: TransitionGraph,
    pub is_default: bool,
    pub is_active: bool,
    /// `None` for global templates
    pub owner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowTemplate {
    pub fn is_global(&self) -> bool {
        self.owner_id.is_none()
    }
}

/// Pick the template that governs `owner_id` from a candidate list.
///
/// The owner's active templates win (default flag first, then most recently updated); if the
/// owner has none, the active global default applies.
pub fn select_active_template<'a, I>(owner_id: i64, candidates: I) -> Option<&'a FlowTemplate>
where
    I: IntoIterator<Item = &'a FlowTemplate>,
{
    let mut own: Option<&FlowTemplate> = None;
    let mut global: Option<&FlowTemplate> = None;

    for template in candidates.into_iter().filter(|t| t.is_active) {
        match template.owner_id {
            Some(owner) if owner == owner_id => {
                let better = own.map_or(true, |current| {
                    (template.is_default, template.updated_at, template.id)
                        > (current.is_default, current.updated_at, current.id)
                });
                if better {
                    own = Some(template);
                }
            }
            None if template.is_default => {
                let better = global.map_or(true, |current| {
                    (template.updated_at, template.id) > (current.updated_at, current.id)
                });
                if better {
                    global = Some(template);
                }
            }
            _ => {}
        }
    }

    own.or(global)
}
