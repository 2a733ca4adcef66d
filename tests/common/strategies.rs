use applytrack_core::models::TransitionGraph;
use applytrack_core::state_machine::ApplicationStatus;
use proptest::prelude::*;
use proptest::sample::select;

pub fn status_strategy() -> impl Strategy<Value = ApplicationStatus> {
    select(ApplicationStatus::ALL.to_vec())
}

pub fn edge_strategy() -> impl Strategy<Value = (ApplicationStatus, ApplicationStatus)> {
    (status_strategy(), status_strategy()).prop_filter("no self loops", |(a, b)| a != b)
}

pub fn graph_strategy() -> impl Strategy<Value = TransitionGraph> {
    prop::collection::vec(edge_strategy(), 0..30).prop_map(|edges| {
        let mut graph = TransitionGraph::new();
        for (from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    })
}

/// A run of statuses with the minutes spent before each change
pub fn status_walk_strategy() -> impl Strategy<Value = Vec<(ApplicationStatus, i64)>> {
    prop::collection::vec((status_strategy(), 0i64..10_000), 1..25)
}
