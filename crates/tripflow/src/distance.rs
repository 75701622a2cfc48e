//! Distance enrichment for travel segments.
//!
//! [`DistanceProvider`] is the seam to a routing backend (Google Distance
//! Matrix in production, scripted values in tests). [`enrich_edges`] fans
//! out one lookup per eligible edge concurrently and joins on all of them
//! before returning - the caller sees either the fully enriched graph or
//! the graph with some edges left as they were, never a half-applied
//! intermediate.
//!
//! Enrichment is decorative: a failed or unavailable lookup leaves that
//! edge's label and cached distance unchanged and is logged at warn. Only
//! the provider trait itself can signal a hard error, and [`enrich_edges`]
//! degrades even those.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::graph::{Coordinates, ItineraryGraph};

/// A resolved route measurement between two coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distance {
    /// Display text, e.g. `"233.21 km"`. This is what lands on the edge.
    pub distance_text: String,
    /// Display duration, e.g. `"3 hours 40 mins"`.
    pub duration_text: String,
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

/// Routing backend seam.
///
/// `Ok(None)` means the backend answered but found no route (status not
/// OK); `Err` means the lookup itself failed. Both degrade to "leave the
/// edge alone" during enrichment.
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn distance(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<Distance>>;
}

fn endpoint_coordinates(
    graph: &ItineraryGraph,
    edge_index: usize,
) -> Option<(Coordinates, Coordinates)> {
    let edge = &graph.edges[edge_index];
    let from = graph.node(&edge.source)?.data.coordinates?;
    let to = graph.node(&edge.target)?.data.coordinates?;
    Some((from, to))
}

fn apply(graph: &mut ItineraryGraph, edge_index: usize, distance: &Distance) {
    let edge = &mut graph.edges[edge_index];
    edge.label = Some(distance.distance_text.clone());
    edge.data.distance = Some(distance.distance_text.clone());
}

/// Enrich every edge whose endpoints both carry coordinates.
///
/// All lookups run concurrently; the graph is only touched after every
/// lookup has settled. Edges without coordinates, and edges whose lookup
/// failed or found no route, pass through unchanged.
pub async fn enrich_edges(
    mut graph: ItineraryGraph,
    provider: &dyn DistanceProvider,
) -> ItineraryGraph {
    let eligible: Vec<(usize, Coordinates, Coordinates)> = (0..graph.edges.len())
        .filter_map(|index| {
            endpoint_coordinates(&graph, index).map(|(from, to)| (index, from, to))
        })
        .collect();
    if eligible.is_empty() {
        return graph;
    }

    debug!(edges = eligible.len(), "enriching edge distances");
    let lookups = eligible
        .iter()
        .map(|(_, from, to)| provider.distance(from, to));
    let results = join_all(lookups).await;

    for ((index, _, _), result) in eligible.into_iter().zip(results) {
        match result {
            Ok(Some(distance)) => apply(&mut graph, index, &distance),
            Ok(None) => {
                warn!(edge = %graph.edges[index].id, "no route between edge endpoints");
            }
            Err(error) => {
                warn!(edge = %graph.edges[index].id, %error, "distance lookup failed");
            }
        }
    }
    graph
}

/// Enrich a single edge by id. Fast path for interactive edge creation -
/// skips the graph-wide fan-out.
pub async fn enrich_edge(
    mut graph: ItineraryGraph,
    edge_id: &str,
    provider: &dyn DistanceProvider,
) -> ItineraryGraph {
    let Some(index) = graph.edges.iter().position(|edge| edge.id == edge_id) else {
        return graph;
    };
    let Some((from, to)) = endpoint_coordinates(&graph, index) else {
        return graph;
    };
    match provider.distance(&from, &to).await {
        Ok(Some(distance)) => apply(&mut graph, index, &distance),
        Ok(None) => warn!(edge = %edge_id, "no route between edge endpoints"),
        Err(error) => warn!(edge = %edge_id, %error, "distance lookup failed"),
    }
    graph
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};
    use crate::test_support::StaticDistances;

    fn located(id: &str, label: &str, lat: f64, lng: f64) -> Node {
        Node::new(id, label).with_coordinates(lat, lng)
    }

    fn chain(n: usize) -> ItineraryGraph {
        let nodes = (1..=n)
            .map(|i| located(&i.to_string(), &format!("Stop {i}"), i as f64, i as f64))
            .collect();
        let edges = (1..n)
            .map(|i| Edge::new(i.to_string(), (i + 1).to_string()))
            .collect();
        ItineraryGraph::new(nodes, edges)
    }

    #[tokio::test]
    async fn enriches_all_eligible_edges() {
        let provider = StaticDistances::new();
        let graph = enrich_edges(chain(4), &provider).await;
        for edge in &graph.edges {
            assert!(edge.label.as_deref().is_some_and(|l| l.ends_with(" km")));
            assert_eq!(edge.data.distance, edge.label);
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn skips_edges_without_coordinates() {
        let mut graph = chain(3);
        graph.nodes[2].data.coordinates = None;
        let provider = StaticDistances::new();
        let graph = enrich_edges(graph, &provider).await;
        assert!(graph.edges[0].label.is_some());
        assert!(graph.edges[1].label.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_poison_the_batch() {
        let graph = chain(6); // five edges
        let provider = StaticDistances::new().fail_between(
            &graph.nodes[2].data.coordinates.unwrap(),
            &graph.nodes[3].data.coordinates.unwrap(),
        );
        let graph = enrich_edges(graph, &provider).await;
        let labeled = graph.edges.iter().filter(|edge| edge.label.is_some()).count();
        assert_eq!(labeled, 4);
        assert!(graph.edges[2].label.is_none());
        assert!(graph.edges[2].data.distance.is_none());
    }

    #[tokio::test]
    async fn no_route_leaves_edge_unchanged() {
        let mut graph = chain(2);
        graph.edges[0].label = Some("old label".to_string());
        let provider = StaticDistances::new().no_route_between(
            &graph.nodes[0].data.coordinates.unwrap(),
            &graph.nodes[1].data.coordinates.unwrap(),
        );
        let graph = enrich_edges(graph, &provider).await;
        assert_eq!(graph.edges[0].label.as_deref(), Some("old label"));
    }

    #[tokio::test]
    async fn single_edge_fast_path() {
        let provider = StaticDistances::new();
        let graph = enrich_edge(chain(3), "e2-3", &provider).await;
        assert!(graph.edges[1].label.is_some());
        assert!(graph.edges[0].label.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_edge_id_is_noop() {
        let provider = StaticDistances::new();
        let graph = enrich_edge(chain(2), "e9-9", &provider).await;
        assert!(graph.edges[0].label.is_none());
        assert_eq!(provider.calls(), 0);
    }
}
