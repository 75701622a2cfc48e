//! End-to-end session scenarios against the in-memory test doubles.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tripflow::assistant::AssistantReply;
use tripflow::command::{AddEdgePayload, AddNodePayload, GraphCommand};
use tripflow::graph::{Edge, ItineraryGraph, Node};
use tripflow::persist::{TripRecord, TripStore};
use tripflow::session::{SessionController, SessionState};
use tripflow::test_support::{InMemoryTripStore, ScriptedAssistant, StaticDistances};

fn day_node(day: u32, label: &str, lat: f64, lng: f64) -> Node {
    Node::new(day.to_string(), label)
        .with_day(day)
        .with_coordinates(lat, lng)
}

fn golden_triangle() -> TripRecord {
    TripRecord {
        id: "trip-1".to_string(),
        title: "Golden Triangle".to_string(),
        destination: Some("India".to_string()),
        start_date: Some("2026-11-02".to_string()),
        nodes: vec![
            day_node(1, "Delhi", 28.6139, 77.2090),
            day_node(2, "Agra", 27.1767, 78.0081),
            day_node(3, "Jaipur", 26.9124, 75.7873),
        ],
        edges: vec![Edge::new("1", "2"), Edge::new("2", "3")],
    }
}

fn session_with(assistant: ScriptedAssistant) -> (SessionController, Arc<InMemoryTripStore>) {
    let store = Arc::new(InMemoryTripStore::new());
    store.insert_trip(golden_triangle());
    let session = SessionController::new(
        "trip-1",
        Arc::new(assistant),
        Arc::new(StaticDistances::new()),
        Arc::clone(&store) as Arc<dyn TripStore>,
    );
    (session, store)
}

#[tokio::test]
async fn remove_a_day_then_undo_then_redo() {
    // The assistant drops Agra, leaving days 1 and 3 with a spanning edge.
    let proposal = ItineraryGraph::new(
        vec![
            day_node(1, "Delhi", 28.6139, 77.2090),
            day_node(3, "Jaipur", 26.9124, 75.7873),
        ],
        vec![Edge::new("1", "3")],
    );
    let assistant = ScriptedAssistant::new().with_reply(AssistantReply::replacement(
        "Removed Agra from the itinerary.",
        proposal,
    ));
    let (mut session, _store) = session_with(assistant);

    session.load().await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    let loaded = session.graph().clone();

    let outcome = session.send_message("remove Agra").await.unwrap();
    assert!(outcome.graph_committed);

    // Jaipur got renumbered to day 2 / id "2", the edge followed, and the
    // segment carries a computed distance.
    let graph = session.graph().clone();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[1].id, "2");
    assert_eq!(graph.nodes[1].data.label, "Jaipur");
    assert_eq!(graph.edges[0].id, "e1-2");
    assert!(graph.edges[0].label.as_deref().is_some_and(|l| l.ends_with(" km")));
    graph.validate().unwrap();

    assert!(session.undo().unwrap());
    assert_eq!(session.graph(), &loaded);

    assert!(session.redo().unwrap());
    assert_eq!(session.graph(), &graph);
}

#[tokio::test]
async fn command_batch_and_manual_connect_share_one_timeline() {
    let (mut session, _store) = session_with(ScriptedAssistant::new());
    session.load().await.unwrap();

    let commands = vec![
        GraphCommand::AddNode(AddNodePayload {
            id: Some("4".to_string()),
            label: Some("Udaipur".to_string()),
            day: Some(4),
            coordinates: Some(tripflow::Coordinates { lat: 24.5854, lng: 73.7125 }),
            ..AddNodePayload::default()
        }),
        GraphCommand::AddEdge(AddEdgePayload {
            source: Some("3".to_string()),
            target: Some("4".to_string()),
            ..AddEdgePayload::default()
        }),
    ];
    let diagnostics = session.apply_commands(&commands).await.unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(session.graph().nodes.len(), 4);
    assert!(session.graph().edge("e3-4").is_some());

    // Manual connect back to the start; already-present edges are no-ops.
    assert!(session.connect("4", "1").await.unwrap());
    assert!(!session.connect("4", "1").await.unwrap());
    assert!(session.graph().edge("e4-1").unwrap().label.is_some());

    // Two commits happened: batch, then connect.
    assert!(session.undo().unwrap());
    assert!(session.graph().edge("e4-1").is_none());
    assert!(session.undo().unwrap());
    assert!(session.graph().node("4").is_none());
    assert!(!session.can_undo());
}

#[tokio::test]
async fn commit_after_undo_discards_redo_branch() {
    let (mut session, _store) = session_with(ScriptedAssistant::new());
    session.load().await.unwrap();

    session.connect("3", "1").await.unwrap();
    assert!(session.undo().unwrap());
    assert!(session.can_redo());

    // A fresh commit from the undone state erases the redo path.
    session.connect("2", "1").await.unwrap();
    assert!(!session.can_redo());
    assert!(!session.redo().unwrap());
    assert!(session.graph().edge("e2-1").is_some());
    assert!(session.graph().edge("e3-1").is_none());
}

#[tokio::test]
async fn flush_persists_the_latest_committed_state() {
    let (mut session, store) = session_with(ScriptedAssistant::new());
    session.load().await.unwrap();

    session.connect("3", "1").await.unwrap();
    session.connect("2", "1").await.unwrap();
    session.flush().await;

    // One coalesced write carrying both edges.
    assert_eq!(store.save_count(), 1);
    let saved = store.last_saved("trip-1").unwrap();
    assert_eq!(saved.edges.len(), 4);
    assert!(session.save_state().last_saved_at.is_some());
}

#[tokio::test]
async fn conversational_failure_keeps_the_session_usable() {
    let assistant = ScriptedAssistant::new().failing("model overloaded");
    let (mut session, _store) = session_with(assistant);
    session.load().await.unwrap();

    assert!(session.send_message("anything").await.is_err());
    assert_eq!(session.state(), SessionState::Ready);

    // Non-assistant operations still work after the failure.
    assert!(session.connect("3", "1").await.unwrap());
}
