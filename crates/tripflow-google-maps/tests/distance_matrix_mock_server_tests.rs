//! Integration tests for the Distance Matrix provider using a mock HTTP
//! server. These tests don't require an API key.
//!
//! Run with: cargo test -p tripflow-google-maps --test distance_matrix_mock_server_tests

#![allow(clippy::unwrap_used)]

use serde_json::json;
use tripflow::distance::DistanceProvider;
use tripflow::graph::Coordinates;
use tripflow_google_maps::GoogleMapsDistance;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DELHI: Coordinates = Coordinates { lat: 28.6139, lng: 77.2090 };
const AGRA: Coordinates = Coordinates { lat: 27.1767, lng: 78.0081 };

fn matrix_ok(meters: u64, duration_text: &str, seconds: u64) -> serde_json::Value {
    json!({
        "status": "OK",
        "rows": [{
            "elements": [{
                "status": "OK",
                "distance": {"text": "233 km", "value": meters},
                "duration": {"text": duration_text, "value": seconds}
            }]
        }]
    })
}

#[tokio::test]
async fn parses_distance_and_formats_km_to_two_decimals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/distancematrix/json"))
        .and(query_param("units", "metric"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(matrix_ok(233_214, "3 hours 40 mins", 13_200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = GoogleMapsDistance::new("test-key").with_base_url(server.uri());
    let distance = provider.distance(&DELHI, &AGRA).await.unwrap().unwrap();

    assert_eq!(distance.distance_text, "233.21 km");
    assert_eq!(distance.duration_text, "3 hours 40 mins");
    assert_eq!(distance.distance_meters, 233_214);
    assert_eq!(distance.duration_seconds, 13_200);
}

#[tokio::test]
async fn unroutable_pair_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/distancematrix/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "rows": [{"elements": [{"status": "ZERO_RESULTS"}]}]
        })))
        .mount(&server)
        .await;

    let provider = GoogleMapsDistance::new("test-key").with_base_url(server.uri());
    assert!(provider.distance(&DELHI, &AGRA).await.unwrap().is_none());
}

#[tokio::test]
async fn denied_request_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/distancematrix/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "rows": []
        })))
        .mount(&server)
        .await;

    let provider = GoogleMapsDistance::new("bad-key").with_base_url(server.uri());
    let error = provider.distance(&DELHI, &AGRA).await.unwrap_err();
    assert!(matches!(error, tripflow::Error::Distance(_)));
    assert!(error.to_string().contains("REQUEST_DENIED"));
}

#[tokio::test]
async fn http_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/distancematrix/json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = GoogleMapsDistance::new("test-key").with_base_url(server.uri());
    let error = provider.distance(&DELHI, &AGRA).await.unwrap_err();
    assert!(error.to_string().contains("500"));
}
