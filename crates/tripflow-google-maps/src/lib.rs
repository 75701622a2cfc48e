//! Google Distance Matrix integration for TripFlow
//!
//! This crate provides [`GoogleMapsDistance`], an implementation of
//! [`tripflow::distance::DistanceProvider`] backed by the Google Distance
//! Matrix API.
//!
//! Distance text is recomputed from the raw meter count as `"{:.2} km"`
//! rather than echoing the API's localized text, so edge labels render
//! consistently regardless of the API's locale settings.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tripflow_google_maps::GoogleMapsDistance;
//! use tripflow::distance::DistanceProvider;
//! use tripflow::graph::Coordinates;
//!
//! #[tokio::main]
//! async fn main() -> tripflow::Result<()> {
//!     // Uses the GOOGLE_MAPS_API_KEY env var
//!     let provider = GoogleMapsDistance::from_env()?;
//!     let delhi = Coordinates { lat: 28.6139, lng: 77.2090 };
//!     let agra = Coordinates { lat: 27.1767, lng: 78.0081 };
//!     if let Some(distance) = provider.distance(&delhi, &agra).await? {
//!         println!("{} ({})", distance.distance_text, distance.duration_text);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tripflow::distance::{Distance, DistanceProvider};
use tripflow::error::{Error, Result};
use tripflow::graph::Coordinates;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// Distance provider backed by the Google Distance Matrix API.
pub struct GoogleMapsDistance {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleMapsDistance {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Build from the `GOOGLE_MAPS_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_MAPS_API_KEY")
            .map_err(|_| Error::InvalidInput("GOOGLE_MAPS_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (e.g. for a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_url(&self, from: &Coordinates, to: &Coordinates) -> String {
        let origins = urlencoding::encode(&format!("{},{}", from.lat, from.lng)).into_owned();
        let destinations = urlencoding::encode(&format!("{},{}", to.lat, to.lng)).into_owned();
        format!(
            "{}/maps/api/distancematrix/json?units=metric&origins={origins}&destinations={destinations}&key={}",
            self.base_url, self.api_key
        )
    }
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    distance: Option<MatrixValue>,
    duration: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    text: String,
    value: u64,
}

#[async_trait]
impl DistanceProvider for GoogleMapsDistance {
    async fn distance(&self, from: &Coordinates, to: &Coordinates) -> Result<Option<Distance>> {
        let response = self
            .client
            .get(self.request_url(from, to))
            .send()
            .await
            .map_err(|error| Error::Distance(format!("request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Distance(format!(
                "Distance Matrix returned HTTP {status}"
            )));
        }
        let matrix: MatrixResponse = response
            .json()
            .await
            .map_err(|error| Error::Distance(format!("malformed response: {error}")))?;

        if matrix.status != "OK" {
            let detail = matrix.error_message.unwrap_or_default();
            return Err(Error::Distance(format!(
                "Distance Matrix status {}: {detail}",
                matrix.status
            )));
        }

        let element = matrix
            .rows
            .first()
            .and_then(|row| row.elements.first())
            .ok_or_else(|| Error::Distance("response carried no elements".to_string()))?;
        if element.status != "OK" {
            // No route between the points (e.g. across an ocean).
            debug!(status = %element.status, "no route between coordinates");
            return Ok(None);
        }
        let (Some(distance), Some(duration)) = (&element.distance, &element.duration) else {
            return Err(Error::Distance(
                "OK element missing distance or duration".to_string(),
            ));
        };

        Ok(Some(Distance {
            distance_text: format!("{:.2} km", distance.value as f64 / 1000.0),
            duration_text: duration.text.clone(),
            distance_meters: distance.value,
            duration_seconds: duration.value,
        }))
    }
}
