use reqwest::StatusCode;
use serde::Deserialize;
use serde_aux::prelude::*;
use serde_repr::Deserialize_repr;
use thiserror::Error;

/// Most recent requests fetched per run. Overseerr pages beyond this are
/// intentionally ignored.
pub const REQUEST_PAGE_SIZE: u32 = 200;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Error)]
pub enum OverseerrError {
    #[error("Overseerr request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Overseerr returned {status} for {endpoint}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("Could not decode Overseerr {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
pub enum RequestStatus {
    Pending = 1,
    Approved = 2,
    Declined = 3,
    Failed = 4,
    #[serde(other)]
    Unknown = 0,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    pub id: i32,
    pub status: RequestStatus,
    pub created_at: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub is_4k: bool,
    pub media: RequestMedia,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMedia {
    // Overseerr encodes this as a number in the request list but as a string
    // in some other payloads, so accept both.
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub tmdb_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RequestsPage {
    results: Vec<MediaRequest>,
}

pub struct OverseerrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OverseerrClient {
    pub fn new(http: reqwest::Client, config: &crate::OverseerrConfig) -> Self {
        Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Fetch the most recent requests in a single call, newest first, as
    /// Overseerr returns them.
    pub async fn recent_requests(&self) -> Result<Vec<MediaRequest>, OverseerrError> {
        let url = format!("{}/request?take={REQUEST_PAGE_SIZE}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OverseerrError::Status {
                endpoint: "request",
                status,
            });
        }

        let body = response.text().await?;
        let deserializer = &mut serde_json::Deserializer::from_str(&body);
        let page: RequestsPage =
            serde_path_to_error::deserialize(deserializer).map_err(|source| {
                OverseerrError::Decode {
                    endpoint: "request",
                    source,
                }
            })?;

        Ok(page.results)
    }
}
