use bon::Builder;
use log::{debug, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Error)]
pub enum RadarrError {
    #[error("Radarr request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Radarr returned {status} for {endpoint}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("Could not decode Radarr {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub cover_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub remote_url: Option<String>,
}

/// Movie as returned by the TMDB lookup endpoint, cut down to the fields the
/// add call sends back.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieResource {
    pub title: String,
    pub title_slug: String,
    #[serde(default)]
    pub images: Vec<Image>,
    pub tmdb_id: i32,
    pub year: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityProfile {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOptions {
    pub search_for_movie: bool,
}

/// Body of `POST /movie`. An unresolved profile id still goes out as null;
/// Radarr rejects the add server-side and the dispatcher reports it per
/// request.
#[derive(Debug, Serialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct NewMovie {
    pub title: String,
    pub quality_profile_id: Option<i32>,
    pub title_slug: String,
    pub images: Vec<Image>,
    pub tmdb_id: i32,
    pub year: i32,
    pub root_folder_path: String,
    pub monitored: bool,
    pub add_options: AddOptions,
}

pub fn find_profile_id(profiles: &[QualityProfile], name: &str) -> Option<i32> {
    profiles
        .iter()
        .find(|profile| profile.name == name)
        .map(|profile| profile.id)
}

pub struct RadarrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RadarrClient {
    pub fn new(http: reqwest::Client, config: &crate::RadarrConfig) -> Self {
        Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    pub async fn lookup_movie(&self, tmdb_id: i32) -> Result<MovieResource, RadarrError> {
        let url = format!("{}/movie/lookup/tmdb?tmdbId={tmdb_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        info!("Radarr lookup response status: {status}");
        if !status.is_success() {
            return Err(RadarrError::Status {
                endpoint: "movie/lookup/tmdb",
                status,
            });
        }

        let body = response.text().await?;
        debug!("Radarr lookup response body: {body}");
        decode("movie/lookup/tmdb", &body)
    }

    pub async fn quality_profile_id(&self, name: &str) -> Result<Option<i32>, RadarrError> {
        let url = format!("{}/qualityprofile", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadarrError::Status {
                endpoint: "qualityprofile",
                status,
            });
        }

        let body = response.text().await?;
        let profiles: Vec<QualityProfile> = decode("qualityprofile", &body)?;
        Ok(find_profile_id(&profiles, name))
    }

    /// Submit the add-movie command and hand back the raw status. Only 201
    /// means the movie was added; the caller decides how to report the rest.
    pub async fn add_movie(&self, movie: &NewMovie) -> Result<StatusCode, RadarrError> {
        let url = format!("{}/movie", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(movie)
            .send()
            .await?;

        let status = response.status();
        info!("Adding movie {} to Radarr ({status})", movie.title);
        Ok(status)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    endpoint: &'static str,
    body: &str,
) -> Result<T, RadarrError> {
    let deserializer = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(deserializer)
        .map_err(|source| RadarrError::Decode { endpoint, source })
}
