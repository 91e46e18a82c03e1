use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use reqwest::StatusCode;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::datetime};

use crate::AppConfig;
use crate::overseerr::{MediaRequest, OverseerrClient, RequestStatus};
use crate::radarr::{AddOptions, NewMovie, RadarrClient};

/// Requests created before this date are never synced.
const DEFAULT_SYNC_CUTOFF: OffsetDateTime = datetime!(2024-01-01 0:00 UTC);

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Standard,
    UltraHd,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::UltraHd => write!(f, "4K"),
        }
    }
}

/// Split the raw request list into per-tier work lists.
///
/// Keeps approved requests created on or after `cutoff`, drops requests
/// tagged with a non-movie type (an absent tag counts as a movie), and routes
/// 4K-flagged requests to the ultra-hd list only while a 4K instance is
/// configured. Everything else lands on the standard list.
fn partition_requests(
    requests: Vec<MediaRequest>,
    cutoff: OffsetDateTime,
    uhd_configured: bool,
) -> Result<(Vec<MediaRequest>, Vec<MediaRequest>)> {
    let mut standard = Vec::new();
    let mut ultra_hd = Vec::new();

    for request in requests {
        let created_at = OffsetDateTime::parse(&request.created_at, &Rfc3339)
            .with_context(|| format!("Invalid createdAt on request {}", request.id))?;

        if created_at < cutoff || request.status != RequestStatus::Approved {
            continue;
        }

        if request.r#type.as_deref().is_some_and(|tag| tag != "movie") {
            continue;
        }

        if request.is_4k && uhd_configured {
            ultra_hd.push(request);
        } else {
            standard.push(request);
        }
    }

    Ok((standard, ultra_hd))
}

fn add_succeeded(status: StatusCode) -> bool {
    status == StatusCode::CREATED
}

async fn resolve_profile(radarr: &RadarrClient, name: &str, tier: Tier) -> Result<Option<i32>> {
    let profile_id = radarr
        .quality_profile_id(name)
        .await
        .map_err(|e| anyhow!("Could not resolve quality profile {name:?} on the {tier} Radarr instance: {e}"))?;

    if profile_id.is_none() {
        warn!("No quality profile named {name:?} on the {tier} Radarr instance, adds will be rejected");
    }

    Ok(profile_id)
}

/// Sync one tier's requests into its Radarr instance.
///
/// A lookup failure ends the run; a failed add is logged and the loop moves
/// on to the next request.
async fn sync_requests(
    radarr: &RadarrClient,
    requests: Vec<MediaRequest>,
    profile_id: Option<i32>,
    root_folder_path: &str,
    tier: Tier,
) -> Result<()> {
    info!("Syncing {} requests to the {tier} Radarr instance", requests.len());

    for request in requests {
        let tmdb_id = request
            .media
            .tmdb_id
            .ok_or_else(|| anyhow!("Request {} has no TMDB id", request.id))?;

        let movie = radarr
            .lookup_movie(tmdb_id)
            .await
            .map_err(|e| anyhow!("Could not look up TMDB id {tmdb_id}: {e}"))?;

        let new_movie = NewMovie::builder()
            .title(movie.title.clone())
            .maybe_quality_profile_id(profile_id)
            .title_slug(movie.title_slug)
            .images(movie.images)
            .tmdb_id(movie.tmdb_id)
            .year(movie.year)
            .root_folder_path(root_folder_path.to_string())
            .monitored(true)
            .add_options(AddOptions {
                search_for_movie: false,
            })
            .build();

        match radarr.add_movie(&new_movie).await {
            Ok(status) if add_succeeded(status) => {
                info!("Added {} to the {tier} Radarr instance", movie.title);
            }
            Ok(status) => {
                error!("Failed to add {} to the {tier} Radarr instance ({status})", movie.title);
            }
            Err(e) => {
                error!("Failed to add {} to the {tier} Radarr instance: {e}", movie.title);
            }
        }
    }

    Ok(())
}

pub async fn run(app_config: &AppConfig) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Could not build HTTP client")?;

    let overseerr = OverseerrClient::new(http.clone(), &app_config.overseerr);
    let radarr = RadarrClient::new(http.clone(), &app_config.radarr);
    let radarr_4k = app_config
        .radarr_4k
        .as_ref()
        .map(|config| RadarrClient::new(http.clone(), config));

    let requests = overseerr
        .recent_requests()
        .await
        .map_err(|e| anyhow!("Could not fetch Overseerr requests: {e}"))?;
    info!("Fetched {} requests from Overseerr", requests.len());

    let (standard, ultra_hd) =
        partition_requests(requests, DEFAULT_SYNC_CUTOFF, radarr_4k.is_some())?;
    info!(
        "{} standard and {} 4K requests eligible for sync",
        standard.len(),
        ultra_hd.len()
    );

    let profile_id = resolve_profile(&radarr, &app_config.hd_profile_name, Tier::Standard).await?;
    sync_requests(
        &radarr,
        standard,
        profile_id,
        &app_config.root_folder_path,
        Tier::Standard,
    )
    .await?;

    if let Some(radarr_4k) = &radarr_4k {
        let profile_id =
            resolve_profile(radarr_4k, &app_config.uhd_profile_name, Tier::UltraHd).await?;
        sync_requests(
            radarr_4k,
            ultra_hd,
            profile_id,
            &app_config.root_folder_path,
            Tier::UltraHd,
        )
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> MediaRequest {
        serde_json::from_value(value).unwrap()
    }

    fn movie_request(id: i32, status: u8, created_at: &str, is_4k: bool) -> MediaRequest {
        request(json!({
            "id": id,
            "status": status,
            "createdAt": created_at,
            "type": "movie",
            "is4k": is_4k,
            "media": { "tmdbId": 603 }
        }))
    }

    #[test]
    fn excludes_unapproved_requests_regardless_of_date() {
        let requests = vec![
            movie_request(1, 1, "2024-03-01T00:00:00.000Z", false),
            movie_request(2, 3, "2024-06-01T00:00:00.000Z", false),
            movie_request(3, 4, "2025-01-01T00:00:00.000Z", true),
        ];

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert!(standard.is_empty());
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn excludes_requests_created_before_the_cutoff() {
        let requests = vec![
            movie_request(1, 2, "2023-12-31T23:59:59.000Z", false),
            movie_request(2, 2, "2024-01-01T00:00:00.000Z", false),
        ];

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert_eq!(standard.len(), 1);
        assert_eq!(standard[0].id, 2);
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn excludes_non_movie_requests_from_both_tiers() {
        let requests = vec![request(json!({
            "id": 1,
            "status": 2,
            "createdAt": "2024-03-01T00:00:00.000Z",
            "type": "tv",
            "is4k": true,
            "media": { "tmdbId": 1399 }
        }))];

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert!(standard.is_empty());
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn untyped_requests_are_treated_as_movies() {
        let requests = vec![request(json!({
            "id": 1,
            "status": 2,
            "createdAt": "2024-03-01T00:00:00.000Z",
            "media": { "tmdbId": 603 }
        }))];

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert_eq!(standard.len(), 1);
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn routes_4k_requests_by_instance_availability() {
        let requests = || vec![movie_request(1, 2, "2024-03-01T00:00:00.000Z", true)];

        let (standard, ultra_hd) =
            partition_requests(requests(), DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert!(standard.is_empty());
        assert_eq!(ultra_hd.len(), 1);

        // Without a 4K instance the same request falls back to standard.
        let (standard, ultra_hd) =
            partition_requests(requests(), DEFAULT_SYNC_CUTOFF, false).unwrap();
        assert_eq!(standard.len(), 1);
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn output_tiers_are_disjoint_and_drawn_from_the_input() {
        let requests = vec![
            movie_request(1, 2, "2024-03-01T00:00:00.000Z", false),
            movie_request(2, 2, "2024-03-02T00:00:00.000Z", true),
            movie_request(3, 1, "2024-03-03T00:00:00.000Z", false),
            movie_request(4, 2, "2023-06-01T00:00:00.000Z", true),
        ];
        let input_ids: Vec<i32> = requests.iter().map(|r| r.id).collect();

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();

        let standard_ids: Vec<i32> = standard.iter().map(|r| r.id).collect();
        let ultra_hd_ids: Vec<i32> = ultra_hd.iter().map(|r| r.id).collect();

        assert_eq!(standard_ids, vec![1]);
        assert_eq!(ultra_hd_ids, vec![2]);
        assert!(standard_ids.iter().all(|id| !ultra_hd_ids.contains(id)));
        assert!(standard_ids
            .iter()
            .chain(&ultra_hd_ids)
            .all(|id| input_ids.contains(id)));
    }

    #[test]
    fn approved_movie_request_lands_on_the_standard_tier() {
        let requests = vec![movie_request(1, 2, "2024-03-01T00:00:00.000Z", false)];

        let (standard, ultra_hd) =
            partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap();
        assert_eq!(standard.len(), 1);
        assert!(ultra_hd.is_empty());
    }

    #[test]
    fn rejects_unparseable_timestamps() {
        let requests = vec![request(json!({
            "id": 7,
            "status": 2,
            "createdAt": "yesterday",
            "media": { "tmdbId": 603 }
        }))];

        let error = partition_requests(requests, DEFAULT_SYNC_CUTOFF, true).unwrap_err();
        assert!(error.to_string().contains("request 7"));
    }

    #[test]
    fn only_a_201_counts_as_added() {
        assert!(add_succeeded(StatusCode::CREATED));
        assert!(!add_succeeded(StatusCode::OK));
        assert!(!add_succeeded(StatusCode::BAD_REQUEST));
    }
}
