use anyhow::{Context, Result, anyhow};
use log::error;
use tracing_subscriber::EnvFilter;

mod controller;
mod overseerr;
mod radarr;

#[derive(Clone, Debug)]
struct OverseerrConfig {
    url: String,
    api_key: String,
}

#[derive(Clone, Debug)]
struct RadarrConfig {
    url: String,
    api_key: String,
}

#[derive(Clone, Debug)]
struct AppConfig {
    overseerr: OverseerrConfig,
    radarr: RadarrConfig,
    radarr_4k: Option<RadarrConfig>,
    hd_profile_name: String,
    uhd_profile_name: String,
    root_folder_path: String,
}

impl AppConfig {
    fn from_env() -> Result<Self> {
        let overseerr = OverseerrConfig {
            url: require_url("OVERSEERR_URL")?,
            api_key: require_env("OVERSEERR_API_KEY")?,
        };

        let radarr = RadarrConfig {
            url: require_url("DEFAULT_RADARR_URL")?,
            api_key: require_env("DEFAULT_RADARR_API_KEY")?,
        };

        // Half a 4K connection is a configuration mistake, not a disabled
        // tier.
        let radarr_4k = match (optional_env("UHD_RADARR_URL"), optional_env("UHD_RADARR_API_KEY")) {
            (Some(url), Some(api_key)) => Some(RadarrConfig {
                url: trim_base_url(url),
                api_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(anyhow!("UHD_RADARR_URL is set but UHD_RADARR_API_KEY is not"));
            }
            (None, Some(_)) => {
                return Err(anyhow!("UHD_RADARR_API_KEY is set but UHD_RADARR_URL is not"));
            }
        };

        Ok(Self {
            overseerr,
            radarr,
            radarr_4k,
            hd_profile_name: optional_env("HD_PROFILE_NAME")
                .unwrap_or_else(|| "HD-1080p".to_string()),
            uhd_profile_name: optional_env("UHD_PROFILE_NAME")
                .unwrap_or_else(|| "Ultra-HD".to_string()),
            root_folder_path: optional_env("ROOT_FOLDER_PATH")
                .unwrap_or_else(|| "/movies".to_string()),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| anyhow!("{name} is not set"))
}

fn require_url(name: &str) -> Result<String> {
    require_env(name).map(trim_base_url)
}

/// Blank values count as unset.
fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run().await {
        error!("Sync run failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let app_config = AppConfig::from_env().context("Could not load configuration")?;
    controller::run(&app_config).await
}
