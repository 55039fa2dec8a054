use serde::Deserialize;

/// Default similarity threshold for fuzzy postal-code matching.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listings_path: String,
    pub demographics_path: String,
    pub port: u16,
    /// Minimum similarity score (inclusive) for a fuzzy match, in [0, 1].
    pub match_threshold: f64,
    /// TTL for the reconciled-dataset cache, in seconds.
    pub dataset_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            listings_path: std::env::var("LISTINGS_CSV")
                .unwrap_or_else(|_| "data/listings.csv".to_string()),
            demographics_path: std::env::var("DEMOGRAPHICS_CSV")
                .unwrap_or_else(|_| "data/demographics.csv".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            match_threshold: std::env::var("MATCH_THRESHOLD")
                .unwrap_or_else(|_| DEFAULT_MATCH_THRESHOLD.to_string())
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("MATCH_THRESHOLD must be a number"))
                .and_then(|threshold| {
                    // Rejected at configuration time, before any processing.
                    if !(0.0..=1.0).contains(&threshold) {
                        anyhow::bail!(
                            "MATCH_THRESHOLD must lie in [0, 1], got {}",
                            threshold
                        );
                    }
                    Ok(threshold)
                })?,
            dataset_cache_ttl_secs: std::env::var("DATASET_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DATASET_CACHE_TTL_SECS must be a whole number"))?,
        };

        if config.listings_path.trim().is_empty() {
            anyhow::bail!("LISTINGS_CSV cannot be empty");
        }
        if config.demographics_path.trim().is_empty() {
            anyhow::bail!("DEMOGRAPHICS_CSV cannot be empty");
        }

        // Log successful configuration load
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Listings CSV: {}", config.listings_path);
        tracing::debug!("Demographics CSV: {}", config.demographics_path);
        tracing::debug!("Match threshold: {}", config.match_threshold);
        tracing::debug!("Dataset cache TTL: {}s", config.dataset_cache_ttl_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
