use crate::config::Config;
use crate::dataset_cache::{dataset_key, source_fingerprint};
use crate::errors::{AppError, ResultExt};
use crate::export::records_to_csv;
use crate::filters::{self, FilterCriteria};
use crate::ingest::{parse_demographics, parse_listings};
use crate::models::{
    CrimeCategory, ReconciledDataset, RecordsResponse, RejectedSummary, StatsResponse,
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Reconciled-dataset cache keyed by source fingerprint + threshold, so
    /// repeated filter/export requests skip the pipeline entirely.
    pub dataset_cache: Cache<String, Arc<ReconciledDataset>>,
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "property-insights-api",
            "version": "0.1.0"
        })),
    )
}

/// Filter query parameters accepted by the records and export endpoints.
///
/// Every parameter is optional; an omitted parameter restricts nothing.
/// `postal_codes` and `crime` take comma-separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct RecordsQueryParams {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<u32>,
    pub max_bedrooms: Option<u32>,
    pub min_sqft: Option<f64>,
    pub max_sqft: Option<f64>,
    pub min_income: Option<f64>,
    pub min_school_rating: Option<f64>,
    pub postal_codes: Option<String>,
    pub crime: Option<String>,
}

impl RecordsQueryParams {
    /// Converts the raw query form into typed filter criteria.
    pub fn into_criteria(self) -> Result<FilterCriteria, AppError> {
        let postal_codes = self.postal_codes.as_deref().and_then(parse_list).map(
            |codes: Vec<String>| codes.into_iter().collect::<HashSet<String>>(),
        );

        let crime_categories = match self.crime.as_deref().and_then(parse_list) {
            Some(raw) => {
                let mut categories = HashSet::new();
                for value in &raw {
                    let category = CrimeCategory::parse(value).ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Unknown crime category '{}'; expected low, medium, or high",
                            value
                        ))
                    })?;
                    categories.insert(category);
                }
                Some(categories)
            }
            None => None,
        };

        Ok(FilterCriteria {
            postal_codes,
            min_price: self.min_price,
            max_price: self.max_price,
            min_bedrooms: self.min_bedrooms,
            max_bedrooms: self.max_bedrooms,
            min_sqft: self.min_sqft,
            max_sqft: self.max_sqft,
            min_income: self.min_income,
            min_school_rating: self.min_school_rating,
            crime_categories,
        })
    }
}

/// Splits a comma-separated query value, dropping empty entries.
fn parse_list(raw: &str) -> Option<Vec<String>> {
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Loads the reconciled dataset, running the pipeline only on cache miss.
///
/// The cache key is the SHA-256 fingerprint of both raw source files plus
/// the configured threshold, so edits to either file invalidate naturally.
pub async fn load_dataset(state: &AppState) -> Result<Arc<ReconciledDataset>, AppError> {
    let listings_bytes = tokio::fs::read(&state.config.listings_path)
        .await
        .with_context(|| format!("reading listings table {}", state.config.listings_path))?;
    let demographics_bytes = tokio::fs::read(&state.config.demographics_path)
        .await
        .with_context(|| {
            format!(
                "reading demographics table {}",
                state.config.demographics_path
            )
        })?;

    let fingerprint = source_fingerprint(&listings_bytes, &demographics_bytes);
    let key = dataset_key(&fingerprint, state.config.match_threshold);

    if let Some(cached) = state.dataset_cache.get(&key).await {
        tracing::debug!("Dataset cache hit ({})", &key[..12]);
        return Ok(cached);
    }

    tracing::info!("Dataset cache miss, running reconciliation pipeline");
    let listings = parse_listings(&listings_bytes)?;
    let demographics = parse_demographics(&demographics_bytes)?;
    let dataset = Arc::new(ReconciledDataset::build(
        listings,
        demographics,
        state.config.match_threshold,
    )?);

    state.dataset_cache.insert(key, dataset.clone()).await;
    Ok(dataset)
}

/// GET /api/v1/records
///
/// Returns the enriched records surviving the active filters, along with the
/// unfiltered dataset size.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `params` - Optional filter query parameters.
///
/// # Returns
///
/// * `Result<Json<RecordsResponse>, AppError>` - The filtered records or an error.
pub async fn get_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQueryParams>,
) -> Result<Json<RecordsResponse>, AppError> {
    tracing::info!("GET /api/v1/records - params: {:?}", params);

    let criteria = params.into_criteria()?;
    let dataset = load_dataset(&state).await?;
    let records = filters::apply(&dataset.records, &criteria);

    Ok(Json(RecordsResponse {
        count: records.len(),
        total: dataset.records.len(),
        records,
    }))
}

/// GET /api/v1/stats
///
/// Returns the match-quality statistics for the current dataset plus
/// rejected-row summaries for both source tables.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, AppError> {
    tracing::info!("GET /api/v1/stats");

    let dataset = load_dataset(&state).await?;
    Ok(Json(StatsResponse {
        stats: dataset.stats.clone(),
        rejected_listings: RejectedSummary::from_rows(&dataset.rejected_listings),
        rejected_demographics: RejectedSummary::from_rows(&dataset.rejected_demographics),
        generated_at: dataset.generated_at,
    }))
}

/// GET /api/v1/export
///
/// Returns the filtered records as a CSV attachment.
///
/// # Returns
///
/// * `Result<Response, AppError>` - A `text/csv` response body or an error.
pub async fn export_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecordsQueryParams>,
) -> Result<Response, AppError> {
    tracing::info!("GET /api/v1/export - params: {:?}", params);

    let criteria = params.into_criteria()?;
    let dataset = load_dataset(&state).await?;
    let records = filters::apply(&dataset.records, &criteria);
    let body = records_to_csv(&records)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"listings_enriched.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/v1/reprocess
///
/// Drops every cached dataset and rebuilds from the current source files.
/// Reprocessing is a full re-run of the pipeline; there is no partial
/// update path.
pub async fn reprocess(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /api/v1/reprocess");

    state.dataset_cache.invalidate_all();
    let dataset = load_dataset(&state).await?;

    Ok(Json(json!({
        "reprocessed": true,
        "records": dataset.records.len(),
        "stats": dataset.stats,
        "generated_at": dataset.generated_at,
    })))
}
