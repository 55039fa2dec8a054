/// Shared reconciliation logic for the HTTP handlers and the batch demo.
///
/// This module provides the merge workflow:
/// 1. Normalize each listing's address and choose its postal fragment
/// 2. Match the fragment against the demographics reference set
/// 3. Attach the matched demographic fields (left join, never inner)
/// 4. Compute derived metrics with null propagation
/// 5. Accumulate per-outcome match statistics
use chrono::Utc;
use std::collections::HashMap;

use crate::errors::AppError;
use crate::ingest::TableLoad;
use crate::matcher::PostalIndex;
use crate::models::{
    CrimeCategory, EnrichedRecord, MatchStatistics, RawDemographic, RawListing, ReconciledDataset,
};
use crate::normalizer::{normalize, normalize_postal_hint};

/// Validates the similarity threshold at the pipeline boundary.
///
/// Config validates at startup; this guards direct library callers.
pub fn ensure_threshold(threshold: f64) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&threshold) || threshold.is_nan() {
        return Err(AppError::InvalidThreshold(threshold));
    }
    Ok(())
}

/// Reconciles the listings table with the demographics table.
///
/// Every input listing yields exactly one enriched record, in input order;
/// unmatched listings keep `None` demographics rather than being dropped.
/// Empty inputs are a table-level fault, distinct from a pass that simply
/// matched nothing.
pub fn reconcile(
    listings: &[RawListing],
    demographics: &[RawDemographic],
    threshold: f64,
) -> Result<(Vec<EnrichedRecord>, MatchStatistics), AppError> {
    ensure_threshold(threshold)?;
    if listings.is_empty() {
        return Err(AppError::NoData("listings table is empty".to_string()));
    }
    if demographics.is_empty() {
        return Err(AppError::NoData("demographics table is empty".to_string()));
    }

    let index = PostalIndex::build(demographics);
    let by_code: HashMap<&str, &RawDemographic> = demographics
        .iter()
        .map(|d| (d.postal_code.as_str(), d))
        .collect();

    tracing::info!(
        "Reconciling {} listings against {} postal codes (threshold {})",
        listings.len(),
        index.len(),
        threshold
    );

    let mut stats = MatchStatistics::default();
    let mut records = Vec::with_capacity(listings.len());

    for listing in listings {
        records.push(enrich_listing(listing, &index, &by_code, threshold, &mut stats));
    }

    tracing::info!(
        "Reconciliation done: {} exact, {} fuzzy, {} unmatched ({:.1}% matched)",
        stats.exact,
        stats.fuzzy,
        stats.unmatched,
        stats.match_rate * 100.0
    );

    Ok((records, stats))
}

/// Enriches a single listing: normalize, match, join, derive.
fn enrich_listing(
    listing: &RawListing,
    index: &PostalIndex,
    by_code: &HashMap<&str, &RawDemographic>,
    threshold: f64,
    stats: &mut MatchStatistics,
) -> EnrichedRecord {
    let normalized = normalize(&listing.address);
    let fragment = choose_fragment(listing, &normalized.fragment);

    let matched = index.best_match(&fragment, threshold);
    stats.record(matched.outcome);

    let demographic = matched
        .matched_code
        .as_deref()
        .and_then(|code| by_code.get(code).copied());

    let median_income = demographic.map(|d| d.median_income);
    let crime_index = demographic.map(|d| d.crime_index);

    EnrichedRecord {
        address: listing.address.clone(),
        normalized_address: normalized.canonical,
        postal_fragment: fragment,
        price: listing.price,
        bedrooms: listing.bedrooms,
        sq_ft: listing.sq_ft,
        extra: listing.extra.clone(),
        match_outcome: matched.outcome,
        match_score: matched.score,
        matched_postal_code: matched.matched_code,
        median_income,
        school_rating: demographic.map(|d| d.school_rating),
        crime_index,
        price_per_sqft: ratio(listing.price, Some(listing.sq_ft)),
        price_to_income_ratio: ratio(listing.price, median_income),
        crime_category: crime_index.map(CrimeCategory::from_index),
    }
}

/// The fragment the matcher sees: an explicit postal-code column wins when it
/// canonicalizes to something usable, otherwise the address-extracted
/// fragment.
fn choose_fragment(listing: &RawListing, address_fragment: &str) -> String {
    if let Some(hint) = listing.postal_hint.as_deref() {
        let canonical = normalize_postal_hint(hint);
        if !canonical.is_empty() {
            return canonical;
        }
    }
    address_fragment.to_string()
}

/// Null-propagating division: a zero or absent denominator yields `None`,
/// never a default numeric value that could be mistaken for real data.
fn ratio(numerator: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(value) if value != 0.0 => Some(numerator / value),
        _ => None,
    }
}

impl ReconciledDataset {
    /// Runs the full pipeline over two loaded tables and bundles the output
    /// with its ingest artifacts and a timestamp. This is the unit the
    /// dataset cache stores and the handlers serve.
    pub fn build(
        listings: TableLoad<RawListing>,
        demographics: TableLoad<RawDemographic>,
        threshold: f64,
    ) -> Result<Self, AppError> {
        let (records, stats) = reconcile(&listings.rows, &demographics.rows, threshold)?;
        Ok(Self {
            records,
            stats,
            rejected_listings: listings.rejected,
            rejected_demographics: demographics.rejected,
            generated_at: Utc::now(),
        })
    }
}
