use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Source Table Models ============

/// A single property listing as loaded from the listings table.
///
/// Immutable once loaded; one row per property. Columns beyond the required
/// set are carried in `extra` untouched and reappear in exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    /// Free-text street address, possibly with a trailing postal fragment.
    pub address: String,
    /// Listing price.
    pub price: f64,
    /// Number of bedrooms.
    pub bedrooms: u32,
    /// Interior square footage.
    pub sq_ft: f64,
    /// Raw value of the optional `postal_code` column, if the source has one.
    pub postal_hint: Option<String>,
    /// Pass-through columns in source order: (header, value).
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

/// One demographic record per postal code; the reference side of the join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDemographic {
    /// Canonical 5-digit postal code, zero-padded at ingest.
    pub postal_code: String,
    /// Median household income for the area.
    pub median_income: f64,
    /// School rating on the source's bounded scale.
    pub school_rating: f64,
    /// Numeric crime index; bucketed into `CrimeCategory` by the merger.
    pub crime_index: f64,
}

// ============ Pipeline Models ============

/// Canonical form of a free-text address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    /// Lowercased, abbreviation-expanded, punctuation-stripped address.
    pub canonical: String,
    /// Trailing 5-character digit/wildcard group, uppercase `X`; empty when
    /// no such group exists. The empty string is the explicit
    /// "could not extract" signal.
    pub fragment: String,
}

/// How a postal fragment resolved against the reference code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchOutcome {
    /// Fragment equals a known code verbatim.
    Exact,
    /// Best-scoring candidate cleared the similarity threshold.
    Fuzzy,
    /// Empty fragment, or no candidate cleared the threshold.
    None,
}

/// Result of matching one fragment against the reference set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub outcome: MatchOutcome,
    /// The winning code, present for `Exact` and `Fuzzy`.
    pub matched_code: Option<String>,
    /// Similarity score in [0, 1]; absent when the fragment was empty.
    pub score: Option<f64>,
}

impl MatchResult {
    /// The fixed result for fragments that could not be extracted or resolved.
    pub fn none() -> Self {
        Self {
            outcome: MatchOutcome::None,
            matched_code: None,
            score: None,
        }
    }
}

/// Crime level bucketed from the numeric crime index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrimeCategory {
    Low,
    Medium,
    High,
}

impl CrimeCategory {
    /// Buckets a crime index into {Low, Medium, High} via fixed tertile
    /// thresholds on the 0-100 scale.
    pub fn from_index(index: f64) -> Self {
        if index < 34.0 {
            CrimeCategory::Low
        } else if index < 67.0 {
            CrimeCategory::Medium
        } else {
            CrimeCategory::High
        }
    }

    /// Case-insensitive parse of a category name, for filter criteria.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(CrimeCategory::Low),
            "medium" => Some(CrimeCategory::Medium),
            "high" => Some(CrimeCategory::High),
            _ => None,
        }
    }
}

/// A listing joined (or not) with its demographic record.
///
/// Every `RawListing` produces exactly one `EnrichedRecord`; unmatched
/// listings keep `None` in every demographic-derived field rather than being
/// dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Original free-text address.
    pub address: String,
    /// Canonical address form used for matching.
    pub normalized_address: String,
    /// Fragment the matcher saw (postal hint or address-extracted).
    pub postal_fragment: String,
    pub price: f64,
    pub bedrooms: u32,
    pub sq_ft: f64,
    /// Pass-through columns from the source row.
    pub extra: Vec<(String, String)>,
    pub match_outcome: MatchOutcome,
    /// Similarity score of the winning candidate, if any.
    pub match_score: Option<f64>,
    /// Postal code the listing was joined on.
    pub matched_postal_code: Option<String>,
    pub median_income: Option<f64>,
    pub school_rating: Option<f64>,
    pub crime_index: Option<f64>,
    /// price / sq_ft; `None` when sq_ft is zero.
    pub price_per_sqft: Option<f64>,
    /// price / median_income; `None` when unmatched or income is zero.
    pub price_to_income_ratio: Option<f64>,
    pub crime_category: Option<CrimeCategory>,
}

/// Per-outcome counts for one reconciliation pass.
///
/// A side artifact of the merge, consumed by the presentation layer for its
/// match-quality indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub total: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub unmatched: usize,
    /// (exact + fuzzy) / total; 0.0 for an empty pass.
    pub match_rate: f64,
}

impl MatchStatistics {
    pub fn record(&mut self, outcome: MatchOutcome) {
        self.total += 1;
        match outcome {
            MatchOutcome::Exact => self.exact += 1,
            MatchOutcome::Fuzzy => self.fuzzy += 1,
            MatchOutcome::None => self.unmatched += 1,
        }
        self.match_rate = (self.exact + self.fuzzy) as f64 / self.total as f64;
    }
}

/// A source row that was skipped during ingest, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based line number in the source file (header is line 1).
    pub line: u64,
    pub reason: String,
}

/// The full output of one pipeline run: the unit that gets cached and served.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledDataset {
    pub records: Vec<EnrichedRecord>,
    pub stats: MatchStatistics,
    pub rejected_listings: Vec<RejectedRow>,
    pub rejected_demographics: Vec<RejectedRow>,
    /// When this dataset was produced.
    pub generated_at: DateTime<Utc>,
}

// ============ API Response Models ============

/// Response body for `GET /api/v1/records`.
#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    /// Records surviving the active filters.
    pub count: usize,
    /// Size of the unfiltered dataset.
    pub total: usize,
    pub records: Vec<EnrichedRecord>,
}

/// Summary of rejected rows for one source table: count plus a few samples.
#[derive(Debug, Serialize)]
pub struct RejectedSummary {
    pub count: usize,
    pub samples: Vec<RejectedRow>,
}

impl RejectedSummary {
    const SAMPLE_LIMIT: usize = 5;

    pub fn from_rows(rows: &[RejectedRow]) -> Self {
        Self {
            count: rows.len(),
            samples: rows.iter().take(Self::SAMPLE_LIMIT).cloned().collect(),
        }
    }
}

/// Response body for `GET /api/v1/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: MatchStatistics,
    pub rejected_listings: RejectedSummary,
    pub rejected_demographics: RejectedSummary,
    pub generated_at: DateTime<Utc>,
}
