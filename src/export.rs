/// CSV view of enriched records for the presentation layer's export.
///
/// Pure read operation over the merger's output: fixed columns first, then
/// the sorted union of pass-through columns. Null metrics serialize as empty
/// cells, never as sentinel numbers.
use std::collections::BTreeSet;

use crate::errors::AppError;
use crate::models::{CrimeCategory, EnrichedRecord, MatchOutcome};

const FIXED_HEADERS: &[&str] = &[
    "address",
    "normalized_address",
    "postal_fragment",
    "price",
    "bedrooms",
    "sq_ft",
    "match_outcome",
    "match_score",
    "matched_postal_code",
    "median_income",
    "school_rating",
    "crime_index",
    "crime_category",
    "price_per_sqft",
    "price_to_income_ratio",
];

/// Serializes records to a CSV document.
pub fn records_to_csv(records: &[EnrichedRecord]) -> Result<String, AppError> {
    // Pass-through columns vary by source file; emit the union in a stable
    // order so every row has the same width.
    let extra_headers: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.extra.iter().map(|(header, _)| header.as_str()))
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header_row: Vec<&str> = FIXED_HEADERS.to_vec();
    header_row.extend(extra_headers.iter().copied());
    writer
        .write_record(&header_row)
        .map_err(AppError::from)?;

    for record in records {
        let mut row: Vec<String> = vec![
            record.address.clone(),
            record.normalized_address.clone(),
            record.postal_fragment.clone(),
            format_f64(record.price),
            record.bedrooms.to_string(),
            format_f64(record.sq_ft),
            outcome_label(record.match_outcome).to_string(),
            record.match_score.map(format_f64).unwrap_or_default(),
            record.matched_postal_code.clone().unwrap_or_default(),
            record.median_income.map(format_f64).unwrap_or_default(),
            record.school_rating.map(format_f64).unwrap_or_default(),
            record.crime_index.map(format_f64).unwrap_or_default(),
            record
                .crime_category
                .map(category_label)
                .unwrap_or_default()
                .to_string(),
            record.price_per_sqft.map(format_f64).unwrap_or_default(),
            record
                .price_to_income_ratio
                .map(format_f64)
                .unwrap_or_default(),
        ];

        for header in &extra_headers {
            let value = record
                .extra
                .iter()
                .find(|(name, _)| name == header)
                .map(|(_, value)| value.clone())
                .unwrap_or_default();
            row.push(value);
        }

        writer.write_record(&row).map_err(AppError::from)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV writer flush failed: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::InternalError(format!("CSV output was not UTF-8: {}", e)))
}

fn format_f64(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn outcome_label(outcome: MatchOutcome) -> &'static str {
    match outcome {
        MatchOutcome::Exact => "exact",
        MatchOutcome::Fuzzy => "fuzzy",
        MatchOutcome::None => "none",
    }
}

fn category_label(category: CrimeCategory) -> &'static str {
    match category {
        CrimeCategory::Low => "Low",
        CrimeCategory::Medium => "Medium",
        CrimeCategory::High => "High",
    }
}
