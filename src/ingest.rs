/// CSV ingest for the two source tables.
///
/// Row-level faults (missing fields, unparseable numerics, duplicate codes)
/// are isolated: the row is skipped and recorded with a reason, and the batch
/// continues. Table-level faults (unreadable file, missing required columns,
/// no usable rows) abort the load with a distinct error, since a pipeline
/// must never run on absent input.
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::path::Path;

use crate::errors::AppError;
use crate::models::{RawDemographic, RawListing, RejectedRow};

/// Result of loading one source table: typed rows plus rejected-row records.
#[derive(Debug, Clone)]
pub struct TableLoad<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<RejectedRow>,
}

/// Accepted header spellings per required listings column.
const ADDRESS_COLUMNS: &[&str] = &["address", "raw_address"];
const PRICE_COLUMNS: &[&str] = &["price", "listing_price"];
const BEDROOMS_COLUMNS: &[&str] = &["bedrooms"];
const SQFT_COLUMNS: &[&str] = &["sq_ft", "sqft", "square_footage"];
/// Optional listings column whose value feeds the matcher as a postal hint.
const POSTAL_HINT_COLUMNS: &[&str] = &["postal_code", "zip_code"];

/// Accepted header spellings per required demographics column.
const DEMO_CODE_COLUMNS: &[&str] = &["postal_code", "zip_code"];
const DEMO_INCOME_COLUMNS: &[&str] = &["median_income"];
const DEMO_SCHOOL_COLUMNS: &[&str] = &["school_rating"];
const DEMO_CRIME_COLUMNS: &[&str] = &["crime_index"];

/// Loads the listings table from a CSV file.
pub fn load_listings(path: impl AsRef<Path>) -> Result<TableLoad<RawListing>, AppError> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_listings(&bytes)
}

/// Loads the demographics table from a CSV file.
pub fn load_demographics(path: impl AsRef<Path>) -> Result<TableLoad<RawDemographic>, AppError> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_demographics(&bytes)
}

/// Parses listings rows out of raw CSV bytes.
///
/// Required columns: address, price, bedrooms, square footage. Any other
/// column passes through untouched on each row.
pub fn parse_listings(bytes: &[u8]) -> Result<TableLoad<RawListing>, AppError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers()?.clone();

    let address_idx = required_column(&headers, ADDRESS_COLUMNS, "listings", "address")?;
    let price_idx = required_column(&headers, PRICE_COLUMNS, "listings", "price")?;
    let bedrooms_idx = required_column(&headers, BEDROOMS_COLUMNS, "listings", "bedrooms")?;
    let sqft_idx = required_column(&headers, SQFT_COLUMNS, "listings", "sq_ft")?;
    let hint_idx = find_column(&headers, POSTAL_HINT_COLUMNS);

    let consumed = [address_idx, price_idx, bedrooms_idx, sqft_idx];

    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    let mut row_count: u64 = 0;

    for result in reader.records() {
        let record = result?;
        row_count += 1;
        let line = record_line(&record, row_count);

        let address = match non_empty_field(&record, address_idx) {
            Some(value) => value.to_string(),
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "missing address".to_string(),
                });
                continue;
            }
        };

        let price = match parse_numeric(&record, price_idx) {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable price".to_string(),
                });
                continue;
            }
        };

        let bedrooms = match record
            .get(bedrooms_idx)
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable bedrooms".to_string(),
                });
                continue;
            }
        };

        let sq_ft = match parse_numeric(&record, sqft_idx) {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable sq_ft".to_string(),
                });
                continue;
            }
        };

        let postal_hint = hint_idx
            .and_then(|idx| non_empty_field(&record, idx))
            .map(|value| value.to_string());

        let extra: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| !consumed.contains(idx))
            .map(|(idx, header)| {
                (
                    header.to_string(),
                    record.get(idx).unwrap_or_default().to_string(),
                )
            })
            .collect();

        rows.push(RawListing {
            address,
            price,
            bedrooms,
            sq_ft,
            postal_hint,
            extra,
        });
    }

    finish_load("listings", rows, rejected, row_count)
}

/// Parses demographics rows out of raw CSV bytes.
///
/// Postal codes are canonicalized to zero-padded 5-digit form here; the rest
/// of the pipeline treats them as opaque keys. Postal codes are unique within
/// this table, so a repeated code rejects the later row.
pub fn parse_demographics(bytes: &[u8]) -> Result<TableLoad<RawDemographic>, AppError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers()?.clone();

    let code_idx = required_column(&headers, DEMO_CODE_COLUMNS, "demographics", "postal_code")?;
    let income_idx = required_column(&headers, DEMO_INCOME_COLUMNS, "demographics", "median_income")?;
    let school_idx = required_column(&headers, DEMO_SCHOOL_COLUMNS, "demographics", "school_rating")?;
    let crime_idx = required_column(&headers, DEMO_CRIME_COLUMNS, "demographics", "crime_index")?;

    let mut rows: Vec<RawDemographic> = Vec::new();
    let mut rejected = Vec::new();
    let mut seen_codes: HashSet<String> = HashSet::new();
    let mut row_count: u64 = 0;

    for result in reader.records() {
        let record = result?;
        row_count += 1;
        let line = record_line(&record, row_count);

        let postal_code = match record.get(code_idx).and_then(canonical_code) {
            Some(code) => code,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable postal code".to_string(),
                });
                continue;
            }
        };

        if !seen_codes.insert(postal_code.clone()) {
            rejected.push(RejectedRow {
                line,
                reason: format!("duplicate postal code {}", postal_code),
            });
            continue;
        }

        let median_income = match parse_numeric(&record, income_idx) {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable median income".to_string(),
                });
                continue;
            }
        };

        let school_rating = match parse_numeric(&record, school_idx) {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable school rating".to_string(),
                });
                continue;
            }
        };

        let crime_index = match parse_numeric(&record, crime_idx) {
            Some(value) => value,
            None => {
                rejected.push(RejectedRow {
                    line,
                    reason: "unparseable crime index".to_string(),
                });
                continue;
            }
        };

        rows.push(RawDemographic {
            postal_code,
            median_income,
            school_rating,
            crime_index,
        });
    }

    finish_load("demographics", rows, rejected, row_count)
}

/// Shared tail of both loaders: a table with no usable rows is a table-level
/// fault, surfaced distinctly from a dataset that simply matched nothing.
fn finish_load<T>(
    table: &str,
    rows: Vec<T>,
    rejected: Vec<RejectedRow>,
    row_count: u64,
) -> Result<TableLoad<T>, AppError> {
    if rows.is_empty() {
        if row_count == 0 {
            return Err(AppError::NoData(format!("{} table is empty", table)));
        }
        return Err(AppError::NoData(format!(
            "{} table produced no usable rows ({} rejected)",
            table,
            rejected.len()
        )));
    }

    if !rejected.is_empty() {
        tracing::warn!(
            "{} load: {} rows accepted, {} rejected",
            table,
            rows.len(),
            rejected.len()
        );
    } else {
        tracing::debug!("{} load: {} rows accepted", table, rows.len());
    }

    Ok(TableLoad { rows, rejected })
}

/// Finds the first header matching one of the accepted spellings
/// (case-insensitive).
fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim();
        names.iter().any(|name| header.eq_ignore_ascii_case(name))
    })
}

fn required_column(
    headers: &StringRecord,
    names: &[&str],
    table: &str,
    label: &str,
) -> Result<usize, AppError> {
    find_column(headers, names).ok_or_else(|| {
        AppError::NoData(format!(
            "{} table is missing required column '{}'",
            table, label
        ))
    })
}

fn non_empty_field<'r>(record: &'r StringRecord, idx: usize) -> Option<&'r str> {
    record.get(idx).map(str::trim).filter(|v| !v.is_empty())
}

/// Tolerant numeric parse: trims and drops currency/grouping characters.
/// Non-finite values count as unparseable.
fn parse_numeric(record: &StringRecord, idx: usize) -> Option<f64> {
    let raw = non_empty_field(record, idx)?;
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical zero-padded 5-digit form of a reference postal code.
fn canonical_code(value: &str) -> Option<String> {
    let mut digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.truncate(5);
    Some(format!("{:0>5}", digits))
}

/// 1-based file line for a record, falling back to the row ordinal when the
/// reader has no position (header occupies line 1).
fn record_line(record: &StringRecord, row_count: u64) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(row_count + 1)
}
