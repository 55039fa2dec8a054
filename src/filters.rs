/// Predicate filtering over the enriched dataset.
///
/// Criteria are independent optional predicates combined with logical AND.
/// A predicate left unset restricts nothing. Active predicates over
/// demographic-derived fields treat unmatched records (null fields) as
/// failing, so demographic filters exclude unmatched listings while leaving
/// them visible when no demographic filter is active.
use std::collections::HashSet;

use crate::models::{CrimeCategory, EnrichedRecord};

/// User-selected filter configuration. `Default` applies no restriction.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Keep records matched to one of these postal codes.
    pub postal_codes: Option<HashSet<String>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_bedrooms: Option<u32>,
    pub max_bedrooms: Option<u32>,
    pub min_sqft: Option<f64>,
    pub max_sqft: Option<f64>,
    /// Keep records whose area's median income is at least this.
    pub min_income: Option<f64>,
    /// Keep records whose area's school rating is at least this.
    pub min_school_rating: Option<f64>,
    /// Keep records whose crime category is one of these.
    pub crime_categories: Option<HashSet<CrimeCategory>>,
}

impl FilterCriteria {
    /// True when no predicate is active.
    pub fn is_unrestricted(&self) -> bool {
        self.postal_codes.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_bedrooms.is_none()
            && self.max_bedrooms.is_none()
            && self.min_sqft.is_none()
            && self.max_sqft.is_none()
            && self.min_income.is_none()
            && self.min_school_rating.is_none()
            && self.crime_categories.is_none()
    }

    /// Whether a single record passes every active predicate.
    pub fn matches(&self, record: &EnrichedRecord) -> bool {
        if let Some(codes) = &self.postal_codes {
            // Demographic-derived: unmatched records have no code and fail.
            match &record.matched_postal_code {
                Some(code) if codes.contains(code) => {}
                _ => return false,
            }
        }

        if !in_range(record.price, self.min_price, self.max_price) {
            return false;
        }
        if let Some(min) = self.min_bedrooms {
            if record.bedrooms < min {
                return false;
            }
        }
        if let Some(max) = self.max_bedrooms {
            if record.bedrooms > max {
                return false;
            }
        }
        if !in_range(record.sq_ft, self.min_sqft, self.max_sqft) {
            return false;
        }

        if let Some(min) = self.min_income {
            match record.median_income {
                Some(income) if income >= min => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_school_rating {
            match record.school_rating {
                Some(rating) if rating >= min => {}
                _ => return false,
            }
        }
        if let Some(categories) = &self.crime_categories {
            match record.crime_category {
                Some(category) if categories.contains(&category) => {}
                _ => return false,
            }
        }

        true
    }
}

fn in_range(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// Applies the criteria to a record sequence.
///
/// Non-mutating: always returns a new sequence of clones and never reorders
/// survivors.
pub fn apply(records: &[EnrichedRecord], criteria: &FilterCriteria) -> Vec<EnrichedRecord> {
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect()
}
