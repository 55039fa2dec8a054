//! Property Insights API Library
//!
//! This library reconciles two mismatched tabular sources (free-text
//! real-estate listings and postal-code-keyed demographics) into a single
//! enriched dataset served for interactive filtering and export.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `dataset_cache`: Source fingerprinting and dataset cache keys.
//! - `enrichment`: Record merge workflow (the reconciliation pipeline).
//! - `errors`: Error handling types.
//! - `export`: CSV view of enriched records.
//! - `filters`: Predicate filtering over the enriched dataset.
//! - `handlers`: HTTP request handlers.
//! - `ingest`: CSV source-table loading.
//! - `matcher`: Approximate postal-code matching.
//! - `models`: Core data models.
//! - `normalizer`: Address normalization.

pub mod config;
pub mod dataset_cache;
pub mod enrichment;
pub mod errors;
pub mod export;
pub mod filters;
pub mod handlers;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod normalizer;
