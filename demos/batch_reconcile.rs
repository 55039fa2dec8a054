use anyhow::Result;

use property_insights_api::enrichment::reconcile;
use property_insights_api::ingest::{load_demographics, load_listings};
use property_insights_api::models::MatchOutcome;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Batch Listing Reconciliation ===\n");

    // Load environment variables
    dotenvy::dotenv().ok();

    let listings_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LISTINGS_CSV").ok())
        .unwrap_or_else(|| "data/listings.csv".to_string());
    let demographics_path = std::env::args()
        .nth(2)
        .or_else(|| std::env::var("DEMOGRAPHICS_CSV").ok())
        .unwrap_or_else(|| "data/demographics.csv".to_string());
    let threshold: f64 = std::env::var("MATCH_THRESHOLD")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.8);

    println!("Loading listings from {}...", listings_path);
    let listings = load_listings(&listings_path)?;
    println!(
        "✓ {} listings loaded ({} rejected)",
        listings.rows.len(),
        listings.rejected.len()
    );

    println!("Loading demographics from {}...", demographics_path);
    let demographics = load_demographics(&demographics_path)?;
    println!(
        "✓ {} demographic areas loaded ({} rejected)\n",
        demographics.rows.len(),
        demographics.rejected.len()
    );

    let (records, stats) = reconcile(&listings.rows, &demographics.rows, threshold)?;

    let total = records.len();
    for (idx, record) in records.iter().enumerate() {
        let outcome = match record.match_outcome {
            MatchOutcome::Exact => "exact",
            MatchOutcome::Fuzzy => "fuzzy",
            MatchOutcome::None => "none ",
        };
        let code = record.matched_postal_code.as_deref().unwrap_or("-----");
        println!(
            "[{}/{}] {} | {} → {}",
            idx + 1,
            total,
            outcome,
            record.address,
            code
        );
    }

    println!("\n=== Reconciliation Complete ===");
    println!("Total listings: {}", stats.total);
    println!("✓ Exact matches: {}", stats.exact);
    println!("✓ Fuzzy matches: {}", stats.fuzzy);
    println!("✗ Unmatched: {}", stats.unmatched);
    println!("Match rate: {:.1}%", stats.match_rate * 100.0);

    for rejected in listings
        .rejected
        .iter()
        .chain(demographics.rejected.iter())
    {
        println!("  rejected row (line {}): {}", rejected.line, rejected.reason);
    }

    Ok(())
}
