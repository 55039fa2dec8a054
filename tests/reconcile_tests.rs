/// Unit tests for the reconciliation pipeline
/// Covers address normalization, postal-code matching, the merge workflow,
/// and predicate filtering
use property_insights_api::enrichment::{ensure_threshold, reconcile};
use property_insights_api::errors::AppError;
use property_insights_api::filters::{self, FilterCriteria};
use property_insights_api::matcher::{similarity, PostalIndex};
use property_insights_api::models::{
    CrimeCategory, MatchOutcome, RawDemographic, RawListing,
};
use property_insights_api::normalizer::{normalize, normalize_postal_hint};

fn listing(address: &str) -> RawListing {
    RawListing {
        address: address.to_string(),
        price: 250_000.0,
        bedrooms: 3,
        sq_ft: 1500.0,
        postal_hint: None,
        extra: Vec::new(),
    }
}

fn demographic(code: &str, income: f64, school: f64, crime: f64) -> RawDemographic {
    RawDemographic {
        postal_code: code.to_string(),
        median_income: income,
        school_rating: school,
        crime_index: crime,
    }
}

fn reference_set() -> Vec<RawDemographic> {
    vec![
        demographic("32501", 48200.0, 6.5, 58.0),
        demographic("32502", 61400.0, 7.8, 31.0),
        demographic("40001", 52000.0, 5.9, 72.0),
    ]
}

#[cfg(test)]
mod normalizer_tests {
    use super::*;

    #[test]
    fn test_lowercases_and_expands_abbreviations() {
        let result = normalize("7893 BRANDON FORKS ST");
        assert_eq!(result.canonical, "7893 brandon forks street");
        assert_eq!(result.fragment, "");
    }

    #[test]
    fn test_expansion_is_whole_token_only() {
        // "stanton" contains "st" but must not become "streetanton"
        let result = normalize("5 Stanton Way");
        assert_eq!(result.canonical, "5 stanton way");

        let result = normalize("12 Dry Creek Rd");
        assert_eq!(result.canonical, "12 dry creek road");
    }

    #[test]
    fn test_strips_punctuation() {
        let result = normalize("42 O'Brien Blvd.");
        assert_eq!(result.canonical, "42 obrien boulevard");

        let result = normalize("412 N. Palafox Ave, Pensacola");
        assert_eq!(result.canonical, "412 north palafox avenue pensacola");
    }

    #[test]
    fn test_collapses_duplicate_words_but_keeps_numbers() {
        let result = normalize("100 Main Main St");
        assert_eq!(result.canonical, "100 main street");

        // All-digit tokens always survive, even repeated
        let result = normalize("1 1 Oak Ln");
        assert_eq!(result.canonical, "1 1 oak lane");
    }

    #[test]
    fn test_extracts_trailing_postal_fragment() {
        assert_eq!(normalize("100 Main Street 32501").fragment, "32501");
        assert_eq!(normalize("100 Main Street, FL 325xx").fragment, "325XX");
        assert_eq!(normalize("100 Main Street").fragment, "");
        // Fragment must be the final token, not anywhere in the text
        assert_eq!(normalize("32501 Main Street").fragment, "");
        // Six digits is not a postal fragment
        assert_eq!(normalize("100 Main Street 325011").fragment, "");
    }

    #[test]
    fn test_never_fails_on_malformed_input() {
        for garbage in ["", "   ", "!!!", "\t\n", "héllo wörld", "....."] {
            let result = normalize(garbage);
            assert_eq!(result.fragment, "");
        }
    }

    #[test]
    fn test_idempotent() {
        for address in [
            "7893 BRANDON FORKS ST",
            "412 N. Palafox Ave, Pensacola FL 32502",
            "100 Main Main Street 325xx",
        ] {
            let once = normalize(address);
            let twice = normalize(&once.canonical);
            assert_eq!(once, twice, "normalize not idempotent for {}", address);
        }
    }

    #[test]
    fn test_postal_hint_canonicalization() {
        // Wildcard-bearing hints keep their shape
        assert_eq!(normalize_postal_hint("325XX"), "325XX");
        assert_eq!(normalize_postal_hint(" 325xx "), "325XX");
        // Plain hints reduce to zero-padded digits
        assert_eq!(normalize_postal_hint("32501-1234"), "32501");
        assert_eq!(normalize_postal_hint("401"), "00401");
        assert_eq!(normalize_postal_hint("3250"), "03250");
        // No digits means no hint
        assert_eq!(normalize_postal_hint("unknown"), "");
        assert_eq!(normalize_postal_hint(""), "");
    }
}

#[cfg(test)]
mod matcher_tests {
    use super::*;

    #[test]
    fn test_exact_match_takes_precedence() {
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("32501", 0.8);
        assert_eq!(result.outcome, MatchOutcome::Exact);
        assert_eq!(result.matched_code.as_deref(), Some("32501"));
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn test_empty_fragment_never_matches() {
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("", 0.0);
        assert_eq!(result.outcome, MatchOutcome::None);
        assert_eq!(result.matched_code, None);
        assert_eq!(result.score, None);
    }

    #[test]
    fn test_wildcard_resolves_to_lexicographically_smallest() {
        // 32501 and 32502 both score 1.0 against 325XX; the tie must break
        // to the smaller code.
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("325XX", 0.8);
        assert_eq!(result.outcome, MatchOutcome::Fuzzy);
        assert_eq!(result.matched_code.as_deref(), Some("32501"));
        assert_eq!(result.score, Some(1.0));
    }

    #[test]
    fn test_wildcard_match_is_fuzzy_not_exact() {
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("325XX", 0.8);
        assert_eq!(result.outcome, MatchOutcome::Fuzzy);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // One substitution away: score is exactly 1 - 1/5. Using that same
        // value as the threshold must still produce a fuzzy match.
        let score = similarity("42501", "32501");
        let index = PostalIndex::build(&[demographic("32501", 48200.0, 6.5, 58.0)]);
        let result = index.best_match("42501", score);
        assert_eq!(result.outcome, MatchOutcome::Fuzzy);
        assert_eq!(result.matched_code.as_deref(), Some("32501"));
        assert_eq!(result.score, Some(score));
    }

    #[test]
    fn test_below_threshold_is_none() {
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("99999", 0.8);
        assert_eq!(result.outcome, MatchOutcome::None);
        assert_eq!(result.matched_code, None);
    }

    #[test]
    fn test_prefix_bucket_miss_falls_back_to_full_scan() {
        // No code starts with 425, but 32501 is still one edit away and
        // must be found by the full scan.
        let index = PostalIndex::build(&reference_set());
        let result = index.best_match("42501", 0.75);
        assert_eq!(result.outcome, MatchOutcome::Fuzzy);
        assert_eq!(result.matched_code.as_deref(), Some("32501"));
    }

    #[test]
    fn test_similarity_formula() {
        // 1 - distance / max(len)
        assert_eq!(similarity("32501", "32501"), 1.0);
        assert_eq!(similarity("325XX", "32501"), 1.0);
        assert_eq!(similarity("325XX", "32502"), 1.0);
        // Wildcards match digits, not arbitrary characters
        assert!(similarity("3250X", "32501") > similarity("3250X", "3250A"));
        let one_edit = similarity("42501", "32501");
        assert!(one_edit > 0.79 && one_edit < 0.81);
    }

    #[test]
    fn test_scores_stay_in_unit_interval() {
        let codes = reference_set();
        for fragment in ["00000", "99999", "3XXXX", "X2501", "1", "325XX"] {
            for demo in &codes {
                let score = similarity(fragment, &demo.postal_code);
                assert!((0.0..=1.0).contains(&score), "score {} for {}", score, fragment);
            }
        }
    }
}

#[cfg(test)]
mod merger_tests {
    use super::*;

    #[test]
    fn test_left_join_keeps_every_listing_in_order() {
        let listings = vec![
            listing("100 Main Street 32501"),
            listing("no fragment here at all"),
            listing("200 Oak Avenue 32502"),
        ];
        let (records, stats) = reconcile(&listings, &reference_set(), 0.8).unwrap();

        assert_eq!(records.len(), listings.len());
        for (record, source) in records.iter().zip(&listings) {
            assert_eq!(record.address, source.address);
        }
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn test_unmatched_listing_keeps_null_demographics() {
        let listings = vec![listing("7893 BRANDON FORKS STREET")];
        let (records, stats) = reconcile(&listings, &reference_set(), 0.8).unwrap();

        let record = &records[0];
        assert_eq!(record.match_outcome, MatchOutcome::None);
        assert_eq!(record.matched_postal_code, None);
        assert_eq!(record.median_income, None);
        assert_eq!(record.school_rating, None);
        assert_eq!(record.crime_index, None);
        assert_eq!(record.crime_category, None);
        // Null, never zero or a default
        assert_eq!(record.price_to_income_ratio, None);
        // Listing-only metric still computes
        assert!(record.price_per_sqft.is_some());
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.match_rate, 0.0);
    }

    #[test]
    fn test_matched_listing_gets_demographics_and_metrics() {
        let listings = vec![listing("100 Main Street 32501")];
        let (records, _) = reconcile(&listings, &reference_set(), 0.8).unwrap();

        let record = &records[0];
        assert_eq!(record.match_outcome, MatchOutcome::Exact);
        assert_eq!(record.matched_postal_code.as_deref(), Some("32501"));
        assert_eq!(record.median_income, Some(48200.0));
        assert_eq!(record.school_rating, Some(6.5));
        assert_eq!(record.crime_index, Some(58.0));
        assert_eq!(record.crime_category, Some(CrimeCategory::Medium));
        assert_eq!(record.price_per_sqft, Some(250_000.0 / 1500.0));
        assert_eq!(record.price_to_income_ratio, Some(250_000.0 / 48200.0));
    }

    #[test]
    fn test_zero_square_footage_yields_null_metric() {
        let mut source = listing("100 Main Street 32501");
        source.sq_ft = 0.0;
        let (records, _) = reconcile(&[source], &reference_set(), 0.8).unwrap();
        assert_eq!(records[0].price_per_sqft, None);
    }

    #[test]
    fn test_postal_hint_preferred_over_address_fragment() {
        let mut source = listing("412 North Palafox Avenue");
        source.postal_hint = Some("325XX".to_string());
        let (records, stats) = reconcile(&[source], &reference_set(), 0.8).unwrap();

        assert_eq!(records[0].postal_fragment, "325XX");
        assert_eq!(records[0].match_outcome, MatchOutcome::Fuzzy);
        assert_eq!(records[0].matched_postal_code.as_deref(), Some("32501"));
        assert_eq!(stats.fuzzy, 1);
    }

    #[test]
    fn test_unusable_hint_falls_back_to_address_fragment() {
        let mut source = listing("15 East Cervantes Street 32502");
        source.postal_hint = Some("pending".to_string());
        let (records, _) = reconcile(&[source], &reference_set(), 0.8).unwrap();

        assert_eq!(records[0].postal_fragment, "32502");
        assert_eq!(records[0].match_outcome, MatchOutcome::Exact);
    }

    #[test]
    fn test_statistics_count_every_outcome() {
        let listings = vec![
            listing("1 A Street 32501"),
            listing("2 B Street 325XX"),
            listing("3 C Street"),
            listing("4 D Street 32502"),
        ];
        let (_, stats) = reconcile(&listings, &reference_set(), 0.8).unwrap();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.exact, 2);
        assert_eq!(stats.fuzzy, 1);
        assert_eq!(stats.unmatched, 1);
        assert_eq!(stats.match_rate, 0.75);
    }

    #[test]
    fn test_empty_tables_are_rejected_up_front() {
        let listings = vec![listing("100 Main Street 32501")];

        let err = reconcile(&[], &reference_set(), 0.8).unwrap_err();
        assert!(matches!(err, AppError::NoData(_)));

        let err = reconcile(&listings, &[], 0.8).unwrap_err();
        assert!(matches!(err, AppError::NoData(_)));
    }

    #[test]
    fn test_zero_matches_is_a_valid_result_not_an_error() {
        let listings = vec![listing("somewhere unknowable")];
        let result = reconcile(&listings, &reference_set(), 0.8);
        assert!(result.is_ok());
        let (records, stats) = result.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(stats.match_rate, 0.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ensure_threshold(0.0).is_ok());
        assert!(ensure_threshold(1.0).is_ok());
        assert!(matches!(
            ensure_threshold(1.5),
            Err(AppError::InvalidThreshold(_))
        ));
        assert!(matches!(
            ensure_threshold(-0.1),
            Err(AppError::InvalidThreshold(_))
        ));
        assert!(matches!(
            reconcile(&[listing("x")], &reference_set(), 2.0),
            Err(AppError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_crime_bucketing_thresholds() {
        assert_eq!(CrimeCategory::from_index(0.0), CrimeCategory::Low);
        assert_eq!(CrimeCategory::from_index(33.9), CrimeCategory::Low);
        assert_eq!(CrimeCategory::from_index(34.0), CrimeCategory::Medium);
        assert_eq!(CrimeCategory::from_index(66.9), CrimeCategory::Medium);
        assert_eq!(CrimeCategory::from_index(67.0), CrimeCategory::High);
        assert_eq!(CrimeCategory::from_index(100.0), CrimeCategory::High);
    }
}

#[cfg(test)]
mod filter_tests {
    use super::*;

    fn sample_records() -> Vec<property_insights_api::models::EnrichedRecord> {
        let mut matched = listing("1 A Street 32501");
        matched.price = 300_000.0;
        matched.bedrooms = 4;

        let mut fuzzy = listing("2 B Street 325XX");
        fuzzy.price = 150_000.0;
        fuzzy.bedrooms = 2;

        let mut unmatched = listing("3 C Street");
        unmatched.price = 500_000.0;
        unmatched.bedrooms = 5;

        let (records, _) =
            reconcile(&[matched, fuzzy, unmatched], &reference_set(), 0.8).unwrap();
        records
    }

    #[test]
    fn test_default_criteria_restrict_nothing() {
        let records = sample_records();
        let criteria = FilterCriteria::default();
        assert!(criteria.is_unrestricted());

        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), records.len());
    }

    #[test]
    fn test_price_range() {
        let records = sample_records();
        let criteria = FilterCriteria {
            min_price: Some(200_000.0),
            max_price: Some(400_000.0),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].price, 300_000.0);
    }

    #[test]
    fn test_bedroom_range() {
        let records = sample_records();
        let criteria = FilterCriteria {
            min_bedrooms: Some(4),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_active_demographic_filter_excludes_unmatched() {
        let records = sample_records();
        // Every matched area clears this income floor; the unmatched record
        // has no income at all and must be excluded.
        let criteria = FilterCriteria {
            min_income: Some(10_000.0),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.median_income.is_some()));
    }

    #[test]
    fn test_inactive_demographic_filter_includes_unmatched() {
        let records = sample_records();
        let criteria = FilterCriteria {
            min_price: Some(400_000.0),
            ..Default::default()
        };
        // The only record over 400k is the unmatched one; with no active
        // demographic predicate it stays.
        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].match_outcome, MatchOutcome::None);
    }

    #[test]
    fn test_postal_code_membership() {
        let records = sample_records();
        let criteria = FilterCriteria {
            postal_codes: Some(["32501".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        // Both the exact and the wildcard-resolved record landed on 32501.
        assert_eq!(filtered.len(), 2);
        assert!(filtered
            .iter()
            .all(|r| r.matched_postal_code.as_deref() == Some("32501")));
    }

    #[test]
    fn test_crime_category_membership() {
        let records = sample_records();
        let criteria = FilterCriteria {
            crime_categories: Some([CrimeCategory::Medium].into_iter().collect()),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        assert!(!filtered.is_empty());
        assert!(filtered
            .iter()
            .all(|r| r.crime_category == Some(CrimeCategory::Medium)));
    }

    #[test]
    fn test_predicates_combine_with_and() {
        let records = sample_records();
        let criteria = FilterCriteria {
            min_price: Some(100_000.0),
            min_bedrooms: Some(4),
            min_income: Some(10_000.0),
            ..Default::default()
        };
        // min_bedrooms keeps {matched, unmatched}; min_income then removes
        // the unmatched record.
        let filtered = filters::apply(&records, &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].bedrooms, 4);
    }

    #[test]
    fn test_adding_criteria_never_grows_the_result() {
        let records = sample_records();
        let loose = FilterCriteria {
            min_price: Some(100_000.0),
            ..Default::default()
        };
        let tight = FilterCriteria {
            min_price: Some(100_000.0),
            min_school_rating: Some(7.0),
            ..Default::default()
        };
        assert!(filters::apply(&records, &tight).len() <= filters::apply(&records, &loose).len());
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let records = sample_records();
        let before: Vec<String> = records.iter().map(|r| r.address.clone()).collect();
        let criteria = FilterCriteria {
            min_price: Some(1_000_000.0),
            ..Default::default()
        };
        let filtered = filters::apply(&records, &criteria);
        assert!(filtered.is_empty());
        let after: Vec<String> = records.iter().map(|r| r.address.clone()).collect();
        assert_eq!(before, after);
    }
}
