//! Integration tests for fcindex-construction.
//!
//! These tests run the full methodology over a realistic synthetic universe.

use std::collections::HashSet;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use fcindex_construction::prelude::*;
use fcindex_construction::{valuation, weighting};
use fcindex_core::config::default_stages;

// =============================================================================
// TEST FIXTURES
// =============================================================================

const INDUSTRIES: [&str; 10] = [
    "Energy",
    "Materials",
    "Industrials",
    "Consumer Staples",
    "Health Care",
    "Information Technology",
    "Utilities",
    "Banking",
    "Real Estate",
    "Non-bank Finance",
];

fn simple_hash(seed: u64, i: u64) -> u64 {
    let mut x = seed.wrapping_add(i).wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x = x.wrapping_mul(0x517cc1b727220a95);
    x ^= x >> 32;
    x
}

/// Generates a deterministic universe of `n` A-share style records.
fn generate_universe(n: usize, seed: u64) -> Universe {
    let records = (0..n)
        .map(|i| {
            let hash = simple_hash(seed, i as u64);

            let price = 2.0 + (hash % 3000) as f64 / 10.0;
            let shares = 1e8 + ((hash >> 8) % 5000) as f64 * 1e6;
            let market_value = price * shares;
            let ev = market_value * (0.8 + ((hash >> 16) % 80) as f64 / 100.0);
            let fcf = ev * (((hash >> 24) % 200) as f64 / 1000.0 - 0.02);
            let operating_profit = ev * 0.05 * (1 + (hash >> 32) % 5) as f64;
            let ocf = operating_profit * ((hash >> 36) % 150) as f64 / 100.0;
            let turnover = 1e6 * (1 + (hash >> 40) % 1000) as f64;

            InstrumentRecord::builder()
                .id(format!("{:06}.SZ", i))
                .name(format!("Company {i}"))
                .industry(INDUSTRIES[(hash >> 4) as usize % INDUSTRIES.len()])
                .price(price)
                .shares(shares)
                .turnover(turnover)
                .free_cash_flow(fcf)
                .enterprise_value(ev)
                .operating_cash_flow(ocf)
                .operating_profit(operating_profit)
                .listing_months(((hash >> 44) % 240) as u32)
                .roe_stability(((hash >> 48) % 100) as f64 / 100.0)
                .flags(EligibilityFlags {
                    special_treatment: hash % 53 == 0,
                    violation: hash % 59 == 0,
                    loss_making: fcf < 0.0 && hash % 3 == 0,
                    abnormal_price: hash % 61 == 0,
                })
                .build()
                .unwrap()
        })
        .collect();
    Universe::new(records).unwrap()
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

// =============================================================================
// END-TO-END METHODOLOGY
// =============================================================================

#[test]
fn test_default_methodology_end_to_end() {
    let universe = generate_universe(800, 42);
    let run = IndexConstructor::new(IndexConfig::default())
        .run(&universe, as_of())
        .unwrap();

    assert_eq!(run.selection.components.len(), 100);
    assert_eq!(run.selection.backup.len(), 5);
    assert!(run.selection.shortfall.is_none());

    // Weight invariants
    let table = &run.allocation.table;
    assert_eq!(table.len(), 100);
    assert_relative_eq!(table.total(), 1.0, epsilon = 1e-9);
    for entry in table.iter() {
        assert!(entry.weight <= 0.10 + 1e-6, "{} over cap", entry.id);
        assert!(entry.weight > 0.0);
    }

    // Audit trail follows the configured stage order
    let names: Vec<&str> = run.audit.stages.iter().map(|s| s.name.as_str()).collect();
    let expected: Vec<String> = default_stages().into_iter().map(|s| s.name).collect();
    assert_eq!(names, expected);
    assert_eq!(run.audit.initial, 800);
    for window in run.audit.stages.windows(2) {
        assert_eq!(window[0].after, window[1].before);
        assert!(window[1].after <= window[1].before);
    }

    // Every component satisfies the record-level rules
    let excluded = ["Banking", "Non-bank Finance", "Real Estate"];
    for record in run.selection.components.iter() {
        assert!(!record.flags.special_treatment);
        assert!(!record.flags.violation);
        assert!(!record.flags.loss_making);
        assert!(!record.flags.abnormal_price);
        assert!(record.listing_months >= 6);
        assert!(!excluded.contains(&record.industry.as_str()));
        assert!(record.free_cash_flow > 0.0);
        assert!(record.enterprise_value > 0.0);
        assert!(record.operating_cash_flow > 0.0);
    }

    // Anchored to the base point without a configured base value
    assert_relative_eq!(run.valuation.index_value, 1000.0, epsilon = 1e-9);
    assert_eq!(run.valuation.as_of, as_of());
    assert_eq!(run.summary.total_components, 100);
}

#[test]
fn test_components_ranked_by_fcf_yield() {
    let universe = generate_universe(800, 7);
    let run = IndexConstructor::new(IndexConfig::default())
        .run(&universe, as_of())
        .unwrap();

    let yields: Vec<f64> = run
        .selection
        .components
        .iter()
        .map(InstrumentRecord::fcf_yield)
        .collect();
    assert!(yields.windows(2).all(|w| w[0] >= w[1]));

    let last = *yields.last().unwrap();
    for backup in run.selection.backup.iter() {
        assert!(backup.fcf_yield() <= last);
    }

    let component_ids: HashSet<_> = run.selection.components.ids().into_iter().collect();
    for id in run.selection.backup.ids() {
        assert!(!component_ids.contains(id));
    }
}

#[test]
fn test_steps_compose_like_constructor() {
    let universe = generate_universe(600, 3);
    let config = IndexConfig::default().with_base_value(2.5e9);

    let run = IndexConstructor::new(config.clone())
        .run(&universe, as_of())
        .unwrap();

    let screened = screen(universe.records(), &config.stages).unwrap();
    let selection = select(
        &screened.records,
        &config.selection.ranking_field,
        config.selection.target_size,
        config.selection.backup_fraction,
    )
    .unwrap();
    let allocation = weighting::allocate(
        selection.components.records(),
        &config.weighting.sizing_field,
        &config.weighting.allocator,
    )
    .unwrap();
    let valuation = valuation::value(
        &selection.components,
        &allocation.table,
        2.5e9,
        config.index.base_point,
        as_of(),
    )
    .unwrap();

    assert_eq!(screened.audit, run.audit);
    assert_eq!(selection.components, run.selection.components);
    assert_eq!(allocation.table, run.allocation.table);
    assert_relative_eq!(valuation.index_value, run.valuation.index_value);
    assert_relative_eq!(
        run.valuation.index_value,
        run.valuation.current_value / 2.5e9 * 1000.0,
        max_relative = 1e-12
    );
}

#[test]
fn test_toml_config_drives_run() {
    let toml = r#"
        [selection]
        target_size = 30
        backup_fraction = 0.1

        [weighting]
        max_weight = 0.05

        [[stages]]
        name = "positive_fcf"
        rule = "require_positive"
        field = "free_cash_flow"

        [[stages]]
        name = "turnover_bottom_50pct"
        rule = "quantile_cutoff"
        field = "turnover"
        fraction = 0.5
    "#;
    let config = IndexConfig::from_toml_str(toml).unwrap();
    let universe = generate_universe(200, 11);

    let run = IndexConstructor::new(config).run(&universe, as_of()).unwrap();
    assert_eq!(run.audit.stages.len(), 2);
    assert_eq!(run.selection.components.len(), 30);
    assert_eq!(run.selection.backup.len(), 3);
    assert!(run.summary.max_weight <= 0.05 + 1e-6);
    assert_relative_eq!(run.allocation.table.total(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_tight_cap_spreads_weight() {
    let universe = generate_universe(800, 99);
    let config = IndexConfig::default()
        .with_stages(vec![ScreeningStage::require_positive(
            "positive_fcf",
            Field::FreeCashFlow,
        )])
        .with_target_size(50)
        .with_max_weight(0.025);

    let run = IndexConstructor::new(config).run(&universe, as_of()).unwrap();
    let summary = run.summary;
    assert!(summary.max_weight <= 0.025 + 1e-6);
    assert_eq!(summary.concentration_count, 0);
    assert_relative_eq!(summary.avg_weight, 0.02, epsilon = 1e-12);
    assert!(run.allocation.converged);
}

#[test]
fn test_industry_distribution_covers_all_weight() {
    let universe = generate_universe(800, 5);
    let run = IndexConstructor::new(IndexConfig::default())
        .run(&universe, as_of())
        .unwrap();

    let distribution = &run.industry_distribution;
    let total: f64 = distribution.buckets().iter().map(|b| b.weight).sum();
    let count: usize = distribution.buckets().iter().map(|b| b.count).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    assert_eq!(count, 100);
    assert!(distribution.get("Banking").is_none());
    assert!(distribution
        .buckets()
        .windows(2)
        .all(|w| w[0].weight >= w[1].weight));
}

#[test]
fn test_run_serializes() {
    let universe = generate_universe(300, 1);
    let config = IndexConfig::default().with_target_size(20);
    let run = IndexConstructor::new(config).run(&universe, as_of()).unwrap();

    let json = serde_json::to_value(&run).unwrap();
    assert_eq!(json["selection"]["components"].as_array().unwrap().len(), 20);
    assert_eq!(json["allocation"]["table"]["entries"].as_array().unwrap().len(), 20);
    assert!(json["audit"]["stages"].is_array());
    assert_eq!(json["valuation"]["as_of"], "2024-06-28");
    assert!(json["valuation"]["index_value"].is_number());
}

#[test]
fn test_monotone_in_sizing_metric() {
    let universe = generate_universe(800, 21);
    let run = IndexConstructor::new(IndexConfig::default())
        .run(&universe, as_of())
        .unwrap();

    let mut pairs: Vec<(f64, f64)> = run
        .selection
        .components
        .iter()
        .map(|r| (r.free_cash_flow, run.allocation.table.weight(&r.id).unwrap()))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in pairs.windows(2) {
        assert!(w[1].1 >= w[0].1 - 1e-9);
    }
}
