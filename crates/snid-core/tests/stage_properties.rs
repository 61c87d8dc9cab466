mod common;

use common::{Family, build_template, noise, observed};
use snid_core::ClassificationConfig;
use snid_core::common::config::FilterConfig;
use snid_core::consensus::classify_matches;
use snid_core::correlation::CorrelationEngine;
use snid_core::domain::MatchRecord;
use snid_core::preprocess::Preprocessor;
use snid_core::ranking::rank_matches;

fn preprocessor(config: &ClassificationConfig) -> Preprocessor {
    Preprocessor::new(&config.grid, config.preprocess.clone()).expect("preprocessor")
}

#[test]
fn canonical_spectra_fill_the_grid_with_zero_mean() {
    let config = ClassificationConfig::default();
    let preprocessor = preprocessor(&config);
    let inputs = [
        observed(Family::Ia, 0.0, 0.0),
        observed(Family::II, 5.0, 0.1),
        noise(7, 0.1),
    ];
    for spectrum in &inputs {
        let canonical = preprocessor.process(spectrum).expect("canonical");
        assert_eq!(canonical.len(), config.grid.num_points);
        let mean = canonical.flux().iter().sum::<f64>() / canonical.len() as f64;
        assert!(mean.abs() < 1.0e-2, "mean {mean}");
        assert!(canonical.flux().iter().all(|value| value.is_finite()));
    }
}

#[test]
fn template_matches_itself_at_zero_lag() {
    let config = ClassificationConfig::default();
    let template = build_template(&config, Family::Ia, 0.0);
    let engine = CorrelationEngine::new(*template.spectrum.grid(), config.correlation);
    let input = engine.prepare(&template.spectrum);

    let records = engine.match_template(&input, &template);
    let best = &records[0];
    assert!(best.lag.abs() < 0.1);
    assert!(best.redshift.abs() < 1.0e-3);
    assert!((best.peak_height - 1.0).abs() < 1.0e-6);
    assert!((best.overlap - 1.0).abs() < 1.0e-12);
}

#[test]
fn shifted_copy_recovers_its_stretch_factor() {
    let config = ClassificationConfig::default();
    let template = build_template(&config, Family::Ib, 0.0);
    let engine = CorrelationEngine::new(*template.spectrum.grid(), config.correlation);

    for redshift in [0.01, 0.05, 0.2] {
        let canonical = preprocessor(&config)
            .process(&observed(Family::Ib, 0.0, redshift))
            .expect("canonical");
        let records = engine.match_template(&engine.prepare(&canonical), &template);
        let best = &records[0];
        let tolerance = (3.0 * best.redshift_error).max(2.0 * engine.grid().dlog());
        assert!(
            (best.redshift - redshift).abs() <= tolerance,
            "z={redshift}: got {} +/- {}",
            best.redshift,
            best.redshift_error
        );
    }
}

fn all_records(config: &ClassificationConfig, redshift: f64) -> Vec<MatchRecord> {
    let engine = CorrelationEngine::new(config.grid.to_grid().expect("grid"), config.correlation);
    let canonical = preprocessor(config)
        .process(&observed(Family::Ia, 0.0, redshift))
        .expect("canonical");
    let input = engine.prepare(&canonical);
    common::library(config)
        .iter()
        .flat_map(|template| engine.match_template(&input, template))
        .collect()
}

#[test]
fn ranking_twice_changes_nothing() {
    let config = ClassificationConfig::default();
    let records = all_records(&config, 0.03);
    let thresholds = FilterConfig {
        min_quality: 1.0,
        ..config.filter
    };
    let once = rank_matches(&records, &thresholds);
    let twice = rank_matches(&once, &thresholds);
    assert!(!once.is_empty());
    assert_eq!(once, twice);
    assert!(
        once.windows(2)
            .all(|pair| pair[0].quality >= pair[1].quality)
    );
}

#[test]
fn consensus_ignores_input_order() {
    let config = ClassificationConfig::default();
    let ranked = rank_matches(&all_records(&config, 0.03), &config.filter);
    let expected = classify_matches(&ranked, &config.consensus).expect("classified");

    let mut reversed = ranked.clone();
    reversed.reverse();
    let mut interleaved: Vec<MatchRecord> = ranked.iter().step_by(2).cloned().collect();
    interleaved.extend(ranked.iter().skip(1).step_by(2).cloned());

    for permuted in [reversed, interleaved] {
        let result = classify_matches(&permuted, &config.consensus).expect("classified");
        assert_eq!(result.best_type, expected.best_type);
        assert!((result.redshift - expected.redshift).abs() < 1.0e-12);
        assert!((result.redshift_error - expected.redshift_error).abs() < 1.0e-12);
    }
}
