//! Tests for reproducibility of simulated paths
//!
//! These tests verify that:
//! - The same seed reproduces a run bit for bit
//! - Path `i` does not depend on how many paths are in the run
//! - Chunked and whole-run execution produce identical paths
//! - Cancellation stops a run with no partial result

use super::baseline_model;
use crate::config::{SimulationBuilder, SimulationConfig};
use crate::error::SimulationError;
use crate::model::{AllocationWeights, Periodicity};
use crate::progress::SimulationProgress;
use crate::simulation::{PathResult, SimulationEngine};

fn sixty_forty(paths: usize, seed: u64) -> SimulationConfig {
    SimulationBuilder::new()
        .allocation(
            AllocationWeights::from_pairs([("us_equity", 0.6), ("us_bonds", 0.4)]).unwrap(),
        )
        .years(10)
        .paths(paths)
        .seed(seed)
        .initial_balance(100_000.0)
        .contribute(500.0, 0..60)
        .withdraw_real(900.0, 60..120)
        .build()
        .unwrap()
}

#[test]
fn test_same_seed_is_bit_identical() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = sixty_forty(64, 42);
    let a = engine.run(&config, None).unwrap();
    let b = engine.run(&config, None).unwrap();
    assert_eq!(a.balances(), b.balances());
    assert_eq!(a.returns(), b.returns());
    assert_eq!(a.depleted_at(), b.depleted_at());
}

#[test]
fn test_different_seeds_differ() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let a = engine.run(&sixty_forty(8, 1), None).unwrap();
    let b = engine.run(&sixty_forty(8, 2), None).unwrap();
    assert_ne!(a.terminal_values(), b.terminal_values());
}

#[test]
fn test_path_independent_of_num_paths() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let small = engine.run(&sixty_forty(10, 9), None).unwrap();
    let large = engine.run(&sixty_forty(250, 9), None).unwrap();
    for i in 0..10 {
        assert_eq!(small.balances().row(i), large.balances().row(i), "path {i}");
        assert_eq!(small.returns().row(i), large.returns().row(i), "path {i}");
    }
}

#[test]
fn test_single_path_matches_run_row() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = sixty_forty(20, 5);
    let run = engine.run(&config, None).unwrap();
    let path = engine.simulate_path(&config, 13).unwrap();
    assert_eq!(path.index, 13);
    assert_eq!(path.balances.as_slice(), run.balances().row(13));
    assert_eq!(path.depleted_at, run.depleted_at()[13]);
}

#[test]
fn test_chunked_execution_matches_run() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = sixty_forty(37, 11);
    let run = engine.run(&config, None).unwrap();

    let mut seen: Vec<PathResult> = Vec::new();
    engine
        .for_each_path(&config, 5, None, |p| {
            seen.push(p);
            Ok(())
        })
        .unwrap();

    assert_eq!(seen.len(), 37);
    for (i, p) in seen.iter().enumerate() {
        assert_eq!(p.index, i);
        assert_eq!(p.balances.as_slice(), run.balances().row(i));
    }
}

#[test]
fn test_market_paths_match_engine_streams() {
    // Zero-weight assets still consume their draws, so the engine's
    // portfolio return is the weighted sum of the model's return path.
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let config = SimulationBuilder::new()
        .allocation(AllocationWeights::single("us_equity"))
        .periods(24)
        .paths(3)
        .seed(77)
        .initial_balance(1_000.0)
        .build()
        .unwrap();
    let run = engine.run(&config, None).unwrap();
    let idx = model.index_of(&"us_equity".into()).unwrap();
    let draws = model.simulate_return_path(77, 2, 24);
    for (t, r) in run.returns().row(2).iter().enumerate() {
        assert!((r - draws[t][idx]).abs() < 1e-12, "period {t}");
    }
}

#[test]
fn test_cancelled_run_returns_error() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let progress = SimulationProgress::new(0);
    progress.cancel();
    let err = engine.run(&sixty_forty(100, 1), Some(&progress)).unwrap_err();
    assert_eq!(err, SimulationError::Cancelled);
}

#[test]
fn test_progress_counts_paths() {
    let model = baseline_model(Periodicity::Monthly);
    let engine = SimulationEngine::new(&model);
    let progress = SimulationProgress::default();
    engine.run(&sixty_forty(30, 1), Some(&progress)).unwrap();
    assert_eq!(progress.completed(), 30);
    assert_eq!(progress.total(), 30);
    assert_eq!(progress.fraction(), 1.0);
}

#[test]
fn test_periodicity_mismatch_is_config_error() {
    let model = baseline_model(Periodicity::Annual);
    let engine = SimulationEngine::new(&model);
    assert!(matches!(
        engine.run(&sixty_forty(4, 1), None),
        Err(SimulationError::Config(_))
    ));
}
