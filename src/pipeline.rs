// Pipeline orchestration: full recompute of each published dataset from
// the source snapshot, ending in the stage -> swap -> cleanup protocol.
//
// Every run reads the entire source table; recovery from any failure is an
// idempotent re-run. A failure before the swap leaves the previously
// published dataset untouched.

use thiserror::Error;
use tracing::{info, warn};

use crate::db::Warehouse;
use crate::mart::gamelog::build_game_log;
use crate::mart::profile::compose_profiles;
use crate::mart::reference::build_reference;
use crate::mart::resolve::resolve_current_teams;
use crate::mart::season::summarize_seasons;
use crate::publish::{
    cleanup, stage_profile, stage_reference, swap, PublishError, PublishedDataset,
};
use crate::source::{load_games, GameStatRecord, SourceError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

// ---------------------------------------------------------------------------
// Run reports
// ---------------------------------------------------------------------------

/// Summary of one pipeline run, for logging and operator visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub dataset: PublishedDataset,
    /// Rows read from the source table.
    pub source_rows: usize,
    /// Rows excluded for missing or negative minutes (profile pipeline
    /// only; the reference extract covers every source row).
    pub excluded_rows: usize,
    /// Rows in the newly published dataset.
    pub published_rows: usize,
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Split the snapshot into valid roster appearances and excluded rows.
/// Rows with NULL or negative minutes are handled here explicitly rather
/// than being coerced to zero somewhere downstream.
fn partition_appearances(rows: Vec<GameStatRecord>) -> (Vec<GameStatRecord>, usize) {
    let total = rows.len();
    let valid: Vec<GameStatRecord> = rows
        .into_iter()
        .filter(GameStatRecord::is_roster_appearance)
        .collect();
    let excluded = total - valid.len();
    if excluded > 0 {
        warn!("excluded {excluded} source rows with missing or negative minutes");
    }
    (valid, excluded)
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Recompute and publish the player/team/season reference dataset.
pub fn run_reference(warehouse: &Warehouse) -> Result<PipelineReport, PipelineError> {
    let dataset = PublishedDataset::Reference;
    info!("reference pipeline: reading source snapshot");
    let rows = load_games(warehouse)?;

    let entries = build_reference(&rows);
    info!(
        "reference pipeline: {} source rows -> {} distinct entries",
        rows.len(),
        entries.len()
    );

    stage_reference(warehouse, &entries)?;
    swap(warehouse, dataset)?;
    cleanup(warehouse, dataset);
    info!("reference pipeline: published {} rows", entries.len());

    Ok(PipelineReport {
        dataset,
        source_rows: rows.len(),
        excluded_rows: 0,
        published_rows: entries.len(),
    })
}

/// Recompute and publish the player profile dataset: current-team
/// resolution, season aggregation, game log, and their join.
pub fn run_profile(warehouse: &Warehouse) -> Result<PipelineReport, PipelineError> {
    let dataset = PublishedDataset::Profile;
    info!("profile pipeline: reading source snapshot");
    let rows = load_games(warehouse)?;
    let source_rows = rows.len();

    let (valid, excluded_rows) = partition_appearances(rows);

    let teams = resolve_current_teams(&valid);
    let summaries = summarize_seasons(&valid, &teams);
    let log = build_game_log(&valid);
    let profiles = compose_profiles(&summaries, &log);
    info!(
        "profile pipeline: {} appearances -> {} player-seasons, {} profile rows",
        valid.len(),
        summaries.len(),
        profiles.len()
    );

    stage_profile(warehouse, &profiles)?;
    swap(warehouse, dataset)?;
    cleanup(warehouse, dataset);
    info!("profile pipeline: published {} rows", profiles.len());

    Ok(PipelineReport {
        dataset,
        source_rows,
        excluded_rows,
        published_rows: profiles.len(),
    })
}

/// Run both pipelines. They share no staging resource, so order is
/// immaterial; reference first keeps the cheap one's failures early.
pub fn run_all(warehouse: &Warehouse) -> Result<Vec<PipelineReport>, PipelineError> {
    let reference = run_reference(warehouse)?;
    let profile = run_profile(warehouse)?;
    Ok(vec![reference, profile])
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mart::testutil::game;
    use crate::publish::{read_profile, read_reference};
    use crate::source::insert_games;

    fn test_warehouse() -> Warehouse {
        Warehouse::open(":memory:").expect("in-memory warehouse should open")
    }

    fn seed(warehouse: &Warehouse, rows: &[GameStatRecord]) {
        insert_games(warehouse, rows).unwrap();
    }

    #[test]
    fn profile_run_publishes_one_row_per_appearance() {
        let w = test_warehouse();
        seed(
            &w,
            &[
                game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
                game(1, "2023-24", 20, "Betas", "2024-02-01", "g2"),
                game(2, "2023-24", 10, "Alphas", "2024-01-05", "g3"),
            ],
        );

        let report = run_profile(&w).unwrap();
        assert_eq!(report.source_rows, 3);
        assert_eq!(report.excluded_rows, 0);
        assert_eq!(report.published_rows, 3);
        assert_eq!(read_profile(&w).unwrap().len(), 3);
    }

    #[test]
    fn null_minutes_rows_are_excluded_from_profile_but_not_reference() {
        let w = test_warehouse();
        let mut unrecorded = game(1, "2023-24", 10, "Alphas", "2024-01-07", "g2");
        unrecorded.min = None;
        seed(
            &w,
            &[
                game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
                unrecorded,
            ],
        );

        let profile = run_profile(&w).unwrap();
        assert_eq!(profile.excluded_rows, 1);
        assert_eq!(profile.published_rows, 1);

        let reference = run_reference(&w).unwrap();
        assert_eq!(reference.source_rows, 2);
        // Both rows collapse to one distinct (player, team, season) tuple.
        assert_eq!(read_reference(&w).unwrap().len(), 1);
    }

    #[test]
    fn run_all_publishes_both_datasets() {
        let w = test_warehouse();
        seed(&w, &[game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1")]);

        let reports = run_all(&w).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(w.table_exists("player_team_reference").unwrap());
        assert!(w.table_exists("player_profile").unwrap());
    }

    #[test]
    fn missing_source_table_aborts_before_staging() {
        let w = test_warehouse();
        {
            let conn = w.conn();
            conn.execute_batch("DROP TABLE player_game_stats;").unwrap();
        }

        let err = run_profile(&w).unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
        assert!(!w.table_exists("player_profile").unwrap());
        assert!(!w.table_exists("player_profile_staging").unwrap());
    }

    #[test]
    fn empty_source_publishes_empty_datasets() {
        let w = test_warehouse();

        let reports = run_all(&w).unwrap();
        assert_eq!(reports[0].published_rows, 0);
        assert_eq!(reports[1].published_rows, 0);
        assert!(read_reference(&w).unwrap().is_empty());
        assert!(read_profile(&w).unwrap().is_empty());
    }

    #[test]
    fn rerun_replaces_rather_than_appends() {
        let w = test_warehouse();
        seed(&w, &[game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1")]);

        run_all(&w).unwrap();
        run_all(&w).unwrap();

        assert_eq!(read_reference(&w).unwrap().len(), 1);
        assert_eq!(read_profile(&w).unwrap().len(), 1);
    }
}
