// Atomic publication of derived datasets: stage into a private table, swap
// it into the published name in one transaction, then discard the staging
// artifact best-effort.
//
// Protocol per dataset:
//   1. stage_*   — materialize the full recompute into `<table>_staging`.
//                  A leftover staging table from a failed run is dropped
//                  and rebuilt. The published table is never touched here.
//   2. swap      — one transaction: DROP the published table, RENAME the
//                  staging table into its place. A concurrent reader sees
//                  the old dataset or the new one, never a mix.
//   3. cleanup   — best-effort DROP of the staging table. After a
//                  successful swap the rename already consumed it, so this
//                  only matters for artifacts left by earlier failures;
//                  its own failure never invalidates the publish.

use chrono::NaiveDate;
use rusqlite::params;
use thiserror::Error;
use tracing::warn;

use crate::db::Warehouse;
use crate::mart::gamelog::{GameLogEntry, GameStatus};
use crate::mart::profile::ProfileRow;
use crate::mart::reference::ReferenceEntry;
use crate::mart::season::SeasonSummary;

// ---------------------------------------------------------------------------
// Datasets and errors
// ---------------------------------------------------------------------------

/// The two published datasets. Each owns its own staging table, so the two
/// pipelines never share a staging resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishedDataset {
    Reference,
    Profile,
}

impl PublishedDataset {
    pub fn published_table(&self) -> &'static str {
        match self {
            PublishedDataset::Reference => "player_team_reference",
            PublishedDataset::Profile => "player_profile",
        }
    }

    pub fn staging_table(&self) -> &'static str {
        match self {
            PublishedDataset::Reference => "player_team_reference_staging",
            PublishedDataset::Profile => "player_profile_staging",
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to stage dataset into `{table}`: {source}")]
    Stage {
        table: String,
        source: rusqlite::Error,
    },

    #[error("failed to swap `{staging}` into `{published}`: {source}")]
    Swap {
        staging: String,
        published: String,
        source: rusqlite::Error,
    },

    #[error("failed to read published table `{table}`: {source}")]
    Read {
        table: String,
        source: rusqlite::Error,
    },

    #[error("published table `{table}` has a malformed row: {message}")]
    MalformedRow { table: String, message: String },
}

// ---------------------------------------------------------------------------
// Staging: reference dataset
// ---------------------------------------------------------------------------

const REFERENCE_COLUMNS: &str = "
    full_name      TEXT NOT NULL,
    first_name     TEXT NOT NULL,
    last_name      TEXT NOT NULL,
    player_id      INTEGER NOT NULL,
    team_full_name TEXT NOT NULL,
    team_city      TEXT NOT NULL,
    team_name      TEXT NOT NULL,
    team_id        INTEGER NOT NULL,
    season         TEXT NOT NULL,
    snapshot_ts    TEXT NOT NULL,
    batch_id       TEXT NOT NULL
";

/// Materialize the reference dataset into its staging table. Insertion
/// order is the published order; readers page with `ORDER BY rowid`.
pub fn stage_reference(
    warehouse: &Warehouse,
    entries: &[ReferenceEntry],
) -> Result<(), PublishError> {
    let dataset = PublishedDataset::Reference;
    let staging = dataset.staging_table();
    let stage_err = |source| PublishError::Stage {
        table: staging.to_string(),
        source,
    };

    let mut conn = warehouse.conn();

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE TABLE {staging} ({REFERENCE_COLUMNS});"
    ))
    .map_err(stage_err)?;

    let tx = conn.transaction().map_err(stage_err)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {staging}
                    (full_name, first_name, last_name, player_id,
                     team_full_name, team_city, team_name, team_id,
                     season, snapshot_ts, batch_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ))
            .map_err(stage_err)?;

        for e in entries {
            stmt.execute(params![
                e.full_name,
                e.first_name,
                e.last_name,
                e.player_id,
                e.team_full_name,
                e.team_city,
                e.team_name,
                e.team_id,
                e.season,
                e.snapshot_ts,
                e.batch_id,
            ])
            .map_err(stage_err)?;
        }
    }
    tx.commit().map_err(stage_err)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Staging: profile dataset
// ---------------------------------------------------------------------------

const PROFILE_COLUMNS: &str = "
    player_id        INTEGER NOT NULL,
    first_name       TEXT NOT NULL,
    last_name        TEXT NOT NULL,
    season           TEXT NOT NULL,
    team_id          INTEGER NOT NULL,
    team             TEXT NOT NULL,
    games_played     INTEGER NOT NULL,
    total_min        REAL NOT NULL,
    total_pts        REAL NOT NULL,
    total_reb        REAL NOT NULL,
    total_ast        REAL NOT NULL,
    total_stl        REAL NOT NULL,
    total_blk        REAL NOT NULL,
    total_tov        REAL NOT NULL,
    total_pf         REAL NOT NULL,
    total_fgm        REAL NOT NULL,
    total_fga        REAL NOT NULL,
    total_fg3m       REAL NOT NULL,
    total_fg3a       REAL NOT NULL,
    total_ftm        REAL NOT NULL,
    total_fta        REAL NOT NULL,
    total_plus_minus REAL NOT NULL,
    avg_min          REAL NOT NULL,
    avg_pts          REAL NOT NULL,
    avg_reb          REAL NOT NULL,
    avg_ast          REAL NOT NULL,
    avg_stl          REAL NOT NULL,
    avg_blk          REAL NOT NULL,
    avg_tov          REAL NOT NULL,
    avg_pf           REAL NOT NULL,
    fg_pct           REAL NOT NULL,
    fg3_pct          REAL NOT NULL,
    ft_pct           REAL NOT NULL,
    ts_pct           REAL NOT NULL,
    game_id          TEXT,
    game_date        TEXT,
    game_team_id     INTEGER,
    game_team        TEXT,
    game_index       INTEGER,
    game_status      TEXT,
    game_min         REAL,
    game_pts         REAL,
    game_reb         REAL,
    game_ast         REAL,
    game_stl         REAL,
    game_blk         REAL,
    game_tov         REAL,
    game_pf          REAL,
    game_fgm         REAL,
    game_fga         REAL,
    game_fg3m        REAL,
    game_fg3a        REAL,
    game_ftm         REAL,
    game_fta         REAL,
    game_plus_minus  REAL
";

/// Materialize the profile dataset into its staging table in published
/// order (season desc, player name asc, game date asc).
pub fn stage_profile(warehouse: &Warehouse, rows: &[ProfileRow]) -> Result<(), PublishError> {
    let dataset = PublishedDataset::Profile;
    let staging = dataset.staging_table();
    let stage_err = |source| PublishError::Stage {
        table: staging.to_string(),
        source,
    };

    let mut conn = warehouse.conn();

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {staging};
         CREATE TABLE {staging} ({PROFILE_COLUMNS});"
    ))
    .map_err(stage_err)?;

    let tx = conn.transaction().map_err(stage_err)?;
    {
        let mut stmt = tx
            .prepare(&format!(
                "INSERT INTO {staging} VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                    ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                    ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                    ?31, ?32, ?33, ?34,
                    ?35, ?36, ?37, ?38, ?39, ?40,
                    ?41, ?42, ?43, ?44, ?45, ?46, ?47, ?48, ?49, ?50, ?51, ?52, ?53, ?54, ?55
                )"
            ))
            .map_err(stage_err)?;

        for row in rows {
            let s = &row.summary;
            let g = row.game.as_ref();
            stmt.execute(params![
                s.player_id,
                s.first_name,
                s.last_name,
                s.season,
                s.team_id,
                s.team_label,
                s.games_played,
                s.total_min,
                s.total_pts,
                s.total_reb,
                s.total_ast,
                s.total_stl,
                s.total_blk,
                s.total_tov,
                s.total_pf,
                s.total_fgm,
                s.total_fga,
                s.total_fg3m,
                s.total_fg3a,
                s.total_ftm,
                s.total_fta,
                s.total_plus_minus,
                s.avg_min,
                s.avg_pts,
                s.avg_reb,
                s.avg_ast,
                s.avg_stl,
                s.avg_blk,
                s.avg_tov,
                s.avg_pf,
                s.fg_pct,
                s.fg3_pct,
                s.ft_pct,
                s.ts_pct,
                g.map(|g| g.game_id.as_str()),
                g.map(|g| g.game_date.format("%Y-%m-%d").to_string()),
                g.map(|g| g.team_id),
                g.map(|g| g.team_label.as_str()),
                g.map(|g| g.game_index),
                g.map(|g| g.status.as_str()),
                g.map(|g| g.min),
                g.map(|g| g.pts),
                g.map(|g| g.reb),
                g.map(|g| g.ast),
                g.map(|g| g.stl),
                g.map(|g| g.blk),
                g.map(|g| g.tov),
                g.map(|g| g.pf),
                g.map(|g| g.fgm),
                g.map(|g| g.fga),
                g.map(|g| g.fg3m),
                g.map(|g| g.fg3a),
                g.map(|g| g.ftm),
                g.map(|g| g.fta),
                g.map(|g| g.plus_minus),
            ])
            .map_err(stage_err)?;
        }
    }
    tx.commit().map_err(stage_err)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Swap and cleanup
// ---------------------------------------------------------------------------

/// Atomically replace the published table with the staged one. The drop
/// and rename commit together; rollback on failure leaves the previously
/// published dataset fully intact. Errors if nothing was staged.
pub fn swap(warehouse: &Warehouse, dataset: PublishedDataset) -> Result<(), PublishError> {
    let staging = dataset.staging_table();
    let published = dataset.published_table();
    let swap_err = |source| PublishError::Swap {
        staging: staging.to_string(),
        published: published.to_string(),
        source,
    };

    let mut conn = warehouse.conn();
    let tx = conn.transaction().map_err(swap_err)?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {published};
         ALTER TABLE {staging} RENAME TO {published};"
    ))
    .map_err(swap_err)?;
    tx.commit().map_err(swap_err)?;

    Ok(())
}

/// Discard the staging artifact. Best-effort: a failure here is logged and
/// swallowed, since the publish has already committed.
pub fn cleanup(warehouse: &Warehouse, dataset: PublishedDataset) {
    let staging = dataset.staging_table();
    let conn = warehouse.conn();
    if let Err(e) = conn.execute_batch(&format!("DROP TABLE IF EXISTS {staging};")) {
        warn!("failed to clean up staging table {staging}: {e}");
    }
}

// ---------------------------------------------------------------------------
// Reading back published datasets
// ---------------------------------------------------------------------------

/// Read the published reference dataset in published order.
pub fn read_reference(warehouse: &Warehouse) -> Result<Vec<ReferenceEntry>, PublishError> {
    let table = PublishedDataset::Reference.published_table();
    let read_err = |source| PublishError::Read {
        table: table.to_string(),
        source,
    };

    let conn = warehouse.conn();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT full_name, first_name, last_name, player_id,
                    team_full_name, team_city, team_name, team_id,
                    season, snapshot_ts, batch_id
             FROM {table} ORDER BY rowid"
        ))
        .map_err(read_err)?;

    let entries = stmt
        .query_map([], |row| {
            Ok(ReferenceEntry {
                full_name: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                player_id: row.get(3)?,
                team_full_name: row.get(4)?,
                team_city: row.get(5)?,
                team_name: row.get(6)?,
                team_id: row.get(7)?,
                season: row.get(8)?,
                snapshot_ts: row.get(9)?,
                batch_id: row.get(10)?,
            })
        })
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;

    Ok(entries)
}

/// Read the published profile dataset in published order.
pub fn read_profile(warehouse: &Warehouse) -> Result<Vec<ProfileRow>, PublishError> {
    let table = PublishedDataset::Profile.published_table();
    let read_err = |source| PublishError::Read {
        table: table.to_string(),
        source,
    };
    let malformed = |message: String| PublishError::MalformedRow {
        table: table.to_string(),
        message,
    };

    let conn = warehouse.conn();
    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))
        .map_err(read_err)?;

    struct RawProfile {
        summary: SeasonSummary,
        game_id: Option<String>,
        game_date: Option<String>,
        game_team_id: Option<i64>,
        game_team: Option<String>,
        game_index: Option<u32>,
        game_status: Option<String>,
        game_stats: Option<[f64; 15]>,
    }

    let raw_rows = stmt
        .query_map([], |row| {
            let summary = SeasonSummary {
                player_id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                season: row.get(3)?,
                team_id: row.get(4)?,
                team_label: row.get(5)?,
                games_played: row.get(6)?,
                total_min: row.get(7)?,
                total_pts: row.get(8)?,
                total_reb: row.get(9)?,
                total_ast: row.get(10)?,
                total_stl: row.get(11)?,
                total_blk: row.get(12)?,
                total_tov: row.get(13)?,
                total_pf: row.get(14)?,
                total_fgm: row.get(15)?,
                total_fga: row.get(16)?,
                total_fg3m: row.get(17)?,
                total_fg3a: row.get(18)?,
                total_ftm: row.get(19)?,
                total_fta: row.get(20)?,
                total_plus_minus: row.get(21)?,
                avg_min: row.get(22)?,
                avg_pts: row.get(23)?,
                avg_reb: row.get(24)?,
                avg_ast: row.get(25)?,
                avg_stl: row.get(26)?,
                avg_blk: row.get(27)?,
                avg_tov: row.get(28)?,
                avg_pf: row.get(29)?,
                fg_pct: row.get(30)?,
                fg3_pct: row.get(31)?,
                ft_pct: row.get(32)?,
                ts_pct: row.get(33)?,
            };

            let game_id: Option<String> = row.get(34)?;
            let game_stats = if game_id.is_some() {
                Some([
                    row.get(40)?,
                    row.get(41)?,
                    row.get(42)?,
                    row.get(43)?,
                    row.get(44)?,
                    row.get(45)?,
                    row.get(46)?,
                    row.get(47)?,
                    row.get(48)?,
                    row.get(49)?,
                    row.get(50)?,
                    row.get(51)?,
                    row.get(52)?,
                    row.get(53)?,
                    row.get(54)?,
                ])
            } else {
                None
            };

            Ok(RawProfile {
                summary,
                game_id,
                game_date: row.get(35)?,
                game_team_id: row.get(36)?,
                game_team: row.get(37)?,
                game_index: row.get(38)?,
                game_status: row.get(39)?,
                game_stats,
            })
        })
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let game = match raw.game_id {
            None => None,
            Some(game_id) => {
                let date_text = raw
                    .game_date
                    .ok_or_else(|| malformed(format!("game {game_id} has no game_date")))?;
                let game_date =
                    NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|_| {
                        malformed(format!("game {game_id} has bad game_date '{date_text}'"))
                    })?;
                let status_label = raw
                    .game_status
                    .ok_or_else(|| malformed(format!("game {game_id} has no status")))?;
                let status = GameStatus::from_label(&status_label).ok_or_else(|| {
                    malformed(format!("game {game_id} has bad status '{status_label}'"))
                })?;
                let stats = raw
                    .game_stats
                    .ok_or_else(|| malformed(format!("game {game_id} has null stats")))?;

                Some(GameLogEntry {
                    player_id: raw.summary.player_id,
                    season: raw.summary.season.clone(),
                    game_id,
                    game_date,
                    team_id: raw
                        .game_team_id
                        .ok_or_else(|| malformed("game row has no team_id".into()))?,
                    team_label: raw
                        .game_team
                        .ok_or_else(|| malformed("game row has no team label".into()))?,
                    game_index: raw
                        .game_index
                        .ok_or_else(|| malformed("game row has no game_index".into()))?,
                    status,
                    min: stats[0],
                    pts: stats[1],
                    reb: stats[2],
                    ast: stats[3],
                    stl: stats[4],
                    blk: stats[5],
                    tov: stats[6],
                    pf: stats[7],
                    fgm: stats[8],
                    fga: stats[9],
                    fg3m: stats[10],
                    fg3a: stats[11],
                    ftm: stats[12],
                    fta: stats[13],
                    plus_minus: stats[14],
                })
            }
        };

        rows.push(ProfileRow {
            summary: raw.summary,
            game,
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mart::gamelog::build_game_log;
    use crate::mart::profile::compose_profiles;
    use crate::mart::reference::build_reference;
    use crate::mart::resolve::resolve_current_teams;
    use crate::mart::season::summarize_seasons;
    use crate::mart::testutil::game;

    fn test_warehouse() -> Warehouse {
        Warehouse::open(":memory:").expect("in-memory warehouse should open")
    }

    fn sample_reference() -> Vec<ReferenceEntry> {
        build_reference(&[
            game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
            game(2, "2023-24", 20, "Betas", "2024-01-05", "g2"),
        ])
    }

    fn sample_profile() -> Vec<ProfileRow> {
        let rows = vec![
            game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
            game(1, "2023-24", 20, "Betas", "2024-02-01", "g2"),
        ];
        let teams = resolve_current_teams(&rows);
        let summaries = summarize_seasons(&rows, &teams);
        let log = build_game_log(&rows);
        compose_profiles(&summaries, &log)
    }

    #[test]
    fn stage_does_not_touch_published_table() {
        let w = test_warehouse();
        stage_reference(&w, &sample_reference()).unwrap();

        assert!(w.table_exists("player_team_reference_staging").unwrap());
        assert!(!w.table_exists("player_team_reference").unwrap());
    }

    #[test]
    fn swap_publishes_and_consumes_staging() {
        let w = test_warehouse();
        let entries = sample_reference();

        stage_reference(&w, &entries).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();
        cleanup(&w, PublishedDataset::Reference);

        assert!(w.table_exists("player_team_reference").unwrap());
        assert!(!w.table_exists("player_team_reference_staging").unwrap());
        assert_eq!(read_reference(&w).unwrap(), entries);
    }

    #[test]
    fn abort_between_stage_and_swap_leaves_published_intact() {
        let w = test_warehouse();
        let original = sample_reference();

        // First full publish.
        stage_reference(&w, &original).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();
        cleanup(&w, PublishedDataset::Reference);

        // Second run stages different content, then the run "dies" before
        // the swap. The published dataset must equal the earlier snapshot.
        let changed = build_reference(&[game(9, "2023-24", 30, "Gammas", "2024-01-05", "g9")]);
        stage_reference(&w, &changed).unwrap();

        assert_eq!(read_reference(&w).unwrap(), original);
        // The partial staging artifact is left behind for diagnosis.
        assert!(w.table_exists("player_team_reference_staging").unwrap());
    }

    #[test]
    fn stale_staging_artifact_is_overwritten_by_next_stage() {
        let w = test_warehouse();

        stage_reference(&w, &sample_reference()).unwrap();
        let replacement = build_reference(&[game(9, "2023-24", 30, "Gammas", "2024-01-05", "g9")]);
        stage_reference(&w, &replacement).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();

        assert_eq!(read_reference(&w).unwrap(), replacement);
    }

    #[test]
    fn swap_without_staging_is_an_error_and_preserves_published() {
        let w = test_warehouse();
        let entries = sample_reference();

        stage_reference(&w, &entries).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();

        // No staging table exists now; a second swap must fail without
        // dropping the published table.
        let err = swap(&w, PublishedDataset::Reference).unwrap_err();
        assert!(matches!(err, PublishError::Swap { .. }));
        assert_eq!(read_reference(&w).unwrap(), entries);
    }

    #[test]
    fn profile_round_trips_through_the_warehouse() {
        let w = test_warehouse();
        let profiles = sample_profile();

        stage_profile(&w, &profiles).unwrap();
        swap(&w, PublishedDataset::Profile).unwrap();
        cleanup(&w, PublishedDataset::Profile);

        let read_back = read_profile(&w).unwrap();
        assert_eq!(read_back, profiles);
    }

    #[test]
    fn profile_row_without_game_round_trips() {
        let w = test_warehouse();
        let rows = vec![game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1")];
        let teams = resolve_current_teams(&rows);
        let summaries = summarize_seasons(&rows, &teams);
        let profiles = compose_profiles(&summaries, &[]);

        stage_profile(&w, &profiles).unwrap();
        swap(&w, PublishedDataset::Profile).unwrap();

        let read_back = read_profile(&w).unwrap();
        assert_eq!(read_back.len(), 1);
        assert!(read_back[0].game.is_none());
        assert_eq!(read_back[0].summary, profiles[0].summary);
    }

    #[test]
    fn reference_and_profile_staging_are_independent() {
        let w = test_warehouse();

        stage_reference(&w, &sample_reference()).unwrap();
        stage_profile(&w, &sample_profile()).unwrap();

        // Publishing one leaves the other's staging untouched.
        swap(&w, PublishedDataset::Profile).unwrap();
        assert!(w.table_exists("player_team_reference_staging").unwrap());
        assert!(w.table_exists("player_profile").unwrap());
    }

    #[test]
    fn cleanup_is_a_noop_without_staging() {
        let w = test_warehouse();
        // Must not panic or log an error-path failure into the run.
        cleanup(&w, PublishedDataset::Reference);
    }

    #[test]
    fn republish_replaces_content() {
        let w = test_warehouse();
        let first = sample_reference();
        stage_reference(&w, &first).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();

        let second = build_reference(&[game(9, "2023-24", 30, "Gammas", "2024-01-05", "g9")]);
        stage_reference(&w, &second).unwrap();
        swap(&w, PublishedDataset::Reference).unwrap();

        assert_eq!(read_reference(&w).unwrap(), second);
    }
}
