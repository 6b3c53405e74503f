// Source table access: reading the full `player_game_stats` snapshot and
// importing CSV drops of the upstream feed.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::params;
use serde::Deserialize;
use tracing::warn;

use crate::db::{Warehouse, SOURCE_TABLE};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source table `{table}` does not exist")]
    MissingTable { table: String },

    #[error("source table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("malformed value in source column `{column}`: {value}")]
    MalformedValue { column: String, value: String },

    #[error("failed to read source table: {source}")]
    Read {
        #[from]
        source: rusqlite::Error,
    },

    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Source record
// ---------------------------------------------------------------------------

/// One source row: a single player's box score for a single game.
///
/// `min` is `None` when the feed carried no minutes value at all; such rows
/// are excluded from the derived pipelines explicitly (never coerced to 0).
#[derive(Debug, Clone, PartialEq)]
pub struct GameStatRecord {
    pub first_name: String,
    pub last_name: String,
    pub player_id: i64,
    pub team_city: String,
    pub team_name: String,
    pub team_id: i64,
    pub season: String,
    pub game_date: NaiveDate,
    pub game_id: String,
    pub min: Option<f64>,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub tov: f64,
    pub pf: f64,
    pub fgm: f64,
    pub fga: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub ftm: f64,
    pub fta: f64,
    pub plus_minus: f64,
    pub snapshot_ts: String,
    pub batch_id: String,
}

impl GameStatRecord {
    /// "First Last" display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "City Name" team label for this specific game.
    pub fn team_label(&self) -> String {
        format!("{} {}", self.team_city, self.team_name)
    }

    /// A valid roster appearance: minutes recorded and non-negative.
    /// Includes zero-minute roster entries.
    pub fn is_roster_appearance(&self) -> bool {
        matches!(self.min, Some(m) if m >= 0.0)
    }

    /// A real appearance that counts toward games played (min >= 0.1,
    /// distinguishing it from a zero-minute roster entry).
    pub fn counts_as_played(&self) -> bool {
        matches!(self.min, Some(m) if m >= 0.1)
    }
}

/// Columns every source snapshot must carry. Checked before any derivation
/// so a schema drift in the upstream feed fails the run before staging.
const REQUIRED_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "player_id",
    "team_city",
    "team_name",
    "team_id",
    "season",
    "game_date",
    "game_id",
    "min",
    "pts",
    "reb",
    "ast",
    "stl",
    "blk",
    "tov",
    "pf",
    "fgm",
    "fga",
    "fg3m",
    "fg3a",
    "ftm",
    "fta",
    "plus_minus",
    "snapshot_ts",
    "batch_id",
];

// ---------------------------------------------------------------------------
// Reading the source snapshot
// ---------------------------------------------------------------------------

/// Verify the source table schema, then load the full snapshot.
///
/// Rows come back ordered by (player_id, season, game_date, game_id) so the
/// derivation passes see a stable input order regardless of insert order.
pub fn load_games(warehouse: &Warehouse) -> Result<Vec<GameStatRecord>, SourceError> {
    check_schema(warehouse)?;

    let conn = warehouse.conn();
    let mut stmt = conn.prepare(
        "SELECT first_name, last_name, player_id, team_city, team_name, team_id,
                season, game_date, game_id, min,
                pts, reb, ast, stl, blk, tov, pf,
                fgm, fga, fg3m, fg3a, ftm, fta, plus_minus,
                snapshot_ts, batch_id
         FROM player_game_stats
         ORDER BY player_id, season, game_date, game_id",
    )?;

    let mut rows = stmt.query([])?;
    let mut games = Vec::new();
    while let Some(row) = rows.next()? {
        let date_text: String = row.get(7)?;
        let game_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|_| {
            SourceError::MalformedValue {
                column: "game_date".into(),
                value: date_text.clone(),
            }
        })?;

        games.push(GameStatRecord {
            first_name: row.get(0)?,
            last_name: row.get(1)?,
            player_id: row.get(2)?,
            team_city: row.get(3)?,
            team_name: row.get(4)?,
            team_id: row.get(5)?,
            season: row.get(6)?,
            game_date,
            game_id: row.get(8)?,
            min: row.get(9)?,
            pts: row.get(10)?,
            reb: row.get(11)?,
            ast: row.get(12)?,
            stl: row.get(13)?,
            blk: row.get(14)?,
            tov: row.get(15)?,
            pf: row.get(16)?,
            fgm: row.get(17)?,
            fga: row.get(18)?,
            fg3m: row.get(19)?,
            fg3a: row.get(20)?,
            ftm: row.get(21)?,
            fta: row.get(22)?,
            plus_minus: row.get(23)?,
            snapshot_ts: row.get(24)?,
            batch_id: row.get(25)?,
        });
    }

    Ok(games)
}

/// Check that the source table exists and carries every required column.
fn check_schema(warehouse: &Warehouse) -> Result<(), SourceError> {
    let conn = warehouse.conn();

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [SOURCE_TABLE],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(SourceError::MissingTable {
            table: SOURCE_TABLE.to_string(),
        });
    }

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({SOURCE_TABLE})"))?;
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(SourceError::MissingColumn {
                table: SOURCE_TABLE.to_string(),
                column: (*required).to_string(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Appending to the source table
// ---------------------------------------------------------------------------

/// Append records to the source table in a single transaction. Uses
/// INSERT OR IGNORE on the (player_id, game_id) key so re-importing the
/// same feed drop is a no-op. Returns the number of newly inserted rows.
pub fn insert_games(
    warehouse: &Warehouse,
    records: &[GameStatRecord],
) -> Result<usize, SourceError> {
    let mut conn = warehouse.conn();
    let tx = conn.transaction()?;
    let mut inserted = 0usize;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO player_game_stats
                (first_name, last_name, player_id, team_city, team_name, team_id,
                 season, game_date, game_id, min,
                 pts, reb, ast, stl, blk, tov, pf,
                 fgm, fga, fg3m, fg3a, ftm, fta, plus_minus,
                 snapshot_ts, batch_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
        )?;

        for r in records {
            inserted += stmt.execute(params![
                r.first_name,
                r.last_name,
                r.player_id,
                r.team_city,
                r.team_name,
                r.team_id,
                r.season,
                r.game_date.format("%Y-%m-%d").to_string(),
                r.game_id,
                r.min,
                r.pts,
                r.reb,
                r.ast,
                r.stl,
                r.blk,
                r.tov,
                r.pf,
                r.fgm,
                r.fga,
                r.fg3m,
                r.fg3a,
                r.ftm,
                r.fta,
                r.plus_minus,
                r.snapshot_ts,
                r.batch_id,
            ])?;
        }
    }

    tx.commit()?;
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// CSV import
// ---------------------------------------------------------------------------

/// Raw CSV row for the upstream feed. `min` deserializes to `None` for an
/// empty field. Lineage columns are optional; when the feed omits them the
/// importer stamps them itself.
#[derive(Debug, Deserialize)]
struct RawGameRow {
    first_name: String,
    last_name: String,
    player_id: i64,
    team_city: String,
    team_name: String,
    team_id: i64,
    season: String,
    game_date: String,
    game_id: String,
    min: Option<f64>,
    pts: f64,
    reb: f64,
    ast: f64,
    stl: f64,
    blk: f64,
    tov: f64,
    pf: f64,
    fgm: f64,
    fga: f64,
    fg3m: f64,
    fg3a: f64,
    ftm: f64,
    fta: f64,
    plus_minus: f64,
    #[serde(default)]
    snapshot_ts: String,
    #[serde(default)]
    batch_id: String,
}

/// Returns true if all given f64 values are finite (not NaN or Infinity).
fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Generate a batch identifier from the current UTC timestamp.
///
/// Format: `batch_YYYYMMDD_HHMMSS_SSS`. The millisecond suffix keeps two
/// imports within the same second distinct.
pub fn generate_batch_id() -> String {
    chrono::Utc::now().format("batch_%Y%m%d_%H%M%S_%3f").to_string()
}

fn parse_rows_from_reader<R: Read>(
    rdr: R,
    path_label: &str,
) -> Result<Vec<GameStatRecord>, SourceError> {
    let mut reader = csv::Reader::from_reader(rdr);
    let snapshot_default = chrono::Utc::now().to_rfc3339();
    let batch_default = generate_batch_id();

    let mut records = Vec::new();
    for result in reader.deserialize::<RawGameRow>() {
        let raw = result.map_err(|e| SourceError::Csv {
            path: path_label.to_string(),
            source: e,
        })?;

        let game_date = match NaiveDate::parse_from_str(raw.game_date.trim(), "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                warn!(
                    "skipping game {} for player {}: unparsable game_date '{}'",
                    raw.game_id, raw.player_id, raw.game_date
                );
                continue;
            }
        };

        let stats = [
            raw.pts, raw.reb, raw.ast, raw.stl, raw.blk, raw.tov, raw.pf, raw.fgm, raw.fga,
            raw.fg3m, raw.fg3a, raw.ftm, raw.fta, raw.plus_minus,
        ];
        if !all_finite(&stats) {
            warn!(
                "skipping game {} for player {}: non-finite stat value",
                raw.game_id, raw.player_id
            );
            continue;
        }

        let snapshot_ts = if raw.snapshot_ts.trim().is_empty() {
            snapshot_default.clone()
        } else {
            raw.snapshot_ts.trim().to_string()
        };
        let batch_id = if raw.batch_id.trim().is_empty() {
            batch_default.clone()
        } else {
            raw.batch_id.trim().to_string()
        };

        records.push(GameStatRecord {
            first_name: raw.first_name.trim().to_string(),
            last_name: raw.last_name.trim().to_string(),
            player_id: raw.player_id,
            team_city: raw.team_city.trim().to_string(),
            team_name: raw.team_name.trim().to_string(),
            team_id: raw.team_id,
            season: raw.season.trim().to_string(),
            game_date,
            game_id: raw.game_id.trim().to_string(),
            min: raw.min,
            pts: raw.pts,
            reb: raw.reb,
            ast: raw.ast,
            stl: raw.stl,
            blk: raw.blk,
            tov: raw.tov,
            pf: raw.pf,
            fgm: raw.fgm,
            fga: raw.fga,
            fg3m: raw.fg3m,
            fg3a: raw.fg3a,
            ftm: raw.ftm,
            fta: raw.fta,
            plus_minus: raw.plus_minus,
            snapshot_ts,
            batch_id,
        });
    }

    Ok(records)
}

/// Import a CSV drop of the upstream feed into the source table.
/// Returns the number of newly inserted rows (re-imports are idempotent).
pub fn import_csv(warehouse: &Warehouse, path: &Path) -> Result<usize, SourceError> {
    let file = std::fs::File::open(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let records = parse_rows_from_reader(file, &path.display().to_string())?;
    insert_games(warehouse, &records)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
