// Per-game log: one enriched row per source row, carrying the team the
// game was actually played for (not the resolved current team).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::source::GameStatRecord;

/// Played/not-played status for a game-log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    #[serde(rename = "Played")]
    Played,
    #[serde(rename = "Did Not Play")]
    DidNotPlay,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Played => "Played",
            GameStatus::DidNotPlay => "Did Not Play",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Played" => Some(GameStatus::Played),
            "Did Not Play" => Some(GameStatus::DidNotPlay),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One game-log row. Cardinality matches the qualifying source rows
/// exactly; this is a per-row enrichment pass, not an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameLogEntry {
    pub player_id: i64,
    pub season: String,
    pub game_id: String,
    pub game_date: NaiveDate,
    /// The team this specific game was played for.
    pub team_id: i64,
    pub team_label: String,
    /// 1-based position within the player-season, ordered by game date
    /// ascending (game_id ascending on equal dates).
    pub game_index: u32,
    pub status: GameStatus,
    pub min: f64,
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
}

/// Build the game log from valid roster appearances (minutes present and
/// >= 0). Output is grouped by (player, season) in key order, each group
/// chronological.
pub fn build_game_log(rows: &[GameStatRecord]) -> Vec<GameLogEntry> {
    let mut groups: BTreeMap<(i64, String), Vec<&GameStatRecord>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.player_id, row.season.clone()))
            .or_default()
            .push(row);
    }

    let mut log = Vec::with_capacity(rows.len());
    for group in groups.into_values() {
        let mut games = group;
        games.sort_by(|a, b| (a.game_date, &a.game_id).cmp(&(b.game_date, &b.game_id)));

        for (i, row) in games.into_iter().enumerate() {
            let status = if row.counts_as_played() {
                GameStatus::Played
            } else {
                GameStatus::DidNotPlay
            };

            log.push(GameLogEntry {
                player_id: row.player_id,
                season: row.season.clone(),
                game_id: row.game_id.clone(),
                game_date: row.game_date,
                team_id: row.team_id,
                team_label: row.team_label(),
                game_index: (i + 1) as u32,
                status,
                min: row.min.unwrap_or(0.0),
                pts: row.pts,
                reb: row.reb,
                ast: row.ast,
                stl: row.stl,
                blk: row.blk,
                tov: row.tov,
                pf: row.pf,
                fgm: row.fgm,
                fga: row.fga,
                fg3m: row.fg3m,
                fg3a: row.fg3a,
                ftm: row.ftm,
                fta: row.fta,
                plus_minus: row.plus_minus,
            });
        }
    }

    log
}
