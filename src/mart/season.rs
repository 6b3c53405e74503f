// Season-level aggregation: totals, per-game averages, and shooting
// efficiency per (player, season), combined across every team the player
// appeared for that season.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::mart::resolve::TeamAssignment;
use crate::source::GameStatRecord;

/// Season summary for one (player, season), labeled with the resolved
/// current team. Averages are rounded to 1 decimal place and efficiency
/// ratios to 4; both roundings are a published contract, since downstream
/// dashboards display the values verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSummary {
    pub player_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub season: String,
    /// Current team only. Games for earlier teams in the same season are
    /// folded into the totals below but keep their own team in the game log.
    pub team_id: i64,
    pub team_label: String,
    /// Rows with min >= 0.1; a zero-minute roster entry does not count.
    pub games_played: u32,
    pub total_min: f64,
    pub total_pts: f64,
    pub total_reb: f64,
    pub total_ast: f64,
    pub total_stl: f64,
    pub total_blk: f64,
    pub total_tov: f64,
    pub total_pf: f64,
    pub total_fgm: f64,
    pub total_fga: f64,
    pub total_fg3m: f64,
    pub total_fg3a: f64,
    pub total_ftm: f64,
    pub total_fta: f64,
    pub total_plus_minus: f64,
    pub avg_min: f64,
    pub avg_pts: f64,
    pub avg_reb: f64,
    pub avg_ast: f64,
    pub avg_stl: f64,
    pub avg_blk: f64,
    pub avg_tov: f64,
    pub avg_pf: f64,
    pub fg_pct: f64,
    pub fg3_pct: f64,
    pub ft_pct: f64,
    /// True shooting: pts / (2 * (fga + 0.44 * fta)) * 100.
    pub ts_pct: f64,
}

impl SeasonSummary {
    /// "First Last" display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Free-throw attempt weight in the true shooting denominator.
const TS_FTA_WEIGHT: f64 = 0.44;

/// Round to 1 decimal place (per-game averages).
fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to 4 decimal places (efficiency ratios).
fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Ratio with a zero-denominator guard: 0 attempts yields 0.0, never NaN.
fn safe_ratio(makes: f64, attempts: f64) -> f64 {
    if attempts == 0.0 {
        0.0
    } else {
        makes / attempts
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    first_name: String,
    last_name: String,
    games_played: u32,
    min: f64,
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
}

/// Aggregate one SeasonSummary per (player, season).
///
/// Input rows are expected to be valid roster appearances (minutes present
/// and >= 0). Sums cover every input row for the player-season; the
/// games-played count and the per-game averages only cover rows with
/// min >= 0.1. A (player, season) with no entry in `teams` is skipped —
/// both derive from the same filtered input, so this indicates the caller
/// passed inconsistent slices.
pub fn summarize_seasons(
    rows: &[GameStatRecord],
    teams: &std::collections::HashMap<(i64, String), TeamAssignment>,
) -> Vec<SeasonSummary> {
    let mut groups: BTreeMap<(i64, String), Accumulator> = BTreeMap::new();

    for row in rows {
        let acc = groups
            .entry((row.player_id, row.season.clone()))
            .or_default();

        acc.first_name = row.first_name.clone();
        acc.last_name = row.last_name.clone();

        if row.counts_as_played() {
            acc.games_played += 1;
        }

        acc.min += row.min.unwrap_or(0.0);
        acc.pts += row.pts;
        acc.reb += row.reb;
        acc.ast += row.ast;
        acc.stl += row.stl;
        acc.blk += row.blk;
        acc.tov += row.tov;
        acc.pf += row.pf;
        acc.fgm += row.fgm;
        acc.fga += row.fga;
        acc.fg3m += row.fg3m;
        acc.fg3a += row.fg3a;
        acc.ftm += row.ftm;
        acc.fta += row.fta;
        acc.plus_minus += row.plus_minus;
    }

    let mut summaries = Vec::with_capacity(groups.len());
    for ((player_id, season), acc) in groups {
        let Some(assignment) = teams.get(&(player_id, season.clone())) else {
            tracing::warn!(
                "no team assignment for player {player_id} season {season}; skipping summary"
            );
            continue;
        };

        let gp = f64::from(acc.games_played);
        let per_game = |total: f64| if gp == 0.0 { 0.0 } else { round1(total / gp) };

        let ts_denominator = 2.0 * (acc.fga + TS_FTA_WEIGHT * acc.fta);
        let ts_pct = if ts_denominator == 0.0 {
            0.0
        } else {
            round4(acc.pts / ts_denominator * 100.0)
        };

        summaries.push(SeasonSummary {
            player_id,
            first_name: acc.first_name,
            last_name: acc.last_name,
            season,
            team_id: assignment.team_id,
            team_label: assignment.team_label.clone(),
            games_played: acc.games_played,
            total_min: acc.min,
            total_pts: acc.pts,
            total_reb: acc.reb,
            total_ast: acc.ast,
            total_stl: acc.stl,
            total_blk: acc.blk,
            total_tov: acc.tov,
            total_pf: acc.pf,
            total_fgm: acc.fgm,
            total_fga: acc.fga,
            total_fg3m: acc.fg3m,
            total_fg3a: acc.fg3a,
            total_ftm: acc.ftm,
            total_fta: acc.fta,
            total_plus_minus: acc.plus_minus,
            avg_min: per_game(acc.min),
            avg_pts: per_game(acc.pts),
            avg_reb: per_game(acc.reb),
            avg_ast: per_game(acc.ast),
            avg_stl: per_game(acc.stl),
            avg_blk: per_game(acc.blk),
            avg_tov: per_game(acc.tov),
            avg_pf: per_game(acc.pf),
            fg_pct: round4(safe_ratio(acc.fgm, acc.fga)),
            fg3_pct: round4(safe_ratio(acc.fg3m, acc.fg3a)),
            ft_pct: round4(safe_ratio(acc.ftm, acc.fta)),
            ts_pct,
        });
    }

    summaries
}
