// Current-team resolution: which team a player belongs to "now" within a
// season, defined as the team of their most recent game.

use std::collections::HashMap;

use crate::source::GameStatRecord;

/// Key for all per-player-per-season derivations.
pub type PlayerSeason = (i64, String);

/// The resolved current team for one (player, season).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAssignment {
    pub player_id: i64,
    pub season: String,
    pub team_id: i64,
    /// "City Name" display label.
    pub team_label: String,
}

/// Resolve each (player, season) to the team of that player's latest game.
///
/// Ranking is by game_date descending; when two games share the maximum
/// date, the lexicographically greatest game_id wins. That tie-break is
/// arbitrary but deterministic: the feed is not expected to produce
/// same-day games for different teams, so any stable rule suffices.
///
/// Input rows are expected to be valid roster appearances (minutes present
/// and >= 0, zero-minute entries included). A (player, season) with no rows
/// simply gets no assignment.
pub fn resolve_current_teams(
    rows: &[GameStatRecord],
) -> HashMap<PlayerSeason, TeamAssignment> {
    let mut latest: HashMap<PlayerSeason, &GameStatRecord> = HashMap::new();

    for row in rows {
        let key = (row.player_id, row.season.clone());
        let newer = match latest.get(&key) {
            Some(current) => (row.game_date, &row.game_id) > (current.game_date, &current.game_id),
            None => true,
        };
        if newer {
            latest.insert(key, row);
        }
    }

    latest
        .into_iter()
        .map(|(key, row)| {
            (
                key,
                TeamAssignment {
                    player_id: row.player_id,
                    season: row.season.clone(),
                    team_id: row.team_id,
                    team_label: row.team_label(),
                },
            )
        })
        .collect()
}
