// Profile composition: the left join of season summaries onto game-log
// rows, one output row per game carrying the full season KPIs.

use std::collections::HashMap;

use serde::Serialize;

use crate::mart::gamelog::GameLogEntry;
use crate::mart::season::SeasonSummary;

/// One published profile row: a player-season's summary repeated across
/// each of that season's game-log rows. `game` is `None` only for the
/// left-anchored degenerate case of a summary with no matching game rows,
/// which cannot occur when both sides derive from the same filtered source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRow {
    pub summary: SeasonSummary,
    pub game: Option<GameLogEntry>,
}

/// Left-join summaries against game-log entries on (player, season).
///
/// Every game-log row whose (player, season) has a summary appears exactly
/// once. Output ordering: season descending, player name ascending, game
/// date ascending — dashboard consumers page by season, then player, then
/// a chronological game list.
pub fn compose_profiles(
    summaries: &[SeasonSummary],
    log: &[GameLogEntry],
) -> Vec<ProfileRow> {
    let mut by_player_season: HashMap<(i64, &str), Vec<&GameLogEntry>> = HashMap::new();
    for entry in log {
        by_player_season
            .entry((entry.player_id, entry.season.as_str()))
            .or_default()
            .push(entry);
    }

    let mut rows = Vec::with_capacity(log.len());
    for summary in summaries {
        match by_player_season.get(&(summary.player_id, summary.season.as_str())) {
            Some(entries) => {
                for entry in entries {
                    rows.push(ProfileRow {
                        summary: summary.clone(),
                        game: Some((*entry).clone()),
                    });
                }
            }
            None => rows.push(ProfileRow {
                summary: summary.clone(),
                game: None,
            }),
        }
    }

    rows.sort_by(|a, b| {
        b.summary
            .season
            .cmp(&a.summary.season)
            .then_with(|| a.summary.full_name().cmp(&b.summary.full_name()))
            .then_with(|| a.summary.player_id.cmp(&b.summary.player_id))
            .then_with(|| {
                let da = a.game.as_ref().map(|g| (g.game_date, g.game_id.as_str()));
                let db = b.game.as_ref().map(|g| (g.game_date, g.game_id.as_str()));
                da.cmp(&db)
            })
    });

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mart::gamelog::build_game_log;
    use crate::mart::resolve::resolve_current_teams;
    use crate::mart::season::summarize_seasons;
    use crate::mart::testutil::game;
    use crate::source::GameStatRecord;

    fn compose(rows: &[GameStatRecord]) -> Vec<ProfileRow> {
        let teams = resolve_current_teams(rows);
        let summaries = summarize_seasons(rows, &teams);
        let log = build_game_log(rows);
        compose_profiles(&summaries, &log)
    }

    #[test]
    fn row_count_matches_game_rows_not_teams() {
        // Traded mid-season: 3 games across 2 teams must yield 3 rows.
        let rows = vec![
            game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
            game(1, "2023-24", 10, "Alphas", "2024-01-07", "g2"),
            game(1, "2023-24", 20, "Betas", "2024-02-01", "g3"),
        ];

        let profiles = compose(&rows);
        assert_eq!(profiles.len(), 3);
    }

    #[test]
    fn summary_fields_repeat_on_every_game_row() {
        let mut g1 = game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1");
        g1.pts = 20.0;
        let mut g2 = game(1, "2023-24", 20, "Betas", "2024-02-01", "g2");
        g2.pts = 30.0;

        let profiles = compose(&[g1, g2]);
        for row in &profiles {
            assert_eq!(row.summary.total_pts, 50.0);
            assert_eq!(row.summary.team_label, "Gotham Betas");
        }
        // While the game side keeps the actual team per game.
        let first_game = profiles[0].game.as_ref().unwrap();
        assert_eq!(first_game.team_label, "Gotham Alphas");
    }

    #[test]
    fn ordering_is_season_desc_name_asc_date_asc() {
        let mut rows = vec![
            game(1, "2022-23", 10, "Alphas", "2023-01-05", "g1"),
            game(1, "2023-24", 10, "Alphas", "2024-01-07", "g3"),
            game(1, "2023-24", 10, "Alphas", "2024-01-05", "g2"),
            game(2, "2023-24", 20, "Betas", "2024-01-06", "g4"),
        ];
        // Shuffle so the output order can't just mirror the input.
        rows.swap(0, 3);

        let profiles = compose(&rows);
        let keys: Vec<(String, String, String)> = profiles
            .iter()
            .map(|r| {
                (
                    r.summary.season.clone(),
                    r.summary.full_name(),
                    r.game.as_ref().unwrap().game_id.clone(),
                )
            })
            .collect();

        assert_eq!(
            keys,
            vec![
                ("2023-24".into(), "Test Player1".into(), "g2".into()),
                ("2023-24".into(), "Test Player1".into(), "g3".into()),
                ("2023-24".into(), "Test Player2".into(), "g4".into()),
                ("2022-23".into(), "Test Player1".into(), "g1".into()),
            ]
        );
    }

    #[test]
    fn summary_without_games_still_appears_once() {
        let rows = vec![game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1")];
        let teams = resolve_current_teams(&rows);
        let summaries = summarize_seasons(&rows, &teams);

        // Join against an empty log: the summary side is the anchor.
        let profiles = compose_profiles(&summaries, &[]);
        assert_eq!(profiles.len(), 1);
        assert!(profiles[0].game.is_none());
    }

    #[test]
    fn game_rows_without_summary_are_dropped() {
        let rows = vec![game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1")];
        let log = build_game_log(&rows);

        let profiles = compose_profiles(&[], &log);
        assert!(profiles.is_empty());
    }

    #[test]
    fn game_index_is_preserved_through_the_join() {
        let rows = vec![
            game(1, "2023-24", 10, "Alphas", "2024-01-07", "g2"),
            game(1, "2023-24", 10, "Alphas", "2024-01-05", "g1"),
        ];

        let profiles = compose(&rows);
        let indices: Vec<u32> = profiles
            .iter()
            .map(|r| r.game.as_ref().unwrap().game_index)
            .collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
