// Derived-dataset builders. Each submodule is a pure function over the
// source snapshot; nothing here touches the warehouse.
//
// The season aggregation and game-log passes are deliberately independent
// (no shared accumulator): season totals combine a traded player's games
// across teams under one "current team" label, while the game log keeps the
// actual team for each game. The profile composer joins the two at the end.

pub mod gamelog;
pub mod profile;
pub mod reference;
pub mod resolve;
pub mod season;

#[cfg(test)]
pub(crate) mod testutil {
    use crate::source::GameStatRecord;
    use chrono::NaiveDate;

    /// Build a game row with the given identity and neutral stats. Tests
    /// overwrite the fields they care about.
    pub fn game(
        player_id: i64,
        season: &str,
        team_id: i64,
        team_name: &str,
        date: &str,
        game_id: &str,
    ) -> GameStatRecord {
        GameStatRecord {
            first_name: "Test".to_string(),
            last_name: format!("Player{player_id}"),
            player_id,
            team_city: "Gotham".to_string(),
            team_name: team_name.to_string(),
            team_id,
            season: season.to_string(),
            game_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            game_id: game_id.to_string(),
            min: Some(30.0),
            pts: 0.0,
            reb: 0.0,
            ast: 0.0,
            stl: 0.0,
            blk: 0.0,
            tov: 0.0,
            pf: 0.0,
            fgm: 0.0,
            fga: 0.0,
            fg3m: 0.0,
            fg3a: 0.0,
            ftm: 0.0,
            fta: 0.0,
            plus_minus: 0.0,
            snapshot_ts: "2024-05-01T00:00:00Z".to_string(),
            batch_id: "batch_test".to_string(),
        }
    }
}
