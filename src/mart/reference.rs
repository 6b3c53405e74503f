// Reference dimension extract: distinct (player, team, season) tuples with
// denormalized names and lineage, straight off the source table. No joins,
// no aggregation, no current-team resolution.

use std::collections::HashSet;

use serde::Serialize;

use crate::source::GameStatRecord;

/// One reference row. Lineage fields (`snapshot_ts`, `batch_id`) are copied
/// through from the source rows unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceEntry {
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub player_id: i64,
    pub team_full_name: String,
    pub team_city: String,
    pub team_name: String,
    pub team_id: i64,
    pub season: String,
    pub snapshot_ts: String,
    pub batch_id: String,
}

/// Project the source snapshot to distinct reference entries, ordered by
/// full name ascending, then season descending. Two rows identical across
/// every column collapse to one; rows differing in any column (including
/// lineage) stay distinct.
pub fn build_reference(rows: &[GameStatRecord]) -> Vec<ReferenceEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for row in rows {
        let entry = ReferenceEntry {
            full_name: row.full_name(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            player_id: row.player_id,
            team_full_name: row.team_label(),
            team_city: row.team_city.clone(),
            team_name: row.team_name.clone(),
            team_id: row.team_id,
            season: row.season.clone(),
            snapshot_ts: row.snapshot_ts.clone(),
            batch_id: row.batch_id.clone(),
        };
        if seen.insert(entry.clone()) {
            entries.push(entry);
        }
    }

    entries.sort_by(|a, b| {
        a.full_name
            .cmp(&b.full_name)
            .then_with(|| b.season.cmp(&a.season))
            .then_with(|| a.player_id.cmp(&b.player_id))
            .then_with(|| a.team_id.cmp(&b.team_id))
            .then_with(|| a.snapshot_ts.cmp(&b.snapshot_ts))
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });

    entries
}
