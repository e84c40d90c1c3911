// Player points import.
//
// Reads CSV files with a `player_id,gameweek,points` header. Points are the
// already-converted fantasy points for the player in that gameweek.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use matchday_core::Gameweek;
use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Points one player scored in one gameweek.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlayerPointsRow {
    pub player_id: String,
    pub gameweek: Gameweek,
    pub points: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum PointsImportError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Reader-based loader
// ---------------------------------------------------------------------------

fn load_points_from_reader<R: Read>(rdr: R) -> Result<Vec<PlayerPointsRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let mut rows: Vec<PlayerPointsRow> = Vec::new();
    let mut seen: HashMap<(String, Gameweek), usize> = HashMap::new();
    for result in reader.deserialize::<PlayerPointsRow>() {
        match result {
            Ok(row) => {
                if row.player_id.is_empty() {
                    warn!("skipping points row with empty player_id");
                    continue;
                }
                if row.gameweek == 0 {
                    warn!("skipping points for '{}': gameweek 0", row.player_id);
                    continue;
                }
                let key = (row.player_id.clone(), row.gameweek);
                match seen.get(&key) {
                    Some(&index) => {
                        warn!(
                            "duplicate points for '{}' in gameweek {}, using latest value",
                            row.player_id, row.gameweek
                        );
                        rows[index] = row;
                    }
                    None => {
                        seen.insert(key, rows.len());
                        rows.push(row);
                    }
                }
            }
            Err(e) => {
                warn!("skipping malformed points row: {}", e);
            }
        }
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Public path-based loader
// ---------------------------------------------------------------------------

/// Load player points from a CSV file.
pub fn load_player_points(path: &Path) -> Result<Vec<PlayerPointsRow>, PointsImportError> {
    let file = std::fs::File::open(path).map_err(|e| PointsImportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_points_from_reader(file).map_err(|e| PointsImportError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
