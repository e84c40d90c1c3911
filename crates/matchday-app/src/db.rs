// SQLite persistence layer for manager state, squads, points and results.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use matchday_core::sources::{SquadSource, StateStore};
use matchday_core::{Gameweek, GameweekScore, GameweekTransferSummary, ManagerState, Squad};

use crate::points_import::PlayerPointsRow;

/// A gameweek outcome as recorded for one manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameweekResult {
    pub user_id: String,
    pub gameweek: Gameweek,
    pub summary: GameweekTransferSummary,
    pub score: GameweekScore,
    pub recorded_at: DateTime<Utc>,
}

/// The outgoing gameweek of a manager, scored as it closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedGameweek {
    pub summary: GameweekTransferSummary,
    pub score: GameweekScore,
}

/// SQLite-backed persistence for manager state, saved squads, player points
/// and recorded gameweek results.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS managers (
                user_id TEXT PRIMARY KEY,
                state   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS squads (
                user_id  TEXT NOT NULL REFERENCES managers(user_id),
                gameweek INTEGER NOT NULL,
                squad    TEXT NOT NULL,
                PRIMARY KEY (user_id, gameweek)
            );

            CREATE TABLE IF NOT EXISTS player_points (
                player_id TEXT NOT NULL,
                gameweek  INTEGER NOT NULL,
                points    INTEGER NOT NULL,
                PRIMARY KEY (player_id, gameweek)
            );

            CREATE TABLE IF NOT EXISTS gameweek_results (
                user_id   TEXT NOT NULL REFERENCES managers(user_id),
                gameweek  INTEGER NOT NULL,
                summary   TEXT NOT NULL,
                score     TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                PRIMARY KEY (user_id, gameweek)
            );

            CREATE INDEX IF NOT EXISTS idx_player_points_gameweek ON player_points(gameweek);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Managers
    // ------------------------------------------------------------------

    fn read_manager(conn: &Connection, user_id: &str) -> Result<Option<ManagerState>> {
        let json_str: Option<String> = conn
            .query_row(
                "SELECT state FROM managers WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query manager state")?;

        json_str
            .map(|s| {
                serde_json::from_str(&s)
                    .with_context(|| format!("failed to deserialize state of manager {user_id}"))
            })
            .transpose()
    }

    fn write_manager(conn: &Connection, user_id: &str, state: &ManagerState) -> Result<()> {
        let json_str =
            serde_json::to_string(state).context("failed to serialize manager state")?;
        conn.execute(
            "INSERT INTO managers (user_id, state) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET state = excluded.state",
            params![user_id, json_str],
        )
        .context("failed to save manager state")?;
        Ok(())
    }

    /// Load a manager's state. Returns `None` for an unknown manager.
    pub fn load_manager(&self, user_id: &str) -> Result<Option<ManagerState>> {
        Self::read_manager(&self.conn(), user_id)
    }

    /// Persist a manager's state, replacing any previous value. Upserts in
    /// place so squads and results that reference the manager survive.
    pub fn save_manager(&self, user_id: &str, state: &ManagerState) -> Result<()> {
        Self::write_manager(&self.conn(), user_id, state)
    }

    /// Read, transform and write back one manager's state atomically.
    ///
    /// The row is read inside an `IMMEDIATE` transaction, so concurrent
    /// updates to the same manager serialize. `f` receives the stored state
    /// (`None` for an unknown manager) and returns the state to store plus a
    /// value to hand back. If `f` fails nothing is written.
    pub fn update_manager<T, E, F>(&self, user_id: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Option<ManagerState>) -> std::result::Result<(ManagerState, T), E>,
        E: From<anyhow::Error>,
    {
        self.advance_manager(user_id, |current| {
            f(current).map(|(next, out)| (next, None, out))
        })
    }

    /// Like `update_manager`, but `f` may also hand back the gameweek the
    /// manager just left. Its result is recorded in the same transaction as
    /// the new state.
    pub fn advance_manager<T, E, F>(&self, user_id: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(
            Option<ManagerState>,
        ) -> std::result::Result<(ManagerState, Option<ClosedGameweek>, T), E>,
        E: From<anyhow::Error>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin manager transaction")?;

        let current = Self::read_manager(&tx, user_id)?;
        let (next, closed, out) = f(current)?;
        Self::write_manager(&tx, user_id, &next)?;
        if let Some(closed) = &closed {
            Self::write_result(
                &tx,
                user_id,
                closed.score.gameweek,
                &closed.summary,
                &closed.score,
            )?;
        }

        tx.commit().context("failed to commit manager update")?;
        Ok(out)
    }

    /// All registered manager ids, in id order.
    pub fn list_managers(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT user_id FROM managers ORDER BY user_id")
            .context("failed to prepare list_managers query")?;
        let ids = stmt
            .query_map([], |row| row.get(0))
            .context("failed to query managers")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("failed to map manager rows")?;
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Squads
    // ------------------------------------------------------------------

    /// Save the squad a manager picked for `gameweek`, replacing any earlier
    /// save for the same gameweek.
    pub fn save_squad(&self, user_id: &str, gameweek: Gameweek, squad: &Squad) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(squad).context("failed to serialize squad")?;
        conn.execute(
            "INSERT OR REPLACE INTO squads (user_id, gameweek, squad) VALUES (?1, ?2, ?3)",
            params![user_id, gameweek, json_str],
        )
        .context("failed to save squad")?;
        Ok(())
    }

    pub fn load_squad(&self, user_id: &str, gameweek: Gameweek) -> Result<Option<Squad>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT squad FROM squads WHERE user_id = ?1 AND gameweek = ?2",
                params![user_id, gameweek],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query squad")?;

        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize squad"))
            .transpose()
    }

    // ------------------------------------------------------------------
    // Player points
    // ------------------------------------------------------------------

    /// Store imported points in a single transaction. Re-importing a
    /// `(player, gameweek)` pair overwrites the earlier value. Returns the
    /// number of rows written.
    pub fn import_player_points(&self, rows: &[PlayerPointsRow]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO player_points (player_id, gameweek, points)
                 VALUES (?1, ?2, ?3)",
                params![row.player_id, row.gameweek, row.points],
            )
            .context("failed to insert player points in batch")?;
        }
        tx.commit().context("failed to commit points import")?;
        Ok(rows.len())
    }

    /// Every recorded player's points for `gameweek`.
    pub fn points_for_gameweek(&self, gameweek: Gameweek) -> Result<HashMap<String, i32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player_id, points FROM player_points WHERE gameweek = ?1")
            .context("failed to prepare points_for_gameweek query")?;
        let points = stmt
            .query_map(params![gameweek], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query player points")?
            .collect::<std::result::Result<HashMap<String, i32>, _>>()
            .context("failed to map player points rows")?;
        Ok(points)
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    fn write_result(
        conn: &Connection,
        user_id: &str,
        gameweek: Gameweek,
        summary: &GameweekTransferSummary,
        score: &GameweekScore,
    ) -> Result<()> {
        let summary_json =
            serde_json::to_string(summary).context("failed to serialize transfer summary")?;
        let score_json = serde_json::to_string(score).context("failed to serialize score")?;
        conn.execute(
            "INSERT OR REPLACE INTO gameweek_results (user_id, gameweek, summary, score, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                gameweek,
                summary_json,
                score_json,
                Utc::now().to_rfc3339()
            ],
        )
        .context("failed to record gameweek result")?;
        Ok(())
    }

    /// Record a manager's transfer summary and score for `gameweek`.
    pub fn record_result(
        &self,
        user_id: &str,
        gameweek: Gameweek,
        summary: &GameweekTransferSummary,
        score: &GameweekScore,
    ) -> Result<()> {
        Self::write_result(&self.conn(), user_id, gameweek, summary, score)
    }

    pub fn load_result(&self, user_id: &str, gameweek: Gameweek) -> Result<Option<GameweekResult>> {
        let conn = self.conn();
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT summary, score, timestamp FROM gameweek_results
                 WHERE user_id = ?1 AND gameweek = ?2",
                params![user_id, gameweek],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("failed to query gameweek result")?;

        let Some((summary_json, score_json, timestamp)) = row else {
            return Ok(None);
        };
        let summary = serde_json::from_str(&summary_json)
            .context("failed to deserialize transfer summary")?;
        let score = serde_json::from_str(&score_json).context("failed to deserialize score")?;
        let recorded_at = DateTime::parse_from_rfc3339(&timestamp)
            .with_context(|| format!("invalid result timestamp {timestamp}"))?
            .with_timezone(&Utc);

        Ok(Some(GameweekResult {
            user_id: user_id.to_string(),
            gameweek,
            summary,
            score,
            recorded_at,
        }))
    }

    // ------------------------------------------------------------------
    // Season reset
    // ------------------------------------------------------------------

    /// Delete every manager, squad, points row and result, ready for a new
    /// season. Uses a transaction with automatic rollback on error.
    pub fn clear_season(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM gameweek_results", [])
            .context("failed to delete gameweek results")?;
        tx.execute("DELETE FROM squads", [])
            .context("failed to delete squads")?;
        tx.execute("DELETE FROM player_points", [])
            .context("failed to delete player points")?;
        tx.execute("DELETE FROM managers", [])
            .context("failed to delete managers")?;
        tx.commit().context("failed to commit clear_season")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rules engine boundary
// ---------------------------------------------------------------------------

impl StateStore for Database {
    type Error = anyhow::Error;

    fn load(&self, user_id: &str) -> Result<Option<ManagerState>> {
        self.load_manager(user_id)
    }

    fn save(&self, user_id: &str, state: &ManagerState) -> Result<()> {
        self.save_manager(user_id, state)
    }
}

impl SquadSource for Database {
    type Error = anyhow::Error;

    fn squad_for(&self, user_id: &str, gameweek: Gameweek) -> Result<Option<Squad>> {
        self.load_squad(user_id, gameweek)
    }
}
