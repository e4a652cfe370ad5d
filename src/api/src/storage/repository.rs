//! SQLite repository for the statistics store and its load ledger

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::schema::create_tables;
use crate::ingest::{LoadState, LoadSummary};
use crate::models::{Driver, EntityKind, Race, RaceResult};

/// Repository over one SQLite database
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        Self::init(conn)
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        // Create tables if they don't exist
        create_tables(&conn).context("Failed to create schema")?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ==================== Load Ledger ====================

    /// Ledger state for an entity (resume capability)
    pub fn load_state(&self, kind: EntityKind) -> Result<LoadState> {
        let state: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM load_runs WHERE entity = ?1",
                [kind.name()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(state
            .as_deref()
            .and_then(LoadState::parse)
            .unwrap_or(LoadState::NotStarted))
    }

    /// Mark an entity as being loaded; stays so if the load never finishes
    pub fn mark_in_progress(&self, kind: EntityKind) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO load_runs (entity, state, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(entity) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
            params![kind.name(), LoadState::InProgress.as_str()],
        )?;
        Ok(())
    }

    /// Record a finished load and its counters
    pub fn record_load(&self, summary: &LoadSummary) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO load_runs
            (entity, state, loaded, failed, skipped, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            "#,
            params![
                summary.entity.name(),
                summary.state().as_str(),
                summary.success as i64,
                summary.failed as i64,
                summary.skipped as i64,
            ],
        )?;
        Ok(())
    }

    // ==================== Query Operations ====================

    /// Row count of an entity's table
    pub fn count(&self, kind: EntityKind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Row counts for every table, in load order
    pub fn table_counts(&self) -> Result<Vec<(EntityKind, i64)>> {
        EntityKind::ALL
            .iter()
            .map(|&kind| -> Result<(EntityKind, i64)> { Ok((kind, self.count(kind)?)) })
            .collect()
    }

    /// Number of rows whose foreign keys do not resolve
    pub fn foreign_key_violations(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut violations = 0;
        while rows.next()?.is_some() {
            violations += 1;
        }
        Ok(violations)
    }

    /// Key the store will assign to the next row inserted without one
    pub fn next_id(&self, kind: EntityKind) -> Result<i64> {
        let seq: Option<i64> = self
            .conn
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = ?1",
                [kind.table()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(seq.unwrap_or(0) + 1)
    }

    /// Races of one season
    pub fn races_by_year(&self, year: i64) -> Result<Vec<Race>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_id, year, round, circuit_id, name, date, time, url
            FROM races
            WHERE year = ?1
            ORDER BY round
            "#,
        )?;

        let races = stmt
            .query_map([year], |row| {
                Ok(Race {
                    race_id: row.get(0)?,
                    year: row.get(1)?,
                    round: row.get(2)?,
                    circuit_id: row.get(3)?,
                    name: row.get(4)?,
                    date: row.get(5)?,
                    time: row.get(6)?,
                    url: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(races)
    }

    /// Results of one race, classified and unclassified, in finishing order
    pub fn race_results(&self, race_id: i64) -> Result<Vec<RaceResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT result_id, race_id, driver_id, constructor_id, number, grid, position,
                   position_text, position_order, points, laps, time_text, milliseconds,
                   fastest_lap, rank, fastest_lap_time, fastest_lap_speed, status_id
            FROM results
            WHERE race_id = ?1
            ORDER BY position_order
            "#,
        )?;

        let results = stmt
            .query_map([race_id], |row| {
                Ok(RaceResult {
                    result_id: row.get(0)?,
                    race_id: row.get(1)?,
                    driver_id: row.get(2)?,
                    constructor_id: row.get(3)?,
                    number: row.get(4)?,
                    grid: row.get(5)?,
                    position: row.get(6)?,
                    position_text: row.get(7)?,
                    position_order: row.get(8)?,
                    points: row.get(9)?,
                    laps: row.get(10)?,
                    time_text: row.get(11)?,
                    milliseconds: row.get(12)?,
                    fastest_lap: row.get(13)?,
                    rank: row.get(14)?,
                    fastest_lap_time: row.get(15)?,
                    fastest_lap_speed: row.get(16)?,
                    status_id: row.get(17)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }

    /// Look up a driver by its stable reference ("hamilton")
    pub fn driver_by_ref(&self, driver_ref: &str) -> Result<Option<Driver>> {
        let driver = self
            .conn
            .query_row(
                r#"
                SELECT driver_id, driver_ref, number, code, forename, surname,
                       dob, nationality, url
                FROM drivers
                WHERE driver_ref = ?1
                "#,
                [driver_ref],
                driver_from_row,
            )
            .optional()?;
        Ok(driver)
    }
}

fn driver_from_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
    Ok(Driver {
        driver_id: row.get(0)?,
        driver_ref: row.get(1)?,
        number: row.get(2)?,
        code: row.get(3)?,
        forename: row.get(4)?,
        surname: row.get(5)?,
        dob: row.get(6)?,
        nationality: row.get(7)?,
        url: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seed(repo: &Repository) {
        repo.conn()
            .execute_batch(
                r#"
                INSERT INTO status (status_id, status) VALUES (1, 'Finished'), (4, 'Collision');
                INSERT INTO drivers (driver_id, driver_ref, forename, surname, dob)
                    VALUES (1, 'hamilton', 'Lewis', 'Hamilton', '1985-01-07'),
                           (8, 'raikkonen', 'Kimi', 'Räikkönen', NULL);
                INSERT INTO constructors (constructor_id, constructor_ref, name)
                    VALUES (1, 'mclaren', 'McLaren');
                INSERT INTO circuits (circuit_id, circuit_ref, name) VALUES (1, 'albert_park', 'Albert Park');
                INSERT INTO races (race_id, year, round, circuit_id, name, date, time)
                    VALUES (19, 2008, 2, 1, 'Malaysian Grand Prix', '2008-03-23', NULL),
                           (18, 2008, 1, 1, 'Australian Grand Prix', '2008-03-16', '04:30:00');
                INSERT INTO results (result_id, race_id, driver_id, constructor_id, grid, position,
                                     position_text, position_order, points, laps, status_id)
                    VALUES (2, 18, 8, 1, 15, NULL, 'R', 15, 0, 53, 4),
                           (1, 18, 1, 1, 1, 1, '1', 1, 10, 58, 1);
                "#,
            )
            .unwrap();
    }

    #[test]
    fn test_ledger_defaults_to_not_started() {
        let repo = Repository::in_memory().unwrap();
        assert_eq!(
            repo.load_state(EntityKind::Drivers).unwrap(),
            LoadState::NotStarted
        );
    }

    #[test]
    fn test_ledger_transitions() {
        let repo = Repository::in_memory().unwrap();
        repo.mark_in_progress(EntityKind::Results).unwrap();
        assert_eq!(
            repo.load_state(EntityKind::Results).unwrap(),
            LoadState::InProgress
        );

        let mut summary = LoadSummary::new(EntityKind::Results);
        summary.success = 10;
        summary.failed = 1;
        repo.record_load(&summary).unwrap();
        assert_eq!(
            repo.load_state(EntityKind::Results).unwrap(),
            LoadState::PartiallyFailed
        );

        let loaded: i64 = repo
            .conn()
            .query_row(
                "SELECT loaded FROM load_runs WHERE entity = 'results'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(loaded, 10);
    }

    #[test]
    fn test_counts_and_fk_check() {
        let repo = Repository::in_memory().unwrap();
        seed(&repo);

        assert_eq!(repo.count(EntityKind::Races).unwrap(), 2);
        let counts = repo.table_counts().unwrap();
        assert_eq!(counts.len(), 11);
        assert_eq!(counts[0], (EntityKind::Status, 2));
        assert_eq!(repo.foreign_key_violations().unwrap(), 0);
    }

    #[test]
    fn test_races_by_year_ordered_by_round() {
        let repo = Repository::in_memory().unwrap();
        seed(&repo);

        let races = repo.races_by_year(2008).unwrap();
        assert_eq!(races.len(), 2);
        assert_eq!(races[0].round, 1);
        assert_eq!(races[0].date, NaiveDate::from_ymd_opt(2008, 3, 16).unwrap());
        assert_eq!(races[0].time, chrono::NaiveTime::from_hms_opt(4, 30, 0));
        assert_eq!(races[1].time, None);
        assert!(repo.races_by_year(1950).unwrap().is_empty());
    }

    #[test]
    fn test_race_results_in_finishing_order() {
        let repo = Repository::in_memory().unwrap();
        seed(&repo);

        let results = repo.race_results(18).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].position, Some(1));
        assert_eq!(results[1].position, None);
        assert_eq!(results[1].position_order, 15);
    }

    #[test]
    fn test_driver_by_ref() {
        let repo = Repository::in_memory().unwrap();
        seed(&repo);

        let driver = repo.driver_by_ref("hamilton").unwrap().unwrap();
        assert_eq!(driver.driver_id, Some(1));
        assert_eq!(driver.dob, NaiveDate::from_ymd_opt(1985, 1, 7));
        assert!(repo.driver_by_ref("senna").unwrap().is_none());
    }

    #[test]
    fn test_next_id_follows_sequence() {
        let repo = Repository::in_memory().unwrap();
        assert_eq!(repo.next_id(EntityKind::Drivers).unwrap(), 1);
        seed(&repo);
        // Explicit keys still advance AUTOINCREMENT past the largest inserted id
        assert_eq!(repo.next_id(EntityKind::Drivers).unwrap(), 9);
    }
}
