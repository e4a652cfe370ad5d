//! SQLite schema definitions for the Formula 1 statistics store
//!
//! Tables:
//! - status: Race-ending reasons lookup
//! - drivers, constructors, circuits: Independent reference entities
//! - races: Season calendar, references circuits
//! - results, qualifying, lap_times, pit_stops: Per-race transactional data
//! - driver_standings, constructor_standings: Championship snapshots per race
//! - load_runs: Ingestion ledger, one row per entity

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS status (
            status_id INTEGER PRIMARY KEY AUTOINCREMENT,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS drivers (
            driver_id INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_ref TEXT NOT NULL UNIQUE,
            number INTEGER CHECK (number BETWEEN 0 AND 999),
            code TEXT,
            forename TEXT NOT NULL,
            surname TEXT NOT NULL,
            dob TEXT,
            nationality TEXT,
            url TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS constructors (
            constructor_id INTEGER PRIMARY KEY AUTOINCREMENT,
            constructor_ref TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            nationality TEXT,
            url TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS circuits (
            circuit_id INTEGER PRIMARY KEY AUTOINCREMENT,
            circuit_ref TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            location TEXT,
            country TEXT,
            lat REAL CHECK (lat BETWEEN -90 AND 90),
            lng REAL CHECK (lng BETWEEN -180 AND 180),
            alt INTEGER,
            url TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        );
        "#,
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            race_id INTEGER PRIMARY KEY AUTOINCREMENT,
            year INTEGER NOT NULL CHECK (year BETWEEN 1950 AND 2100),
            round INTEGER NOT NULL CHECK (round > 0),
            circuit_id INTEGER NOT NULL REFERENCES circuits(circuit_id) ON DELETE RESTRICT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT,
            url TEXT,
            created_at TEXT DEFAULT (datetime('now')),
            UNIQUE(year, round)
        )
        "#,
        [],
    )?;

    // Race results. position is NULL for unclassified finishers.
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            result_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            driver_id INTEGER NOT NULL REFERENCES drivers(driver_id) ON DELETE RESTRICT,
            constructor_id INTEGER NOT NULL REFERENCES constructors(constructor_id) ON DELETE RESTRICT,
            number INTEGER,
            grid INTEGER NOT NULL CHECK (grid >= 0),
            position INTEGER CHECK (position > 0),
            position_text TEXT NOT NULL,
            position_order INTEGER NOT NULL CHECK (position_order > 0),
            points REAL NOT NULL DEFAULT 0 CHECK (points >= 0),
            laps INTEGER NOT NULL CHECK (laps >= 0),
            time_text TEXT,
            milliseconds INTEGER,
            fastest_lap INTEGER CHECK (fastest_lap > 0),
            rank INTEGER,
            fastest_lap_time TEXT,
            fastest_lap_speed REAL,
            status_id INTEGER NOT NULL REFERENCES status(status_id) ON DELETE RESTRICT,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS qualifying (
            qualify_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            driver_id INTEGER NOT NULL REFERENCES drivers(driver_id) ON DELETE RESTRICT,
            constructor_id INTEGER NOT NULL REFERENCES constructors(constructor_id) ON DELETE RESTRICT,
            number INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position > 0),
            q1 TEXT,
            q2 TEXT,
            q3 TEXT,
            UNIQUE(race_id, driver_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS lap_times (
            lap_time_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            driver_id INTEGER NOT NULL REFERENCES drivers(driver_id) ON DELETE RESTRICT,
            lap INTEGER NOT NULL CHECK (lap > 0),
            position INTEGER CHECK (position > 0),
            time_text TEXT,
            milliseconds INTEGER,
            UNIQUE(race_id, driver_id, lap)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS pit_stops (
            pit_stop_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            driver_id INTEGER NOT NULL REFERENCES drivers(driver_id) ON DELETE RESTRICT,
            stop INTEGER NOT NULL CHECK (stop > 0),
            lap INTEGER NOT NULL CHECK (lap > 0),
            time_of_day TEXT NOT NULL,
            duration TEXT,
            milliseconds INTEGER,
            UNIQUE(race_id, driver_id, stop)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS driver_standings (
            driver_standing_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            driver_id INTEGER NOT NULL REFERENCES drivers(driver_id) ON DELETE RESTRICT,
            points REAL NOT NULL DEFAULT 0 CHECK (points >= 0),
            position INTEGER NOT NULL CHECK (position > 0),
            position_text TEXT,
            wins INTEGER NOT NULL DEFAULT 0 CHECK (wins >= 0),
            UNIQUE(race_id, driver_id)
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS constructor_standings (
            constructor_standing_id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_id INTEGER NOT NULL REFERENCES races(race_id) ON DELETE CASCADE,
            constructor_id INTEGER NOT NULL REFERENCES constructors(constructor_id) ON DELETE RESTRICT,
            points REAL NOT NULL DEFAULT 0 CHECK (points >= 0),
            position INTEGER NOT NULL CHECK (position > 0),
            position_text TEXT,
            wins INTEGER NOT NULL DEFAULT 0 CHECK (wins >= 0),
            UNIQUE(race_id, constructor_id)
        )
        "#,
        [],
    )?;

    // Ingestion ledger (resume capability)
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS load_runs (
            entity TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            loaded INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    // Create indexes for common queries
    conn.execute("CREATE INDEX IF NOT EXISTS idx_races_year ON races(year)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_race ON results(race_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_race_driver ON results(race_id, driver_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_driver ON results(driver_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        // Verify tables exist
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('status', 'drivers', 'constructors', 'circuits', 'races', 'results',
                  'qualifying', 'lap_times', 'pit_stops', 'driver_standings',
                  'constructor_standings', 'load_runs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 12);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // Should not fail on second call
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_check_constraints_reject_bad_year() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO circuits (circuit_id, circuit_ref, name) VALUES (1, 'monza', 'Monza')",
            [],
        )
        .unwrap();

        let err = conn.execute(
            "INSERT INTO races (race_id, year, round, circuit_id, name, date)
             VALUES (1, 1900, 1, 1, 'Italian Grand Prix', '1900-09-01')",
            [],
        );
        assert!(err.is_err());
    }
}
