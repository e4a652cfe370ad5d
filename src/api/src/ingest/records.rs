//! Row-to-record conversion and persistence for every loadable entity.
//!
//! Column names follow the public dataset's camelCase headers.

use rusqlite::{params, Connection, ToSql};

use super::source::{RawRow, RowError};
use crate::models::{
    Circuit, Constructor, ConstructorStanding, Driver, DriverStanding, EntityKind, LapTime,
    PitStop, Qualifying, Race, RaceResult, Status,
};

/// A domain record the loader can build from a CSV row and write to the store.
pub trait Record: Sized {
    const KIND: EntityKind;

    /// Sanitize and validate one row
    fn from_row(row: &RawRow) -> Result<Self, RowError>;

    /// Whether this record's key is already stored
    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool>;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()>;
}

fn row_exists(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> rusqlite::Result<bool> {
    conn.query_row(sql, params, |row| row.get(0))
}

/// Existence by surrogate id when the source supplies one, else by natural key
fn exists_by_id_or(
    conn: &Connection,
    kind: EntityKind,
    id: Option<i64>,
    natural_sql: &str,
    natural: &[&dyn ToSql],
) -> rusqlite::Result<bool> {
    match id {
        Some(id) => {
            let sql = format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
                kind.table(),
                kind.key_column()
            );
            row_exists(conn, &sql, &[&id])
        }
        None => row_exists(conn, natural_sql, natural),
    }
}

fn date_text(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn time_text(time: chrono::NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

impl Record for Status {
    const KIND: EntityKind = EntityKind::Status;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(Status {
            status_id: row.req_int("statusId")?,
            status: row.req_text("status")?,
        })
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        row_exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM status WHERE status_id = ?1)",
            &[&self.status_id],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO status (status_id, status) VALUES (?1, ?2)",
            params![self.status_id, self.status],
        )?;
        Ok(())
    }
}

impl Record for Driver {
    const KIND: EntityKind = EntityKind::Drivers;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let driver = Driver {
            driver_id: row.int("driverId"),
            driver_ref: row.req_text("driverRef")?,
            number: row.int("number"),
            code: row.text("code"),
            forename: row.req_text("forename")?,
            surname: row.req_text("surname")?,
            dob: row.date("dob"),
            nationality: row.text("nationality"),
            url: row.text("url"),
        };
        driver.validate()?;
        Ok(driver)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.driver_id,
            "SELECT EXISTS(SELECT 1 FROM drivers WHERE driver_ref = ?1)",
            &[&self.driver_ref],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO drivers
            (driver_id, driver_ref, number, code, forename, surname, dob, nationality, url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                self.driver_id,
                self.driver_ref,
                self.number,
                self.code,
                self.forename,
                self.surname,
                self.dob.map(date_text),
                self.nationality,
                self.url,
            ],
        )?;
        Ok(())
    }
}

impl Record for Constructor {
    const KIND: EntityKind = EntityKind::Constructors;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        Ok(Constructor {
            constructor_id: row.int("constructorId"),
            constructor_ref: row.req_text("constructorRef")?,
            name: row.req_text("name")?,
            nationality: row.text("nationality"),
            url: row.text("url"),
        })
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.constructor_id,
            "SELECT EXISTS(SELECT 1 FROM constructors WHERE constructor_ref = ?1)",
            &[&self.constructor_ref],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO constructors (constructor_id, constructor_ref, name, nationality, url)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                self.constructor_id,
                self.constructor_ref,
                self.name,
                self.nationality,
                self.url,
            ],
        )?;
        Ok(())
    }
}

impl Record for Circuit {
    const KIND: EntityKind = EntityKind::Circuits;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let circuit = Circuit {
            circuit_id: row.int("circuitId"),
            circuit_ref: row.req_text("circuitRef")?,
            name: row.req_text("name")?,
            location: row.text("location"),
            country: row.text("country"),
            lat: row.float("lat"),
            lng: row.float("lng"),
            alt: row.int("alt"),
            url: row.text("url"),
        };
        circuit.validate()?;
        Ok(circuit)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.circuit_id,
            "SELECT EXISTS(SELECT 1 FROM circuits WHERE circuit_ref = ?1)",
            &[&self.circuit_ref],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO circuits
            (circuit_id, circuit_ref, name, location, country, lat, lng, alt, url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                self.circuit_id,
                self.circuit_ref,
                self.name,
                self.location,
                self.country,
                self.lat,
                self.lng,
                self.alt,
                self.url,
            ],
        )?;
        Ok(())
    }
}

impl Record for Race {
    const KIND: EntityKind = EntityKind::Races;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let race = Race {
            race_id: row.int("raceId"),
            year: row.req_int("year")?,
            round: row.req_int("round")?,
            circuit_id: row.req_int("circuitId")?,
            name: row.req_text("name")?,
            date: row.req_date("date")?,
            time: row.time("time"),
            url: row.text("url"),
        };
        race.validate()?;
        Ok(race)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.race_id,
            "SELECT EXISTS(SELECT 1 FROM races WHERE year = ?1 AND round = ?2)",
            &[&self.year, &self.round],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO races (race_id, year, round, circuit_id, name, date, time, url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                self.race_id,
                self.year,
                self.round,
                self.circuit_id,
                self.name,
                date_text(self.date),
                self.time.map(time_text),
                self.url,
            ],
        )?;
        Ok(())
    }
}

impl Record for RaceResult {
    const KIND: EntityKind = EntityKind::Results;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let result = RaceResult {
            result_id: row.int("resultId"),
            race_id: row.req_int("raceId")?,
            driver_id: row.req_int("driverId")?,
            constructor_id: row.req_int("constructorId")?,
            number: row.int("number"),
            grid: row.req_int("grid")?,
            position: row.int("position"),
            position_text: row.req_text("positionText")?,
            position_order: row.req_int("positionOrder")?,
            points: row.float("points").unwrap_or(0.0),
            laps: row.req_int("laps")?,
            time_text: row.text("time"),
            milliseconds: row.int("milliseconds"),
            fastest_lap: row.int("fastestLap"),
            rank: row.int("rank"),
            fastest_lap_time: row.text("fastestLapTime"),
            fastest_lap_speed: row.float("fastestLapSpeed"),
            status_id: row.req_int("statusId")?,
        };
        result.validate()?;
        Ok(result)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.result_id,
            "SELECT EXISTS(SELECT 1 FROM results WHERE race_id = ?1 AND driver_id = ?2)",
            &[&self.race_id, &self.driver_id],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO results
            (result_id, race_id, driver_id, constructor_id, number, grid, position,
             position_text, position_order, points, laps, time_text, milliseconds,
             fastest_lap, rank, fastest_lap_time, fastest_lap_speed, status_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                self.result_id,
                self.race_id,
                self.driver_id,
                self.constructor_id,
                self.number,
                self.grid,
                self.position,
                self.position_text,
                self.position_order,
                self.points,
                self.laps,
                self.time_text,
                self.milliseconds,
                self.fastest_lap,
                self.rank,
                self.fastest_lap_time,
                self.fastest_lap_speed,
                self.status_id,
            ],
        )?;
        Ok(())
    }
}

impl Record for Qualifying {
    const KIND: EntityKind = EntityKind::Qualifying;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let qualifying = Qualifying {
            qualify_id: row.int("qualifyId"),
            race_id: row.req_int("raceId")?,
            driver_id: row.req_int("driverId")?,
            constructor_id: row.req_int("constructorId")?,
            number: row.req_int("number")?,
            position: row.req_int("position")?,
            q1: row.text("q1"),
            q2: row.text("q2"),
            q3: row.text("q3"),
        };
        qualifying.validate()?;
        Ok(qualifying)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.qualify_id,
            "SELECT EXISTS(SELECT 1 FROM qualifying WHERE race_id = ?1 AND driver_id = ?2)",
            &[&self.race_id, &self.driver_id],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO qualifying
            (qualify_id, race_id, driver_id, constructor_id, number, position, q1, q2, q3)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                self.qualify_id,
                self.race_id,
                self.driver_id,
                self.constructor_id,
                self.number,
                self.position,
                self.q1,
                self.q2,
                self.q3,
            ],
        )?;
        Ok(())
    }
}

impl Record for LapTime {
    const KIND: EntityKind = EntityKind::LapTimes;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let lap_time = LapTime {
            race_id: row.req_int("raceId")?,
            driver_id: row.req_int("driverId")?,
            lap: row.req_int("lap")?,
            position: row.int("position"),
            time_text: row.text("time"),
            milliseconds: row.int("milliseconds"),
        };
        lap_time.validate()?;
        Ok(lap_time)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        row_exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM lap_times WHERE race_id = ?1 AND driver_id = ?2 AND lap = ?3)",
            &[&self.race_id, &self.driver_id, &self.lap],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO lap_times (race_id, driver_id, lap, position, time_text, milliseconds)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                self.race_id,
                self.driver_id,
                self.lap,
                self.position,
                self.time_text,
                self.milliseconds,
            ],
        )?;
        Ok(())
    }
}

impl Record for PitStop {
    const KIND: EntityKind = EntityKind::PitStops;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let pit_stop = PitStop {
            race_id: row.req_int("raceId")?,
            driver_id: row.req_int("driverId")?,
            stop: row.req_int("stop")?,
            lap: row.req_int("lap")?,
            time_of_day: row.req_time("time")?,
            duration: row.text("duration"),
            milliseconds: row.int("milliseconds"),
        };
        pit_stop.validate()?;
        Ok(pit_stop)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        row_exists(
            conn,
            "SELECT EXISTS(SELECT 1 FROM pit_stops WHERE race_id = ?1 AND driver_id = ?2 AND stop = ?3)",
            &[&self.race_id, &self.driver_id, &self.stop],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO pit_stops
            (race_id, driver_id, stop, lap, time_of_day, duration, milliseconds)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                self.race_id,
                self.driver_id,
                self.stop,
                self.lap,
                time_text(self.time_of_day),
                self.duration,
                self.milliseconds,
            ],
        )?;
        Ok(())
    }
}

impl Record for DriverStanding {
    const KIND: EntityKind = EntityKind::DriverStandings;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let standing = DriverStanding {
            driver_standing_id: row.int("driverStandingsId"),
            race_id: row.req_int("raceId")?,
            driver_id: row.req_int("driverId")?,
            points: row.float("points").unwrap_or(0.0),
            position: row.req_int("position")?,
            position_text: row.text("positionText"),
            wins: row.int("wins").unwrap_or(0),
        };
        standing.validate()?;
        Ok(standing)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.driver_standing_id,
            "SELECT EXISTS(SELECT 1 FROM driver_standings WHERE race_id = ?1 AND driver_id = ?2)",
            &[&self.race_id, &self.driver_id],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO driver_standings
            (driver_standing_id, race_id, driver_id, points, position, position_text, wins)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                self.driver_standing_id,
                self.race_id,
                self.driver_id,
                self.points,
                self.position,
                self.position_text,
                self.wins,
            ],
        )?;
        Ok(())
    }
}

impl Record for ConstructorStanding {
    const KIND: EntityKind = EntityKind::ConstructorStandings;

    fn from_row(row: &RawRow) -> Result<Self, RowError> {
        let standing = ConstructorStanding {
            constructor_standing_id: row.int("constructorStandingsId"),
            race_id: row.req_int("raceId")?,
            constructor_id: row.req_int("constructorId")?,
            points: row.float("points").unwrap_or(0.0),
            position: row.req_int("position")?,
            position_text: row.text("positionText"),
            wins: row.int("wins").unwrap_or(0),
        };
        standing.validate()?;
        Ok(standing)
    }

    fn exists(&self, conn: &Connection) -> rusqlite::Result<bool> {
        exists_by_id_or(
            conn,
            Self::KIND,
            self.constructor_standing_id,
            "SELECT EXISTS(SELECT 1 FROM constructor_standings WHERE race_id = ?1 AND constructor_id = ?2)",
            &[&self.race_id, &self.constructor_id],
        )
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            r#"
            INSERT INTO constructor_standings
            (constructor_standing_id, race_id, constructor_id, points, position, position_text, wins)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                self.constructor_standing_id,
                self.race_id,
                self.constructor_id,
                self.points,
                self.position,
                self.position_text,
                self.wins,
            ],
        )?;
        Ok(())
    }
}
