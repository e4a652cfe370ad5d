//! Domain records for the Formula 1 statistics store.
//!
//! Each record mirrors one table in [`crate::storage::schema`]. Surrogate keys are
//! `Option<i64>`: bulk loads carry the dataset's own ids, anything else lets
//! SQLite assign one.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Entity types known to the ingestion pipeline, in foreign-key dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Status,
    Drivers,
    Constructors,
    Circuits,
    Races,
    Results,
    Qualifying,
    LapTimes,
    PitStops,
    DriverStandings,
    ConstructorStandings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Status,
        EntityKind::Drivers,
        EntityKind::Constructors,
        EntityKind::Circuits,
        EntityKind::Races,
        EntityKind::Results,
        EntityKind::Qualifying,
        EntityKind::LapTimes,
        EntityKind::PitStops,
        EntityKind::DriverStandings,
        EntityKind::ConstructorStandings,
    ];

    pub fn name(&self) -> &'static str {
        self.table()
    }

    /// Backing SQLite table
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Status => "status",
            EntityKind::Drivers => "drivers",
            EntityKind::Constructors => "constructors",
            EntityKind::Circuits => "circuits",
            EntityKind::Races => "races",
            EntityKind::Results => "results",
            EntityKind::Qualifying => "qualifying",
            EntityKind::LapTimes => "lap_times",
            EntityKind::PitStops => "pit_stops",
            EntityKind::DriverStandings => "driver_standings",
            EntityKind::ConstructorStandings => "constructor_standings",
        }
    }

    /// Surrogate key column
    pub fn key_column(&self) -> &'static str {
        match self {
            EntityKind::Status => "status_id",
            EntityKind::Drivers => "driver_id",
            EntityKind::Constructors => "constructor_id",
            EntityKind::Circuits => "circuit_id",
            EntityKind::Races => "race_id",
            EntityKind::Results => "result_id",
            EntityKind::Qualifying => "qualify_id",
            EntityKind::LapTimes => "lap_time_id",
            EntityKind::PitStops => "pit_stop_id",
            EntityKind::DriverStandings => "driver_standing_id",
            EntityKind::ConstructorStandings => "constructor_standing_id",
        }
    }

    /// Whether source files supply the surrogate key themselves.
    ///
    /// Those tables need their `sqlite_sequence` entry repaired after a bulk load.
    pub fn has_explicit_keys(&self) -> bool {
        !matches!(self, EntityKind::LapTimes | EntityKind::PitStops)
    }

    /// Rows staged per committed transaction
    pub fn batch_size(&self) -> usize {
        match self {
            EntityKind::Status | EntityKind::Constructors | EntityKind::Circuits => 50,
            EntityKind::Drivers | EntityKind::Races => 100,
            EntityKind::Results | EntityKind::Qualifying => 500,
            EntityKind::LapTimes => 5000,
            EntityKind::PitStops
            | EntityKind::DriverStandings
            | EntityKind::ConstructorStandings => 1000,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| format!("unknown entity: {}", s))
    }
}

/// A numeric field outside the range the schema allows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("`{field}` = {value} is outside {expected}")]
pub struct BoundsError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

fn check_int(
    field: &'static str,
    value: i64,
    range: RangeInclusive<i64>,
    expected: &'static str,
) -> Result<(), BoundsError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(BoundsError {
            field,
            value: value.to_string(),
            expected,
        })
    }
}

fn check_opt_int(
    field: &'static str,
    value: Option<i64>,
    range: RangeInclusive<i64>,
    expected: &'static str,
) -> Result<(), BoundsError> {
    match value {
        Some(v) => check_int(field, v, range, expected),
        None => Ok(()),
    }
}

fn check_float(
    field: &'static str,
    value: Option<f64>,
    range: RangeInclusive<f64>,
    expected: &'static str,
) -> Result<(), BoundsError> {
    match value {
        Some(v) if !range.contains(&v) => Err(BoundsError {
            field,
            value: v.to_string(),
            expected,
        }),
        _ => Ok(()),
    }
}

const POSITIVE: RangeInclusive<i64> = 1..=i64::MAX;
const NON_NEGATIVE: RangeInclusive<i64> = 0..=i64::MAX;

/// Race-ending reason ("Finished", "Accident", "+1 Lap", ...)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub status_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Driver {
    pub driver_id: Option<i64>,
    pub driver_ref: String,
    pub number: Option<i64>,
    pub code: Option<String>,
    pub forename: String,
    pub surname: String,
    pub dob: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

impl Driver {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_opt_int("number", self.number, 0..=999, "[0, 999]")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constructor {
    pub constructor_id: Option<i64>,
    pub constructor_ref: String,
    pub name: String,
    pub nationality: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circuit {
    pub circuit_id: Option<i64>,
    pub circuit_ref: String,
    pub name: String,
    pub location: Option<String>,
    pub country: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub alt: Option<i64>,
    pub url: Option<String>,
}

impl Circuit {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_float("lat", self.lat, -90.0..=90.0, "[-90, 90]")?;
        check_float("lng", self.lng, -180.0..=180.0, "[-180, 180]")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Race {
    pub race_id: Option<i64>,
    pub year: i64,
    pub round: i64,
    pub circuit_id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub url: Option<String>,
}

impl Race {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_int("year", self.year, 1950..=2100, "[1950, 2100]")?;
        check_int("round", self.round, POSITIVE, ">= 1")
    }
}

/// Classified or unclassified finish of one driver in one race.
///
/// `position` is null for non-finishers; `position_order` always ranks every car.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub result_id: Option<i64>,
    pub race_id: i64,
    pub driver_id: i64,
    pub constructor_id: i64,
    pub number: Option<i64>,
    pub grid: i64,
    pub position: Option<i64>,
    pub position_text: String,
    pub position_order: i64,
    pub points: f64,
    pub laps: i64,
    pub time_text: Option<String>,
    pub milliseconds: Option<i64>,
    pub fastest_lap: Option<i64>,
    pub rank: Option<i64>,
    pub fastest_lap_time: Option<String>,
    pub fastest_lap_speed: Option<f64>,
    pub status_id: i64,
}

impl RaceResult {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_opt_int("number", self.number, 0..=999, "[0, 999]")?;
        check_int("grid", self.grid, NON_NEGATIVE, ">= 0")?;
        check_opt_int("position", self.position, POSITIVE, ">= 1")?;
        check_int("positionOrder", self.position_order, POSITIVE, ">= 1")?;
        check_float("points", Some(self.points), 0.0..=f64::MAX, ">= 0")?;
        check_int("laps", self.laps, NON_NEGATIVE, ">= 0")?;
        check_opt_int("fastestLap", self.fastest_lap, POSITIVE, ">= 1")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Qualifying {
    pub qualify_id: Option<i64>,
    pub race_id: i64,
    pub driver_id: i64,
    pub constructor_id: i64,
    pub number: i64,
    pub position: i64,
    pub q1: Option<String>,
    pub q2: Option<String>,
    pub q3: Option<String>,
}

impl Qualifying {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_int("number", self.number, 0..=999, "[0, 999]")?;
        check_int("position", self.position, POSITIVE, ">= 1")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapTime {
    pub race_id: i64,
    pub driver_id: i64,
    pub lap: i64,
    pub position: Option<i64>,
    pub time_text: Option<String>,
    pub milliseconds: Option<i64>,
}

impl LapTime {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_int("lap", self.lap, POSITIVE, ">= 1")?;
        check_opt_int("position", self.position, POSITIVE, ">= 1")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitStop {
    pub race_id: i64,
    pub driver_id: i64,
    pub stop: i64,
    pub lap: i64,
    pub time_of_day: NaiveTime,
    pub duration: Option<String>,
    pub milliseconds: Option<i64>,
}

impl PitStop {
    pub fn validate(&self) -> Result<(), BoundsError> {
        check_int("stop", self.stop, POSITIVE, ">= 1")?;
        check_int("lap", self.lap, POSITIVE, ">= 1")
    }
}

/// Championship snapshot for one driver after one race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverStanding {
    pub driver_standing_id: Option<i64>,
    pub race_id: i64,
    pub driver_id: i64,
    pub points: f64,
    pub position: i64,
    pub position_text: Option<String>,
    pub wins: i64,
}

/// Championship snapshot for one constructor after one race
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstructorStanding {
    pub constructor_standing_id: Option<i64>,
    pub race_id: i64,
    pub constructor_id: i64,
    pub points: f64,
    pub position: i64,
    pub position_text: Option<String>,
    pub wins: i64,
}

fn validate_standing(points: f64, position: i64, wins: i64) -> Result<(), BoundsError> {
    check_float("points", Some(points), 0.0..=f64::MAX, ">= 0")?;
    check_int("position", position, POSITIVE, ">= 1")?;
    check_int("wins", wins, NON_NEGATIVE, ">= 0")
}

impl DriverStanding {
    pub fn validate(&self) -> Result<(), BoundsError> {
        validate_standing(self.points, self.position, self.wins)
    }
}

impl ConstructorStanding {
    pub fn validate(&self) -> Result<(), BoundsError> {
        validate_standing(self.points, self.position, self.wins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(year: i64, round: i64) -> Race {
        Race {
            race_id: Some(1),
            year,
            round,
            circuit_id: 1,
            name: "Australian Grand Prix".to_string(),
            date: NaiveDate::from_ymd_opt(2009, 3, 29).unwrap(),
            time: None,
            url: None,
        }
    }

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("drivers".parse::<EntityKind>(), Ok(EntityKind::Drivers));
        assert_eq!("lap-times".parse::<EntityKind>(), Ok(EntityKind::LapTimes));
        assert_eq!(" Pit_Stops ".parse::<EntityKind>(), Ok(EntityKind::PitStops));
        assert!("sprint_results".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_explicit_key_tables() {
        assert!(EntityKind::Drivers.has_explicit_keys());
        assert!(EntityKind::Results.has_explicit_keys());
        assert!(!EntityKind::LapTimes.has_explicit_keys());
        assert!(!EntityKind::PitStops.has_explicit_keys());
    }

    #[test]
    fn test_race_bounds() {
        assert!(race(1950, 1).validate().is_ok());
        assert!(race(2100, 22).validate().is_ok());

        let err = race(1949, 1).validate().unwrap_err();
        assert_eq!(err.field, "year");
        assert_eq!(race(2024, 0).validate().unwrap_err().field, "round");
    }

    #[test]
    fn test_circuit_bounds() {
        let mut circuit = Circuit {
            circuit_id: Some(1),
            circuit_ref: "albert_park".to_string(),
            name: "Albert Park Grand Prix Circuit".to_string(),
            location: Some("Melbourne".to_string()),
            country: Some("Australia".to_string()),
            lat: Some(-37.8497),
            lng: Some(144.968),
            alt: Some(10),
            url: None,
        };
        assert!(circuit.validate().is_ok());

        circuit.lng = Some(181.0);
        assert_eq!(circuit.validate().unwrap_err().field, "lng");
    }

    #[test]
    fn test_driver_number_bounds() {
        let mut driver = Driver {
            driver_id: Some(1),
            driver_ref: "hamilton".to_string(),
            number: Some(44),
            code: Some("HAM".to_string()),
            forename: "Lewis".to_string(),
            surname: "Hamilton".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 1, 7),
            nationality: Some("British".to_string()),
            url: None,
        };
        assert!(driver.validate().is_ok());

        driver.number = Some(1000);
        assert!(driver.validate().is_err());
    }

    #[test]
    fn test_standing_bounds() {
        let standing = DriverStanding {
            driver_standing_id: Some(1),
            race_id: 18,
            driver_id: 1,
            points: -1.0,
            position: 1,
            position_text: Some("1".to_string()),
            wins: 1,
        };
        assert_eq!(standing.validate().unwrap_err().field, "points");
    }
}
