//! Dependency-ordered load of a whole dataset directory.

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::loader::{load_entity, LoadFn, LoadOptions, LoadSummary};
use super::source::RowSource;
use crate::models::{
    Circuit, Constructor, ConstructorStanding, Driver, DriverStanding, EntityKind, LapTime,
    PitStop, Qualifying, Race, RaceResult, Status,
};
use crate::storage::{reconcile_sequences, Repository, SequenceReport};

/// One entry of the load plan
pub struct LoadStep {
    pub entity: EntityKind,
    pub file: &'static str,
    pub load: LoadFn,
}

/// Referenced tables come before the tables that reference them
pub static LOAD_PLAN: [LoadStep; 11] = [
    LoadStep {
        entity: EntityKind::Status,
        file: "status.csv",
        load: load_entity::<Status>,
    },
    LoadStep {
        entity: EntityKind::Drivers,
        file: "drivers.csv",
        load: load_entity::<Driver>,
    },
    LoadStep {
        entity: EntityKind::Constructors,
        file: "constructors.csv",
        load: load_entity::<Constructor>,
    },
    LoadStep {
        entity: EntityKind::Circuits,
        file: "circuits.csv",
        load: load_entity::<Circuit>,
    },
    LoadStep {
        entity: EntityKind::Races,
        file: "races.csv",
        load: load_entity::<Race>,
    },
    LoadStep {
        entity: EntityKind::Results,
        file: "results.csv",
        load: load_entity::<RaceResult>,
    },
    LoadStep {
        entity: EntityKind::Qualifying,
        file: "qualifying.csv",
        load: load_entity::<Qualifying>,
    },
    LoadStep {
        entity: EntityKind::LapTimes,
        file: "lap_times.csv",
        load: load_entity::<LapTime>,
    },
    LoadStep {
        entity: EntityKind::PitStops,
        file: "pit_stops.csv",
        load: load_entity::<PitStop>,
    },
    LoadStep {
        entity: EntityKind::DriverStandings,
        file: "driver_standings.csv",
        load: load_entity::<DriverStanding>,
    },
    LoadStep {
        entity: EntityKind::ConstructorStandings,
        file: "constructor_standings.csv",
        load: load_entity::<ConstructorStanding>,
    },
];

/// The plan step loading `kind`
pub fn plan_step(kind: EntityKind) -> Option<&'static LoadStep> {
    LOAD_PLAN.iter().find(|step| step.entity == kind)
}

/// What happened to one entity during a run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntityOutcome {
    Loaded(LoadSummary),
    AlreadyLoaded { existing: i64 },
    SourceMissing { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity: EntityKind,
    #[serde(flatten)]
    pub outcome: EntityOutcome,
}

/// Aggregated result of a full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub entities: Vec<EntityReport>,
    pub sequences: Vec<SequenceReport>,
    pub elapsed: Duration,
}

impl RunReport {
    /// New rows per entity; zero for anything not loaded this run
    pub fn loaded_counts(&self) -> BTreeMap<&'static str, usize> {
        self.entities
            .iter()
            .map(|report| {
                let loaded = match &report.outcome {
                    EntityOutcome::Loaded(summary) => summary.success,
                    _ => 0,
                };
                (report.entity.name(), loaded)
            })
            .collect()
    }

    pub fn total_loaded(&self) -> usize {
        self.loaded_counts().values().sum()
    }

    /// Row error samples across entities, at most `limit`
    pub fn errors(&self, limit: usize) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|report| {
                let errors: &[String] = match &report.outcome {
                    EntityOutcome::Loaded(summary) => &summary.errors,
                    _ => &[],
                };
                errors
                    .iter()
                    .map(move |e| format!("{}: {}", report.entity, e))
            })
            .take(limit)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub data_dir: PathBuf,
    /// Reload entities the ledger already marks as finished
    pub force: bool,
    pub load: LoadOptions,
}

/// Run every plan step in order, then repair sequences once.
pub fn run_pipeline(repo: &Repository, opts: &PipelineOptions) -> RunReport {
    let start = Instant::now();
    tracing::info!("Starting full load from {}", opts.data_dir.display());

    let entities = LOAD_PLAN
        .iter()
        .map(|step| EntityReport {
            entity: step.entity,
            outcome: run_step(repo, step, opts),
        })
        .collect();

    tracing::info!("Reconciling sequences...");
    let sequences = reconcile_sequences(repo.conn());

    let report = RunReport {
        entities,
        sequences,
        elapsed: start.elapsed(),
    };
    tracing::info!(
        "Full load finished in {:.1}s: {} new rows",
        report.elapsed.as_secs_f64(),
        report.total_loaded()
    );
    report
}

fn run_step(repo: &Repository, step: &LoadStep, opts: &PipelineOptions) -> EntityOutcome {
    let path = opts.data_dir.join(step.file);
    if !path.exists() {
        tracing::warn!("Skipping {}: {} not found", step.entity, path.display());
        return EntityOutcome::SourceMissing { path };
    }

    if !opts.force {
        match already_loaded(repo, step.entity) {
            Ok(Some(existing)) => {
                tracing::info!(
                    "Skipping {}: already loaded ({} rows present)",
                    step.entity,
                    existing
                );
                return EntityOutcome::AlreadyLoaded { existing };
            }
            Ok(None) => {}
            Err(e) => return failed(step.entity, e),
        }
    }

    match load_file(repo, step, &path, &opts.load) {
        Ok(summary) => EntityOutcome::Loaded(summary),
        Err(e) => failed(step.entity, e),
    }
}

fn failed(entity: EntityKind, e: anyhow::Error) -> EntityOutcome {
    tracing::error!("Failed to load {}: {:#}", entity, e);
    EntityOutcome::Failed {
        error: format!("{:#}", e),
    }
}

/// Existing row count when the ledger marks the entity finished and rows exist
fn already_loaded(repo: &Repository, kind: EntityKind) -> Result<Option<i64>> {
    if !repo.load_state(kind)?.is_finished() {
        return Ok(None);
    }
    let existing = repo.count(kind)?;
    Ok((existing > 0).then_some(existing))
}

/// Load one file through its plan step, keeping the ledger current
pub fn load_file(
    repo: &Repository,
    step: &LoadStep,
    path: &Path,
    opts: &LoadOptions,
) -> Result<LoadSummary> {
    repo.mark_in_progress(step.entity)?;
    let mut source = RowSource::open(path)?;
    load_source(repo, step, &mut source, opts)
}

/// Load an already-open source and record the outcome in the ledger.
///
/// Callers mark the entity in progress first.
pub fn load_source(
    repo: &Repository,
    step: &LoadStep,
    source: &mut RowSource,
    opts: &LoadOptions,
) -> Result<LoadSummary> {
    let summary = (step.load)(repo, source, opts)?;
    repo.record_load(&summary)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::LoadState;
    use std::fs;
    use tempfile::TempDir;

    const FIXTURES: [(&str, &str); 8] = [
        (
            "status.csv",
            "statusId,status\n1,Finished\n4,Collision\n11,+1 Lap\n",
        ),
        (
            "drivers.csv",
            "driverId,driverRef,number,code,forename,surname,dob,nationality,url\n\
             1,hamilton,44,HAM,Lewis,Hamilton,1985-01-07,British,http://en.wikipedia.org/wiki/Lewis_Hamilton\n\
             2,heidfeld,\\N,HEI,Nick,Heidfeld,1977-05-10,German,\\N\n\
             8,raikkonen,7,RAI,Kimi,Räikkönen,1979-10-17,Finnish,\\N\n",
        ),
        (
            "constructors.csv",
            "constructorId,constructorRef,name,nationality,url\n\
             1,mclaren,McLaren,British,\\N\n\
             2,bmw_sauber,BMW Sauber,German,\\N\n\
             6,ferrari,Ferrari,Italian,\\N\n",
        ),
        (
            "circuits.csv",
            "circuitId,circuitRef,name,location,country,lat,lng,alt,url\n\
             1,albert_park,Albert Park Grand Prix Circuit,Melbourne,Australia,-37.8497,144.968,10,\\N\n",
        ),
        (
            "races.csv",
            "raceId,year,round,circuitId,name,date,time,url\n\
             18,2008,1,1,Australian Grand Prix,2008-03-16,04:30:00,\\N\n\
             19,2008,2,9999,Malaysian Grand Prix,2008-03-23,07:00:00,\\N\n",
        ),
        (
            "results.csv",
            "resultId,raceId,driverId,constructorId,number,grid,position,positionText,positionOrder,points,laps,time,milliseconds,fastestLap,rank,fastestLapTime,fastestLapSpeed,statusId\n\
             1,18,1,1,22,1,1,1,1,10,58,1:34:50.616,5690616,39,2,1:27.452,218.300,1\n\
             2,18,2,2,3,5,2,2,2,8,58,+5.478,5696094,41,3,1:27.739,217.586,1\n\
             50,18,8,6,1,22,\\N,R,22,0,0,\\N,\\N,\\N,\\N,\\N,\\N,4\n",
        ),
        (
            "lap_times.csv",
            "raceId,driverId,lap,position,time,milliseconds\n\
             18,1,1,1,1:40.101,100101\n\
             18,1,2,1,1:29.823,89823\n\
             18,2,1,2,1:41.004,101004\n",
        ),
        (
            "pit_stops.csv",
            "raceId,driverId,stop,lap,time,duration,milliseconds\n\
             18,1,1,26,17:28:24,23.227,23227\n\
             18,2,1,20,17:20:05,24.011,24011\n",
        ),
    ];

    fn fixture_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in FIXTURES {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn options(dir: &TempDir, force: bool) -> PipelineOptions {
        PipelineOptions {
            data_dir: dir.path().to_path_buf(),
            force,
            load: LoadOptions::default(),
        }
    }

    fn outcome(report: &RunReport, kind: EntityKind) -> &EntityOutcome {
        &report
            .entities
            .iter()
            .find(|r| r.entity == kind)
            .unwrap()
            .outcome
    }

    #[test]
    fn test_plan_matches_dependency_order() {
        let kinds: Vec<EntityKind> = LOAD_PLAN.iter().map(|s| s.entity).collect();
        assert_eq!(kinds, EntityKind::ALL.to_vec());
    }

    #[test]
    fn test_plan_step_for_every_kind() {
        for kind in EntityKind::ALL {
            assert_eq!(plan_step(kind).unwrap().entity, kind);
        }
        assert_eq!(
            plan_step(EntityKind::LapTimes).unwrap().file,
            "lap_times.csv"
        );
        assert_eq!(
            plan_step(EntityKind::Status).unwrap().file,
            "status.csv"
        );
    }

    #[test]
    fn test_full_run_loads_present_files() {
        let dir = fixture_dir();
        let repo = Repository::in_memory().unwrap();

        let report = run_pipeline(&repo, &options(&dir, false));
        let counts = report.loaded_counts();

        assert_eq!(counts["status"], 3);
        assert_eq!(counts["drivers"], 3);
        assert_eq!(counts["races"], 1);
        assert_eq!(counts["results"], 3);
        assert_eq!(counts["lap_times"], 3);
        assert_eq!(counts["pit_stops"], 2);
        assert_eq!(counts["qualifying"], 0);
        assert!(matches!(
            outcome(&report, EntityKind::Qualifying),
            EntityOutcome::SourceMissing { .. }
        ));

        // The race on circuit 9999 is the only rejected row
        let errors = report.errors(10);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("races: row 2:"));
        assert_eq!(
            repo.load_state(EntityKind::Races).unwrap(),
            LoadState::PartiallyFailed
        );

        assert_eq!(repo.foreign_key_violations().unwrap(), 0);
        assert_eq!(report.sequences.len(), 9);
        assert!(repo.next_id(EntityKind::Results).unwrap() > 50);
        assert!(repo.next_id(EntityKind::Drivers).unwrap() > 8);
    }

    #[test]
    fn test_second_run_loads_nothing() {
        let dir = fixture_dir();
        let repo = Repository::in_memory().unwrap();
        run_pipeline(&repo, &options(&dir, false));

        let report = run_pipeline(&repo, &options(&dir, false));
        assert_eq!(report.total_loaded(), 0);
        assert!(matches!(
            outcome(&report, EntityKind::Drivers),
            EntityOutcome::AlreadyLoaded { existing: 3 }
        ));
        assert!(matches!(
            outcome(&report, EntityKind::LapTimes),
            EntityOutcome::AlreadyLoaded { existing: 3 }
        ));
        assert_eq!(repo.count(EntityKind::Results).unwrap(), 3);
        assert_eq!(repo.count(EntityKind::PitStops).unwrap(), 2);
    }

    #[test]
    fn test_forced_run_skips_rows_individually() {
        let dir = fixture_dir();
        let repo = Repository::in_memory().unwrap();
        run_pipeline(&repo, &options(&dir, false));

        let report = run_pipeline(&repo, &options(&dir, true));
        assert_eq!(report.total_loaded(), 0);
        match outcome(&report, EntityKind::Status) {
            EntityOutcome::Loaded(summary) => {
                assert_eq!(summary.skipped, 3);
                assert_eq!(summary.failed, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Rows without a source key are matched on (race, driver, lap)
        match outcome(&report, EntityKind::LapTimes) {
            EntityOutcome::Loaded(summary) => {
                assert_eq!(summary.skipped, 3);
                assert_eq!(summary.success, 0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(repo.count(EntityKind::LapTimes).unwrap(), 3);
    }

    #[test]
    fn test_unfinished_entity_resumes() {
        let dir = fixture_dir();
        let repo = Repository::in_memory().unwrap();
        run_pipeline(&repo, &options(&dir, false));

        // A crash mid-file leaves the ledger in progress
        repo.mark_in_progress(EntityKind::Drivers).unwrap();
        repo.conn()
            .execute_batch(
                r#"
                DELETE FROM results WHERE driver_id = 2;
                DELETE FROM lap_times WHERE driver_id = 2;
                DELETE FROM pit_stops WHERE driver_id = 2;
                DELETE FROM drivers WHERE driver_id = 2;
                "#,
            )
            .unwrap();

        let report = run_pipeline(&repo, &options(&dir, false));
        match outcome(&report, EntityKind::Drivers) {
            EntityOutcome::Loaded(summary) => {
                assert_eq!(summary.success, 1);
                assert_eq!(summary.skipped, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            repo.load_state(EntityKind::Drivers).unwrap(),
            LoadState::Completed
        );
    }

    #[test]
    fn test_unreadable_source_leaves_ledger_in_progress() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("status.csv")).unwrap();
        let repo = Repository::in_memory().unwrap();

        let report = run_pipeline(&repo, &options(&dir, false));
        assert!(matches!(
            outcome(&report, EntityKind::Status),
            EntityOutcome::Failed { .. }
        ));
        assert_eq!(
            repo.load_state(EntityKind::Status).unwrap(),
            LoadState::InProgress
        );
        assert!(matches!(
            outcome(&report, EntityKind::Drivers),
            EntityOutcome::SourceMissing { .. }
        ));
    }
}
