//! CLI command implementations
//!
//! Commands are thin: load config, open the data file, call one engine
//! operation with an engine-owned transaction, print the report.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::model::CorrelationFilter;
use crate::observability::Logger;
use crate::progression::{
    BatchRequest, ProgressionEngine, PromotionRequest, RevertRequest, RevertScope, RunCorrelation,
};
use crate::storage::{Dataset, FileStore};

use super::args::{Cli, Command, RunArgs, StoreArgs};
use super::errors::{CliError, CliResult};
use super::io::write_response;

type FileEngine = ProgressionEngine<FileStore, EngineConfig>;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run one command and print its result
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = execute(cmd)?;
    write_response(data)
}

/// Run one command and return its result as JSON
pub fn execute(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Init { data, import } => init(&data, import.as_deref()),
        Command::Preview { store } => preview(&store),
        Command::Promote { store, run } => promote(&store, &run),
        Command::PromoteOne {
            store,
            run,
            student,
            target,
        } => promote_one(&store, &run, student, target),
        Command::Revert {
            store,
            execution_id,
            progression_id,
            with_enrollments,
        } => revert(&store, execution_id, progression_id, with_enrollments),
    }
}

/// Create a data file, optionally seeded from a plain JSON dataset.
pub fn init(data_path: &Path, import: Option<&Path>) -> CliResult<Value> {
    if data_path.exists() {
        return Err(CliError::already_initialized(data_path.display()));
    }

    let dataset = match import {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                CliError::io_error(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str::<Dataset>(&content)?
        }
        None => Dataset::new(),
    };

    FileStore::create(data_path, &dataset)?;

    Ok(json!({
        "initialized": true,
        "students": dataset.students.len(),
        "levels": dataset.levels.len(),
    }))
}

pub fn preview(args: &StoreArgs) -> CliResult<Value> {
    let engine = open_engine(args)?;
    let report = engine.preview_batch(args.tenant, None)?;
    Ok(serde_json::to_value(report)?)
}

pub fn promote(args: &StoreArgs, run: &RunArgs) -> CliResult<Value> {
    let engine = open_engine(args)?;

    let mut request = BatchRequest::new(args.tenant)
        .with_dry_run(run.dry_run)
        .with_correlation(correlation(run));
    request.triggered_by = run.triggered_by.clone();
    request.note = run.note.clone();

    let report = engine.promote_batch(&request, None)?;
    Ok(serde_json::to_value(report)?)
}

pub fn promote_one(
    args: &StoreArgs,
    run: &RunArgs,
    student: uuid::Uuid,
    target: Option<uuid::Uuid>,
) -> CliResult<Value> {
    let engine = open_engine(args)?;

    let mut request = PromotionRequest::new(args.tenant, student)
        .with_dry_run(run.dry_run)
        .with_correlation(correlation(run));
    request.target_level_id = target;
    request.triggered_by = run.triggered_by.clone();
    request.note = run.note.clone();

    let report = engine.promote_one(&request, None)?;
    Ok(json!({
        "execution_id": request.correlation.execution_id,
        "report": report,
    }))
}

pub fn revert(
    args: &StoreArgs,
    execution_id: Option<uuid::Uuid>,
    progression_id: Option<uuid::Uuid>,
    with_enrollments: bool,
) -> CliResult<Value> {
    let engine = open_engine(args)?;

    let filter = CorrelationFilter {
        execution_id,
        progression_id,
    };
    let scope = if with_enrollments {
        RevertScope::LevelAndEnrollments
    } else {
        RevertScope::LevelOnly
    };

    let report = engine.revert_batch(&RevertRequest::new(args.tenant, filter).with_scope(scope), None)?;
    Ok(serde_json::to_value(report)?)
}

fn correlation(run: &RunArgs) -> RunCorrelation {
    let correlation = RunCorrelation::new();
    match run.progression_id {
        Some(id) => correlation.with_progression_id(id),
        None => correlation,
    }
}

fn open_engine(args: &StoreArgs) -> CliResult<FileEngine> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);

    if !args.data.exists() {
        return Err(CliError::not_initialized(args.data.display()));
    }
    let store = FileStore::open(&args.data)?;

    Ok(ProgressionEngine::from_config(store, config))
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use crate::model::{CourseOffering, Level, Period, Student};
    use chrono::NaiveDate;
    use tempfile::TempDir;
    use uuid::Uuid;

    struct Seeded {
        _dir: TempDir,
        args: StoreArgs,
        student: Uuid,
        grade2: Uuid,
    }

    fn seeded() -> Seeded {
        let dir = TempDir::new().unwrap();
        let tenant = Uuid::new_v4();

        let mut dataset = Dataset::new();
        let grade1 = dataset.insert_level(Level::new(tenant, 1, "Grade 1"));
        let grade2 = dataset.insert_level(Level::new(tenant, 2, "Grade 2"));
        dataset.insert_course(CourseOffering::new(tenant, "MATH-2", Some(grade2)));
        let mut period = Period::new(tenant, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), 3);
        period.is_current = true;
        dataset.insert_period(period);
        let student = dataset.insert_student(Student::new(tenant, "Ada", Some(grade1)));

        let seed = dir.path().join("seed.json");
        fs::write(&seed, serde_json::to_string(&dataset).unwrap()).unwrap();
        let data = dir.path().join("school.data");
        init(&data, Some(&seed)).unwrap();

        Seeded {
            args: StoreArgs {
                config: None,
                data,
                tenant,
            },
            _dir: dir,
            student,
            grade2,
        }
    }

    #[test]
    fn test_init_creates_data_file() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("school.data");

        let out = init(&data, None).unwrap();
        assert_eq!(out["initialized"], true);
        assert!(FileStore::open(&data).is_ok());
    }

    #[test]
    fn test_init_refuses_reinit() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("school.data");
        init(&data, None).unwrap();

        let err = init(&data, None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::AlreadyInitialized);
    }

    #[test]
    fn test_commands_require_init() {
        let dir = TempDir::new().unwrap();
        let args = StoreArgs {
            config: None,
            data: dir.path().join("missing.data"),
            tenant: Uuid::new_v4(),
        };

        let err = preview(&args).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::NotInitialized);
    }

    #[test]
    fn test_promote_then_revert() {
        let s = seeded();

        let out = promote(&s.args, &RunArgs::default()).unwrap();
        assert_eq!(out["promoted_count"], 1);
        let execution_id: Uuid = serde_json::from_value(out["execution_id"].clone()).unwrap();

        let store = FileStore::open(&s.args.data).unwrap();
        let data = store.load().unwrap();
        assert_eq!(data.students[&s.student].current_level_id, Some(s.grade2));
        assert_eq!(data.enrollments.len(), 1);

        let out = revert(&s.args, Some(execution_id), None, true).unwrap();
        assert_eq!(out["reverted_count"], 1);
        let data = store.load().unwrap();
        assert_ne!(data.students[&s.student].current_level_id, Some(s.grade2));
        assert!(data.enrollments.is_empty());
    }

    #[test]
    fn test_preview_and_dry_run_do_not_write() {
        let s = seeded();
        let before = FileStore::open(&s.args.data).unwrap().load().unwrap();

        let out = preview(&s.args).unwrap();
        assert_eq!(out["promote_count"], 1);

        let run = RunArgs {
            dry_run: true,
            ..RunArgs::default()
        };
        let out = promote_one(&s.args, &run, s.student, None).unwrap();
        assert_eq!(out["report"]["status"], "previewed");

        let after = FileStore::open(&s.args.data).unwrap().load().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_revert_without_ids_is_invalid() {
        let s = seeded();
        let err = revert(&s.args, None, None, false).unwrap_err();
        assert_eq!(err.code_str(), "PROGRESSION_INVALID_REQUEST");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut s = seeded();
        let config = s.args.data.with_file_name("progression.json");
        fs::write(&config, r#"{"default_policy":{"pass_threshold":500}}"#).unwrap();
        s.args.config = Some(config);

        let err = preview(&s.args).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
