//! End-to-end tests for the executor façade through its public API.

mod common;

use std::sync::Arc;

use common::RecordingLogger;
use forklift::executor::{Executor, ExecutorSpec, ParallelizationInput};
use forklift::logger::ProgressLogger;
use forklift::BoxError;

fn letters() -> Result<Vec<String>, BoxError> {
    Ok(vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()])
}

fn ok_runner(item: &str) -> Result<(), BoxError> {
    let _ = item;
    Ok(())
}

#[tokio::test]
async fn in_process_run_end_to_end() {
    let spec = ExecutorSpec::builder(ok_runner)
        .items(letters)
        .item_name("letter")
        .batch_size(2)
        .build()
        .unwrap();

    let logger = Arc::new(RecordingLogger::default());
    let input = ParallelizationInput {
        main_process: true,
        ..ParallelizationInput::default()
    };

    let mut executor = Executor::new(spec);
    let code = executor
        .execute(&input, Arc::clone(&logger) as Arc<dyn ProgressLogger>)
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(*logger.started_with.lock().unwrap(), Some(5));
    assert_eq!(*logger.advanced.lock().unwrap(), 5);
    assert_eq!(logger.finished.lock().unwrap().as_deref(), Some("letter"));
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_mode_runs_real_workers_end_to_end() {
    use forklift::supervisor::WorkerCommand;

    let spec = ExecutorSpec::builder(ok_runner)
        .items(letters)
        .segment_size(2)
        .child_command_factory(|_input: &ParallelizationInput| {
            WorkerCommand::new("sh").args(["-c", "while read line; do printf .; done"])
        })
        .build()
        .unwrap();

    let logger = Arc::new(RecordingLogger::default());
    let input = ParallelizationInput {
        number_of_processes: Some(2),
        ..ParallelizationInput::default()
    };

    let mut executor = Executor::new(spec);
    let code = executor
        .execute(&input, Arc::clone(&logger) as Arc<dyn ProgressLogger>)
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(*logger.advanced.lock().unwrap(), 5);
    assert_eq!(*logger.commands_started.lock().unwrap(), 3);
    assert_eq!(*logger.commands_finished.lock().unwrap(), 3);
    assert!(*logger.peak_running.lock().unwrap() <= 2);

    let configuration = logger.configuration.lock().unwrap().unwrap();
    assert!(configuration.should_spawn_children);
    assert_eq!(configuration.number_of_processes, 2);
    assert_eq!(configuration.number_of_segments, 3);
}

#[cfg(unix)]
#[tokio::test]
async fn spawn_mode_with_zero_items_spawns_nothing() {
    use forklift::supervisor::WorkerCommand;

    let empty = || -> Result<Vec<String>, BoxError> { Ok(Vec::new()) };
    let spec = ExecutorSpec::builder(ok_runner)
        .items(empty)
        .child_command_factory(|_input: &ParallelizationInput| {
            WorkerCommand::new("sh").args(["-c", "while read line; do printf .; done"])
        })
        .build()
        .unwrap();

    let logger = Arc::new(RecordingLogger::default());
    let mut executor = Executor::new(spec);
    let code = executor
        .execute(
            &ParallelizationInput::new(),
            Arc::clone(&logger) as Arc<dyn ProgressLogger>,
        )
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert_eq!(*logger.commands_started.lock().unwrap(), 0);
    assert_eq!(*logger.advanced.lock().unwrap(), 0);
    assert!(logger.finished.lock().unwrap().is_some());
}
