mod common;

use std::{cell::RefCell, path::PathBuf, rc::Rc};

use common::{RecordingConsumer, TestWorkspace, record};
use csv_importer::{
    config::ImportConfig,
    error::ImportError,
    stream::ImportStatus,
    workflow::{ImportWorkflow, WorkflowStep},
};

fn declare_id_name(workflow: &mut ImportWorkflow) {
    workflow.registry_mut().register("id", "ID", false);
    workflow.registry_mut().register("name", "Name", false);
}

fn assign_id_name(workflow: &mut ImportWorkflow) {
    workflow.assign("id", Some(0)).expect("assign id");
    workflow.assign("name", Some(1)).expect("assign name");
}

#[test]
fn single_file_walks_all_three_steps() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", "id,name\n1,Alice\n2,Bob\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFile);

    workflow.select_file(input).expect("select");
    assert_eq!(workflow.preview_columns().len(), 2);
    workflow.accept_file().expect("accept file");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFields);

    assign_id_name(&mut workflow);
    workflow.accept_fields().expect("accept fields");
    assert_eq!(workflow.step(), WorkflowStep::Processing);

    let mut consumer = RecordingConsumer::new();
    workflow.process(&mut consumer).expect("process");

    assert!(workflow.is_finished());
    assert_eq!(workflow.progress().status, ImportStatus::Complete);
    assert_eq!(workflow.stats().files_processed, 1);
    assert_eq!(workflow.stats().rows_processed, 2);
    assert_eq!(*consumer.records()[0], record(&[("id", "1"), ("name", "Alice")]));
}

#[test]
fn incomplete_mapping_is_rejected_synchronously() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", "id,name\n1,Alice\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_file(input).expect("select");
    workflow.accept_file().expect("accept file");
    workflow.assign("id", Some(0)).expect("assign");

    let err = workflow.accept_fields().unwrap_err();
    match err {
        ImportError::AssignmentIncomplete { missing } => {
            assert_eq!(missing, vec!["name".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Never entered as a state: still mapping fields.
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFields);
}

#[test]
fn cancel_keeps_the_parsed_preview() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", "id,name\n1,Alice\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_file(input.clone()).expect("select");
    workflow.accept_file().expect("accept file");
    workflow.cancel_fields().expect("cancel");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFile);

    // Deleting the file proves re-acceptance needs no re-parse.
    std::fs::remove_file(&input).expect("remove input");
    workflow.accept_file().expect("re-accept");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFields);
    assert_eq!(workflow.preview_columns().len(), 2);
}

#[test]
fn header_toggle_flows_into_processing() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("people.csv", "id,name\n1,Alice\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_file(input).expect("select");
    workflow.set_has_headers(false).expect("toggle");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.accept_fields().expect("accept fields");

    let mut consumer = RecordingConsumer::new();
    workflow.process(&mut consumer).expect("process");

    // The former header row is a real data row now.
    assert_eq!(workflow.stats().rows_processed, 2);
    assert_eq!(*consumer.records()[0], record(&[("id", "id"), ("name", "name")]));
}

#[test]
fn queued_files_require_their_own_mapping_by_default() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.csv", "id,name\n1,Alice\n");
    let second = workspace.write("b.csv", "id,name\n2,Bob\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_files([first, second]).expect("select");
    assert_eq!(workflow.queued_files(), 1);

    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.accept_fields().expect("accept fields");

    let mut consumer = RecordingConsumer::new();
    workflow.process(&mut consumer).expect("process first");

    // Second file came forward, but verification is not skipped.
    assert!(!workflow.is_finished());
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFile);
    assert_eq!(workflow.queued_files(), 0);
    assert_eq!(workflow.assignments().assigned_count(), 0);

    workflow.accept_file().expect("accept second");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFields);
}

#[test]
fn import_all_drains_the_queue_with_one_mapping() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.csv", "id,name\n1,Alice\n");
    let second = workspace.write("b.csv", "id,name\n2,Bob\n");
    let third = workspace.write("c.csv", "id,name\n3,Carol\n");

    let config = ImportConfig {
        allow_import_all: true,
        ..ImportConfig::default()
    };
    let mut workflow = ImportWorkflow::new(config);
    declare_id_name(&mut workflow);
    workflow
        .select_files([first, second, third])
        .expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.import_all().expect("import all");
    assert_eq!(workflow.step(), WorkflowStep::Processing);
    assert!(workflow.skip_verification());

    let mut consumer = RecordingConsumer::new();
    workflow.process(&mut consumer).expect("first file");

    // The fields step is bypassed for every queued file.
    assert_eq!(workflow.step(), WorkflowStep::Processing);
    assert!(workflow.skip_verification());
    workflow.process(&mut consumer).expect("second file");
    workflow.process(&mut consumer).expect("third file");

    assert!(workflow.is_finished());
    assert_eq!(workflow.stats().files_processed, 3);
    assert_eq!(workflow.stats().rows_processed, 3);
    let names: Vec<&str> = consumer
        .records()
        .iter()
        .map(|record| record["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
}

#[test]
fn import_all_requires_configuration() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("a.csv", "id,name\n1,Alice\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_file(input).expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    assert!(matches!(
        workflow.import_all().unwrap_err(),
        ImportError::ImportAllDisabled
    ));
}

#[test]
fn restart_pulls_the_next_queued_file() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.csv", "id,name\n1,Alice\n");
    let second = workspace.write("b.csv", "id,name\n2,Bob\n");

    let config = ImportConfig {
        restartable: true,
        ..ImportConfig::default()
    };
    let mut workflow = ImportWorkflow::new(config);
    declare_id_name(&mut workflow);
    workflow.select_files([first, second]).expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);

    workflow.restart().expect("restart");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFile);
    assert_eq!(workflow.queued_files(), 0);
    // Without import-all, restarting drops the mapping.
    assert_eq!(workflow.assignments().assigned_count(), 0);
    // The dequeued file is already preview-parsed.
    assert_eq!(workflow.preview_columns().len(), 2);
    assert_eq!(
        workflow.file_state().map(|s| s.path().file_name().unwrap().to_owned()),
        Some("b.csv".into())
    );
}

#[test]
fn restart_requires_configuration() {
    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    assert!(matches!(
        workflow.restart().unwrap_err(),
        ImportError::RestartDisabled
    ));
}

#[test]
fn consumer_failure_does_not_advance_the_queue() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.csv", "id,name\n1,Alice\n");
    let second = workspace.write("b.csv", "id,name\n2,Bob\n");

    let mut workflow = ImportWorkflow::new(ImportConfig::default());
    declare_id_name(&mut workflow);
    workflow.select_files([first, second]).expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.accept_fields().expect("accept fields");

    let mut consumer = RecordingConsumer::failing_at(0);
    let err = workflow.process(&mut consumer).unwrap_err();
    assert!(matches!(err, ImportError::Consumer { .. }));
    assert_eq!(workflow.progress().status, ImportStatus::Failed);
    assert_eq!(workflow.queued_files(), 1);
    assert!(!workflow.is_finished());

    // The mapping is intact; the embedder may retry with a fresh consumer.
    let mut retry = RecordingConsumer::new();
    workflow.process(&mut retry).expect("retry");
    assert_eq!(workflow.step(), WorkflowStep::AwaitingFile);
}

#[test]
fn lifecycle_hooks_fire_at_the_documented_transitions() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.csv", "id,name\n1,Alice\n");
    let second = workspace.write("b.csv", "id,name\n2,Bob\n");

    let started: Rc<RefCell<Vec<PathBuf>>> = Rc::default();
    let completed: Rc<RefCell<Vec<u64>>> = Rc::default();
    let closed = Rc::new(RefCell::new(0u32));

    let config = ImportConfig {
        allow_import_all: true,
        ..ImportConfig::default()
    };
    let mut workflow = ImportWorkflow::new(config);
    declare_id_name(&mut workflow);
    {
        let started = Rc::clone(&started);
        workflow.on_start(move |path| started.borrow_mut().push(path.to_path_buf()));
    }
    {
        let completed = Rc::clone(&completed);
        workflow.on_complete(move |stats| completed.borrow_mut().push(stats.rows_processed));
    }
    {
        let closed = Rc::clone(&closed);
        workflow.on_close(move || *closed.borrow_mut() += 1);
    }

    workflow.select_files([first, second]).expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.import_all().expect("import all");

    let mut consumer = RecordingConsumer::new();
    workflow.process(&mut consumer).expect("first");
    assert!(completed.borrow().is_empty());
    workflow.process(&mut consumer).expect("second");

    assert_eq!(started.borrow().len(), 2);
    assert_eq!(*completed.borrow(), vec![2]);

    workflow.close();
    assert_eq!(*closed.borrow(), 1);
}

#[test]
fn cancellation_leaves_partial_progress() {
    let workspace = TestWorkspace::new();
    let mut contents = String::from("id,name\n");
    for row in 0..9 {
        contents.push_str(&format!("{row},person_{row}\n"));
    }
    let input = workspace.write("big.csv", &contents);

    let config = ImportConfig {
        chunk_size: 3,
        ..ImportConfig::default()
    };
    let mut workflow = ImportWorkflow::new(config);
    declare_id_name(&mut workflow);
    workflow.select_file(input).expect("select");
    workflow.accept_file().expect("accept file");
    assign_id_name(&mut workflow);
    workflow.accept_fields().expect("accept fields");

    let token = workflow.cancel_token();
    let mut consumer = RecordingConsumer::cancelling_at(0, token);
    workflow.process(&mut consumer).expect("process");

    assert_eq!(workflow.progress().status, ImportStatus::Parsing);
    assert_eq!(workflow.progress().rows_processed, 3);
    assert!(!workflow.is_finished());
    // Nothing was counted as a finished file.
    assert_eq!(workflow.stats().files_processed, 0);
}
