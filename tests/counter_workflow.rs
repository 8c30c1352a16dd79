use loopway::demo::{counter_workflow, counter_workflow_with, final_step, increment_step};
use loopway::runtime::RunHandle;
use loopway::workflow::{FieldKind, ObjectShape};
use loopway::{Condition, EngineConfig, Operator, RunError, RunStatus, Step, WorkflowBuilder};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

fn increment_values(result: &loopway::RunResult) -> Vec<Value> {
    result
        .history
        .iter()
        .filter(|record| record.step_id == "increment")
        .map(|record| record.output["newValue"].clone())
        .collect()
}

#[tokio::test]
async fn counter_loops_ten_times_then_finishes() {
    let plan = counter_workflow().unwrap();
    let result = plan
        .create_run()
        .start(json!({ "target": 10, "startValue": 0 }))
        .await;

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.error.is_none());
    assert_eq!(result.executions_of("increment"), 10);
    assert_eq!(increment_values(&result), (1..=10).map(Value::from).collect::<Vec<_>>());
    assert_eq!(result.results["increment"]["newValue"], json!(10));
    assert_eq!(result.results["final"], json!({ "status": "complete" }));
    assert_eq!(result.results["trigger"], json!({ "target": 10, "startValue": 0 }));

    let order: Vec<&str> = result.history.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(order.last(), Some(&"final"));
    assert_eq!(result.executions_of("final"), 1);
}

#[tokio::test]
async fn commit_twice_yields_identical_plan() {
    let (increment, finish) = (increment_step(), final_step());
    let mut builder = WorkflowBuilder::new("counter-workflow");
    builder
        .step(&increment)
        .until(
            Condition::field("increment", "newValue", Operator::Gte, 10),
            &increment,
        )
        .then(&finish);

    let first = builder.commit().unwrap();
    let second = builder.commit().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.nodes().len(), second.nodes().len());
    assert_eq!(second.nodes().len(), 2);
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let plan = counter_workflow().unwrap();
    let run_a = plan.create_run();
    let run_b = plan.create_run();
    assert_ne!(run_a.run_id(), run_b.run_id());

    let (a, b) = tokio::join!(
        tokio::spawn(run_a.start(json!({ "target": 10, "startValue": 0 }))),
        tokio::spawn(run_b.start(json!({ "target": 10, "startValue": 5 }))),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_completed());
    assert!(b.is_completed());
    assert_eq!(a.executions_of("increment"), 10);
    assert_eq!(b.executions_of("increment"), 5);
    assert_eq!(a.results["increment"]["newValue"], json!(10));
    assert_eq!(b.results["increment"]["newValue"], json!(10));
    assert_eq!(increment_values(&b), (6..=10).map(Value::from).collect::<Vec<_>>());
}

#[tokio::test]
async fn absent_reference_keeps_the_loop_going() {
    // First pass yields null, so the condition has nothing to read yet
    let probe = Step::new("probe", |ctx| {
        let ready = ctx.iteration() >= 2;
        async move {
            if ready {
                Ok(json!({ "ready": true }))
            } else {
                Ok(Value::Null)
            }
        }
    });
    let plan = WorkflowBuilder::new("probe")
        .step(&probe)
        .until(Condition::field("probe", "ready", Operator::Eq, true), &probe)
        .commit()
        .unwrap();

    let result = plan.create_run().start(json!({})).await;
    assert!(result.is_completed());
    assert_eq!(result.executions_of("probe"), 2);
    assert_eq!(result.history[0].output, Value::Null);
}

#[tokio::test]
async fn condition_on_a_step_that_has_not_run_reads_as_false() {
    // `report` sits after the loop, so it is absent on every loop check
    let poll = Step::new("poll", |ctx| {
        let n = ctx.iteration();
        async move { Ok(json!({ "n": n })) }
    });
    let report = Step::new("report", |_ctx| async { Ok(json!({ "done": true })) });
    let plan = WorkflowBuilder::new("poll-then-report")
        .step(&poll)
        .until(
            Condition::any([
                Condition::field("report", "done", Operator::Eq, true),
                Condition::field("poll", "n", Operator::Gte, 3),
            ]),
            &poll,
        )
        .then(&report)
        .commit()
        .unwrap();

    let result = plan.create_run().start(json!({})).await;
    assert!(result.is_completed());
    assert_eq!(result.executions_of("poll"), 3);
    assert_eq!(result.executions_of("report"), 1);
    assert_eq!(result.results["report"], json!({ "done": true }));
}

#[tokio::test]
async fn failure_on_third_iteration_keeps_first_two_outputs() {
    let flaky = Step::new("increment", |ctx| {
        let iteration = ctx.iteration();
        async move {
            if iteration == 3 {
                anyhow::bail!("counter backend unavailable");
            }
            Ok(json!({ "newValue": iteration }))
        }
    });
    let plan = counter_workflow_with(&flaky, &final_step()).unwrap();

    let result = plan
        .create_run()
        .start(json!({ "target": 10, "startValue": 0 }))
        .await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(increment_values(&result), vec![json!(1), json!(2)]);
    assert_eq!(result.results["increment"], json!({ "newValue": 2 }));
    assert!(!result.results.contains_key("final"));
    match result.error {
        Some(RunError::Executor { step, source }) => {
            assert_eq!(step, "increment");
            assert_eq!(source.to_string(), "counter backend unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_trigger_runs_no_steps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Step::new("increment", {
        let calls = calls.clone();
        move |_ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!({ "newValue": 10 })) }
        }
    });
    let plan = counter_workflow_with(&counted, &final_step()).unwrap();

    let result = plan.create_run().start(json!({ "target": 10 })).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(result.error, Some(RunError::InvalidTrigger(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(result.history.is_empty());
    assert!(result.results.is_empty());
}

#[tokio::test]
async fn invalid_step_output_is_its_own_error() {
    let wrong = Step::new("increment", |_ctx| async { Ok(json!({ "newValue": "ten" })) })
        .output_shape(ObjectShape::new().field("newValue", FieldKind::Number));
    let plan = counter_workflow_with(&wrong, &final_step()).unwrap();
    let trigger = json!({ "target": 10, "startValue": 0 });

    let strict = plan.create_run().start(trigger.clone()).await;
    assert!(matches!(strict.error, Some(RunError::InvalidOutput { .. })));
    assert!(strict.history.is_empty());

    // Without validation the string never satisfies `$gte`, so the guard trips
    let lenient = plan
        .create_run_with(EngineConfig {
            max_iterations: Some(3),
            validate_outputs: false,
            ..EngineConfig::default()
        })
        .start(trigger)
        .await;
    assert!(matches!(lenient.error, Some(RunError::IterationLimit { limit: 3, .. })));
    assert_eq!(lenient.executions_of("increment"), 3);
}

#[tokio::test]
async fn cancellation_takes_effect_between_steps() {
    let handle_slot: Arc<Mutex<Option<RunHandle>>> = Arc::new(Mutex::new(None));
    let cancelling = Step::new("increment", {
        let handle_slot = handle_slot.clone();
        move |ctx| {
            let iteration = ctx.iteration();
            if iteration == 2 {
                if let Some(handle) = handle_slot.lock().unwrap().as_ref() {
                    handle.cancel();
                }
            }
            async move { Ok(json!({ "newValue": iteration })) }
        }
    });
    let plan = counter_workflow_with(&cancelling, &final_step()).unwrap();

    let run = plan.create_run();
    let handle = run.handle();
    *handle_slot.lock().unwrap() = Some(handle.clone());
    assert_eq!(handle.status(), RunStatus::Pending);

    let result = run.start(json!({ "target": 10, "startValue": 0 })).await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(result.error, Some(RunError::Cancelled)));
    // The executor that requested cancellation still finished
    assert_eq!(increment_values(&result), vec![json!(1), json!(2)]);
    assert!(handle.is_cancelled());
    assert_eq!(handle.wait_finished().await, RunStatus::Failed);
}

#[tokio::test]
async fn handle_reports_running_then_completed() {
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let started_tx = Arc::new(Mutex::new(Some(started_tx)));
    let release_rx = Arc::new(tokio::sync::Mutex::new(Some(release_rx)));

    let gate = Step::new("gate", move |_ctx| {
        let started_tx = started_tx.clone();
        let release_rx = release_rx.clone();
        async move {
            if let Some(tx) = started_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            if let Some(rx) = release_rx.lock().await.take() {
                let _ = rx.await;
            }
            Ok(json!({ "opened": true }))
        }
    });
    let plan = WorkflowBuilder::new("gated").step(&gate).commit().unwrap();

    let run = plan.create_run();
    let handle = run.handle();
    let task = tokio::spawn(run.start(json!({})));

    started_rx.await.unwrap();
    assert_eq!(handle.status(), RunStatus::Running);

    release_tx.send(()).unwrap();
    assert_eq!(handle.wait_finished().await, RunStatus::Completed);
    assert!(task.await.unwrap().is_completed());
}
