//! Start, stop and restart behavior.

use std::sync::Arc;
use std::time::{Duration, Instant};

use omnisharp_supervisor::config::ServerOptions;
use omnisharp_supervisor::events::ServerEvent;
use omnisharp_supervisor::server::{ProcessSupervisor, ServerState, SupervisorError};

use super::{
    collect_until, launch_path, options, solution_target, FailingLauncher, Harness,
    RecordingProcessTree, FAKE_PID, HOST_PID,
};

#[tokio::test]
async fn start_reaches_started_and_publishes_lifecycle() {
    let mut harness = Harness::new(options(), true);
    let mut events = harness.supervisor.subscribe();

    let _server = harness.start().await;

    assert_eq!(harness.supervisor.state(), ServerState::Started);
    assert!(harness.supervisor.is_running());
    let target = solution_target(&harness.root);
    assert_eq!(harness.supervisor.launch_target(), Some(target.clone()));

    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::OmnisharpStart)
    })
    .await;
    let position = |wanted: &ServerEvent| events.iter().position(|e| e == wanted).unwrap();
    let before = position(&ServerEvent::BeforeServerStart(target.target.clone()));
    let starting = position(&ServerEvent::StateChanged(ServerState::Starting));
    let started = position(&ServerEvent::StateChanged(ServerState::Started));
    let server_start = position(&ServerEvent::ServerStart(target.target.clone()));
    let ready = position(&ServerEvent::OmnisharpStart);
    assert!(starting < before && before < started && started < server_start && server_start < ready);
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::ServerLaunched(info) if info.pid == Some(FAKE_PID)
    )));
}

#[tokio::test]
async fn launch_request_uses_target_directory_and_arguments() {
    let mut harness = Harness::new(options(), true);
    let _server = harness.start().await;

    let launches = harness.launcher.launches();
    assert_eq!(launches.len(), 1);
    let launch = &launches[0];
    let target = solution_target(&harness.root);
    assert_eq!(launch.cwd, target.directory);
    assert_eq!(launch.launch_path, launch_path());
    assert!(!launch.use_mono);
    assert_eq!(launch.args[0], "-s");
    assert_eq!(launch.args[1], target.target.to_string_lossy());
    assert_eq!(launch.args[2..4], ["--hostPID".to_string(), HOST_PID.to_string()]);
    assert!(launch.args.contains(&"--stdio".to_string()));
}

#[tokio::test]
async fn start_times_out_without_started_event() {
    let options = ServerOptions {
        project_load_timeout: 1,
        ..options()
    };
    let harness = Harness::new(options, false);
    let mut events = harness.supervisor.subscribe();

    let began = Instant::now();
    let err = harness
        .supervisor
        .start(solution_target(&harness.root))
        .await
        .unwrap_err();
    let elapsed = began.elapsed();

    assert!(matches!(err, SupervisorError::ProjectLoadTimeout { secs: 1 }));
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    assert_eq!(harness.supervisor.state(), ServerState::Stopped);
    assert_eq!(harness.tree.terminated(), vec![FAKE_PID]);

    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::ServerStop)
    })
    .await;
    assert!(events.iter().any(|e| matches!(
        e,
        ServerEvent::ServerError(message) if message.contains("project_load_timeout")
    )));
}

#[tokio::test]
async fn launch_failure_publishes_error_and_stops() {
    let tree = Arc::new(RecordingProcessTree::default());
    let supervisor = ProcessSupervisor::builder(options(), std::env::temp_dir())
        .launcher(Arc::new(FailingLauncher))
        .process_tree(tree.clone())
        .build();
    let mut events = supervisor.subscribe();

    let err = supervisor
        .start(solution_target(&std::env::temp_dir()))
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Launch(_)));
    assert_eq!(supervisor.state(), ServerState::Stopped);
    assert!(tree.terminated().is_empty());
    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::ServerStop)
    })
    .await;
    assert!(events.iter().any(|e| matches!(e, ServerEvent::ServerError(_))));
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let mut harness = Harness::new(options(), true);
    let _server = harness.start().await;

    let err = harness
        .supervisor
        .start(solution_target(&harness.root))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning(ServerState::Started)));
}

#[tokio::test]
async fn stop_twice_is_idempotent() {
    let mut harness = Harness::new(options(), true);
    let _server = harness.start().await;

    harness.supervisor.stop().await;
    harness.supervisor.stop().await;

    assert_eq!(harness.supervisor.state(), ServerState::Stopped);
    assert_eq!(harness.tree.terminated(), vec![FAKE_PID]);
}

#[tokio::test]
async fn stop_cancels_a_pending_start() {
    let harness = Harness::new(options(), false);
    let mut events = harness.supervisor.subscribe();
    let supervisor = harness.supervisor.clone();
    let root = harness.root.clone();
    let starting = tokio::spawn(async move { supervisor.start(solution_target(&root)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.supervisor.state(), ServerState::Started);
    harness.supervisor.stop().await;

    let result = tokio::time::timeout(Duration::from_secs(2), starting)
        .await
        .expect("start returns promptly")
        .unwrap();
    assert!(matches!(result, Err(SupervisorError::StoppedWhileStarting)));
    assert_eq!(harness.supervisor.state(), ServerState::Stopped);

    let events = collect_until(&mut events, Duration::from_millis(300), |_| false).await;
    let stops = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::ServerStop))
        .count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn restart_relaunches_last_target() {
    let mut harness = Harness::new(options(), true);
    let _first = harness.start().await;

    harness.supervisor.restart(None).await.unwrap();
    let _second = harness.servers.recv().await.unwrap();

    assert_eq!(harness.supervisor.state(), ServerState::Started);
    assert_eq!(harness.launcher.launches().len(), 2);
    assert_eq!(harness.tree.terminated(), vec![FAKE_PID]);
}

#[tokio::test]
async fn server_exit_stops_supervisor() {
    let mut harness = Harness::new(options(), true);
    let mut events = harness.supervisor.subscribe();
    let server = harness.start().await;

    drop(server);

    let events = collect_until(&mut events, Duration::from_secs(2), |e| {
        matches!(e, ServerEvent::ServerStop)
    })
    .await;
    assert!(events.iter().any(|e| matches!(e, ServerEvent::ServerError(_))));
    assert!(events.contains(&ServerEvent::ServerStop));
    assert_eq!(harness.supervisor.state(), ServerState::Stopped);
}
