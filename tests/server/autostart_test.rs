//! Choosing a launch target from the workspace.

use std::time::Duration;

use omnisharp_supervisor::events::ServerEvent;
use omnisharp_supervisor::server::{AutoStart, ServerState};
use omnisharp_supervisor::workspace::LaunchTargetKind;
use tempfile::TempDir;

use super::{collect_until, options, Harness};

fn workspace(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }
    dir
}

#[tokio::test]
async fn single_project_starts_folder_target() {
    let dir = workspace(&["src/app/app.csproj"]);
    let mut harness = Harness::with_root(options(), true, dir.path().to_path_buf());

    let outcome = harness.supervisor.auto_start(None).await.unwrap();

    let AutoStart::Started(target) = outcome else {
        panic!("expected a started target, got {outcome:?}");
    };
    assert_eq!(target.kind, LaunchTargetKind::Folder);
    assert_eq!(target.target, dir.path());
    assert_eq!(harness.supervisor.state(), ServerState::Started);
    assert_eq!(harness.supervisor.launch_target(), Some(target));
    assert!(harness.servers.recv().await.is_some());
}

#[tokio::test]
async fn several_solutions_are_offered_to_the_caller() {
    let dir = workspace(&["a.sln", "b/b.sln", "b/app.csproj"]);
    let harness = Harness::with_root(options(), true, dir.path().to_path_buf());
    let mut events = harness.supervisor.subscribe();

    let outcome = harness.supervisor.auto_start(None).await.unwrap();

    let AutoStart::MultipleLaunchTargets(targets) = outcome else {
        panic!("expected several targets, got {outcome:?}");
    };
    assert_eq!(targets.len(), 2);
    assert!(targets.iter().all(|t| t.kind == LaunchTargetKind::Solution));
    assert_eq!(harness.supervisor.state(), ServerState::Stopped);
    assert!(harness.launcher.launches().is_empty());

    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::MultipleLaunchTargets(_))
    })
    .await;
    assert_eq!(
        events.last(),
        Some(&ServerEvent::MultipleLaunchTargets(targets))
    );
}

#[tokio::test]
async fn preferred_target_is_started_when_several_exist() {
    let dir = workspace(&["a.sln", "b/b.sln", "b/app.csproj"]);
    let harness = Harness::with_root(options(), true, dir.path().to_path_buf());
    let preferred = dir.path().join("b").join("b.sln");

    let outcome = harness
        .supervisor
        .auto_start(Some(&preferred))
        .await
        .unwrap();

    let AutoStart::Started(target) = outcome else {
        panic!("expected a started target, got {outcome:?}");
    };
    assert_eq!(target.target, preferred);
    assert_eq!(target.directory, dir.path().join("b"));
    let launches = harness.launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].cwd, dir.path().join("b"));
}

#[tokio::test]
async fn empty_workspace_waits_for_a_project_file() {
    let dir = workspace(&[]);
    let harness = Harness::with_root(options(), true, dir.path().to_path_buf());

    let supervisor = harness.supervisor.clone();
    let pending = tokio::spawn(async move { supervisor.auto_start(None).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!pending.is_finished());
    assert!(harness.launcher.launches().is_empty());

    std::fs::write(dir.path().join("app.csproj"), "").unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), pending)
        .await
        .expect("auto start resumes after the project appears")
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, AutoStart::Started(ref t) if t.kind == LaunchTargetKind::Folder));
    assert_eq!(harness.launcher.launches().len(), 1);
}
