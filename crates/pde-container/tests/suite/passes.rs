use std::sync::Arc;

use pde_classpath::{ClasspathEntry, InMemoryJavaModel, JavaModel};
use pde_container::{ContainerError, ContainerRequest, FailureCause, RequestState};
use pde_model::{BundleOrigin, Import, PluginDescriptor};
use pde_scheduler::CancellationToken;
use pretty_assertions::assert_eq;

use super::fixture::Fixture;

fn util_and_core(fx: &Fixture) {
    fx.universe.put_workspace(fx.project("com.acme.util"));
    fx.universe
        .put_workspace(fx.project("com.acme.core").with_import(Import::new("com.acme.util")));
}

#[test]
fn second_pass_without_changes_writes_nothing() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    let token = CancellationToken::new();

    manager.request_all();
    let first = manager.run(&token).unwrap();
    assert_eq!(first.updated, vec!["com.acme.util", "com.acme.core"]);
    assert_eq!(manager.store().writes(), 2);
    assert_eq!(fx.java.container_pushes(), 1);
    assert_eq!(
        fx.java.container_entries("com.acme.core"),
        Some(vec![ClasspathEntry::project("/com.acme.util", false)])
    );

    manager.request_all();
    let second = manager.run(&token).unwrap();
    assert_eq!(second.unchanged, vec!["com.acme.util", "com.acme.core"]);
    assert!(second.updated.is_empty());
    assert_eq!(manager.store().writes(), 2);
    assert_eq!(fx.java.container_pushes(), 1);
    assert_eq!(manager.state("com.acme.core"), Some(RequestState::Unchanged));
}

#[test]
fn changed_dependencies_are_pushed_in_one_batch() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    let token = CancellationToken::new();
    manager.request_all();
    manager.run(&token).unwrap();

    fx.universe.put_workspace(
        fx.project("com.acme.core")
            .with_import(Import::new("com.acme.util"))
            .with_import(Import::new("com.acme.extra")),
    );
    fx.universe.put_workspace(fx.project("com.acme.extra"));
    manager.request_all();
    let report = manager.run(&token).unwrap();

    assert_eq!(report.updated, vec!["com.acme.core", "com.acme.extra"]);
    assert_eq!(report.unchanged, vec!["com.acme.util"]);
    assert_eq!(fx.java.container_pushes(), 2);
    assert_eq!(
        fx.java.container_entries("com.acme.core").unwrap(),
        vec![
            ClasspathEntry::project("/com.acme.util", false),
            ClasspathEntry::project("/com.acme.extra", false),
        ]
    );
}

#[test]
fn supplied_baseline_is_compared() {
    let fx = Fixture::new();
    fx.universe.put_workspace(fx.project("p"));
    let manager = fx.manager();
    manager.enqueue(ContainerRequest {
        project: "p".to_string(),
        previous: Some(vec![ClasspathEntry::project("/stale", false)]),
    });
    let report = manager.run(&CancellationToken::new()).unwrap();
    assert_eq!(report.updated, vec!["p"]);
    assert_eq!(manager.store().load("p"), Some(Vec::new()));
}

#[test]
fn closed_projects_are_skipped() {
    let fx = Fixture::new();
    fx.universe.put_workspace(fx.project("p"));
    fx.workspace.close("p");
    let manager = fx.manager();
    manager.request("p");
    manager.request("ghost");
    let report = manager.run(&CancellationToken::new()).unwrap();
    assert_eq!(report.skipped, vec!["p", "ghost"]);
    assert_eq!(manager.store().writes(), 0);
    assert_eq!(fx.java.container_pushes(), 0);
}

fn broken(fx: &Fixture, id: &str) -> PluginDescriptor {
    let location = fx.project(id).install_location;
    PluginDescriptor::unloaded(
        id,
        BundleOrigin::Workspace {
            project: id.to_string(),
        },
        &location,
    )
}

#[test]
fn one_failure_is_surfaced_directly_and_others_proceed() {
    let fx = Fixture::new();
    fx.universe.put_workspace(broken(&fx, "bad"));
    fx.universe.put_workspace(fx.project("good"));
    let manager = fx.manager();
    manager.request("bad");
    manager.request("good");

    let err = manager.run(&CancellationToken::new()).unwrap_err();
    match &err {
        ContainerError::Project { project, source } => {
            assert_eq!(project, "bad");
            assert!(matches!(source, FailureCause::Classpath(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(manager.state("bad"), Some(RequestState::Failed));
    assert_eq!(manager.state("good"), Some(RequestState::Updated));
    assert!(fx.java.container_entries("good").is_some());
}

#[test]
fn several_failures_are_aggregated() {
    let fx = Fixture::new();
    fx.universe.put_workspace(broken(&fx, "bad1"));
    fx.universe.put_workspace(broken(&fx, "bad2"));
    let manager = fx.manager();
    manager.request_all();

    let err = manager.run(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, ContainerError::Multiple(_)));
    assert_eq!(err.failed_projects(), vec!["bad1", "bad2"]);
    assert_eq!(fx.java.container_pushes(), 0);
}

#[test]
fn cancelled_pass_persists_nothing() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    manager.request_all();

    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(manager.run(&token), Err(ContainerError::Cancelled)));
    assert_eq!(manager.store().writes(), 0);
    assert_eq!(fx.java.container_pushes(), 0);
    assert_eq!(manager.pending(), vec!["com.acme.util", "com.acme.core"]);

    let report = manager.run(&CancellationToken::new()).unwrap();
    assert_eq!(report.updated.len(), 2);
}

#[test]
fn rejected_push_is_retried_on_the_next_pass() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    let token = CancellationToken::new();

    fx.java.reject_container_pushes(true);
    manager.request_all();
    let err = manager.run(&token).unwrap_err();
    assert!(matches!(err, ContainerError::JavaModel(_)));
    assert_eq!(fx.java.container_entries("com.acme.core"), None);
    assert!(!manager.store().path_for("com.acme.core").exists());
    assert_eq!(manager.state("com.acme.core"), Some(RequestState::Failed));

    fx.java.reject_container_pushes(false);
    manager.request_all();
    let report = manager.run(&token).unwrap();
    assert_eq!(report.updated, vec!["com.acme.util", "com.acme.core"]);
    assert_eq!(fx.java.container_pushes(), 1);
    assert_eq!(
        fx.java.container_entries("com.acme.core"),
        Some(vec![ClasspathEntry::project("/com.acme.util", false)])
    );
}

#[test]
fn snapshots_become_placeholders_after_restart() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    manager.request_all();
    manager.run(&CancellationToken::new()).unwrap();

    let restarted_java = Arc::new(InMemoryJavaModel::new());
    let restarted = fx.manager_with(Arc::clone(&restarted_java));
    assert_eq!(restarted.restore_placeholders().unwrap(), 2);
    assert_eq!(
        restarted_java.container_entries("com.acme.core"),
        fx.java.container_entries("com.acme.core")
    );
    assert_eq!(restarted_java.container_pushes(), 1);

    // Already populated projects are left alone.
    assert_eq!(restarted.restore_placeholders().unwrap(), 0);
}

#[test]
fn scheduled_pass_runs_in_background() {
    let fx = Fixture::new();
    util_and_core(&fx);
    let manager = fx.manager();
    manager.request_all();

    let task = manager.schedule().unwrap();
    let report = task.join_blocking().unwrap().unwrap();
    assert_eq!(report.updated.len(), 2);
    assert!(manager.schedule().is_none());
}
