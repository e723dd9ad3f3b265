use pde_classpath::{ClasspathEntry, JavaModel};
use pde_model::Import;
use pde_scheduler::DebounceOutcome;

use super::fixture::{eventually, Fixture};

#[test]
fn model_changes_trigger_resolution_and_deletion() {
    let fx = Fixture::new();
    let manager = fx.manager();
    manager.attach();

    fx.universe.put_workspace(fx.project("util"));
    fx.universe
        .put_workspace(fx.project("core").with_import(Import::new("util")));

    assert!(eventually(|| {
        fx.java.container_entries("core") == Some(vec![ClasspathEntry::project("/util", false)])
    }));
    assert!(eventually(|| manager.store().load("core").is_some()));

    let snapshot = manager.store().path_for("core");
    fx.universe.remove_workspace("core");
    assert!(eventually(|| !snapshot.exists()));
}

#[test]
fn vm_change_bursts_are_coalesced() {
    let fx = Fixture::new();
    fx.universe.put_workspace(fx.project("p"));
    let manager = fx.manager();

    let first = manager.vm_changed();
    let second = manager.vm_changed();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert_eq!(first.wait_blocking(), DebounceOutcome::Superseded);
    assert_eq!(second.wait_blocking(), DebounceOutcome::Ran);
    assert!(eventually(|| fx.java.container_entries("p").is_some()));
    assert!(eventually(|| fx.java.container_pushes() == 1));
}
