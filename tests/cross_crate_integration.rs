//! Exercises `kmsync-core` across module boundaries the way a host
//! application would: building a component, running it through the
//! executor against an in-memory VFS, and round-tripping a plan document.

use kmsync_core::exec::ExecContext;
use kmsync_core::model::{ActionKind, Component, Instruction};
use kmsync_core::{Executor, PlanDocument, PlannerFs, Vfs};
use std::path::PathBuf;

#[test]
fn component_with_move_instruction_executes_cleanly_against_vfs() {
    let mut component = Component::new("Test Mod", "Someone");
    component.instructions.push(
        Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\foo.2da".to_string()])
            .with_destination("<<kotorDirectory>>\\Override\\foo.2da"),
    );

    let mut vfs = Vfs::new(0);
    vfs.add_file("M\\foo.2da");
    let ctx = ExecContext::new("M", "K", 0);
    let mut executor = Executor::new();

    executor
        .run_component(&component, &mut vfs, &ctx)
        .expect("a single matching move should execute cleanly");
    assert!(vfs.file_exists("K\\Override\\foo.2da"));
}

#[test]
fn plan_document_round_trips_through_toml() {
    let doc = PlanDocument {
        kotor_install_root: PathBuf::from("C:\\Games\\KOTOR"),
        mod_archive_dir: PathBuf::from("C:\\Mods"),
        app_data_root: None,
        components: vec![Component::new("A Mod", "An Author")],
    };
    let serialized = toml::to_string(&doc).expect("plan document must serialize");
    let reloaded: PlanDocument = toml::from_str(&serialized).expect("plan document must deserialize");
    assert_eq!(reloaded.components.len(), 1);
    assert_eq!(reloaded.components[0].name, "A Mod");
}
