// ── Live process directory ────────────────────────────────────────────────────
//
// Exercises `Win32System` against the real process table.  Each test that
// starts a child terminates it before returning.

#![cfg(windows)]

use std::{path::Path, time::Duration};

use procdir::{
    process::{rights::PROCESS_TERMINATE, WaitStatus},
    Error, ProcessDirectory, ProcessSystem, ShowMode, SpawnRequest, Win32System,
};

fn directory() -> ProcessDirectory<Win32System> {
    ProcessDirectory::new(Win32System::new())
}

fn spawn_idle_cmd(dir: &ProcessDirectory<Win32System>) -> procdir::Process<Win32System> {
    dir.start(&SpawnRequest::new("cmd.exe /c ping -n 30 127.0.0.1 >nul").show(ShowMode::Hidden))
        .expect("start cmd.exe")
}

#[test]
fn current_process_matches_std() {
    let dir = directory();
    let current = dir.current();
    assert_eq!(current.id(), std::process::id());

    let exe = std::env::current_exe().expect("current exe");
    let name = current.base_name().expect("base name");
    assert!(name.eq_ignore_ascii_case(&exe.file_name().expect("file name").to_string_lossy()));
    assert!(dir.enumerate_process_ids().expect("ids").contains(&current.id()));
}

#[test]
fn unknown_id_is_none() {
    let dir = directory();
    let unused = (1..)
        .map(|n: u32| u32::MAX - 4 * n)
        .find(|id| !dir.enumerate_process_ids().expect("ids").contains(id))
        .expect("an unused id");
    assert!(dir.open(unused, 0).expect("open").is_none());
}

#[test]
fn parent_of_current_matches_snapshot() {
    let dir = directory();
    let own = dir
        .system()
        .process_snapshot()
        .expect("snapshot")
        .into_iter()
        .find(|e| e.id == std::process::id())
        .expect("own snapshot row");
    let parent = dir
        .resolve_parent(dir.current())
        .expect("parent")
        .expect("test runner's parent is running");
    assert_eq!(parent.id(), own.parent_id);
}

#[test]
fn spawned_child_resolves_back_to_caller() {
    let dir = directory();
    let child = spawn_idle_cmd(&dir);

    assert!(child.base_name().expect("name").eq_ignore_ascii_case("cmd.exe"));
    assert!(child.primary_thread_id().expect("thread").is_some());

    let parent = dir.resolve_parent(&child).expect("parent").expect("caller is running");
    assert_eq!(parent.id(), std::process::id());

    let found = dir
        .find_by_executable(Path::new("cmd.exe"), false, 0)
        .expect("find")
        .expect("a cmd.exe is running");
    assert!(found.base_name().expect("name").eq_ignore_ascii_case("cmd.exe"));

    let owned = dir
        .find_by_executable_owned_by_caller(&child.image_path().expect("path"), false, 0)
        .expect("find")
        .expect("our cmd.exe runs as us");
    assert_eq!(owned.sid().expect("sid"), dir.current().sid().expect("sid"));

    child.terminate(7).expect("terminate");
    assert_eq!(
        child.wait(Some(Duration::from_secs(10))).expect("wait"),
        WaitStatus::Exited
    );
    assert_eq!(child.exit_code().expect("exit code"), 7);
}

#[test]
fn reopened_child_can_be_terminated() {
    let dir = directory();
    let child = spawn_idle_cmd(&dir);
    let reopened = dir
        .open(child.id(), PROCESS_TERMINATE)
        .expect("open")
        .expect("running");
    reopened.terminate(1).expect("terminate");
    assert_eq!(
        child.wait(Some(Duration::from_secs(10))).expect("wait"),
        WaitStatus::Exited
    );
}

#[test]
fn starting_a_missing_program_names_the_command_line() {
    let dir = directory();
    let err = dir
        .start(&SpawnRequest::new("procdir-no-such-program.exe --flag"))
        .unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
    let message = err.to_string();
    assert!(message.contains("procdir-no-such-program.exe"));
    assert!(message.contains("--flag"));
}
