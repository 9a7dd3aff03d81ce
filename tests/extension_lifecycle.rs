use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use terminal_command_keys::config::Config;
use terminal_command_keys::host::memory::{HostCall, MemoryHost};
use terminal_command_keys::host::EditorContext;
use terminal_command_keys::{AppError, Extension, COMMAND_RUN};

fn activate(dir: &tempfile::TempDir) -> (Arc<MemoryHost>, Extension) {
    let config = Config {
        diagnostic_log_file: dir.path().join("diagnostic.log"),
        ..Config::default()
    };
    let host = Arc::new(MemoryHost::new());
    host.set_active_editor(Some(EditorContext {
        file: "/work/src/main.rs".into(),
        line: 41,
    }));
    host.set_workspace_folders(vec!["/work".into()]);
    let extension = Extension::activate(host.clone(), host.clone(), &config);
    (host, extension)
}

/// Polls until the close listener has caught up with `condition`.
async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn user_closed_terminal_is_recreated_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);

    let first = extension
        .execute_command(COMMAND_RUN, Some(json!({"cmd": "cargo run"})))
        .await
        .unwrap()
        .unwrap();
    assert!(host.close_by_user(first.id()));
    eventually(|| extension.registry().is_empty()).await;

    let second = extension
        .execute_command(COMMAND_RUN, Some(json!({"cmd": "cargo run"})))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(host.created_count(), 2);
}

#[tokio::test]
async fn new_terminal_survives_the_old_terminals_close_echo() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);

    let old = extension
        .execute_command(COMMAND_RUN, Some(json!({"cmd": "ls"})))
        .await
        .unwrap()
        .unwrap();
    let new = extension
        .execute_command(COMMAND_RUN, Some(json!({"cmd": "ls", "newTerminal": true})))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(old.id(), new.id());
    assert!(old.is_disposed_by_owner());

    // Give the listener time to process the echo of the old terminal.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let current = extension.registry().get("terminal-command-keys").unwrap();
    assert_eq!(current.id(), new.id());
    assert_eq!(extension.registry().len(), 1);
    assert_eq!(host.live_terminals().len(), 1);
}

#[tokio::test]
async fn close_during_save_is_observed_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);
    let extension = Arc::new(extension);

    let first = extension
        .execute_command(COMMAND_RUN, Some(json!({"cmd": "make", "saveAllFiles": false})))
        .await
        .unwrap()
        .unwrap();

    host.hold_save();
    let pending = {
        let extension = extension.clone();
        tokio::spawn(async move {
            extension
                .execute_command(COMMAND_RUN, Some(json!({"cmd": "make test"})))
                .await
        })
    };
    host.save_started().await;

    // The user closes the terminal while the invocation is suspended in save-all.
    host.close_by_user(first.id());
    eventually(|| extension.registry().is_empty()).await;
    host.release_save();

    let second = pending.await.unwrap().unwrap().unwrap();
    assert_ne!(second.id(), first.id());
    assert_eq!(host.sent_texts(), vec!["make".to_string(), "make test".to_string()]);
    assert_eq!(extension.registry().len(), 1);
}

#[tokio::test]
async fn at_most_one_terminal_per_name_across_interleavings() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);
    let names = ["a", "b", "a", "c", "a", "b"];

    for (i, name) in names.iter().enumerate() {
        let handle = extension
            .execute_command(
                COMMAND_RUN,
                Some(json!({"cmd": "true", "terminalName": name, "newTerminal": i % 2 == 0})),
            )
            .await
            .unwrap()
            .unwrap();
        if i == 3 {
            host.close_by_user(handle.id());
        }
        let registry = extension.registry();
        let tracked = registry.sessions();
        let mut seen: Vec<&str> = tracked.iter().map(|s| s.name()).collect();
        seen.dedup();
        assert_eq!(seen.len(), tracked.len());
        assert!(tracked.iter().all(|s| !s.is_disposed_by_owner()));
    }

    eventually(|| extension.registry().get("c").is_none()).await;
    assert_eq!(extension.registry().names(), vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn deactivate_disposes_each_terminal_once() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);
    let mut ids = Vec::new();
    for name in ["build", "tests", "docs"] {
        let handle = extension
            .execute_command(COMMAND_RUN, Some(json!({"cmd": "true", "terminalName": name})))
            .await
            .unwrap()
            .unwrap();
        ids.push(handle.id());
    }

    assert_eq!(extension.deactivate(), 3);
    let calls = host.calls();
    for id in ids {
        assert_eq!(calls.iter().filter(|c| **c == HostCall::Dispose(id)).count(), 1);
    }
    assert!(host.live_terminals().is_empty());
}

#[tokio::test]
async fn unknown_command_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);
    let err = extension
        .execute_command("terminalCommandKeys.other", Some(json!({"cmd": "ls"})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnknownCommand(_)));
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn template_uses_first_workspace_folder() {
    let dir = tempfile::tempdir().unwrap();
    let (host, extension) = activate(&dir);
    host.set_workspace_folders(vec!["/work".into(), "/other".into()]);
    extension
        .execute_command(
            COMMAND_RUN,
            Some(json!({"cmd": "cd ${workspaceRoot} && vim ${relativeFile} +${line}"})),
        )
        .await
        .unwrap();
    assert_eq!(host.sent_texts(), vec!["cd /work && vim ./src/main.rs +42".to_string()]);
}
