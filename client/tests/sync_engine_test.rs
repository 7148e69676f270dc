mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use common::{FakeRemote, engine, local_service, remote_todo};
use todo_client::store::JsonFileStore;
use todo_client::{
    ClientError, ConflictPolicy, LocalTodo, LocalTodoService, Priority, SyncOutcome, TodoRecord,
};

/// A local edit of server todo `server_id` that has not been uploaded yet.
fn pending_edit(server_id: &str, title: &str, modified: chrono::DateTime<Utc>) -> LocalTodo {
    let mut record = TodoRecord::new(title, Priority::Medium, None);
    record.server_id = Some(server_id.to_string());
    record.last_modified = Some(modified);
    LocalTodo::Active(record)
}

#[tokio::test]
async fn new_local_todo_needs_sync() {
    let local = local_service();
    local
        .create("Buy milk", Priority::Medium, None)
        .await
        .expect("Failed to create todo");

    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].needs_sync());
    assert!(entries[0].is_local());
}

#[tokio::test]
async fn sync_uploads_local_todo_to_empty_server() {
    let local = local_service();
    let remote = FakeRemote::new();
    local
        .create("Buy milk", Priority::Medium, None)
        .await
        .expect("Failed to create todo");

    let report = engine(&local, &remote, ConflictPolicy::default())
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.local_changes_uploaded, 1);
    assert_eq!(report.server_changes_downloaded, 0);
    assert_eq!(report.outcome, SyncOutcome::Success);

    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_synced());
    let server_id = entries[0].server_id().expect("missing server id");
    assert_eq!(remote.find(server_id).expect("not on server").title, "Buy milk");
}

#[tokio::test]
async fn sync_downloads_server_only_todo() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "From the web", Utc::now())]);

    let report = engine(&local, &remote, ConflictPolicy::default())
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.server_changes_downloaded, 1);
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].server_id(), Some("42"));
    assert!(entries[0].is_synced());
    assert_eq!(entries[0].record().title, "From the web");
}

#[tokio::test]
async fn merge_latest_keeps_newer_local_edit() {
    let now = Utc::now();
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "server title", now)]);
    // The upload fails, so the pending edit meets the server copy as a conflict.
    remote.fail_for("42");
    local
        .replace(vec![pending_edit("42", "local title", now + Duration::minutes(1))])
        .await
        .expect("Failed to seed");

    let report = engine(&local, &remote, ConflictPolicy::MergeLatest)
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.local_changes_uploaded, 0);
    assert_eq!(report.conflicts_resolved, 1);
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries[0].record().title, "local title");
    assert!(entries[0].is_synced());
}

#[tokio::test]
async fn merge_latest_tie_goes_to_server() {
    let now = Utc::now();
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "server title", now)]);
    remote.fail_for("42");
    local
        .replace(vec![pending_edit("42", "local title", now)])
        .await
        .expect("Failed to seed");

    let report = engine(&local, &remote, ConflictPolicy::MergeLatest)
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.conflicts_resolved, 1);
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries[0].record().title, "server title");
    assert!(entries[0].is_synced());
}

#[tokio::test]
async fn remote_wins_and_local_wins_policies() {
    let now = Utc::now();

    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "server title", now)]);
    remote.fail_for("42");
    local
        .replace(vec![pending_edit("42", "local title", now + Duration::hours(1))])
        .await
        .expect("Failed to seed");
    engine(&local, &remote, ConflictPolicy::RemoteWins)
        .sync()
        .await
        .expect("Sync failed");
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries[0].record().title, "server title");

    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "server title", now)]);
    remote.fail_for("42");
    local
        .replace(vec![pending_edit("42", "local title", now - Duration::hours(1))])
        .await
        .expect("Failed to seed");
    engine(&local, &remote, ConflictPolicy::LocalWins)
        .sync()
        .await
        .expect("Sync failed");
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries[0].record().title, "local title");
    assert!(entries[0].is_synced());
}

#[tokio::test]
async fn manual_policy_reports_conflict() {
    let now = Utc::now();
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "server title", now)]);
    remote.fail_for("42");
    local
        .replace(vec![pending_edit("42", "local title", now)])
        .await
        .expect("Failed to seed");

    let report = engine(&local, &remote, ConflictPolicy::Manual)
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.conflicts_resolved, 0);
    assert_eq!(report.unresolved_conflicts.len(), 1);
    assert_eq!(report.unresolved_conflicts[0].remote.title, "server title");
    let entries = local.entries().await.expect("Failed to load");
    assert!(entries[0].needs_sync());
}

#[tokio::test]
async fn second_sync_has_no_changes() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("7", "existing", Utc::now())]);
    local
        .create("Buy milk", Priority::High, None)
        .await
        .expect("Failed to create todo");
    let engine = engine(&local, &remote, ConflictPolicy::default());

    let first = engine.sync().await.expect("Sync failed");
    assert_eq!(first.outcome, SyncOutcome::Success);

    let second = engine.sync().await.expect("Sync failed");
    assert_eq!(second.outcome, SyncOutcome::NoChanges);
    assert_eq!(second.local_changes_uploaded, 0);
    assert_eq!(second.server_changes_downloaded, 0);
    assert_eq!(remote.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_sync_is_no_changes() {
    let local = local_service();
    let remote = FakeRemote::new();

    let report = engine(&local, &remote, ConflictPolicy::default())
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.outcome, SyncOutcome::NoChanges);
    assert!(local.entries().await.expect("Failed to load").is_empty());
}

#[tokio::test]
async fn failed_upload_does_not_stop_the_pass() {
    let local = local_service();
    let remote = FakeRemote::new();
    remote.fail_for("flaky");
    local.create("flaky", Priority::Low, None).await.expect("Failed to create");
    local.create("steady", Priority::Low, None).await.expect("Failed to create");

    let report = engine(&local, &remote, ConflictPolicy::default())
        .sync()
        .await
        .expect("Sync failed");

    assert_eq!(report.local_changes_uploaded, 1);
    assert_eq!(remote.todos().len(), 1);
    let flaky = local
        .list()
        .await
        .expect("Failed to list")
        .into_iter()
        .find(|t| t.title == "flaky")
        .expect("flaky todo missing");
    assert!(flaky.is_local());
    assert!(!flaky.is_synced);
}

#[tokio::test]
async fn list_failure_fails_but_keeps_uploads() {
    let local = local_service();
    let remote = FakeRemote::new();
    remote.set_fail_list(true);
    local.create("Buy milk", Priority::Medium, None).await.expect("Failed to create");

    let report = engine(&local, &remote, ConflictPolicy::default())
        .sync()
        .await
        .expect("Sync failed");

    assert!(matches!(report.outcome, SyncOutcome::Failed(_)));
    assert!(!report.is_success());
    assert_eq!(report.local_changes_uploaded, 1);
    let entries = local.entries().await.expect("Failed to load");
    assert!(entries[0].is_synced());
    assert!(entries[0].server_id().is_some());
}

#[tokio::test]
async fn newer_server_edit_reaches_synced_todo() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "old", Utc::now())]);
    let engine = engine(&local, &remote, ConflictPolicy::default());
    engine.sync().await.expect("Sync failed");

    remote.edit("42", "renamed elsewhere", Utc::now() + Duration::seconds(5));
    let report = engine.sync().await.expect("Sync failed");

    assert_eq!(report.server_changes_downloaded, 1);
    let todos = local.list().await.expect("Failed to list");
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].title, "renamed elsewhere");
}

#[tokio::test]
async fn deleted_todo_is_removed_remotely_then_purged() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "done", Utc::now())]);
    let engine = engine(&local, &remote, ConflictPolicy::default());
    engine.sync().await.expect("Sync failed");

    let id = local.list().await.expect("Failed to list")[0].id;
    local.delete(id).await.expect("Failed to delete");
    let entries = local.entries().await.expect("Failed to load");
    assert!(entries[0].is_deleted());

    let report = engine.sync().await.expect("Sync failed");
    assert_eq!(report.local_changes_uploaded, 1);
    assert!(remote.todos().is_empty());
    assert!(local.entries().await.expect("Failed to load").is_empty());
}

#[tokio::test]
async fn confirmed_tombstone_is_purged_by_a_pass_with_nothing_to_do() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "done", Utc::now())]);
    let engine = engine(&local, &remote, ConflictPolicy::default());
    engine.sync().await.expect("Sync failed");

    let id = local.list().await.expect("Failed to list")[0].id;
    local.delete(id).await.expect("Failed to delete");

    // The delete lands but the download step fails, so cleanup never runs.
    remote.set_fail_list(true);
    let report = engine.sync().await.expect("Sync failed");
    assert!(matches!(report.outcome, SyncOutcome::Failed(_)));
    assert!(remote.todos().is_empty());
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_purgeable());

    remote.set_fail_list(false);
    let report = engine.sync().await.expect("Sync failed");
    assert_eq!(report.outcome, SyncOutcome::NoChanges);
    assert!(local.entries().await.expect("Failed to load").is_empty());
}

#[tokio::test]
async fn failed_delete_keeps_tombstone() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("42", "done", Utc::now())]);
    let engine = engine(&local, &remote, ConflictPolicy::default());
    engine.sync().await.expect("Sync failed");

    let id = local.list().await.expect("Failed to list")[0].id;
    local.delete(id).await.expect("Failed to delete");
    remote.fail_for("42");

    let report = engine.sync().await.expect("Sync failed");
    assert_eq!(report.local_changes_uploaded, 0);
    let entries = local.entries().await.expect("Failed to load");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_deleted());
    assert!(entries[0].has_pending_changes());
    assert!(local.list().await.expect("Failed to list").is_empty());
}

#[tokio::test]
async fn full_download_replaces_local_list() {
    let now = Utc::now();
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![
        remote_todo("1", "one", now),
        remote_todo("2", "two", now),
    ]);
    local.create("local only", Priority::Low, None).await.expect("Failed to create");

    let report = engine(&local, &remote, ConflictPolicy::default())
        .full_download()
        .await
        .expect("Download failed");

    assert_eq!(report.server_changes_downloaded, 2);
    let todos = local.list().await.expect("Failed to list");
    assert_eq!(todos.len(), 2);
    assert!(todos.iter().all(|t| t.is_synced && t.has_server_version()));
}

#[tokio::test]
async fn full_upload_pushes_every_todo() {
    let local = local_service();
    let remote = FakeRemote::with_todos(vec![remote_todo("1", "one", Utc::now())]);
    let engine = engine(&local, &remote, ConflictPolicy::default());
    engine.sync().await.expect("Sync failed");
    local.create("two", Priority::High, None).await.expect("Failed to create");

    let report = engine.full_upload().await.expect("Upload failed");

    assert_eq!(report.local_changes_uploaded, 2);
    assert_eq!(remote.updates.load(Ordering::SeqCst), 1);
    assert_eq!(remote.creates.load(Ordering::SeqCst), 1);
    assert_eq!(remote.todos().len(), 2);
    assert_eq!(local.pending_count().await.expect("Failed to count"), 0);
}

#[tokio::test]
async fn storage_failure_is_an_error() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    // A directory cannot be read as a file.
    let local = Arc::new(LocalTodoService::new(Arc::new(JsonFileStore::new(dir.path()))));
    let remote = FakeRemote::new();

    let result = engine(&local, &remote, ConflictPolicy::default()).sync().await;
    assert!(matches!(result, Err(ClientError::Storage(_))));
}
