use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use taskdeck_core::task::{NewTask, Task, TaskPriority, TaskStatus};
use taskdeck_store::{StoreError, TaskStore};

fn open_store(temp: &TempDir) -> TaskStore {
    let store = TaskStore::new(temp.path().join("taskdeck.db"));
    store.open().expect("open store");
    store
}

fn draft(summary: &str) -> NewTask {
    NewTask {
        summary: summary.to_string(),
        ..Default::default()
    }
}

fn task(id: i64, summary: &str) -> Task {
    Task::from_draft(id, draft(summary))
}

#[test]
fn fetch_from_unknown_project_yields_empty_list() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    let tasks = store.fetch_all("Never Seen Before").expect("fetch");
    assert!(tasks.is_empty());
}

#[test]
fn ensure_table_is_idempotent_and_preserves_rows() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.ensure_table("Alpha").expect("first ensure");
    store.create("Alpha", draft("keep me")).expect("create");
    store.ensure_table("Alpha").expect("second ensure");
    let tasks = store.fetch_all("Alpha").expect("fetch");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].summary, "keep me");
}

#[test]
fn ids_start_at_zero_and_follow_max_plus_one() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    let first = store.create("Alpha", draft("a")).expect("create");
    let second = store.create("Alpha", draft("b")).expect("create");
    let third = store.create("Alpha", draft("c")).expect("create");
    assert_eq!((first.id, second.id, third.id), (0, 1, 2));

    // Deleting below the max does not free the id for reuse.
    store.delete("Alpha", 1).expect("delete");
    let fourth = store.create("Alpha", draft("d")).expect("create");
    assert_eq!(fourth.id, 3);

    // Deleting the max row lets its id be assigned again.
    store.delete("Alpha", 3).expect("delete");
    let fifth = store.create("Alpha", draft("e")).expect("create");
    assert_eq!(fifth.id, 3);
}

#[test]
fn projects_get_independent_id_sequences() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.create("Alpha", draft("a0")).expect("create");
    store.create("Alpha", draft("a1")).expect("create");
    let beta = store.create("Beta", draft("b0")).expect("create");
    assert_eq!(beta.id, 0);
}

#[test]
fn upsert_inserts_then_overwrites() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    let mut row = task(5, "original");
    store.upsert("Alpha", &row).expect("insert");

    row.summary = "revised".to_string();
    row.status = TaskStatus::Completed;
    row.priority = TaskPriority::High;
    row.highlight = true;
    store.upsert("Alpha", &row).expect("overwrite");

    let tasks = store.fetch_all("Alpha").expect("fetch");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].summary, "revised");
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert!(tasks[0].highlight);
}

#[test]
fn bulk_replace_swaps_the_whole_task_set() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.create("Alpha", draft("old a")).expect("create");
    store.create("Alpha", draft("old b")).expect("create");

    let replacement = vec![task(10, "new a"), task(11, "new b"), task(12, "new c")];
    store.bulk_replace("Alpha", &replacement).expect("replace");

    let tasks = store.fetch_all("Alpha").expect("fetch");
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![10, 11, 12]);
}

#[test]
fn bulk_replace_rolls_back_on_duplicate_ids() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.create("Alpha", draft("survivor")).expect("create");

    let bad = vec![task(4, "first"), task(4, "duplicate id")];
    let err = store.bulk_replace("Alpha", &bad).expect_err("must fail");
    assert!(matches!(err, StoreError::Sql(_)));

    // The failed batch must not have deleted anything.
    let tasks = store.fetch_all("Alpha").expect("fetch");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].summary, "survivor");
}

#[test]
fn delete_of_absent_id_is_a_no_op() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.create("Alpha", draft("stays")).expect("create");
    store.delete("Alpha", 999).expect("delete absent");
    assert_eq!(store.fetch_all("Alpha").expect("fetch").len(), 1);
}

#[test]
fn data_survives_close_and_reopen() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.create("Alpha", draft("persistent")).expect("create");
    store.upsert_project_name("Alpha").expect("register");
    store.close();

    let reopened = TaskStore::new(temp.path().join("taskdeck.db"));
    reopened.open().expect("reopen");
    let tasks = reopened.fetch_all("Alpha").expect("fetch");
    assert_eq!(tasks.len(), 1);
    assert_eq!(reopened.list_projects(false).expect("list"), vec!["Alpha"]);
}

#[test]
fn registry_keeps_first_seen_casing() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    assert_eq!(store.upsert_project_name("My Project").expect("first"), "My Project");
    assert_eq!(store.upsert_project_name("MY PROJECT").expect("second"), "My Project");
    assert_eq!(store.upsert_project_name("my project").expect("third"), "My Project");

    assert_eq!(store.list_projects(false).expect("list"), vec!["My Project"]);
    assert_eq!(store.list_projects(true).expect("lower"), vec!["my project"]);
}

#[test]
fn rename_updates_casing_for_same_project() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.upsert_project_name("alpha").expect("register");
    store.create("alpha", draft("kept")).expect("create");

    let stored = store.rename_project("alpha", "ALPHA").expect("rename");
    assert_eq!(stored, "ALPHA");
    assert_eq!(store.list_projects(false).expect("list"), vec!["ALPHA"]);
    // Same sanitized table, so the task is still there.
    assert_eq!(store.fetch_all("ALPHA").expect("fetch").len(), 1);
}

#[test]
fn rename_moves_tasks_and_tags_to_new_identity() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.upsert_project_name("Alpha").expect("register");
    store.create("Alpha", draft("migrated")).expect("create");
    store
        .add_tags("Alpha", &["infra".to_string(), "urgent".to_string()])
        .expect("tags");

    store.rename_project("Alpha", "Beta Release").expect("rename");

    assert_eq!(store.list_projects(false).expect("list"), vec!["Beta Release"]);
    let tasks = store.fetch_all("Beta Release").expect("fetch new");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].summary, "migrated");
    assert!(store.fetch_all("Alpha").expect("fetch old").is_empty());
    assert_eq!(
        store.tags_for_project("Beta Release").expect("tags"),
        vec!["infra", "urgent"]
    );
    assert!(store.tags_for_project("Alpha").expect("old tags").is_empty());
}

#[test]
fn rename_of_unknown_project_fails() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    let err = store.rename_project("Ghost", "Anything").expect_err("must fail");
    assert!(matches!(err, StoreError::UnknownProject(_)));
}

#[test]
fn rename_onto_existing_project_fails_without_mutation() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.upsert_project_name("Alpha").expect("register");
    store.upsert_project_name("Beta").expect("register");
    store.create("Alpha", draft("untouched")).expect("create");

    let err = store.rename_project("Alpha", "beta").expect_err("must fail");
    assert!(matches!(err, StoreError::NameConflict(_)));

    let mut names = store.list_projects(false).expect("list");
    names.sort();
    assert_eq!(names, vec!["Alpha", "Beta"]);
    assert_eq!(store.fetch_all("Alpha").expect("fetch").len(), 1);
}

#[test]
fn tags_keep_insertion_order_and_drop_duplicates() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    let tags = store
        .add_tags(
            "Alpha",
            &[
                "backend".to_string(),
                "urgent".to_string(),
                "backend".to_string(),
                "  ".to_string(),
            ],
        )
        .expect("add");
    assert_eq!(tags, vec!["backend", "urgent"]);

    // Tag values are case-sensitive even though the project key is not.
    let tags = store
        .add_tags("ALPHA", &["Backend".to_string()])
        .expect("add cased");
    assert_eq!(tags, vec!["backend", "urgent", "Backend"]);

    let tags = store.remove_tag("alpha", "urgent").expect("remove");
    assert_eq!(tags, vec!["backend", "Backend"]);

    // Removal of an unknown tag leaves the list alone.
    let tags = store.remove_tag("alpha", "missing").expect("remove absent");
    assert_eq!(tags, vec!["backend", "Backend"]);
}

#[test]
fn tags_by_project_groups_under_lowercase_keys() {
    let temp = TempDir::new().expect("tempdir");
    let store = open_store(&temp);
    store.add_tags("Alpha", &["a1".to_string()]).expect("add");
    store
        .add_tags("Beta", &["b1".to_string(), "b2".to_string()])
        .expect("add");

    let grouped = store.tags_by_project().expect("group");
    assert_eq!(
        grouped,
        vec![
            ("alpha".to_string(), vec!["a1".to_string()]),
            ("beta".to_string(), vec!["b1".to_string(), "b2".to_string()]),
        ]
    );
}

#[test]
fn concurrent_creates_assign_distinct_ids() {
    let temp = TempDir::new().expect("tempdir");
    let store = Arc::new(open_store(&temp));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut ids = Vec::new();
            for round in 0..5 {
                let created = store
                    .create("Shared", draft(&format!("w{worker} r{round}")))
                    .expect("create");
                ids.push(created.id);
            }
            ids
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().expect("worker"));
    }
    all_ids.sort_unstable();
    let expected: Vec<i64> = (0..40).collect();
    assert_eq!(all_ids, expected);
}
