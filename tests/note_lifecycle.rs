use amognotes::{
    lifecycle::sweep_at, project, CategoryRegistry, ExpiryPolicy, Filter, LoadOutcome, NoteFields,
    NoteStore, RemovalReason, DEFAULT_CATEGORY,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 8, 30, 0).unwrap()
}

fn temp_store() -> (TempDir, NoteStore) {
    let dir = TempDir::new().unwrap();
    let store = NoteStore::new(dir.path().join("notes.json"));
    (dir, store)
}

fn create(store: &mut NoteStore, fields: NoteFields, at: DateTime<Utc>) -> String {
    store.upsert_at(None, fields, at).unwrap().unwrap()
}

#[test]
fn temporary_note_expires_after_retention_window() {
    let (_dir, mut store) = temp_store();
    let id = create(
        &mut store,
        NoteFields::new("shopping", "milk").temporary(true),
        now() - Duration::days(31),
    );

    let report = sweep_at(&mut store, &ExpiryPolicy::default(), now()).unwrap();
    assert_eq!(report.removed, vec![(id.clone(), RemovalReason::TemporaryExpired)]);

    let (reloaded, outcome) = NoteStore::open(store.path()).unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { notes: 0, unreadable: 0 });
    assert!(!reloaded.contains(&id));
}

#[test]
fn recycle_bin_keeps_notes_for_the_retention_window() {
    let (_dir, mut store) = temp_store();
    let deleted_on = now();
    let id = create(&mut store, NoteFields::new("old idea", ""), deleted_on - Duration::days(3));
    store.soft_delete_at(&id, deleted_on).unwrap();

    let policy = ExpiryPolicy::default();
    sweep_at(&mut store, &policy, deleted_on + Duration::days(29)).unwrap();
    let note = store.get(&id).unwrap();
    assert!(note.deleted);
    assert_eq!(note.deleted_at, Some(deleted_on));

    sweep_at(&mut store, &policy, deleted_on + Duration::days(31)).unwrap();
    assert!(!store.contains(&id));
}

#[test]
fn renaming_a_category_moves_every_member() {
    let (_dir, mut store) = temp_store();
    let ids: Vec<String> = (0..3)
        .map(|i| create(&mut store, NoteFields::new(format!("w{}", i), "").category("Work"), now()))
        .collect();
    create(&mut store, NoteFields::new("home", "").category("Home"), now());

    let mut registry = CategoryRegistry::from_store(&store);
    assert_eq!(registry.rename(&mut store, "Work", "Projects").unwrap(), 3);

    for id in &ids {
        assert_eq!(store.get(id).unwrap().category, "Projects");
    }
    assert!(registry.contains("Projects"));
    assert!(!registry.contains("Work"));

    let (reloaded, _) = NoteStore::open(store.path()).unwrap();
    assert_eq!(
        project(reloaded.notes(), &Filter::Category("Projects".into())).len(),
        3
    );
}

#[test]
fn deleting_a_category_keeps_its_notes() {
    let (_dir, mut store) = temp_store();
    let a = create(&mut store, NoteFields::new("a", "").category("Work"), now());
    let b = create(&mut store, NoteFields::new("b", "").category("Work"), now());

    let mut registry = CategoryRegistry::from_store(&store);
    registry.delete(&mut store, "Work").unwrap();

    assert_eq!(store.get(&a).unwrap().category, DEFAULT_CATEGORY);
    assert_eq!(store.get(&b).unwrap().category, DEFAULT_CATEGORY);
    assert!(registry.names().is_empty());
}

#[test]
fn blank_note_is_never_created() {
    let (_dir, mut store) = temp_store();
    assert_eq!(store.upsert(None, NoteFields::new("", "")).unwrap(), None);
    assert!(store.is_empty());
    assert!(!store.path().exists());
}

#[test]
fn favorite_toggle_is_reversible_and_keeps_updated_at() {
    let (_dir, mut store) = temp_store();
    let id = create(&mut store, NoteFields::new("fav", ""), now());
    let before = store.get(&id).unwrap().clone();

    assert!(store.toggle_favorite(&id).unwrap());
    assert!(store.get(&id).unwrap().favorite);
    assert!(store.toggle_favorite(&id).unwrap());

    let after = store.get(&id).unwrap();
    assert_eq!(after.favorite, before.favorite);
    assert_eq!(after.updated_at, before.updated_at);
}

#[test]
fn documents_written_by_older_versions_still_load() {
    let (_dir, mut store) = temp_store();
    let legacy = json!({
        "20250101093000123456": {
            "title": "legacy",
            "content": "from the desktop app",
            "created_at": "2025-01-01T09:30:00.123456",
            "updated_at": "2025-01-02T10:00:00",
            "category": null,
            "favorite": true
        },
        "20250103120000000000": {
            "title": "binned",
            "content": "",
            "created_at": "2025-01-03T12:00:00",
            "updated_at": "2025-01-03T12:00:00",
            "deleted": true
        },
        "20250104120000000000": "garbage"
    });
    fs::write(store.path(), legacy.to_string()).unwrap();

    let outcome = store.load().unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { notes: 2, unreadable: 1 });

    let legacy_note = store.get("20250101093000123456").unwrap();
    assert_eq!(legacy_note.category, DEFAULT_CATEGORY);
    assert!(legacy_note.favorite);
    assert!(!legacy_note.temporary);

    // deleted notes always carry a deletion date after load
    assert!(store.get("20250103120000000000").unwrap().deleted_at.is_some());

    let report = sweep_at(&mut store, &ExpiryPolicy::default(), Utc::now()).unwrap();
    assert_eq!(
        report.removed,
        vec![("20250104120000000000".to_string(), RemovalReason::Corrupted)]
    );

    let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert!(raw.get("20250104120000000000").is_none());
    assert_eq!(raw["20250101093000123456"]["category"], DEFAULT_CATEGORY);
}

#[test]
fn unparseable_document_recovers_to_empty_store() {
    let (_dir, mut store) = temp_store();
    fs::write(store.path(), "{ this is not json").unwrap();

    let outcome = store.load().unwrap();
    assert!(matches!(outcome, LoadOutcome::Recovered { .. }));
    assert!(store.is_empty());

    let id = create(&mut store, NoteFields::new("fresh start", ""), now());
    let (reloaded, _) = NoteStore::open(store.path()).unwrap();
    assert!(reloaded.contains(&id));
}

#[test]
fn views_partition_notes_and_sort_by_recency() {
    let (_dir, mut store) = temp_store();
    let older = create(&mut store, NoteFields::new("older", ""), now() - Duration::hours(2));
    let newer = create(&mut store, NoteFields::new("newer", ""), now() - Duration::hours(1));
    let temp = create(&mut store, NoteFields::new("temp", "").temporary(true), now());
    let binned = create(&mut store, NoteFields::new("binned", ""), now());
    store.soft_delete(&binned).unwrap();

    let ids = |filter: &Filter| -> Vec<String> {
        store.view(filter).into_iter().map(|n| n.id.clone()).collect()
    };

    assert_eq!(ids(&Filter::All), vec![temp.clone(), newer, older]);
    assert_eq!(ids(&Filter::Temporary), vec![temp]);
    assert_eq!(ids(&Filter::RecycleBin), vec![binned]);
    assert!(ids(&Filter::Favorites).is_empty());
}
