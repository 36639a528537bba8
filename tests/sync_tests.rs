//! End-to-end reconciliation tests
//!
//! Each test drives a full run (scan, index, classify, apply, report)
//! through the public `Syncer` facade against a real source tree and a
//! real store backend.

use refsync::{
    DefinitionStore, DiffSink, FileStore, IGNORE_FILE_NAME, InvalidEntryPolicy,
    LogicalKey, MemorySink, ScopeSelector, SyncDecision, SyncOutcome, SyncState,
    Syncer, TargetStore,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn states(outcome: &SyncOutcome) -> Vec<(String, SyncState)> {
    outcome
        .decisions
        .iter()
        .map(|d| (d.unit_key().to_string(), d.state))
        .collect()
}

/// Sink shared with the test body after the syncer takes ownership
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<String>>>);

impl DiffSink for SharedSink {
    fn emit(&mut self, decision: &SyncDecision) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{} {}", decision.state.prefix(), decision.unit_key()));
    }
}

#[test]
fn single_new_file_is_added() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "a.txt", "x");

    let selector = ScopeSelector::builder(source.path(), "proj").build();
    let mut syncer = Syncer::new(FileStore::open(target.path()).unwrap());
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(states(&outcome), vec![("a.txt".to_string(), SyncState::Added)]);
    assert_eq!(syncer.store().get("proj", "a.txt").unwrap(), b"x");
}

#[test]
fn single_new_definition_lands_at_revision_one() {
    let source = TempDir::new().unwrap();
    write(source.path(), "a.yml", "id: a\nvalue: x\n");

    let selector = ScopeSelector::builder(source.path(), "ns").build();
    let mut syncer = Syncer::new(DefinitionStore::new());
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(states(&outcome), vec![("a".to_string(), SyncState::Added)]);
    assert_eq!(outcome.decisions[0].revision, Some(1));
    assert_eq!(
        syncer.store().revision_of(&LogicalKey::new("ns", "a")),
        Some(1)
    );
}

#[test]
fn changed_file_is_overwritten_in_a_path_store() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "a.txt", "x");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "a.txt", b"y").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj").build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![("a.txt".to_string(), SyncState::Overwritten)]
    );
    assert_eq!(syncer.store().get("proj", "a.txt").unwrap(), b"x");
}

#[test]
fn changed_definition_is_updated_with_a_revision_bump() {
    let source = TempDir::new().unwrap();
    write(source.path(), "a.yml", "id: a\nvalue: new\n");

    let mut store = DefinitionStore::new();
    store.put("ns", "a", b"id: a\nvalue: old\n").unwrap();

    let selector = ScopeSelector::builder(source.path(), "ns").build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(states(&outcome), vec![("a".to_string(), SyncState::Updated)]);
    assert_eq!(outcome.decisions[0].revision, Some(2));
    assert_eq!(
        syncer.store().revision_of(&LogicalKey::new("ns", "a")),
        Some(2)
    );
}

#[test]
fn stale_entry_is_reported_but_kept_without_delete() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "b.txt", b"old").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj").build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![("b.txt".to_string(), SyncState::Deleted)]
    );
    assert_eq!(outcome.summary.deletions_suppressed, 1);
    assert!(syncer.store().exists("proj", "b.txt").unwrap());
}

#[test]
fn stale_entry_is_removed_with_delete_enabled() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "b.txt", b"old").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj")
        .delete_enabled(true)
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(outcome.summary.applied, 1);
    assert!(!syncer.store().exists("proj", "b.txt").unwrap());
}

#[test]
fn file_replaced_by_directory_with_delete_enabled() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "d/f.txt", "content");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "d", b"used to be a file").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj")
        .delete_enabled(true)
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![
            ("d".to_string(), SyncState::Deleted),
            ("d".to_string(), SyncState::Added),
            ("d/f.txt".to_string(), SyncState::Added),
        ]
    );
    let store = syncer.store();
    assert_eq!(store.get("proj", "d/f.txt").unwrap(), b"content");
}

#[test]
fn file_directory_clash_is_a_warning_without_delete() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "d/f.txt", "content");
    // Sorts between "d" and "d/f.txt", splitting the clash subtree in the
    // merged key order.
    write(source.path(), "d.txt", "sibling");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "d", b"used to be a file").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj").build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    let clash = outcome
        .decisions
        .iter()
        .find(|d| d.unit_key() == "d" && d.state == SyncState::Unchanged)
        .expect("clash decision");
    assert!(clash.warning.is_some());
    assert_eq!(outcome.summary.warnings, 1);
    // Nothing under the blocked directory is decided or written.
    assert!(outcome.decisions.iter().all(|d| d.unit_key() != "d/f.txt"));
    // The old file survives untouched and the sibling still lands.
    let store = syncer.store();
    assert_eq!(store.get("proj", "d").unwrap(), b"used to be a file");
    assert_eq!(store.get("proj", "d.txt").unwrap(), b"sibling");
}

#[test]
fn ignored_entries_never_added_and_never_deleted() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), IGNORE_FILE_NAME, "secret.txt\n");
    write(source.path(), "secret.txt", "hidden");
    write(source.path(), "keep.txt", "visible");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "secret.txt", b"already there").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj")
        .delete_enabled(true)
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![("keep.txt".to_string(), SyncState::Added)]
    );
    assert!(syncer.store().exists("proj", "secret.txt").unwrap());
}

#[test]
fn dry_run_reports_everything_and_mutates_nothing() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "new.txt", "n");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "stale.txt", b"old").unwrap();
    store.put("proj", "changed.txt", b"before").unwrap();
    write(source.path(), "changed.txt", "after");

    let selector = ScopeSelector::builder(source.path(), "proj")
        .dry_run(true)
        .delete_enabled(true)
        .build();
    let sink = SharedSink::default();
    let mut syncer = Syncer::new(store).with_sink(sink.clone());
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(outcome.summary.applied, 0);
    assert!(!syncer.store().exists("proj", "new.txt").unwrap());
    assert_eq!(syncer.store().get("proj", "changed.txt").unwrap(), b"before");
    assert!(syncer.store().exists("proj", "stale.txt").unwrap());

    let lines = sink.0.lock().unwrap();
    assert_eq!(
        *lines,
        vec!["~ changed.txt", "+ new.txt", "- stale.txt"]
    );
}

#[test]
fn self_key_survives_full_deletion_run() {
    let source = TempDir::new().unwrap();

    let mut store = DefinitionStore::new();
    store.put("ns", "driver", b"id: driver\n").unwrap();
    store.put("ns", "other", b"id: other\n").unwrap();

    let selector = ScopeSelector::builder(source.path(), "ns")
        .delete_enabled(true)
        .self_key(LogicalKey::new("ns", "driver"))
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![("other".to_string(), SyncState::Deleted)]
    );
    assert_eq!(
        syncer.store().revision_of(&LogicalKey::new("ns", "driver")),
        Some(1)
    );
    assert_eq!(syncer.store().revision_of(&LogicalKey::new("ns", "other")), None);
}

#[test]
fn name_patterns_bound_both_sides_of_the_run() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "flow.yaml", "f");
    write(source.path(), "notes.md", "n");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("proj", "stale.yaml", b"s").unwrap();
    store.put("proj", "precious.bin", b"p").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj")
        .delete_enabled(true)
        .name_patterns(vec!["*.yaml".to_string()])
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(
        states(&outcome),
        vec![
            ("flow.yaml".to_string(), SyncState::Added),
            ("stale.yaml".to_string(), SyncState::Deleted),
        ]
    );
    let store = syncer.store();
    assert!(!store.exists("proj", "notes.md").unwrap());
    assert!(store.exists("proj", "precious.bin").unwrap());
}

#[test]
fn scope_containment_leaves_sibling_scopes_alone() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "a.txt", "a");

    let mut store = FileStore::open(target.path()).unwrap();
    store.put("other-scope", "b.txt", b"b").unwrap();

    let selector = ScopeSelector::builder(source.path(), "proj")
        .delete_enabled(true)
        .build();
    let mut syncer = Syncer::new(store);
    let outcome = syncer.run(&selector).unwrap();

    assert_eq!(states(&outcome), vec![("a.txt".to_string(), SyncState::Added)]);
    assert!(syncer.store().exists("other-scope", "b.txt").unwrap());
}

#[test]
fn namespaced_definitions_map_directories_to_sub_namespaces() {
    let source = TempDir::new().unwrap();
    write(source.path(), "team/flow.yml", "id: flow\n");
    write(source.path(), "solo.yml", "id: solo\n");

    let selector = ScopeSelector::builder(source.path(), "prod").build();
    let mut syncer = Syncer::new(DefinitionStore::new());
    syncer.run(&selector).unwrap();

    let store = syncer.store();
    assert_eq!(store.revision_of(&LogicalKey::new("prod", "solo")), Some(1));
    assert_eq!(
        store.revision_of(&LogicalKey::new("prod.team", "flow")),
        Some(1)
    );
}

#[test]
fn declared_namespace_mismatch_respects_policy() {
    let source = TempDir::new().unwrap();
    write(
        source.path(),
        "team/flow.yml",
        "id: flow\nnamespace: elsewhere\n",
    );

    let selector = ScopeSelector::builder(source.path(), "prod").build();
    let mut syncer = Syncer::new(DefinitionStore::new());
    assert!(syncer.run(&selector).is_err());

    let skip = ScopeSelector::builder(source.path(), "prod")
        .on_invalid(InvalidEntryPolicy::Skip)
        .build();
    let mut syncer = Syncer::new(DefinitionStore::new());
    let outcome = syncer.run(&skip).unwrap();
    assert!(outcome.decisions.is_empty());
    assert!(syncer.store().is_empty());
}

#[test]
fn rerun_of_identity_store_is_a_fixpoint() {
    let source = TempDir::new().unwrap();
    write(source.path(), "a.yml", "id: a\n");
    write(source.path(), "team/b.yml", "id: b\n");

    let selector = ScopeSelector::builder(source.path(), "ns")
        .delete_enabled(true)
        .build();
    let mut syncer = Syncer::new(DefinitionStore::new());
    syncer.run(&selector).unwrap();
    let second = syncer.run(&selector).unwrap();

    assert!(second
        .decisions
        .iter()
        .all(|d| d.state == SyncState::Unchanged));
    assert_eq!(second.summary.applied, 0);
    assert_eq!(
        syncer.store().revision_of(&LogicalKey::new("ns", "a")),
        Some(1)
    );
}

#[test]
fn report_matches_the_decision_list_exactly() {
    let source = TempDir::new().unwrap();
    let target = TempDir::new().unwrap();
    write(source.path(), "a.txt", "x");

    let mut store = FileStore::open(target.path().join("store")).unwrap();
    store.put("proj", "stale.txt", b"old").unwrap();

    let report = target.path().join("run.ndjson");
    let selector = ScopeSelector::builder(source.path(), "proj").build();
    let mut syncer = Syncer::new(store).with_report_path(&report);
    let outcome = syncer.run(&selector).unwrap();

    let parsed = refsync::read_report(&report).unwrap();
    assert_eq!(parsed, outcome.decisions);
    // Suppressed deletions are still part of the transcript.
    assert!(parsed.iter().any(|d| d.state == SyncState::Deleted));
}

#[test]
fn sink_lines_use_the_decision_prefixes() {
    let source = TempDir::new().unwrap();
    write(source.path(), "a.yml", "id: a\n");

    let mut store = DefinitionStore::new();
    store.put("ns", "a", b"something else").unwrap();
    store.put("ns", "gone", b"id: gone\n").unwrap();

    let selector = ScopeSelector::builder(source.path(), "ns")
        .delete_enabled(true)
        .build();
    let sink = SharedSink::default();
    let mut syncer = Syncer::new(store).with_sink(sink.clone());
    syncer.run(&selector).unwrap();

    let lines = sink.0.lock().unwrap();
    assert_eq!(*lines, vec!["~ a", "- gone"]);
}

#[test]
fn memory_sink_collects_lines() {
    // MemorySink is the library-provided collector for embedders that
    // hold onto the sink themselves.
    let mut sink = MemorySink::new();
    sink.emit(&SyncDecision {
        source_path: Some("a.txt".to_string()),
        target_path: None,
        logical_key: None,
        state: SyncState::Added,
        revision: Some(1),
        warning: None,
    });
    assert_eq!(sink.lines(), &["+ a.txt"]);
}
