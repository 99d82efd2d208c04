//! Integration tests for migrations over sled stores.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stepwise_core::catalog::{EntityShape, SchemaRegistry, SchemaVersion};
use stepwise_core::mapping::Mapping;
use stepwise_core::migration::{FailureCategory, MigrationError, MigrationManager, StepFailure};
use stepwise_core::storage::{
    CopyEngine, CopyEngineConfig, SledBackend, SledStoreConfig, StoreBackend, StoreLocation,
    StoreType,
};
use stepwise_core::Error;

struct TestContext {
    backend: SledBackend,
    store: StoreLocation,
    dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreLocation::new(dir.path().join("library"));
        Self {
            backend: SledBackend::default(),
            store,
            dir,
        }
    }

    /// Create the store at `schema` with `count` books.
    fn seed(&self, schema: &SchemaVersion, count: u32) {
        let db = self.backend.initialize(&self.store, schema).unwrap();
        let books = db.open_tree("Book").unwrap();
        for i in 0..count {
            books
                .insert(i.to_be_bytes(), format!("title-{i}").into_bytes())
                .unwrap();
        }
        db.flush().unwrap();
    }

    /// Raw bytes of every file in the store directory.
    fn files(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let entry = entry.unwrap();
                if entry.file_type().unwrap().is_dir() {
                    walk(&entry.path(), files);
                } else {
                    files.insert(entry.path(), std::fs::read(entry.path()).unwrap());
                }
            }
        }
        let mut files = BTreeMap::new();
        walk(self.store.path(), &mut files);
        files
    }

    fn books(&self) -> Vec<Vec<u8>> {
        let db = self.backend.open_store(&self.store).unwrap();
        let books = db.open_tree("Book").unwrap();
        books.iter().map(|item| item.unwrap().1.to_vec()).collect()
    }

    /// Directory entries other than the store itself.
    fn leftovers(&self) -> Vec<String> {
        std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "library")
            .collect()
    }
}

fn v1() -> SchemaVersion {
    SchemaVersion::new("v1").with_entity(EntityShape::new("Book").with_field("title", "string"))
}

fn v2() -> SchemaVersion {
    SchemaVersion::new("v2").with_entity(
        EntityShape::new("Book")
            .with_field("title", "string")
            .with_optional_field("isbn", "string"),
    )
}

fn v3() -> SchemaVersion {
    SchemaVersion::new("v3").with_entity(
        EntityShape::new("Book")
            .with_field("title", "string")
            .with_field("isbn", "string"),
    )
}

fn library_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_version(v1())
        .with_version(v2())
        .with_version(v3())
        .with_mapping(Mapping::new("v1_to_v2", "v1", "v2"))
        .with_mapping(Mapping::new("v2_to_v3", "v2", "v3").with_rule("uppercase"))
}

fn uppercase(_tree: &str, _key: &[u8], value: &[u8]) -> Result<Option<Vec<u8>>, Error> {
    Ok(Some(value.to_ascii_uppercase()))
}

fn failing(_tree: &str, key: &[u8], _value: &[u8]) -> Result<Option<Vec<u8>>, Error> {
    if key == 7u32.to_be_bytes() {
        Err(Error::Transform("record 7 is corrupt".to_string()))
    } else {
        Ok(Some(b"rewritten".to_vec()))
    }
}

fn engine() -> CopyEngine {
    CopyEngine::new(
        SledStoreConfig::default(),
        CopyEngineConfig::default().with_batch_size(4),
    )
    .with_transform("uppercase", uppercase)
}

fn recorder() -> (Arc<Mutex<Vec<f64>>>, impl Fn(f64) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |p| sink.lock().push(p))
}

#[test]
fn test_two_hop_migration() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 10);

    let (seen, observer) = recorder();
    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine())
        .with_observer(observer);

    let report = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap();
    assert_eq!(report.path, vec!["v1_to_v2", "v2_to_v3"]);
    assert_eq!(report.steps_executed, 2);

    let metadata = ctx.backend.read_metadata(&ctx.store).unwrap();
    assert!(v3().is_compatible_with(&metadata));
    assert_eq!(ctx.books().len(), 10);
    assert!(ctx.books().iter().all(|b| b.starts_with(b"TITLE-")));
    assert!(ctx.leftovers().is_empty(), "left behind: {:?}", ctx.leftovers());

    let seen = seen.lock();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.first(), Some(&0.0));
    assert_eq!(seen.last(), Some(&1.0));
    assert_eq!(seen.iter().filter(|p| **p >= 1.0).count(), 1);
    // Halfway through the path once the first hop is done.
    assert!(seen.contains(&0.5));
}

#[test]
fn test_second_run_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 3);
    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine());

    manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap();
    let after_first = ctx.files();

    let report = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap();
    assert!(report.was_current());
    assert_eq!(ctx.files(), after_first);
}

#[test]
fn test_missing_mapping_leaves_store_untouched() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 5);
    let before = ctx.files();

    let registry = SchemaRegistry::new()
        .with_version(v1())
        .with_version(v2())
        .with_version(v3())
        .with_mapping(Mapping::new("v1_to_v2", "v1", "v2"));
    let manager = MigrationManager::new(registry, SledBackend::default(), engine());

    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.category(), FailureCategory::NoMigrationPath);
    assert_eq!(ctx.files(), before);
    assert!(ctx.leftovers().is_empty());
}

#[test]
fn test_failing_second_hop_rolls_back() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 12);
    let before = ctx.files();

    let engine = engine().with_transform("explode", failing);
    let registry = SchemaRegistry::new()
        .with_version(v1())
        .with_version(v2())
        .with_version(v3())
        .with_mapping(Mapping::new("v1_to_v2", "v1", "v2"))
        .with_mapping(Mapping::new("v2_to_v3", "v2", "v3").with_rule("explode"));

    let (seen, observer) = recorder();
    let manager =
        MigrationManager::new(registry, SledBackend::default(), engine).with_observer(observer);

    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.category(), FailureCategory::StepExecutionFailed);
    assert_eq!(err.step_index(), Some(1));
    assert!(err.original_intact());
    match &err {
        MigrationError::StepExecutionFailed { mapping, cause, .. } => {
            assert_eq!(mapping, "v2_to_v3");
            assert!(matches!(cause, StepFailure::Store(Error::Transform(_))));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(ctx.files(), before);
    assert!(v1().is_compatible_with(&ctx.backend.read_metadata(&ctx.store).unwrap()));
    assert!(ctx.leftovers().is_empty(), "left behind: {:?}", ctx.leftovers());
    assert!(!seen.lock().contains(&1.0));
}

#[test]
fn test_unknown_rule_fails_its_hop() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 2);
    let before = ctx.files();

    // No transform registered for "uppercase".
    let manager = MigrationManager::new(
        library_registry(),
        SledBackend::default(),
        CopyEngine::default(),
    );

    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.step_index(), Some(1));
    assert_eq!(ctx.files(), before);
    assert!(ctx.leftovers().is_empty());
}

#[test]
fn test_provider_mapping_preferred() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 4);

    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine())
        .with_mapping_provider(|source: &SchemaVersion| {
            if source.id().as_str() == "v1" {
                vec![Mapping::new("v1_direct_to_v3", "v1", "v3").with_rule("uppercase")]
            } else {
                Vec::new()
            }
        });

    let report = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap();
    assert_eq!(report.path, vec!["v1_direct_to_v3"]);
    assert!(ctx.books().iter().all(|b| b.starts_with(b"TITLE-")));
}

#[test]
fn test_scratch_dir_outside_store_directory() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 6);
    let scratch = tempfile::tempdir_in(ctx.dir.path()).unwrap();

    let config = SledStoreConfig::default().with_scratch_dir(scratch.path());
    let manager = MigrationManager::new(
        library_registry(),
        SledBackend::new(config.clone()),
        CopyEngine::new(config, CopyEngineConfig::default()).with_transform("uppercase", uppercase),
    );

    manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap();
    assert!(v3().is_compatible_with(&ctx.backend.read_metadata(&ctx.store).unwrap()));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_unstamped_store_not_recognized() {
    let ctx = TestContext::new();
    {
        let db = sled::Config::new()
            .path(ctx.store.path())
            .use_compression(true)
            .open()
            .unwrap();
        db.insert(b"k", b"v".to_vec()).unwrap();
        db.flush().unwrap();
    }

    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine());
    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.category(), FailureCategory::SchemaNotRecognized);
    assert!(matches!(
        err,
        MigrationError::SchemaNotRecognized {
            cause: Some(Error::MissingMetadata(_)),
            ..
        }
    ));
}

#[test]
fn test_plain_directory_not_written() {
    let ctx = TestContext::new();
    std::fs::create_dir(ctx.store.path()).unwrap();
    std::fs::write(ctx.store.path().join("cover.jpg"), b"jpeg").unwrap();
    let before = ctx.files();

    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine());
    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.category(), FailureCategory::SchemaNotRecognized);
    assert!(matches!(
        err,
        MigrationError::SchemaNotRecognized {
            cause: Some(Error::NotAStore(_)),
            ..
        }
    ));
    assert_eq!(ctx.files(), before);
    assert!(ctx.leftovers().is_empty());
}

#[test]
fn test_leftover_backup_blocks_commit() {
    let ctx = TestContext::new();
    ctx.seed(&v1(), 3);
    let before = ctx.files();
    let backup = ctx.dir.path().join("library.stepwise-backup");
    std::fs::create_dir(&backup).unwrap();

    let manager = MigrationManager::new(library_registry(), SledBackend::default(), engine());
    let err = manager.migrate(&ctx.store, &StoreType::sled(), &v3()).unwrap_err();
    assert_eq!(err.category(), FailureCategory::CommitFailed);
    assert!(err.original_intact());
    assert_eq!(ctx.files(), before);
    assert!(backup.exists());
    assert_eq!(ctx.leftovers(), vec!["library.stepwise-backup"]);
}
