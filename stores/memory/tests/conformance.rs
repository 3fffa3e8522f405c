use hive_core::testutil::RemoteStoreTests;
use hive_store_memory::MemoryStore;

#[tokio::test]
async fn test_memory_store_conformance() {
    let store = MemoryStore::new();
    RemoteStoreTests::new(&store).run_all().await.unwrap();
}

#[tokio::test]
async fn test_suite_leaves_no_pins_behind() {
    let store = MemoryStore::new();
    RemoteStoreTests::new(&store).run_all().await.unwrap();
    assert!(store.pin_names().is_empty());
}
