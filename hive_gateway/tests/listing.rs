mod common;

use common::{setup, write_tree};
use hive_core::{ErrorKind, NodeKind, OpContext, PinKind};
use hive_store_memory::LOCAL_PEER_ID;

#[tokio::test]
async fn test_list_pins_includes_indirect_records() {
    let (_store, gateway) = setup();
    let ctx = OpContext::new();
    let src = tempfile::tempdir().unwrap();
    let tree = src.path().join("tree");
    write_tree(&tree, &[("a.txt", b"a"), ("b.txt", b"b")]);
    let added = gateway.add(&ctx, "tree", &tree).await.unwrap();

    let pins = gateway.list_pins(&ctx).await.unwrap();
    assert_eq!(pins.len(), 3);
    let direct: Vec<_> = pins.iter().filter(|p| p.kind == PinKind::Direct).collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].cid, added.root);
    assert_eq!(direct[0].name, "tree");

    let mut sorted = pins.clone();
    sorted.sort();
    assert_eq!(pins, sorted);
}

#[tokio::test]
async fn test_list_dir_nested_path() {
    let (_store, gateway) = setup();
    let ctx = OpContext::new();
    let src = tempfile::tempdir().unwrap();
    let tree = src.path().join("tree");
    write_tree(&tree, &[("sub/one.txt", b"1"), ("sub/inner/two.txt", b"22")]);
    let added = gateway.add(&ctx, "tree", &tree).await.unwrap();

    let mut entries = gateway
        .list_dir(&ctx, &format!("{}/sub", added.path))
        .await
        .unwrap();
    entries.sort();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "inner");
    assert_eq!(entries[0].kind, NodeKind::Directory);
    assert_eq!(entries[1].name, "one.txt");
    assert_eq!(entries[1].kind, NodeKind::File);
    assert_eq!(entries[1].size, 1);

    let err = gateway
        .list_dir(&ctx, &format!("{}/missing", added.path))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_malformed_entry_fails_whole_listing() {
    let (store, gateway) = setup();
    let ctx = OpContext::new();
    let src = tempfile::tempdir().unwrap();
    let tree = src.path().join("tree");
    write_tree(&tree, &[("a.txt", b"a")]);
    let added = gateway.add(&ctx, "tree", &tree).await.unwrap();
    store.corrupt_listing_of(added.root);

    let err = gateway
        .list_dir(&ctx, &added.root.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedEntry);
}

#[tokio::test]
async fn test_unsafe_entry_name_fails_whole_listing() {
    for hostile in ["../etc", "..", ".", "", "x/y"] {
        let (store, gateway) = setup();
        let ctx = OpContext::new();
        let src = tempfile::tempdir().unwrap();
        let tree = src.path().join("tree");
        write_tree(&tree, &[("a.txt", b"a")]);
        let added = gateway.add(&ctx, "tree", &tree).await.unwrap();
        let file = gateway
            .list_dir(&ctx, &added.root.to_string())
            .await
            .unwrap()[0]
            .cid;
        store.inject_link(added.root, hostile, file);

        let err = gateway
            .list_dir(&ctx, &added.root.to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEntry, "name {hostile:?}");
    }
}

#[tokio::test]
async fn test_diagnostics() {
    let (_store, gateway) = setup();
    let ctx = OpContext::new();

    let info = gateway.node_info(&ctx, LOCAL_PEER_ID).await.unwrap();
    assert_eq!(info.id, LOCAL_PEER_ID);

    let pings = gateway.ping(&ctx, LOCAL_PEER_ID).await.unwrap();
    assert!(pings.iter().all(|p| p.success));
    let pings = gateway.ping(&ctx, "12D3KooWElsewhere").await.unwrap();
    assert!(!pings[0].success);

    assert!(gateway.connected_peers(&ctx).await.unwrap().is_empty());
    assert_eq!(
        gateway.ping(&ctx, "").await.unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}
