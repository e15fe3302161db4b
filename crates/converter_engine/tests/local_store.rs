use converter_engine::{
    open_store, LocalDirStore, RemoteStore, StorageError, StorageLister, StorageTransfer,
    TransferSettings,
};
use pretty_assertions::assert_eq;

fn seed(root: &std::path::Path) {
    for (id, body) in [
        ("files/b.docx", "bb"),
        ("files/a.pdf", "a"),
        ("files/sub/c.txt", "ccc"),
        ("config/start_conversion_1234.txt", "x"),
    ] {
        let path = root.join(id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }
}

#[tokio::test]
async fn lists_recursively_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let store = LocalDirStore::new(dir.path());

    let listed = store.list("files/").await.unwrap();
    let ids: Vec<(&str, Option<u64>)> = listed
        .iter()
        .map(|o| (o.id.as_str(), o.size_bytes))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("files/a.pdf", Some(1)),
            ("files/b.docx", Some(2)),
            ("files/sub/c.txt", Some(3)),
        ]
    );
    assert_eq!(store.list("").await.unwrap().len(), 4);
}

#[tokio::test]
async fn transfer_round_trip_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());
    let store = LocalDirStore::new(dir.path());
    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("c.txt");

    assert_eq!(store.download("files/sub/c.txt", &local).await.unwrap(), 3);
    store.upload(&local, "converted/deep/c.txt").await.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("converted/deep/c.txt")).unwrap(),
        "ccc"
    );

    store.delete("config/start_conversion_1234.txt").await.unwrap();
    let err = store
        .delete("config/start_conversion_1234.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn ids_cannot_escape_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path().join("root"));
    let scratch = tempfile::tempdir().unwrap();

    let err = store
        .download("../secret.txt", &scratch.path().join("s"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidLocation(_)));
    assert!(matches!(
        store.list("").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[test]
fn open_store_picks_adapter_by_scheme() {
    let settings = TransferSettings::default();
    let local = open_store("/srv/incoming", &settings).unwrap();
    assert_eq!(local.describe(), "dir:/srv/incoming");

    let remote = open_store(
        "https://acct.blob.core.windows.net/main/root?sv=1&sr=c&sig=secret",
        &settings,
    )
    .unwrap();
    assert!(remote.describe().starts_with("blob:https://acct.blob.core.windows.net/main"));
    assert!(!remote.describe().contains("secret"));

    assert!(open_store("  ", &settings).is_err());
    assert!(open_store("https://acct.blob.core.windows.net/main", &settings).is_err());
}
