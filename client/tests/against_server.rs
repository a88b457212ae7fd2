//! Exercises the client against a real filedb application on a loopback port.

use filedb::config::{Config, Permission};
use filedb::{application, AppState, FileStore};
use filedb_client::{ClientError, FileDbClient};

async fn spawn_server(dir: &std::path::Path) -> String {
    let mut config = Config::default();
    config.permissions = vec![Permission {
        key: "test-key".into(),
        get: true,
        post: true,
        delete: true,
        annotation: "integration test".into(),
    }];
    let store = FileStore::open(dir, 0o644, config.server.max_file_size)
        .await
        .unwrap();
    let app = application(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/filedb")
}

#[tokio::test]
async fn test_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = FileDbClient::new(&base, "test-key").unwrap();

    let data = b"%PDF-1.4 fake document".to_vec();
    let id = client.add(data.clone()).await.unwrap();
    assert_eq!(client.add(data.clone()).await.unwrap(), id);

    assert!(client.exists(id).await.unwrap());
    assert!(!client.exists(id + 100).await.unwrap());
    assert_eq!(client.size(id).await.unwrap(), data.len() as u64);
    assert_eq!(client.mimetype(id).await.unwrap(), "application/pdf");
    assert_eq!(client.hardlinks(id).await.unwrap(), 2);
    assert_eq!(client.sha256sum(id).await.unwrap().len(), 64);
    assert_eq!(client.last_access(id).await.unwrap(), None);

    assert_eq!(client.get(id, false).await.unwrap(), data);
    assert_eq!(client.get(id, true).await.unwrap(), data);
    assert_eq!(client.accessed(id).await.unwrap(), 2);
    assert!(client.last_access(id).await.unwrap().is_some());
    let created = client.created(id).await.unwrap();
    assert!(created <= chrono::Local::now().naive_local());

    assert_eq!(client.put(id).await.unwrap(), 3);
    for _ in 0..3 {
        assert!(client.delete(id).await.unwrap());
    }
    assert!(!client.exists(id).await.unwrap());
    assert!(!client.delete(id).await.unwrap());

    let err = client.get(id, false).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let client = FileDbClient::new(&base, "wrong-key").unwrap();

    match client.add(b"data".to_vec()).await {
        Err(ClientError::Server { status, message }) => {
            assert_eq!(status, 403);
            assert_eq!(message, "Not authorized");
        }
        other => panic!("expected 403, got {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_time_format_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let base = spawn_server(dir.path()).await;
    let default = FileDbClient::new(&base, "test-key").unwrap();
    let dotted = FileDbClient::new(&base, "test-key")
        .unwrap()
        .with_time_format("%d.%m.%Y %H:%M:%S");

    let id = dotted.add(b"timestamps".to_vec()).await.unwrap();
    let raw = dotted.metadata(id, "created").await.unwrap();
    assert_eq!(raw.matches('.').count(), 2, "{raw}");
    assert_eq!(
        dotted.created(id).await.unwrap(),
        default.created(id).await.unwrap()
    );

    dotted.get(id, false).await.unwrap();
    assert_eq!(
        dotted.last_access(id).await.unwrap(),
        default.last_access(id).await.unwrap()
    );
    assert!(dotted.last_access(id).await.unwrap().is_some());
}
