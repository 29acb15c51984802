use chrono::Local;
use rlog::adapter::daily_file::{DailyFilePersister, LogFileKey};
use rlog::app::server;
use rlog::error::IngestError;
use rlog::port::BatchPersister;
use rlog::session::SessionConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct TestServer {
    addr: SocketAddr,
    base: TempDir,
    shutdown: CancellationToken,
    handle: JoinHandle<Result<(), IngestError>>,
}

impl TestServer {
    async fn start(flush_interval: Duration, max_connections: usize) -> Self {
        let base = TempDir::new().unwrap();
        let listener = server::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let persister: Arc<dyn BatchPersister> = Arc::new(DailyFilePersister::new(base.path()));
        let config = SessionConfig {
            flush_interval,
            idle_timeout: Duration::from_secs(30),
            read_backoff: Duration::from_millis(50),
        };
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server::serve(
            listener,
            config,
            persister,
            max_connections,
            shutdown.clone(),
        ));
        Self {
            addr,
            base,
            shutdown,
            handle,
        }
    }

    fn log_path(&self, group: &str) -> PathBuf {
        LogFileKey::new(group, Local::now().date_naive())
            .unwrap()
            .path_in(self.base.path())
    }

    async fn stop(self) -> TempDir {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
        self.base
    }
}

fn record(group: &str, message: &str) -> String {
    format!(r#"{{"group":"{group}","time":"2025-01-10T12:00:00Z","level":"INFO","message":"{message}"}}"#)
}

async fn wait_until_exists(path: &Path) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !path.exists() {
        assert!(tokio::time::Instant::now() < deadline, "{path:?} was never written");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn concurrent_connections_write_their_own_groups() {
    let server = TestServer::start(Duration::from_millis(100), 16).await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    first
        .write_all(format!("{}\n{}\n", record("web", "1"), record("web", "2")).as_bytes())
        .await
        .unwrap();
    second
        .write_all(format!("{}\n", record("db", "1")).as_bytes())
        .await
        .unwrap();

    let web = server.log_path("web");
    let db = server.log_path("db");
    wait_until_exists(&web).await;
    wait_until_exists(&db).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        std::fs::read_to_string(&web).unwrap(),
        format!("{}\n{}\n", record("web", "1"), record("web", "2"))
    );
    assert_eq!(
        std::fs::read_to_string(&db).unwrap(),
        format!("{}\n", record("db", "1"))
    );

    drop((first, second));
    server.stop().await;
}

#[tokio::test]
async fn shutdown_drains_live_sessions() {
    let server = TestServer::start(Duration::from_secs(60), 16).await;
    let path = server.log_path("pending");

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client
        .write_all(format!("{}\n", record("pending", "unflushed")).as_bytes())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!path.exists());

    // The client stays connected; shutdown alone must end its session.
    let _base = server.stop().await;
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        format!("{}\n", record("pending", "unflushed"))
    );
    drop(client);
}

#[tokio::test]
async fn connection_cap_defers_extra_sessions() {
    let server = TestServer::start(Duration::from_millis(100), 1).await;

    let holder = TcpStream::connect(server.addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut waiting = TcpStream::connect(server.addr).await.unwrap();
    waiting
        .write_all(format!("{}\n", record("queued", "waiting")).as_bytes())
        .await
        .unwrap();

    let queued = server.log_path("queued");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!queued.exists(), "second session must wait for a free slot");

    drop(holder);
    wait_until_exists(&queued).await;

    drop(waiting);
    server.stop().await;
}

#[tokio::test]
async fn healthcheck_reaches_running_server() {
    let server = TestServer::start(Duration::from_millis(100), 4).await;

    rlog::healthcheck_with_port(server.addr.port())
        .await
        .expect("healthcheck against live server");

    server.stop().await;
}

#[tokio::test]
async fn healthcheck_fails_without_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = rlog::healthcheck_with_port(port).await.unwrap_err();
    assert!(err.to_string().contains("Healthcheck failed"));
}

#[tokio::test]
async fn bind_reports_address_on_failure() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = taken.local_addr().unwrap().to_string();

    let err = server::bind(&address).await.unwrap_err();
    assert!(matches!(err, IngestError::Bind { address: ref a, .. } if *a == address));
}
