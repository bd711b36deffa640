//! Session persistence: resume, corrupt sessions and cancellation

use crate::{create_test_config, http_target, mount_page, read_metadata};
use docrawl::state::{CrawlMetadata, QueueEntry, Session};
use docrawl::storage::{find_resumable, SessionStore};
use docrawl::{run_target, Coordinator};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn interrupted_session(start: &str, output_dir: &std::path::Path) -> CrawlMetadata {
    let mut session = Session::new(start, &output_dir.to_string_lossy());
    session.visited.insert(start.to_string());
    session.queue.push(QueueEntry {
        url: format!("{}/a", start),
        depth: 1,
    });

    CrawlMetadata {
        crawl_state: Some(session),
        ..CrawlMetadata::default()
    }
}

#[tokio::test]
async fn test_resume_continues_from_session_queue() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());

    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>start</p>"))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/docs/a", "A", &["/docs/b", "/docs"]).await;
    mount_page(&server, "/docs/b", "B", &[]).await;

    // Output directory name is not a valid URI
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("previous run [1] #ä");
    std::fs::create_dir_all(&out).unwrap();
    let mut metadata = interrupted_session(&start, &out);
    let mut session = metadata.crawl_state.clone();
    SessionStore::new(out.as_path())
        .save(&mut metadata, session.as_mut())
        .await
        .unwrap();

    let config = create_test_config(dir.path(), vec![http_target("docs", &start)]);
    let coordinator = Coordinator::new(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert!(coordinator.resumed());
    assert_eq!(coordinator.output_dir().as_path(), out.as_path());

    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.total_pages, 2);
    assert_eq!(stats.new_pages, 2);

    assert!(out.join("root").join("a.md").exists());
    assert!(out.join("root").join("b.md").exists());
    assert!(!dir.path().join("docs").exists());

    let metadata = read_metadata(&out);
    assert!(metadata.crawl_state.is_none());
    assert_eq!(metadata.pages[&format!("{}/a", start)].depth, 1);
    assert_eq!(metadata.pages[&format!("{}/b", start)].depth, 2);
}

#[tokio::test]
async fn test_find_resumable_reconstructs_filesystem_path() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("weird dir %20 [x]");
    std::fs::create_dir_all(&out).unwrap();

    let start = "https://x.test/start";
    let mut metadata = interrupted_session(start, &out);
    let mut session = metadata.crawl_state.clone();
    SessionStore::new(out.as_path())
        .save(&mut metadata, session.as_mut())
        .await
        .unwrap();

    let found = find_resumable(&[], Some(dir.path()), start).await.unwrap();
    assert_eq!(found.output_dir.as_path(), out.as_path());
    assert_eq!(found.session.queue[0].url, "https://x.test/start/a");

    assert!(find_resumable(&[], Some(dir.path()), "https://x.test/other")
        .await
        .is_none());
}

#[tokio::test]
async fn test_corrupt_session_falls_back_to_fresh_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &[]).await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("docs");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("metadata.json"), "{\"pages\": {\"trunc").unwrap();

    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );
    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.new_pages, 1);
    assert_eq!(read_metadata(&out).pages.len(), 1);
}

#[tokio::test]
async fn test_inactive_session_is_not_adopted() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());
    mount_page(&server, "/docs", "Docs", &[]).await;
    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("docs");
    std::fs::create_dir_all(&out).unwrap();
    let mut metadata = interrupted_session(&start, &out);
    let mut session = metadata.crawl_state.clone();
    if let Some(session) = session.as_mut() {
        session.is_active = false;
    }
    SessionStore::new(out.as_path())
        .save(&mut metadata, session.as_mut())
        .await
        .unwrap();

    let config = create_test_config(dir.path(), vec![http_target("docs", &start)]);
    let coordinator = Coordinator::new(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert!(!coordinator.resumed());

    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.total_pages, 1);
}

#[tokio::test]
async fn test_fresh_flag_ignores_active_session() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());
    mount_page(&server, "/docs", "Docs", &[]).await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("docs");
    std::fs::create_dir_all(&out).unwrap();
    let mut metadata = interrupted_session(&start, &out);
    let mut session = metadata.crawl_state.clone();
    SessionStore::new(out.as_path())
        .save(&mut metadata, session.as_mut())
        .await
        .unwrap();

    let mut config = create_test_config(dir.path(), vec![http_target("docs", &start)]);
    config.crawler.resume = false;

    let coordinator = Coordinator::new(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert!(!coordinator.resumed());
    let stats = coordinator.run().await.unwrap();
    assert_eq!(stats.total_pages, 1);
    assert!(read_metadata(&out).crawl_state.is_none());
}

#[tokio::test]
async fn test_cancellation_checkpoints_and_resumes() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());

    // First request hangs long enough to be cancelled
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>slow</p>")
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/docs", "Docs", &["/docs/a"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), vec![http_target("docs", &start)]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let stats = run_target(&config, &config.targets[0], cancel).await.unwrap();
    assert_eq!(stats.total_pages, 0);
    assert!(stats.end_time.is_some());

    let out = dir.path().join("docs");
    let metadata = read_metadata(&out);
    let session = metadata.crawl_state.expect("session kept for resume");
    assert!(session.is_active);
    assert_eq!(session.queue.len(), 1);
    assert_eq!(session.queue[0].url, start);
    assert!(session.visited.is_empty());
    assert!(!out.join("root").join("index.md").exists());

    let resumed = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(resumed.total_pages, 2);
    assert!(read_metadata(&out).crawl_state.is_none());
}

#[tokio::test]
async fn test_checkpoint_persists_progress_mid_run() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());
    mount_page(&server, "/docs", "Docs", &["/docs/a", "/docs/b"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;
    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>b</p>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path(), vec![http_target("docs", &start)]);
    config.crawler.checkpoint_every = 1;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let out = dir.path().join("docs");
    let watched = out.clone();
    tokio::spawn(async move {
        // Wait for the checkpoint written after page two, then interrupt
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let Ok(raw) = std::fs::read_to_string(watched.join("metadata.json")) else {
                continue;
            };
            let written = serde_json::from_str::<CrawlMetadata>(&raw)
                .map(|m| m.pages.len())
                .unwrap_or(0);
            if written == 2 {
                break;
            }
        }
        trigger.cancel();
    });

    let stats = run_target(&config, &config.targets[0], cancel).await.unwrap();
    assert_eq!(stats.total_pages, 2);

    let metadata = read_metadata(&out);
    assert_eq!(metadata.pages.len(), 2);
    let session = metadata.crawl_state.unwrap();
    assert!(session.visited.contains(&start));
    assert!(session.visited.contains(&format!("{}/a", start)));
    assert_eq!(session.queue.len(), 1);
    assert_eq!(session.queue[0].url, format!("{}/b", start));
}

#[tokio::test]
async fn test_failed_checkpoint_is_retried_later() {
    let server = MockServer::start().await;
    let start = format!("{}/docs", server.uri());
    mount_page(&server, "/docs", "Docs", &["/docs/a", "/docs/b"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;
    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<h1>B</h1>")
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("docs");
    // A directory in place of the ledger makes every save fail
    let blocker = out.join("metadata.json");
    std::fs::create_dir_all(blocker.join("occupied")).unwrap();

    let mut config = create_test_config(dir.path(), vec![http_target("docs", &start)]);
    config.crawler.checkpoint_every = 1;

    let page_a = out.join("root").join("a.md");
    let watched = blocker.clone();
    let unblock = tokio::spawn(async move {
        for _ in 0..100 {
            if page_a.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let was_blocked = watched.is_dir();
        std::fs::remove_dir_all(&watched).unwrap();
        was_blocked
    });

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert!(unblock.await.unwrap());

    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.errors, 0);
    assert!(out.join("root").join("index.md").exists());
    assert!(out.join("root").join("b.md").exists());

    let metadata = read_metadata(&out);
    assert_eq!(metadata.pages.len(), 3);
    assert_eq!(metadata.stats.total_pages, 3);
    assert!(metadata.crawl_state.is_none());
}
