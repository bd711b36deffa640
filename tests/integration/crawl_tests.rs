//! Single-target crawl cycles

use crate::{create_test_config, http_target, mount_page, read_metadata};
use docrawl::run_target;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_single_page_example() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/a", "/docs/b"]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs/", server.uri()))],
    );
    config.crawler.max_pages = 1;
    config.crawler.max_depth = 0;

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.total_pages, 1);
    assert_eq!(stats.new_pages, 1);
    assert_eq!(stats.errors, 0);
    assert!(stats.start_time.is_some());
    assert!(stats.end_time.is_some());

    let out = dir.path().join("docs");
    let page = std::fs::read_to_string(out.join("root").join("index.md")).unwrap();
    assert!(page.starts_with("---\nsource: "));
    assert!(page.contains("title: Docs\n"));
    assert!(page.contains("# Docs"));

    let metadata = read_metadata(&out);
    assert_eq!(metadata.pages.len(), 1);
    let record = metadata.pages.values().next().unwrap();
    assert_eq!(record.url, format!("{}/docs", server.uri()));
    assert_eq!(record.framework, "root");
    assert_eq!(record.depth, 0);
    assert_eq!(record.content_hash.len(), 64);
    assert!(metadata.crawl_state.is_none());
    assert_eq!(metadata.stats.total_pages, 1);
}

#[tokio::test]
async fn test_breadth_first_crawl_writes_group_directories() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/guide/intro", "/docs/api"]).await;
    mount_page(&server, "/docs/guide/intro", "Intro", &["/docs"]).await;
    mount_page(&server, "/docs/api", "Api", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.new_pages, 3);

    let out = dir.path().join("docs");
    assert!(out.join("root").join("index.md").exists());
    assert!(out.join("root").join("api.md").exists());
    assert!(out.join("guide").join("guide_intro.md").exists());

    let metadata = read_metadata(&out);
    let intro = &metadata.pages[&format!("{}/docs/guide/intro", server.uri())];
    assert_eq!(intro.framework, "guide");
    assert_eq!(intro.file_path, "guide/guide_intro.md");
    assert_eq!(intro.depth, 1);
}

#[tokio::test]
async fn test_idempotent_recrawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/a", "/docs/b"]).await;
    mount_page(&server, "/docs/a", "A", &["/docs/b", "/docs"]).await;
    mount_page(&server, "/docs/b", "B", &["/docs/a"]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let first = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.new_pages, 3);

    let second = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.total_pages, 3);
    assert_eq!(second.skipped_pages, second.total_pages);
    assert_eq!(second.new_pages, 0);
    assert_eq!(second.updated_pages, 0);
}

#[tokio::test]
async fn test_force_recrawl_rewrites_everything() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/a"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();

    config.crawler.force_recrawl = true;
    let forced = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(forced.updated_pages, 2);
    assert_eq!(forced.skipped_pages, 0);
}

#[tokio::test]
async fn test_timestamp_noise_is_not_a_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Stable text</p><p>Generated on 2024-01-01T10:00:00Z</p></body></html>",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Stable text</p><p>Generated on 2024-06-30T23:59:59Z</p></body></html>",
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let first = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.new_pages, 1);

    let second = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.skipped_pages, 1);
}

#[tokio::test]
async fn test_missing_file_is_rewritten() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/a"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();

    let page = dir.path().join("docs").join("root").join("a.md");
    std::fs::remove_file(&page).unwrap();

    let second = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.updated_pages, 1);
    assert_eq!(second.skipped_pages, 1);
    assert!(page.exists());
}

#[tokio::test]
async fn test_depth_bound() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/l1"]).await;
    mount_page(&server, "/docs/l1", "L1", &["/docs/l2"]).await;
    Mock::given(method("GET"))
        .and(path("/docs/l2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );
    config.crawler.max_depth = 1;

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.total_pages, 2);

    let metadata = read_metadata(&dir.path().join("docs"));
    assert!(metadata
        .pages
        .keys()
        .all(|url| !url.ends_with("/docs/l2")));
    assert!(metadata.pages.values().all(|record| record.depth <= 1));
}

#[tokio::test]
async fn test_shared_links_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/docs",
        "Docs",
        &["/docs/a", "/docs/b", "/docs/shared", "/docs/shared#top", "/docs/shared/"],
    )
    .await;
    mount_page(&server, "/docs/a", "A", &["/docs/shared", "/docs/b"]).await;
    mount_page(&server, "/docs/b", "B", &["./shared", "/docs/a"]).await;
    Mock::given(method("GET"))
        .and(path("/docs/shared"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>shared</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.total_pages, 4);
}

#[tokio::test]
async fn test_out_of_prefix_links_not_followed() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/blog/post", "/docs/a"]).await;
    mount_page(&server, "/docs/a", "A", &[]).await;
    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut target = http_target("docs", &format!("{}/docs", server.uri()));
    target.allowed_prefixes = vec![format!("{}/docs/", server.uri())];
    let config = create_test_config(dir.path(), vec![target]);

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.total_pages, 2);
}

#[tokio::test]
async fn test_retry_exhaustion_counts_error_and_continues() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/broken", "/docs/ok"]).await;
    mount_page(&server, "/docs/ok", "Ok", &[]).await;
    Mock::given(method("GET"))
        .and(path("/docs/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.total_pages, 2);

    let metadata = read_metadata(&dir.path().join("docs"));
    assert_eq!(metadata.stats.errors, 1);
    assert!(!metadata
        .pages
        .contains_key(&format!("{}/docs/broken", server.uri())));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/missing"]).await;
    Mock::given(method("GET"))
        .and(path("/docs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.total_pages, 1);
}

#[tokio::test]
async fn test_max_pages_caps_visits() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/a", "/docs/b", "/docs/c"]).await;
    for route in ["/docs/a", "/docs/b", "/docs/c"] {
        mount_page(&server, route, route, &[]).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );
    config.crawler.max_pages = 2;

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.total_pages, 2);
    assert_eq!(read_metadata(&dir.path().join("docs")).pages.len(), 2);
}

#[tokio::test]
async fn test_case_colliding_urls_get_distinct_files() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", &["/docs/Foo", "/docs/foo"]).await;
    mount_page(&server, "/docs/Foo", "Upper", &[]).await;
    mount_page(&server, "/docs/foo", "Lower", &[]).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        dir.path(),
        vec![http_target("docs", &format!("{}/docs", server.uri()))],
    );

    let stats = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stats.new_pages, 3);

    let out = dir.path().join("docs");
    let metadata = read_metadata(&out);
    let upper = &metadata.pages[&format!("{}/docs/Foo", server.uri())];
    let lower = &metadata.pages[&format!("{}/docs/foo", server.uri())];
    assert_ne!(upper.file_path, lower.file_path);
    assert!(upper.file_path == "root/foo.md" || lower.file_path == "root/foo.md");

    let upper_text = std::fs::read_to_string(out.join(&upper.file_path)).unwrap();
    let lower_text = std::fs::read_to_string(out.join(&lower.file_path)).unwrap();
    assert!(upper_text.contains("title: Upper"));
    assert!(lower_text.contains("title: Lower"));

    // Both files stay current on the next run
    let again = run_target(&config, &config.targets[0], CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again.skipped_pages, 3);
    assert_eq!(again.new_pages + again.updated_pages, 0);
}
