//! Concurrent multi-target runs and the non-HTML engines

use crate::{create_test_config, http_target, mount_page, read_metadata};
use docrawl::config::{load_config, EngineKind, Target};
use docrawl::{run_all, CrawlError};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_one_invalid_start_url_fails_only_its_sub_run() {
    let server = MockServer::start().await;
    mount_page(&server, "/alpha", "Alpha", &["/alpha/one"]).await;
    mount_page(&server, "/alpha/one", "One", &[]).await;
    mount_page(&server, "/beta", "Beta", &[]).await;

    let mut alpha = http_target("alpha", &format!("{}/alpha", server.uri()));
    alpha.allowed_prefixes = vec![format!("{}/alpha/", server.uri())];
    let mut beta = http_target("beta", &format!("{}/beta", server.uri()));
    beta.allowed_prefixes = vec![format!("{}/beta/", server.uri())];
    let broken = http_target("broken", "mailto:docs@example.com");

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path(), vec![alpha, broken, beta]);

    let report = run_all(Arc::new(config), CancellationToken::new()).await;

    assert_eq!(report.successes().len(), 2);
    assert_eq!(report.failures().len(), 1);
    assert_ne!(report.exit_code(), 0);

    let (name, err) = report.failures()[0];
    assert_eq!(name, "broken");
    assert!(matches!(err, CrawlError::InvalidStartUrl { .. }));

    let successes = report.successes();
    let (alpha_name, alpha_stats) = successes[0];
    assert_eq!(alpha_name, "alpha");
    assert_eq!(alpha_stats.total_pages, 2);
    assert_eq!(alpha_stats.new_pages, 2);
    assert!(alpha_stats.start_time.is_some() && alpha_stats.end_time.is_some());

    let (beta_name, beta_stats) = successes[1];
    assert_eq!(beta_name, "beta");
    assert_eq!(beta_stats.total_pages, 1);

    assert_eq!(report.aggregate().total_pages, 3);
    assert_eq!(read_metadata(&dir.path().join("alpha")).pages.len(), 2);
    assert_eq!(read_metadata(&dir.path().join("beta")).pages.len(), 1);
    assert!(!dir.path().join("broken").exists());
}

#[tokio::test]
async fn test_all_sub_runs_succeed() {
    let server = MockServer::start().await;
    mount_page(&server, "/a", "A", &[]).await;
    mount_page(&server, "/b", "B", &[]).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(
        dir.path(),
        vec![
            http_target("a", &format!("{}/a", server.uri())),
            http_target("b", &format!("{}/b", server.uri())),
        ],
    );
    for target in &mut config.targets {
        target.max_depth = Some(0);
    }

    let report = run_all(Arc::new(config), CancellationToken::new()).await;
    assert!(report.is_success());
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.aggregate().total_pages, 2);
}

#[tokio::test]
async fn test_api_target_groups_by_module() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/documentation/kit.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "metadata": { "title": "Kit", "modules": [{ "name": "Kit" }] },
                "abstract": [{ "type": "text", "text": "The kit." }],
                "references": { "v": { "title": "View", "url": "/documentation/kit/view" } }
            }"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/documentation/kit/view.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{
                "metadata": { "title": "View", "modules": [{ "name": "Kit" }] },
                "primaryContentSections": [{ "kind": "content", "content": [
                    { "type": "paragraph", "inlineContent": [{ "type": "text", "text": "A view." }] }
                ]}]
            }"#,
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut target = Target::new(
        "kit",
        EngineKind::Api,
        &format!("{}/documentation/kit", server.uri()),
    );
    target.api_path_prefix = "/data".to_string();
    target.api_suffix = ".json".to_string();
    let config = create_test_config(dir.path(), vec![target]);

    let report = run_all(Arc::new(config), CancellationToken::new()).await;
    assert!(report.is_success());
    assert_eq!(report.aggregate().total_pages, 2);

    let out = dir.path().join("kit");
    let view = std::fs::read_to_string(out.join("kit").join("view.md")).unwrap();
    assert!(view.contains("title: View\n"));
    assert!(view.ends_with("# View\n\nA view.\n"));
    assert!(out.join("kit").join("index.md").exists());
}

#[tokio::test]
async fn test_feed_target_follows_sitemap_entries() {
    let server = MockServer::start().await;
    let sitemap = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{0}/pkg/a</loc></url><url><loc>{0}/pkg/b</loc></url></urlset>"#,
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(sitemap)
                .insert_header("content-type", "application/xml"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/pkg/a", "Package A", &[]).await;
    mount_page(&server, "/pkg/b", "Package B", &[]).await;

    let dir = TempDir::new().unwrap();
    let target = Target::new(
        "packages",
        EngineKind::Feed,
        &format!("{}/sitemap.xml", server.uri()),
    );
    let config = create_test_config(dir.path(), vec![target]);

    let report = run_all(Arc::new(config), CancellationToken::new()).await;
    assert!(report.is_success());
    assert_eq!(report.aggregate().total_pages, 3);

    let metadata = read_metadata(&dir.path().join("packages"));
    assert_eq!(metadata.pages.len(), 3);
    assert_eq!(metadata.pages[&format!("{}/pkg/a", server.uri())].depth, 1);
}

#[tokio::test]
async fn test_loaded_config_with_bad_start_url_runs_other_targets() {
    let server = MockServer::start().await;
    mount_page(&server, "/alpha", "Alpha", &[]).await;
    mount_page(&server, "/beta", "Beta", &[]).await;

    let dir = TempDir::new().unwrap();
    let toml = format!(
        r#"
[crawler]
request-delay-ms = 0
retry-delay-ms = 10

[output]
base-dir = "{base}"

[[target]]
name = "alpha"
kind = "http"
start-url = "{uri}/alpha"
allowed-prefixes = ["{uri}/alpha/"]

[[target]]
name = "broken"
kind = "http"
start-url = "mailto:docs@example.com"

[[target]]
name = "beta"
kind = "http"
start-url = "{uri}/beta"
allowed-prefixes = ["{uri}/beta/"]
"#,
        base = dir.path().display(),
        uri = server.uri()
    );
    let config_path = dir.path().join("docrawl.toml");
    std::fs::write(&config_path, toml).unwrap();

    let config = load_config(&config_path).unwrap();
    let report = run_all(Arc::new(config), CancellationToken::new()).await;

    assert_eq!(report.successes().len(), 2);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].0, "broken");
    assert_ne!(report.exit_code(), 0);
    assert_eq!(report.aggregate().total_pages, 2);
}
