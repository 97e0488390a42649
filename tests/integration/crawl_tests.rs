//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use doc_mirror::config::{Config, OutputFormat};
use doc_mirror::crawler::{Coordinator, ProgressCallback};
use doc_mirror::state::{CrawlStatus, PageState};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling `base_url` into `output`
///
/// No politeness delay and millisecond backoff keep the tests fast.
fn create_test_config(base_url: &str, output: &Path) -> Config {
    let mut config = Config::default();
    config.target.base_url = base_url.to_string();
    config.target.output_dir = output.to_string_lossy().into_owned();
    config.crawler.delay = 0.0;
    config.crawler.max_depth = 3;
    config.crawler.concurrent_requests = 3;
    config.http.timeout = 5;
    config.http.max_retries = 2;
    config.http.retry_base_delay_ms = 1;
    config.http.retry_max_delay_ms = 5;
    config
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .mount(server)
        .await;
}

fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("failed to read {}: {}", relative, e))
}

#[tokio::test]
async fn test_full_crawl_markdown() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Home | Example Docs</title></head><body>
           <h1>Welcome</h1>
           <p>Start with the <a href="/guide/intro">introduction</a>.</p>
           <p>Then read <a href="/guide/setup/">setup</a>.</p>
           </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/guide/intro",
        r#"<html><head><title>Intro | Example Docs</title></head><body>
           <h1>Introduction</h1><p>Back to <a href="/">home</a>.</p>
           </body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/guide/setup/",
        r#"<html><head><title>Setup</title></head><body><h1>Setup</h1>
           <pre><code>cargo install doc-mirror</code></pre></body></html>"#,
    )
    .await;

    let config = create_test_config(&base_url, out.path());
    let mut coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let outcome = coordinator.run().await.expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(outcome.pages_downloaded, 3);
    assert!(outcome.failed_urls.is_empty(), "{:?}", outcome.failed_urls);

    let home = read(out.path(), "index.md");
    assert!(home.starts_with("---\ntitle: Home\n"));
    assert!(home.contains(&format!("url: {}\n", base_url)));
    assert!(home.contains("Welcome"));
    assert!(home.contains("guide/intro.md"));

    let intro = read(out.path(), "guide/intro.md");
    assert!(intro.contains("title: Intro"));
    assert!(intro.contains("Introduction"));

    let setup = read(out.path(), "guide/setup.md");
    assert!(setup.contains("cargo install doc-mirror"));

    let index = read(out.path(), "_index.md");
    assert!(index.starts_with("# Documentation Index"));
    assert!(index.contains("- **Pages**: 3"));
    assert!(index.contains("[Intro](guide/intro.md)"));
    assert!(index.contains("- **guide**"));

    let report = read(out.path(), "_report.md");
    assert!(report.contains("- **Pages Downloaded**: 3"));
    assert!(report.contains("- **Status**: completed"));
    assert_eq!(report, doc_mirror::output::format_markdown_report(&outcome.report));
}

#[tokio::test]
async fn test_depth_limit_and_same_origin() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><body><a href="/one">One</a>
               <a href="{}/elsewhere">Elsewhere</a></body></html>"#,
            other.uri()
        ),
    )
    .await;
    mount_page(
        &server,
        "/one",
        r#"<html><body><a href="/two">Two</a></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html_page("<html><body>too deep</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(html_page("<html><body>other origin</body></html>"))
        .expect(0)
        .mount(&other)
        .await;

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.max_depth = 1;

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 2);
    assert!(out.path().join("one.md").exists());
    assert!(!out.path().join("two.md").exists());
    assert_eq!(outcome.report.depth_breakdown.get(&0), Some(&1));
    assert_eq!(outcome.report.depth_breakdown.get(&1), Some(&1));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/missing">Missing</a></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    let missing = format!("{}missing", base_url);
    assert_eq!(outcome.pages_downloaded, 1);
    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert!(outcome.failed_urls[&missing].contains("404"));
    assert_eq!(outcome.stats.state_of(&missing), Some(PageState::Failed));
    assert!(!out.path().join("missing.md").exists());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/flaky">Flaky</a></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/flaky",
        "<html><head><title>Flaky</title></head><body>third time lucky</body></html>",
    )
    .await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 2);
    assert!(outcome.failed_urls.is_empty(), "{:?}", outcome.failed_urls);
    assert!(read(out.path(), "flaky.md").contains("third time lucky"));
}

#[tokio::test]
async fn test_persistent_server_error_fails_after_retries() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/broken">Broken</a></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    let broken = format!("{}broken", base_url);
    assert_eq!(outcome.pages_downloaded, 1);
    assert!(outcome.failed_urls[&broken].contains("3 attempts"));
}

#[tokio::test]
async fn test_max_pages_bounds_the_crawl() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    let links: String = (1..=5)
        .map(|n| format!(r#"<a href="/page{}">Page {}</a>"#, n, n))
        .collect();
    mount_page(&server, "/", &format!("<html><body>{}</body></html>", links)).await;
    for n in 1..=5 {
        mount_page(
            &server,
            &format!("/page{}", n),
            &format!("<html><body>page {}</body></html>", n),
        )
        .await;
    }

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.max_pages = Some(3);

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 3);
    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(
        outcome.stats.state_counts().get(&PageState::Queued),
        Some(&3)
    );
}

#[tokio::test]
async fn test_url_and_content_filters() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body>
           <a href="/public">Public</a>
           <a href="/private/notes">Private</a>
           <a href="/draft">Draft</a>
           <a href="/manual.pdf">Manual</a>
           <a href="/login/">Login</a>
           </body></html>"#,
    )
    .await;
    mount_page(&server, "/public", "<html><body>public page</body></html>").await;
    mount_page(&server, "/draft", "<html><body>DRAFT do not publish</body></html>").await;

    Mock::given(method("GET"))
        .and(path("/manual.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/notes"))
        .respond_with(html_page("<html><body>secret</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login/"))
        .respond_with(html_page("<html><body>sign in</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&base_url, out.path());
    config.filters.url_exclude = vec!["/private/".to_string()];
    config.filters.content_exclude = vec!["do not publish".to_string()];

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 2);
    assert_eq!(outcome.stats.pages_filtered, 2);
    assert!(outcome.failed_urls.is_empty(), "{:?}", outcome.failed_urls);
    assert_eq!(
        outcome.stats.state_of(&format!("{}draft", base_url)),
        Some(PageState::FilteredOut)
    );
    assert!(out.path().join("public.md").exists());
    assert!(!out.path().join("draft.md").exists());
    assert!(!out.path().join("manual.md").exists());
}

#[tokio::test]
async fn test_assets_are_downloaded() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><head><link rel="stylesheet" href="/static/site.css"></head>
           <body><img src="/static/logo.png"><img src="/static/missing.gif"></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/static/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"body{}".to_vec(), "text/css"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/missing.gif"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.include_assets = true;

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 1);
    assert_eq!(outcome.assets_downloaded, 2);
    assert_eq!(read(out.path(), "assets/css/site.css"), "body{}");
    assert_eq!(
        std::fs::read(out.path().join("assets/images/logo.png")).unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );
    assert!(outcome
        .failed_urls
        .contains_key(&format!("{}static/missing.gif", base_url)));
}

#[tokio::test]
async fn test_assets_skipped_by_default() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(&server, "/", r#"<html><body><img src="/logo.png"></body></html>"#).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.assets_downloaded, 0);
    assert!(!out.path().join("assets").exists());
}

#[tokio::test]
async fn test_output_formats() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());

    mount_page(
        &server,
        "/",
        r#"<html><head><title>Reference</title><script>track()</script></head>
           <body><h1>Reference</h1><p>All the options.</p></body></html>"#,
    )
    .await;

    for (format, file) in [
        (OutputFormat::Html, "index.html"),
        (OutputFormat::Text, "index.txt"),
        (OutputFormat::Json, "index.json"),
    ] {
        let out = TempDir::new().unwrap();
        let mut config = create_test_config(&base_url, out.path());
        config.output.format = format;

        let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");
        assert_eq!(outcome.pages_downloaded, 1, "{}", format);

        let document = read(out.path(), file);
        match format {
            OutputFormat::Html => {
                assert!(document.contains("All the options."));
                assert!(!document.contains("track()"));
            }
            OutputFormat::Text => {
                assert!(document.contains("# Reference"));
                assert!(document.contains("All the options."));
                assert!(!document.contains('<'));
            }
            OutputFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(&document).unwrap();
                assert_eq!(value["title"], "Reference");
                assert_eq!(value["url"], base_url.as_str());
                assert_eq!(value["headings"][0]["text"], "Reference");
            }
            OutputFormat::Markdown => unreachable!(),
        }
    }
}

#[tokio::test]
async fn test_trailing_slash_pages_do_not_overwrite() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/a/b">B</a><a href="/a/b/">B dir</a></body></html>"#,
    )
    .await;
    mount_page(&server, "/a/b", "<html><body>without slash</body></html>").await;
    mount_page(&server, "/a/b/", "<html><body>with slash</body></html>").await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 3);

    let first = read(out.path(), "a/b.md");
    let second = read(out.path(), "a/b-1.md");
    assert_ne!(first, second);
    assert!(first.contains("slash") && second.contains("slash"));
}

#[tokio::test]
async fn test_index_and_report_can_be_disabled() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(&server, "/", "<html><body>only page</body></html>").await;

    let mut config = create_test_config(&base_url, out.path());
    config.output.write_index = false;
    config.output.write_report = false;

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 1);
    assert!(out.path().join("index.md").exists());
    assert!(!out.path().join("_index.md").exists());
    assert!(!out.path().join("_report.md").exists());
}

#[tokio::test]
async fn test_stop_from_progress_callback() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/next">Next</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page("<html><body>next</body></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&base_url, out.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let stop = coordinator.stop_handle();
    let progress: ProgressCallback = Arc::new(move |_url, completed, _total| {
        if completed >= 1 {
            stop.stop();
        }
    });
    let mut coordinator = coordinator.with_progress(progress);

    let outcome = coordinator.run().await.expect("Crawl failed");

    assert_eq!(outcome.status, CrawlStatus::Aborted);
    assert_eq!(outcome.pages_downloaded, 1);
    assert_eq!(coordinator.session().status(), CrawlStatus::Aborted);
}

#[tokio::test]
async fn test_extra_seeds_start_at_depth_zero() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(&server, "/", "<html><body>home</body></html>").await;
    mount_page(&server, "/orphan", "<html><body>not linked</body></html>").await;

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.max_depth = 0;
    config.target.seeds = vec![format!("{}orphan", base_url)];

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 2);
    assert_eq!(outcome.report.depth_breakdown.get(&0), Some(&2));
    assert!(out.path().join("orphan.md").exists());
}

#[tokio::test]
async fn test_redirected_page_links_resolve_against_final_url() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/old">Old guide</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/"))
        .respond_with(html_page(
            r#"<html><head><title>New guide</title></head><body>
               <h1>New guide</h1><p>Read the <a href="child">child page</a>.</p>
               </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/new/child",
        r#"<html><head><title>Child</title></head><body>
           <p>Up to the <a href="/new/">guide</a>.</p></body></html>"#,
    )
    .await;

    let config = create_test_config(&base_url, out.path());
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 3, "{:?}", outcome.failed_urls);
    assert!(outcome.failed_urls.is_empty());

    let old = read(out.path(), "old.md");
    assert!(old.contains(&format!("url: {}old\n", base_url)));
    assert!(old.contains("(new/child.md)"), "{}", old);
    assert!(read(out.path(), "new/child.md").contains("Up to the"));
    assert!(!out.path().join("child.md").exists());
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        "<html><head><title>Home</title></head><body>after the wait</body></html>",
    )
    .await;

    let mut config = create_test_config(&base_url, out.path());
    config.http.retry_max_delay_ms = 5_000;

    let started = Instant::now();
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");
    let elapsed = started.elapsed();

    assert_eq!(outcome.pages_downloaded, 1);
    assert!(read(out.path(), "index.md").contains("after the wait"));
    assert!(elapsed >= Duration::from_millis(900), "retried after {:?}", elapsed);
}

#[tokio::test]
async fn test_politeness_delay_spaces_requests_of_one_worker() {
    let server = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#,
    )
    .await;
    mount_page(&server, "/a", "<html><body>page a</body></html>").await;
    mount_page(&server, "/b", "<html><body>page b</body></html>").await;

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.concurrent_requests = 1;
    config.crawler.delay = 0.2;

    let started = Instant::now();
    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");
    let elapsed = started.elapsed();

    assert_eq!(outcome.pages_downloaded, 3);
    assert!(elapsed >= Duration::from_millis(400), "three requests in {:?}", elapsed);
}

#[tokio::test]
async fn test_cookies_only_sent_to_base_origin() {
    let server = MockServer::start().await;
    let cdn = MockServer::start().await;
    let base_url = format!("{}/", server.uri());
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("cookie", "session=42"))
        .respond_with(html_page(&format!(
            r#"<html><body><p>Signed in</p><img src="{}/logo.png"></body></html>"#,
            cdn.uri()
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header_exists("cookie"))
        .respond_with(ResponseTemplate::new(403))
        .expect(0)
        .mount(&cdn)
        .await;
    Mock::given(method("GET"))
        .and(header_exists("referer"))
        .respond_with(ResponseTemplate::new(403))
        .expect(0)
        .mount(&cdn)
        .await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"GIF89a".to_vec(), "image/gif"))
        .expect(1)
        .mount(&cdn)
        .await;

    let mut config = create_test_config(&base_url, out.path());
    config.crawler.include_assets = true;
    config.http.cookies.insert("session".to_string(), "42".to_string());

    let outcome = doc_mirror::crawler::run_crawl(config).await.expect("Crawl failed");

    assert_eq!(outcome.pages_downloaded, 1);
    assert_eq!(outcome.assets_downloaded, 1, "{:?}", outcome.failed_urls);
    assert!(read(out.path(), "index.md").contains("Signed in"));
}
