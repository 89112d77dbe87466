//! Integration tests for the mirror
//!
//! These tests use wiremock to stand in for the origin server and a
//! temporary directory as the output tree, and run full crawls end-to-end.

use static_mirror::catalog::ResourceTypeCatalog;
use static_mirror::config::{parse_config, PageConfig, SiteConfig, UserAgentConfig};
use static_mirror::crawler::{
    build_http_client, generate_pages, mirror, Coordinator, PageOutcome, StopSignal,
};
use static_mirror::resource::content_hash;
use static_mirror::site::{GeneratePolicy, StaticContentTree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(path: &str) -> PageConfig {
    PageConfig {
        id: None,
        path: path.to_string(),
        language: None,
        simple_address: None,
        depends_on: Vec::new(),
        policy: GeneratePolicy::Generate,
    }
}

/// Creates a site mirroring `server` into `output` with the given pages
fn create_test_site(server: &MockServer, output: &Path, pages: &[&str]) -> SiteConfig {
    let mut site = SiteConfig::new("test", &server.uri(), output);
    site.page = pages.iter().map(|path| page(path)).collect();
    site
}

fn create_coordinator(site: SiteConfig) -> Coordinator {
    let tree = Arc::new(StaticContentTree::from_site(&site));
    let client = build_http_client(&UserAgentConfig::default()).expect("Failed to build client");
    Coordinator::new(
        site,
        Arc::new(ResourceTypeCatalog::defaults()),
        client,
        tree,
        StopSignal::new(),
    )
    .expect("Failed to create coordinator")
}

async fn serve(server: &MockServer, at: &str, content_type: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .mount(server)
        .await;
}

/// Reads every file of the output tree, keyed by relative path
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}

fn read(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative, e))
}

#[tokio::test]
async fn test_page_stylesheet_and_background_are_mirrored() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(
        &server,
        "/about/",
        "text/html; charset=utf-8",
        r#"<html><head><link rel="stylesheet" href="/style.css"></head><body>About</body></html>"#,
    )
    .await;
    serve(&server, "/style.css", "text/css", "body{background:url(bg.png)}").await;
    serve(&server, "/bg.png", "image/png", "PNG-BYTES").await;

    let site = create_test_site(&server, output.path(), &["/about/"]);
    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.pages_generated, 1);
    assert_eq!(report.resources_resolved, 2);

    let image_url = format!("/resources/{}.png", content_hash(b"PNG-BYTES"));
    let stylesheet = format!("body{{background:url({})}}", image_url);
    let stylesheet_url = format!("/resources/{}.css", content_hash(stylesheet.as_bytes()));

    assert_eq!(read(output.path(), stylesheet_url.trim_start_matches('/')), stylesheet);
    assert!(output.path().join(image_url.trim_start_matches('/')).is_file());

    let html = read(output.path(), "about/index.html");
    assert!(html.contains(&format!(r#"href="{}""#, stylesheet_url)));
    assert!(!html.contains("/style.css"));
}

#[tokio::test]
async fn test_missing_resource_keeps_reference() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(
        &server,
        "/",
        "text/html",
        r#"<img src="/missing.png"><img src="/logo.png">"#,
    )
    .await;
    serve(&server, "/logo.png", "image/png", "LOGO").await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let site = create_test_site(&server, output.path(), &["/"]);
    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.pages_generated, 1);

    let html = read(output.path(), "index.html");
    assert!(html.contains(r#"src="/missing.png""#));
    assert!(html.contains(&format!("/resources/{}.png", content_hash(b"LOGO"))));
}

#[tokio::test]
async fn test_concurrent_pages_fetch_shared_resource_once() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    let pages = ["/", "/a/", "/b/", "/c/", "/d/", "/e/"];
    for at in pages {
        serve(
            &server,
            at,
            "text/html",
            r#"<link href="/shared.css" rel="stylesheet"><script src="/app.js"></script>"#,
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/shared.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a{}", "text/css"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("run();", "application/javascript"))
        .expect(1)
        .mount(&server)
        .await;

    let mut site = create_test_site(&server, output.path(), &pages);
    site.max_parallelism = 4;
    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.pages_generated, pages.len());

    let stylesheet_url = format!("/resources/{}.css", content_hash(b"a{}"));
    for at in ["a", "b", "c", "d", "e"] {
        let html = read(output.path(), &format!("{}/index.html", at));
        assert!(html.contains(&stylesheet_url), "page {} was not rewritten", at);
    }
}

#[tokio::test]
async fn test_racing_workers_share_one_fetch() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    // The first page runs alone, so it must not warm the crawl map
    serve(&server, "/", "text/html", "<p>home</p>").await;
    let pages = ["/", "/p1/", "/p2/", "/p3/", "/p4/", "/p5/", "/p6/", "/p7/"];
    for at in &pages[1..] {
        serve(
            &server,
            at,
            "text/html",
            r#"<link href="/shared.css" rel="stylesheet">"#,
        )
        .await;
    }
    Mock::given(method("GET"))
        .and(path("/shared.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("b{}", "text/css")
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut site = create_test_site(&server, output.path(), &pages);
    site.max_parallelism = 7;
    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.pages_generated, pages.len());
    assert_eq!(report.resources_resolved, 1);

    let stylesheet_url = format!("/resources/{}.css", content_hash(b"b{}"));
    for at in &pages[1..] {
        let html = read(output.path(), &format!("{}index.html", &at[1..]));
        assert!(html.contains(&stylesheet_url), "page {} was not rewritten", at);
    }
}

#[tokio::test]
async fn test_cyclic_imports_terminate() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(&server, "/", "text/html", r#"<link href="/css/a.css" rel="stylesheet">"#).await;
    serve(&server, "/css/a.css", "text/css", r#"@import "b.css";"#).await;
    serve(&server, "/css/b.css", "text/css", r#"@import "a.css";"#).await;

    let site = create_test_site(&server, output.path(), &["/"]);
    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.pages_generated, 1);

    let b_url = format!("/resources/{}.css", content_hash(br#"@import "a.css";"#));
    let a_content = format!(r#"@import "{}";"#, b_url);
    let a_url = format!("/resources/{}.css", content_hash(a_content.as_bytes()));

    assert_eq!(read(output.path(), a_url.trim_start_matches('/')), a_content);
    assert!(read(output.path(), "index.html").contains(&a_url));
}

#[tokio::test]
async fn test_css_relative_references_climb_directories() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(&server, "/", "text/html", r#"<link href="/assets/css/site.css" rel="stylesheet">"#).await;
    serve(
        &server,
        "/assets/css/site.css",
        "text/css",
        ".logo{background:url('../img/logo.png')}",
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/assets/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("LOGO", "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let site = create_test_site(&server, output.path(), &["/"]);
    create_coordinator(site).run_full_crawl().await.unwrap();

    let image_url = format!("/resources/{}.png", content_hash(b"LOGO"));
    assert!(output.path().join(image_url.trim_start_matches('/')).is_file());
}

#[tokio::test]
async fn test_second_crawl_is_idempotent() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(
        &server,
        "/",
        "text/html",
        r#"<a href="/news/">News</a><picture><source srcset="/img/hero.jpg 1x, /img/hero-2x.jpg 2x"><img src="/img/hero.jpg"></picture>"#,
    )
    .await;
    serve(&server, "/news/", "text/html", r#"<img src="/img/hero.jpg">"#).await;
    serve(&server, "/img/hero.jpg", "image/jpeg", "HERO").await;
    serve(&server, "/img/hero-2x.jpg", "image/jpeg", "HERO-2X").await;

    let mut site = create_test_site(&server, output.path(), &["/", "/news/"]);
    site.remove_obsolete_pages = true;
    site.remove_obsolete_resources = true;
    site.max_parallelism = 2;

    let first = create_coordinator(site.clone()).run_full_crawl().await.unwrap();
    let before = snapshot(output.path());

    let second = create_coordinator(site).run_full_crawl().await.unwrap();
    let after = snapshot(output.path());

    let home = read(output.path(), "index.html");
    assert!(home.contains(&format!("/resources/{}.jpg 2x", content_hash(b"HERO-2X"))));

    assert_eq!(first.pages_generated, 2);
    assert_eq!(second.pages_generated, 2);
    assert_eq!(second.obsolete_pages_removed, 0);
    assert_eq!(second.obsolete_resources_removed, 0);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_obsolete_page_sweep_removes_one_page() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(&server, "/", "text/html", "<p>home</p>").await;
    std::fs::create_dir_all(output.path().join("gone/deeper")).unwrap();
    std::fs::write(output.path().join("gone/deeper/index.html"), "stale").unwrap();
    std::fs::create_dir_all(output.path().join("resources")).unwrap();
    std::fs::write(output.path().join("resources/orphan.css"), "x").unwrap();

    let mut site = create_test_site(&server, output.path(), &["/"]);
    site.remove_obsolete_pages = true;
    site.remove_obsolete_resources = true;

    let report = create_coordinator(site).run_full_crawl().await.unwrap();

    assert_eq!(report.obsolete_pages_removed, 1);
    assert_eq!(report.obsolete_resources_removed, 1);
    assert!(!output.path().join("gone").exists());
    assert!(output.path().join("index.html").is_file());
}

#[tokio::test]
async fn test_mirror_from_configuration() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    serve(&server, "/", "text/html", r#"<script src="/js/app.js"></script>"#).await;
    serve(&server, "/js/app.js", "text/javascript", "app();").await;

    let config = parse_config(&format!(
        r#"
[[site]]
name = "main"
origin-url = "{}/"
output-path = "{}"
use-routing = true

[[site.page]]
path = "/"
simple-address = "/home"

[[site]]
name = "other"
origin-url = "{}"
output-path = "{}"
enabled = false
"#,
        server.uri(),
        output.path().display().to_string().replace('\\', "/"),
        server.uri(),
        output.path().display().to_string().replace('\\', "/"),
    ))
    .unwrap();

    let reports = mirror(&config, &[], &StopSignal::new()).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].site, "main");
    assert_eq!(reports[0].pages_generated, 1);

    let script_url = format!("/resources/{}.js", content_hash(b"app();"));
    assert!(read(output.path(), "index.html").contains(&script_url));
    assert_eq!(read(output.path(), "index.html"), read(output.path(), "home/index.html"));

    let routes = read(output.path(), "routes.toml");
    assert!(routes.contains(r#"path = "home""#));
}

#[tokio::test]
async fn test_page_mode_skips_site_that_fails_to_start() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let broken_output = TempDir::new().unwrap();

    serve(&server, "/news/", "text/html", r#"<img src="/n.png">"#).await;
    serve(&server, "/n.png", "image/png", "NEWS").await;

    let mut config = parse_config(&format!(
        r#"
[[site]]
name = "main"
origin-url = "{}"
output-path = "{}"

[[site.page]]
path = "/news/"
"#,
        server.uri(),
        output.path().display().to_string().replace('\\', "/"),
    ))
    .unwrap();
    config
        .sites
        .insert(0, SiteConfig::new("broken", "not a url", broken_output.path()));

    let results = generate_pages(&config, &[], &["/news/".to_string()], &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let (site, outcomes) = &results[0];
    assert_eq!(site, "main");
    assert!(matches!(outcomes.as_slice(), [PageOutcome::Written { .. }]));
    assert!(read(output.path(), "news/index.html")
        .contains(&format!("/resources/{}.png", content_hash(b"NEWS"))));
}
