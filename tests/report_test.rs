use clap::Parser;
use queryprobe::auth::AuthError;
use queryprobe::error::FatalError;
use queryprobe::options::Cli;
use queryprobe::report::{SiteOutcome, run_report, select_sites};
use queryprobe::sitemap::SitemapError;
use queryprobe::storage::{MemorySink, OutputSink};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sitemap_xml(sites: &[&str]) -> String {
    let entries: String = sites
        .iter()
        .map(|s| format!("  <url><loc>{}</loc></url>\n", s))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>",
        entries
    )
}

fn one_row(query: &str, clicks: u64) -> serde_json::Value {
    json!({
        "rows": [
            {"keys": [query], "clicks": clicks, "impressions": 100, "ctr": 0.12, "position": 3.5}
        ]
    })
}

fn cli_for(server: &MockServer, extra_args: &[&str]) -> Cli {
    let sitemap_url = format!("{}/sitemap.xml", server.uri());
    let mut args = vec![
        "queryprobe".to_string(),
        sitemap_url,
        "2015-05-01".to_string(),
        "2015-05-30".to_string(),
        "--access-token".to_string(),
        "test-token".to_string(),
        "--api-base".to_string(),
        server.uri(),
    ];
    args.extend(extra_args.iter().map(|a| a.to_string()));
    Cli::parse_from(args)
}

async fn mount_sitemap(server: &MockServer, sites: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_xml(sites)))
        .mount(server)
        .await;
}

async fn mount_site(server: &MockServer, host_pattern: &str, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path_regex(format!(
            r"^/webmasters/v3/sites/https%3A%2F%2F{}%2F/searchAnalytics/query$",
            host_pattern
        )))
        .respond_with(template)
        .expect(1)
        .mount(server)
        .await;
}

fn permission_denied() -> ResponseTemplate {
    ResponseTemplate::new(403).set_body_json(json!({
        "error": {"code": 403, "message": "User does not have sufficient permission", "status": "PERMISSION_DENIED"}
    }))
}

#[test]
fn test_select_sites_caps_in_order() {
    let urls: Vec<String> = (0..10).map(|i| format!("https://s{}.example/", i)).collect();

    assert_eq!(select_sites(vec![], 4), Vec::<String>::new());
    assert_eq!(select_sites(urls[..1].to_vec(), 4), urls[..1].to_vec());
    assert_eq!(select_sites(urls[..4].to_vec(), 4), urls[..4].to_vec());
    assert_eq!(select_sites(urls.clone(), 4), urls[..4].to_vec());
}

#[tokio::test]
async fn test_failing_site_is_skipped() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/", "https://b.example/"]).await;
    mount_site(
        &server,
        r"a\.example",
        ResponseTemplate::new(200).set_body_json(one_row("shoes", 12)),
    )
    .await;
    mount_site(&server, r"b\.example", permission_denied()).await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone())
        .await
        .expect("Run should complete");

    assert_eq!(
        sink.contents(),
        "keys,clicks,impressions,ctr,position,property\n\
         shoes,12,100,0.12,3.5,https://a.example/\n"
    );
    assert_eq!(summary.rows_written, 1);
    assert!(summary.header_written);
    assert_eq!(summary.sites[0].outcome, SiteOutcome::Written(1));

    let metrics = summary.metrics();
    assert_eq!(metrics.value("Sites Queried"), Some("2"));
    assert_eq!(metrics.value("Failed"), Some("1"));
    assert_eq!(metrics.value("Rows Written"), Some("1"));

    let failed = summary.failed_sites();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].site_url, "https://b.example/");
    match &failed[0].outcome {
        SiteOutcome::Failed(reason) => assert!(reason.contains("PERMISSION_DENIED")),
        other => panic!("Expected a failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_site_after_failure_is_still_processed() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/", "https://b.example/"]).await;
    mount_site(&server, r"a\.example", ResponseTemplate::new(500)).await;
    mount_site(
        &server,
        r"b\.example",
        ResponseTemplate::new(200).set_body_json(one_row("boots", 7)),
    )
    .await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone())
        .await
        .expect("Run should complete");

    let contents = sink.contents();
    assert!(!contents.contains("https://a.example/"));
    assert!(contents.ends_with("boots,7,100,0.12,3.5,https://b.example/\n"));
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed_sites().len(), 1);
}

#[tokio::test]
async fn test_at_most_four_sites_are_queried() {
    let server = MockServer::start().await;
    let sites: Vec<String> = (0..12).map(|i| format!("https://site{}.example/", i)).collect();
    let site_refs: Vec<&str> = sites.iter().map(String::as_str).collect();
    mount_sitemap(&server, &site_refs).await;

    Mock::given(method("POST"))
        .and(path_regex(r"/searchAnalytics/query$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row("shoes", 1)))
        .expect(4)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone())
        .await
        .expect("Run should complete");

    assert_eq!(summary.discovered, 12);
    assert_eq!(summary.sites.len(), 4);
    let queried: Vec<&str> = summary.sites.iter().map(|s| s.site_url.as_str()).collect();
    assert_eq!(queried, site_refs[..4]);
    // Header plus one row per site.
    assert_eq!(sink.contents().lines().count(), 5);
}

#[tokio::test]
async fn test_site_limit_option() {
    let server = MockServer::start().await;
    mount_sitemap(
        &server,
        &["https://a.example/", "https://b.example/", "https://c.example/"],
    )
    .await;

    Mock::given(method("POST"))
        .and(path_regex(r"/searchAnalytics/query$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row("shoes", 1)))
        .expect(2)
        .mount(&server)
        .await;

    let summary = run_report(&cli_for(&server, &["--site-limit", "2"]), MemorySink::new())
        .await
        .expect("Run should complete");

    assert_eq!(summary.sites.len(), 2);
}

#[tokio::test]
async fn test_fewer_sites_than_limit() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/"]).await;
    mount_site(
        &server,
        r"a\.example",
        ResponseTemplate::new(200).set_body_json(one_row("shoes", 1)),
    )
    .await;

    let summary = run_report(&cli_for(&server, &[]), MemorySink::new())
        .await
        .expect("Run should complete");

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.sites.len(), 1);
}

#[tokio::test]
async fn test_empty_sitemap_queries_nothing() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &[]).await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone())
        .await
        .expect("Run should complete");

    assert_eq!(summary.discovered, 0);
    assert!(summary.sites.is_empty());
    assert!(!sink.has_data().unwrap());
}

#[tokio::test]
async fn test_header_written_once_across_runs() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/"]).await;

    Mock::given(method("POST"))
        .and(path_regex(r"a\.example"))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row("shoes", 12)))
        .expect(2)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let first = run_report(&cli_for(&server, &[]), sink.clone()).await.unwrap();
    let second = run_report(&cli_for(&server, &[]), sink.clone()).await.unwrap();

    assert!(first.header_written);
    assert!(!second.header_written);

    let contents = sink.contents();
    let header_lines = contents
        .lines()
        .filter(|line| line.starts_with("keys,"))
        .count();
    assert_eq!(header_lines, 1);
    // No de-duplication: the same row is appended twice.
    assert_eq!(contents.lines().count(), 3);
}

#[tokio::test]
async fn test_header_comes_from_first_site_with_rows() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/", "https://b.example/"]).await;
    mount_site(
        &server,
        r"a\.example",
        ResponseTemplate::new(200).set_body_json(json!({"responseAggregationType": "byProperty"})),
    )
    .await;
    mount_site(
        &server,
        r"b\.example",
        ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{"keys": ["hat"], "clicks": 2, "impressions": 5}]
        })),
    )
    .await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone()).await.unwrap();

    assert_eq!(summary.sites[0].outcome, SiteOutcome::NoData);
    assert_eq!(summary.sites[1].outcome, SiteOutcome::Written(1));
    assert_eq!(
        sink.contents(),
        "keys,clicks,impressions,property\nhat,2,5,https://b.example/\n"
    );
}

#[tokio::test]
async fn test_no_rows_anywhere_leaves_output_untouched() {
    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/"]).await;
    mount_site(
        &server,
        r"a\.example",
        ResponseTemplate::new(200).set_body_json(json!({})),
    )
    .await;

    let sink = MemorySink::new();
    let summary = run_report(&cli_for(&server, &[]), sink.clone()).await.unwrap();

    assert_eq!(summary.rows_written, 0);
    assert!(!summary.header_written);
    assert_eq!(sink.contents(), "");
}

#[tokio::test]
async fn test_row_limit_is_sent() {
    use wiremock::matchers::body_partial_json;

    let server = MockServer::start().await;
    mount_sitemap(&server, &["https://a.example/"]).await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"rowLimit": 25, "dimensions": ["query"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(one_row("shoes", 1)))
        .expect(1)
        .mount(&server)
        .await;

    run_report(&cli_for(&server, &["--row-limit", "25"]), MemorySink::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sitemap_failure_is_fatal() {
    let server = MockServer::start().await;
    // No sitemap mounted: 404.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = MemorySink::new();
    let result = run_report(&cli_for(&server, &[]), sink.clone()).await;

    assert!(matches!(
        result,
        Err(FatalError::Sitemap(SitemapError::Fetch { .. }))
    ));
    assert_eq!(sink.contents(), "");
}

#[tokio::test]
async fn test_missing_credentials_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut options = cli_for(&server, &[]);
    options.access_token = None;
    options.credentials_file = None;

    let result = run_report(&options, MemorySink::new()).await;
    assert!(matches!(
        result,
        Err(FatalError::Auth(AuthError::MissingCredentials))
    ));
}
