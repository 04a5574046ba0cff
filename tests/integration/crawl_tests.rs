//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the fetch proxy and the
//! inference service, and exercise the full crawl cycle end-to-end.

use std::sync::Arc;
use std::time::Duration;
use sumi_harvest::config::{parse_config, Config, InferenceConfig, ProxyConfig};
use sumi_harvest::crawler::{
    ExtractedBy, ExtractionError, FallbackExtractor, FieldExtractor, HeuristicExtractor,
    InferenceExtractor, PageSource, ProxyFetcher, FETCH_FAILED,
};
use sumi_harvest::output::CrawlStatistics;
use sumi_harvest::{Coordinator, HarvestService};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START: &str = "https://www.ebay.com/sch/i.html?_nkw=boots&_pgn=1";
const PAGE2: &str = "https://www.ebay.com/sch/i.html?_nkw=boots&_pgn=2";

/// Pads markup past the proxy's minimum body length
fn page(body: &str) -> String {
    format!(
        "<html><head><title>Listing</title></head><body>{}<footer>{}</footer></body></html>",
        body,
        "Marketplace footer text. ".repeat(6)
    )
}

fn product_page(name: &str, price: &str) -> String {
    page(&format!(
        r#"<h1 class="x-item-title">{}</h1>
        <span class="x-bin-price">{}</span>
        <div class="item-desc">Lightly worn, no scuffs, ships in the original box.</div>"#,
        name, price
    ))
}

fn proxy_config(endpoint: &str, max_attempts: u32) -> ProxyConfig {
    ProxyConfig {
        endpoint: endpoint.to_string(),
        api_key: "test-key".to_string(),
        timeout_secs: 5,
        max_attempts,
        backoff_base_ms: 5,
        min_body_length: 100,
    }
}

fn inference_config(endpoint: &str) -> InferenceConfig {
    InferenceConfig {
        endpoint: endpoint.to_string(),
        api_key: Some("ai-key".to_string()),
        retry_delay_ms: 5,
        ..InferenceConfig::default()
    }
}

/// Creates a test configuration pointing the proxy at the mock server
fn create_test_config(proxy_endpoint: &str) -> Config {
    let toml = format!(
        r#"
        [proxy]
        endpoint = "{}"
        api-key = "test-key"
        max-attempts = 2
        backoff-base-ms = 5
        timeout-secs = 5

        [crawler]
        start-url = "{}"
        max-pages = 5
        page-delay-ms = 0
        item-delay-ms = 0
        max-concurrent-items = 2
        "#,
        proxy_endpoint, START
    );

    parse_config(&toml, |_| None).expect("Test config should parse")
}

/// Mounts a proxied page for `target`
async fn mount_target(server: &MockServer, target: &str, html: String) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("url", target))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn test_proxy_fetch_passes_key_and_target() {
    let server = MockServer::start().await;
    let target = "https://www.ebay.com/itm/42?var=1";

    mount_target(&server, target, page("<h1>Found</h1>")).await;

    let fetcher = ProxyFetcher::new(&proxy_config(&server.uri(), 3)).unwrap();
    let result = fetcher.fetch(target).await;

    assert!(result.ok);
    assert_eq!(result.url, target);
    assert!(result.html.contains("<h1>Found</h1>"));
}

#[tokio::test]
async fn test_proxy_fetch_gives_up_after_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = ProxyFetcher::new(&proxy_config(&server.uri(), 3)).unwrap();
    let result = fetcher.fetch("https://www.ebay.com/itm/1").await;

    assert!(!result.ok);
    assert!(result.html.is_empty());
}

#[tokio::test]
async fn test_proxy_short_body_is_retried() {
    let server = MockServer::start().await;

    // First response is too short to be a real page
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("<h1>Second try</h1>")))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = ProxyFetcher::new(&proxy_config(&server.uri(), 3)).unwrap();
    let result = fetcher.fetch("https://www.ebay.com/itm/1").await;

    assert!(result.ok);
    assert!(result.html.contains("Second try"));
}

#[tokio::test]
async fn test_proxy_timeout_is_retried() {
    let server = MockServer::start().await;

    // First response stalls past the 1 second attempt timeout
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page("<h1>Too late</h1>"))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page("<h1>On time</h1>")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProxyConfig {
        timeout_secs: 1,
        ..proxy_config(&server.uri(), 3)
    };
    let fetcher = ProxyFetcher::new(&config).unwrap();
    let result = fetcher.fetch("https://www.ebay.com/itm/7").await;

    assert!(result.ok);
    assert!(result.html.contains("On time"));
    assert!(!result.html.contains("Too late"));
}

#[tokio::test]
async fn test_full_crawl_through_proxy() {
    let server = MockServer::start().await;

    mount_target(
        &server,
        START,
        page(
            r#"
            <a href="/itm/1001">Boots one</a>
            <a href="/itm/1002">Boots two</a>
            <a href="/itm/1003?_trksid=p2380057">Boots three</a>
            <a href="https://www.ebay.com/itm/123456">Placeholder</a>
            <a class="pagination__next" href="/sch/i.html?_nkw=boots&_pgn=2">Next</a>
            "#,
        ),
    )
    .await;

    mount_target(
        &server,
        PAGE2,
        page(
            r#"
            <a href="/itm/1002#reviews">Boots two again</a>
            <a href="/itm/1004">Boots four</a>
            "#,
        ),
    )
    .await;

    mount_target(&server, "https://www.ebay.com/itm/1001", product_page("Red Wing Iron Ranger", "US $250.00")).await;
    mount_target(&server, "https://www.ebay.com/itm/1003", product_page("Dr. Martens 1460", "US $120.00")).await;
    mount_target(&server, "https://www.ebay.com/itm/1004", product_page("Blundstone 500", "US $180.00")).await;
    // 1002 is never served, so the proxy answers 404

    let config = create_test_config(&server.uri());
    let coordinator = Coordinator::from_config(&config).unwrap();

    let result = coordinator.run_crawl(START, config.crawler.max_pages).await;

    let urls: Vec<&str> = result.records.iter().map(|r| r.source_url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://www.ebay.com/itm/1001",
            "https://www.ebay.com/itm/1002",
            "https://www.ebay.com/itm/1003",
            "https://www.ebay.com/itm/1004",
        ]
    );
    assert_eq!(result.pages_scraped, 2);

    assert_eq!(result.records[0].name, "Red Wing Iron Ranger");
    assert_eq!(result.records[0].price, "US $250.00");
    assert_eq!(result.records[0].extracted_by, ExtractedBy::Heuristic);

    assert_eq!(result.records[1].name, "-");
    assert_eq!(result.records[1].extracted_by, ExtractedBy::None);
    assert_eq!(result.records[1].error.as_deref(), Some(FETCH_FAILED));

    let stats = CrawlStatistics::from_result(&result);
    assert_eq!(stats.attempted, 4);
    assert_eq!(stats.named, 3);
    assert_eq!(stats.degraded, 1);
}

#[tokio::test]
async fn test_service_scrape_through_proxy() {
    let server = MockServer::start().await;

    mount_target(&server, START, page(r#"<a href="/itm/2001">Only</a>"#)).await;
    mount_target(&server, "https://www.ebay.com/itm/2001", product_page("Chelsea Boot", "$75.00")).await;

    let config = create_test_config(&server.uri());
    let service = HarvestService::new(Coordinator::from_config(&config).unwrap());

    let report = service
        .scrape(START, 1, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.products.len(), 1);
    let stored = service.product(report.products[0].id).await.unwrap();
    assert_eq!(stored.record.name, "Chelsea Boot");
}

#[tokio::test]
async fn test_inference_reply_as_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer ai-key"))
        .and(body_string_contains("gpt-3.5-turbo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"name": "Nike Air Max 90", "price": "$99.99", "description": "Classic runner"}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = InferenceExtractor::new(&inference_config(&format!(
        "{}/v1/chat/completions",
        server.uri()
    )))
    .unwrap();

    let fields = extractor.extract(&product_page("ignored", "$1.00")).await.unwrap();

    assert_eq!(fields.name, "Nike Air Max 90");
    assert_eq!(fields.price, "$99.99");
    assert_eq!(fields.description, "Classic runner");
    assert_eq!(fields.extracted_by, ExtractedBy::Ai);
}

#[tokio::test]
async fn test_inference_prose_reply_is_salvaged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"Here is what I found. name: "Adidas Samba OG", price: "$100.00""#,
        )))
        .mount(&server)
        .await;

    let extractor = InferenceExtractor::new(&inference_config(&server.uri())).unwrap();
    let fields = extractor.extract("<h1>x</h1>").await.unwrap();

    assert_eq!(fields.name, "Adidas Samba OG");
    assert_eq!(fields.price, "$100.00");
    assert_eq!(fields.description, "-");
    assert_eq!(fields.extracted_by, ExtractedBy::Ai);
}

#[tokio::test]
async fn test_inference_nameless_reply_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            r#"{"name": "-", "price": "$5.00", "description": "-"}"#,
        )))
        .expect(2)
        .mount(&server)
        .await;

    let extractor = InferenceExtractor::new(&inference_config(&server.uri())).unwrap();
    let error = extractor.extract("<p>nothing</p>").await.unwrap_err();

    assert!(matches!(error, ExtractionError::Exhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn test_inference_outage_falls_back_to_heuristic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let html = product_page("Timberland 6-Inch Premium", "US $198.00");
    let heuristic = Arc::new(HeuristicExtractor::new().unwrap());
    let fallback = FallbackExtractor::new(
        Arc::new(InferenceExtractor::new(&inference_config(&server.uri())).unwrap()),
        heuristic.clone(),
    );

    let fields = fallback.extract_fields(&html).await;

    assert_eq!(fields, heuristic.extract_fields(&html));
    assert_eq!(fields.name, "Timberland 6-Inch Premium");
    assert_eq!(fields.extracted_by, ExtractedBy::Heuristic);
}
