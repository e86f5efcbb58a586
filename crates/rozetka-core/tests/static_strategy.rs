use rozetka_core::scraper::Pacing;
use rozetka_core::{scrape, PageLayout, ProductRecord, ScrapeConfig, ScrapeError, Strategy};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRODUCT: &str = include_str!("fixtures/product.html");
const CHARACTERISTICS: &str = include_str!("fixtures/characteristics.html");

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn config(server: &MockServer) -> ScrapeConfig {
    ScrapeConfig {
        product_url: format!("{}/product/", server.uri()),
        typing: Pacing::none(),
        settle: Pacing::none(),
        wait_timeout: Duration::from_secs(1),
        navigation_timeout: Duration::from_secs(5),
        block_backoff: Duration::ZERO,
        ..Default::default()
    }
}

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn static_scrape_fills_the_whole_record() {
    let server = MockServer::start().await;
    serve(&server, "/product/", PRODUCT).await;
    serve(&server, "/product/characteristics/", CHARACTERISTICS).await;

    let record = scrape(Strategy::Static, &config(&server), &PageLayout::default())
        .await
        .unwrap();

    let expected = ProductRecord {
        name: Some("Product X".into()),
        regular_price: Some(999),
        promotional_price: Some(799),
        color: Some("Red".into()),
        memory_size: Some(128),
        product_code: Some(395460480),
        number_of_reviews: Some(42),
        series: Some("X Series".into()),
        screen_diagonal: Some("6.1\"".into()),
        display_resolution: Some("2556x1179".into()),
        seller: Some("Rozetka".into()),
        photos: vec![
            "https://content.example/goods/1.jpg".into(),
            "https://content.example/goods/2.jpg".into(),
            "https://content.example/goods/1.jpg".into(),
        ],
        specifications: record.specifications.clone(),
    };
    assert_eq!(record, expected);

    let specs = serde_json::to_value(record.specifications.unwrap()).unwrap();
    assert_eq!(
        specs,
        serde_json::json!({
            "section_0": {
                "Діагональ екрана": "6.1\"",
                "Роздільна здатність дисплея": "2556x1179"
            },
            "section_1": {}
        })
    );
}

#[tokio::test]
async fn missing_characteristics_page_leaves_specifications_empty() {
    let server = MockServer::start().await;
    serve(&server, "/product/", PRODUCT).await;
    Mock::given(method("GET"))
        .and(path("/product/characteristics/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = scrape(Strategy::Static, &config(&server), &PageLayout::default())
        .await
        .unwrap();

    assert_eq!(record.name.as_deref(), Some("Product X"));
    assert_eq!(record.regular_price, Some(999));
    assert_eq!(record.specifications, None);
}

#[tokio::test]
async fn challenge_is_retried_until_the_page_comes_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/product/", PRODUCT).await;
    serve(&server, "/product/characteristics/", CHARACTERISTICS).await;

    let record = scrape(Strategy::Static, &config(&server), &PageLayout::default())
        .await
        .unwrap();

    assert_eq!(record.name.as_deref(), Some("Product X"));
    assert!(record.specifications.is_some());

    let requests = server.received_requests().await.unwrap();
    let product_hits = requests
        .iter()
        .filter(|r| r.url.path() == "/product/")
        .count();
    assert_eq!(product_hits, 2);
}

#[tokio::test]
async fn persistent_challenge_is_fatal() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/product/",
        "<html><head><title>Just a moment...</title></head><body></body></html>",
    )
    .await;

    let config = ScrapeConfig {
        block_retries: 1,
        ..config(&server)
    };
    let err = scrape(Strategy::Static, &config, &PageLayout::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::Blocked { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_product_page_yields_an_empty_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let record = scrape(Strategy::Static, &config(&server), &PageLayout::default())
        .await
        .unwrap();

    assert_eq!(record, ProductRecord::default());
}

#[tokio::test]
async fn slow_product_page_completes_with_an_empty_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/product/"))
        .respond_with(html(PRODUCT).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = ScrapeConfig {
        navigation_timeout: Duration::from_millis(300),
        ..config(&server)
    };
    let record = scrape(Strategy::Static, &config, &PageLayout::default())
        .await
        .unwrap();

    assert_eq!(record, ProductRecord::default());
}
