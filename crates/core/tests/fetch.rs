use std::time::{Duration, Instant};

use ideaforge_core::tools::fetch::{fetch_all, is_error_marker, FetchOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn slow_page(server: &MockServer, route: &str, body: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failures_are_isolated_and_fetches_overlap() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(400);
    slow_page(&server, "/a", "<p>Page A</p>", delay).await;
    slow_page(&server, "/b", "<p>Page B</p>", delay).await;
    slow_page(&server, "/c", "<p>Page C</p>", delay).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut urls: Vec<String> = ["/a", "/b", "/c", "/broken"]
        .iter()
        .map(|p| format!("{}{}", server.uri(), p))
        .collect();
    urls.push("http://127.0.0.1:9/unreachable".to_string());

    let started = Instant::now();
    let results = fetch_all(&urls, &FetchOptions::default()).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 5);
    assert_eq!(results[&urls[0]], "Page A");
    assert_eq!(results[&urls[1]], "Page B");
    assert_eq!(results[&urls[2]], "Page C");
    assert!(is_error_marker(&results[&urls[3]]));
    assert!(is_error_marker(&results[&urls[4]]));
    assert!(
        elapsed < delay * 2,
        "fetches ran sequentially: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_timeout_only_affects_slow_url() {
    let server = MockServer::start().await;
    slow_page(&server, "/fast", "<p>fast</p>", Duration::ZERO).await;
    slow_page(&server, "/slow", "<p>slow</p>", Duration::from_secs(3)).await;

    let urls = vec![
        format!("{}/fast", server.uri()),
        format!("{}/slow", server.uri()),
    ];
    let options = FetchOptions {
        timeout: Duration::from_millis(300),
        ..FetchOptions::default()
    };

    let results = fetch_all(&urls, &options).await;
    assert_eq!(results[&urls[0]], "fast");
    assert!(is_error_marker(&results[&urls[1]]));
}

#[tokio::test]
async fn test_duplicate_urls_fetch_once_and_truncate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>abcdefghij</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/long", server.uri());
    let options = FetchOptions {
        max_chars: 4,
        ..FetchOptions::default()
    };

    let results = fetch_all(&[url.clone(), url.clone()], &options).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[&url], "abcd");
}
