// Tests for LinkResolver against a mocked listing page
// Uses mockito for HTTP mocking

use std::collections::HashMap;

use chrono::NaiveDate;
use mockito::{Matcher, Server};
use node_price_reports::fetch_error::FetchError;
use node_price_reports::http_client::build_client;
use node_price_reports::link_resolver::LinkResolver;

fn create_test_resolver(base_url: String) -> LinkResolver {
    let client = build_client(std::time::Duration::from_secs(10)).unwrap();
    LinkResolver::new(client, base_url)
}

fn listing_query(region: &str, rdate: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("rname".into(), "big_nodes_prices_pub".into()),
        Matcher::UrlEncoded("region".into(), region.into()),
        Matcher::UrlEncoded("rdate".into(), rdate.into()),
    ])
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
}

#[tokio::test]
async fn test_resolve_single_link() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/nreport")
        .match_query(listing_query("eur", "20250127"))
        .with_status(200)
        .with_body(
            r#"<html><body>
            <a href="?fid=4F2A">20250127_eur_big_nodes_prices_pub.xls</a>
            <a href="?fid=4F2B&amp;zip=1">20250127_eur_big_nodes_prices_pub.zip</a>
            </body></html>"#,
        )
        .create_async()
        .await;

    let resolver = create_test_resolver(format!("{}/nreport", server.url()));
    let link = resolver.resolve(date(), "eur").await.unwrap();

    assert_eq!(link.url, format!("{}/nreport?fid=4F2A", server.url()));
    assert_eq!(link.region, "eur");
    assert_eq!(link.date, date());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_resolve_no_links() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/nreport")
        .match_query(listing_query("eur", "20250127"))
        .with_status(200)
        .with_body("<html><body>Отчет не опубликован</body></html>")
        .create_async()
        .await;

    let resolver = create_test_resolver(format!("{}/nreport", server.url()));
    let result = resolver.resolve(date(), "eur").await;

    match result {
        Err(FetchError::LinkNotFound { url }) => assert!(url.contains("rdate=20250127")),
        other => panic!("Expected LinkNotFound, got {other:?}"),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_resolve_ambiguous_links() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/nreport")
        .match_query(listing_query("eur", "20250127"))
        .with_status(200)
        .with_body(
            r#"<a href="?fid=1">20250127_eur_big_nodes_prices_pub.xls</a>
               <a href="?fid=2">20250127_sib_big_nodes_prices_pub.xls</a>"#,
        )
        .create_async()
        .await;

    let resolver = create_test_resolver(format!("{}/nreport", server.url()));
    let result = resolver.resolve(date(), "eur").await;

    match result {
        Err(FetchError::LinkAmbiguous { count, .. }) => assert_eq!(count, 2),
        other => panic!("Expected LinkAmbiguous, got {other:?}"),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_resolve_strict_text_disambiguates() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/nreport")
        .match_query(listing_query("sib", "20250127"))
        .with_status(200)
        .with_body(
            r#"<a href="?fid=1">20250127_eur_big_nodes_prices_pub.xls</a>
               <a href="?fid=2">20250127_sib_big_nodes_prices_pub.xls</a>"#,
        )
        .create_async()
        .await;

    let resolver =
        create_test_resolver(format!("{}/nreport", server.url())).with_strict_link_text(true);
    let link = resolver.resolve(date(), "sib").await.unwrap();

    assert_eq!(link.url, format!("{}/nreport?fid=2", server.url()));
}

#[tokio::test]
async fn test_resolve_region_override_keeps_caller_region() {
    let mut server = Server::new_async().await;

    // "hydro" reports are listed under the "eur" listing
    let mock = server
        .mock("GET", "/nreport")
        .match_query(listing_query("eur", "20250127"))
        .with_status(200)
        .with_body(r#"<a href="?fid=77">20250127_hydro_big_nodes_prices_pub.xls</a>"#)
        .create_async()
        .await;

    let overrides = HashMap::from([("hydro".to_string(), "eur".to_string())]);
    let resolver =
        create_test_resolver(format!("{}/nreport", server.url())).with_region_overrides(overrides);
    let link = resolver.resolve(date(), "hydro").await.unwrap();

    assert_eq!(link.region, "hydro");
    assert!(link.url.ends_with("?fid=77"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_resolve_non_200_status() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/nreport")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let resolver = create_test_resolver(format!("{}/nreport", server.url()));
    let result = resolver.resolve(date(), "eur").await;

    match result {
        Err(FetchError::Status { status, url }) => {
            assert_eq!(status, 503);
            assert!(url.contains("region=eur"));
        }
        other => panic!("Expected Status error, got {other:?}"),
    }

    mock.assert_async().await;
}

#[test]
fn test_error_display() {
    let err = FetchError::LinkAmbiguous {
        url: "https://example/nreport".to_string(),
        count: 3,
    };
    assert!(err.to_string().contains("3"));
    assert!(err.to_string().contains("https://example/nreport"));

    let err = FetchError::Status {
        url: "https://example/nreport".to_string(),
        status: 404,
    };
    assert!(err.to_string().contains("404"));
}
