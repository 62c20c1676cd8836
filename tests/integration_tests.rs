//! Integration tests for the today-reader service
//!
//! These tests drive the full router against a mock publisher, from
//! configuration loading through discovery to serving pages.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn preview_body(page: usize) -> Vec<u8> {
        format!("jpeg bytes for page {}", page).into_bytes()
    }

    pub fn pdf_body(page: usize) -> Vec<u8> {
        format!("%PDF-1.4 bytes for page {}", page).into_bytes()
    }

    /// Config text pointing the upstream at `server`
    pub fn config_for(server: &MockServer) -> String {
        format!(
            r#"
            max_pages = 20
            refresh_timeout = 10
            fetch_timeout = 5

            [upstream]
            preview_url = "{uri}/styles/large/{{date}}_AP_page_{{page}}.jpg"
            pdf_url = "{uri}/files/{{date}}_AP_page_{{page}}.pdf"
            "#,
            uri = server.uri()
        )
    }

    /// Publish pages 1..=count for `date`; page count + 1 is missing
    pub async fn publish_edition(server: &MockServer, date: NaiveDate, count: usize) {
        let stamp = date.format("%Y%m%d");
        for page in 1..=count {
            Mock::given(method("GET"))
                .and(path(format!("/styles/large/{}_AP_page_{}.jpg", stamp, page)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(preview_body(page)))
                .mount(server)
                .await;
            Mock::given(method("GET"))
                .and(path(format!("/files/{}_AP_page_{}.pdf", stamp, page)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body(page)))
                .mount(server)
                .await;
        }
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use chrono::NaiveDate;
    use today_reader::config::Config;

    #[test]
    fn test_load_actual_config() {
        // Test loading the shipped today.toml from the project
        let config = Config::load("today.toml");
        assert!(config.is_ok(), "Failed to load today.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(config.max_pages > 0, "max_pages should be positive");
        assert_eq!(config.read_timeout, 10);
        assert_eq!(config.max_header_bytes, 1 << 20);
        assert_eq!(config.write_timeout, 600);
    }

    #[test]
    fn test_config_file_drives_url_construction() {
        let toml_content = r#"
            [upstream]
            preview_url = "http://files.example.com/large/{date}_AP_page_{page}.jpg"
            pdf_url = "http://files.example.com/{date}_AP_page_{page}.pdf"
            date_format = "%Y-%m-%d"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(
            config.upstream.preview_url(date, 3),
            "http://files.example.com/large/2024-03-09_AP_page_3.jpg"
        );
        assert_eq!(
            config.upstream.pdf_url(date, 12),
            "http://files.example.com/2024-03-09_AP_page_12.pdf"
        );
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::common::*;
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use std::path::Path;
    use std::sync::Arc;
    use today_reader::config::Config;
    use today_reader::paper::{effective_date, today, PaperCache};
    use today_reader::routes::{router, AppState};
    use wiremock::MockServer;

    async fn start(server: &MockServer) -> (TestServer, Arc<PaperCache>) {
        start_with_config(&config_for(server)).await
    }

    async fn start_with_config(config_text: &str) -> (TestServer, Arc<PaperCache>) {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_text.as_bytes()).unwrap();
        let config = Config::load(temp_file.path()).unwrap();

        let cache = Arc::new(PaperCache::from_config(&config).unwrap());
        let state = Arc::new(AppState {
            cache: cache.clone(),
        });
        let app = router(state, Path::new("public"));

        (TestServer::new(app).unwrap(), cache)
    }

    #[tokio::test]
    async fn test_index_then_download_pages() {
        let upstream = MockServer::start().await;
        publish_edition(&upstream, effective_date(today()), 3).await;
        let (server, cache) = start(&upstream).await;

        assert!(cache.needs_refresh().await);

        let index = server.get("/").await;
        assert_eq!(index.status_code(), StatusCode::OK);
        assert!(index.text().contains("3 pages"));

        let summary = cache.summary().await;
        assert_eq!(summary.page_count, 3);
        assert_eq!(summary.refreshed_on, Some(today()));
        assert!(!cache.needs_refresh().await);

        let pdf = server.get("/pdf/1").await;
        assert_eq!(pdf.status_code(), StatusCode::OK);
        assert_eq!(pdf.header("content-type"), "application/pdf");
        assert_eq!(&pdf.as_bytes()[..], &pdf_body(2)[..]);

        let missing = server.get("/pdf/5").await;
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pages_and_previews_stay_aligned() {
        let upstream = MockServer::start().await;
        publish_edition(&upstream, effective_date(today()), 4).await;
        let (server, _cache) = start(&upstream).await;

        server.get("/").await.assert_status_ok();

        for i in 0..4 {
            let image = server.get(&format!("/image/{}", i)).await;
            assert_eq!(image.header("content-type"), "image/jpeg");
            assert_eq!(&image.as_bytes()[..], &preview_body(i + 1)[..]);

            let pdf = server.get(&format!("/pdf/{}", i)).await;
            assert_eq!(&pdf.as_bytes()[..], &pdf_body(i + 1)[..]);
        }
    }

    #[tokio::test]
    async fn test_page_viewer_navigation() {
        let upstream = MockServer::start().await;
        publish_edition(&upstream, effective_date(today()), 3).await;
        let (server, _cache) = start(&upstream).await;
        server.get("/").await.assert_status_ok();

        let first = server.get("/page/0").await.text();
        assert!(first.contains("/page/1"));
        assert!(!first.contains("rel=\"prev\""));

        let last = server.get("/page/2").await.text();
        assert!(last.contains("/page/1"));
        assert!(!last.contains("rel=\"next\""));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_does_not_take_down_server() {
        // Nothing listens on port 1
        let (server, cache) = start_with_config(
            r#"
            [upstream]
            preview_url = "http://127.0.0.1:1/{date}_AP_page_{page}.jpg"
            pdf_url = "http://127.0.0.1:1/{date}_AP_page_{page}.pdf"
            "#,
        )
        .await;

        let index = server.get("/").await;
        assert_eq!(index.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(cache.page_count().await, 0);

        server.get("/health").await.assert_status_ok();
        let image = server.get("/image/0").await;
        assert_eq!(image.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_assets_are_served() {
        let upstream = MockServer::start().await;
        let (server, _cache) = start(&upstream).await;

        let css = server.get("/css/style.css").await;
        assert_eq!(css.status_code(), StatusCode::OK);

        let js = server.get("/js/reader.js").await;
        assert_eq!(js.status_code(), StatusCode::OK);

        let missing = server.get("/css/missing.css").await;
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }
}
