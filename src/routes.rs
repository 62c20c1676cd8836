use std::path::Path as FsPath;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;
use tracing::error;

use crate::paper::{PaperCache, RefreshError};

pub struct AppState {
    pub cache: Arc<PaperCache>,
}

/// Build the application router. Static assets are served from `static_dir`.
pub fn router(state: Arc<AppState>, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/page/:num", get(page))
        .route("/pdf/:num", get(pdf))
        .route("/image/:num", get(image))
        .route("/health", get(health))
        .nest_service("/css", ServeDir::new(static_dir.join("css")))
        .nest_service("/fonts", ServeDir::new(static_dir.join("fonts")))
        .nest_service("/js", ServeDir::new(static_dir.join("js")))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub page_count: usize,
    pub refreshed_on: String,
    pub pages: Vec<usize>,
}

#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub nav: PageNav,
}

/// Identifiers for the page viewer. `pre` and `next` are empty at either end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNav {
    pub pre: String,
    pub cur: String,
    pub next: String,
}

impl PageNav {
    pub fn new(num: usize, page_count: usize) -> Self {
        let pre = if num > 0 {
            (num - 1).to_string()
        } else {
            String::new()
        };
        let next = if num < page_count.saturating_sub(1) {
            (num + 1).to_string()
        } else {
            String::new()
        };

        Self {
            pre,
            cur: num.to_string(),
            next,
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                error!("Failed to render template: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to render template: {}", err),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid page number: {0}")]
    InvalidPage(String),

    #[error("page {0} not found")]
    PageNotFound(usize),

    #[error("could not refresh today's paper: {0}")]
    Refresh(#[from] RefreshError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidPage(_) => StatusCode::BAD_REQUEST,
            AppError::PageNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Refresh(RefreshError::Fetch(_)) => StatusCode::BAD_GATEWAY,
            AppError::Refresh(RefreshError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
        };

        if status.is_server_error() {
            error!("{}", self);
        }

        (status, format!("Error: {}", self)).into_response()
    }
}

fn parse_page_num(raw: &str) -> Result<usize, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidPage(raw.to_string()))
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let summary = state.cache.ensure_fresh().await?;

    Ok(HtmlTemplate(IndexTemplate {
        page_count: summary.page_count,
        refreshed_on: summary
            .refreshed_on
            .map(|d| d.format("%A, %-d %B %Y").to_string())
            .unwrap_or_default(),
        pages: (0..summary.page_count).collect(),
    }))
}

pub async fn page(
    State(state): State<Arc<AppState>>,
    Path(num): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let num = parse_page_num(&num)?;
    let page_count = state.cache.page_count().await;

    Ok(HtmlTemplate(PageTemplate {
        nav: PageNav::new(num, page_count),
    }))
}

pub async fn pdf(
    State(state): State<Arc<AppState>>,
    Path(num): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let num = parse_page_num(&num)?;
    let body = state
        .cache
        .pdf(num)
        .await
        .ok_or(AppError::PageNotFound(num))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"page-{}.pdf\"", num),
            ),
        ],
        body,
    ))
}

pub async fn image(
    State(state): State<Arc<AppState>>,
    Path(num): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let num = parse_page_num(&num)?;
    let body = state
        .cache
        .preview(num)
        .await
        .ok_or(AppError::PageNotFound(num))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], body))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.cache.is_refreshing() {
        Html("OK (refreshing)")
    } else {
        Html("OK")
    }
}
