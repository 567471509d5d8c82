use crate::types::*;
use crate::{mcp, service, AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use url::Url;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

/// Accept only absolute http(s) URLs on the profile's marketplace host.
pub fn validate_source_url(state: &AppState, url: Option<&str>) -> Result<String, String> {
    let invalid = || "Invalid eBay URL".to_string();
    let raw = url.map(str::trim).filter(|u| !u.is_empty()).ok_or_else(invalid)?;
    let parsed = Url::parse(raw).map_err(|_| invalid())?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid());
    }
    let host_ok = parsed
        .host_str()
        .is_some_and(|h| h.contains(state.profile.accepted_host.as_str()));
    if !host_ok {
        return Err(invalid());
    }
    Ok(raw.to_string())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/scrape", get(scrape_handler))
        .route("/item", get(item_handler))
        .route("/mcp/tools", get(mcp::list_tools))
        .route("/mcp/call", post(mcp::call_tool))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<Envelope<ScrapeResult>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    info!("Scrape request: url={:?} page={}", query.url, page);

    let url = validate_source_url(&state, query.url.as_deref()).map_err(|m| bad_request(&m))?;

    match service::scrape_listings(&state, &url, page).await {
        Ok(result) => {
            info!("Scrape result: {} products", result.products.len());
            Ok(Json(Envelope::success(result)))
        }
        Err(e) => {
            error!("Scrape error: {}", e);
            Err((StatusCode::BAD_GATEWAY, Json(ErrorResponse::new(e.to_string()))))
        }
    }
}

async fn item_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Envelope<ItemDetail>>, ApiError> {
    let url = validate_source_url(&state, query.url.as_deref()).map_err(|m| bad_request(&m))?;
    let detail = service::fetch_item_detail(&state, &url).await;
    Ok(Json(Envelope::success(detail)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceConfig, SiteProfile};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Arc<AppState>, Router) {
        let state = Arc::new(AppState::new(
            ServiceConfig::default(),
            SiteProfile::ebay(),
            reqwest::Client::new(),
        ));
        (state.clone(), router(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validate_source_url() {
        let (state, _) = app();
        let ok = validate_source_url(&state, Some("https://www.ebay.com/sch/i.html?_nkw=nike"));
        assert!(ok.is_ok());
        assert!(validate_source_url(&state, Some("https://www.amazon.com/s?k=nike")).is_err());
        assert!(validate_source_url(&state, Some("ftp://ebay.com/x")).is_err());
        assert!(validate_source_url(&state, Some("  ")).is_err());
        assert!(validate_source_url(&state, None).is_err());
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_scrape_rejects_foreign_url() {
        let (_, app) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/scrape?url=https%3A%2F%2Fexample.com%2Fsearch&page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Invalid eBay URL");
    }

    #[tokio::test]
    async fn test_scrape_serves_cached_result_in_envelope() {
        let (state, app) = app();
        let url = "https://www.ebay.com/sch/i.html?_nkw=nike";
        let cached = ScrapeResult {
            products: vec![SiteProfile::ebay().mock_product],
            current_page: 1,
            has_next_page: true,
            next_page_url: Some(format!("{}&_pgn=2", url)),
        };
        state.scrape_cache.insert(format!("{}|1", url), cached).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/scrape?url=https%3A%2F%2Fwww.ebay.com%2Fsch%2Fi.html%3F_nkw%3Dnike")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["hasNextPage"], true);
        assert_eq!(body["products"][0]["name"], "Nike Air Max 90 Essential");
    }
}
