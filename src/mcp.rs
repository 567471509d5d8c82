use crate::api::validate_source_url;
use crate::types::*;
use crate::{service, AppState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpToolsResponse {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallRequest {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpCallResponse {
    pub content: Vec<McpContent>,
    pub is_error: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl McpCallResponse {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![McpContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        }
    }
}

type McpError = (StatusCode, Json<ErrorResponse>);

fn missing(param: &str) -> McpError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(format!("Missing required parameter: {}", param))),
    )
}

pub async fn list_tools() -> Json<McpToolsResponse> {
    let tools = vec![
        McpTool {
            name: "scrape_listings".to_string(),
            description: "Scrape one page of marketplace search results into structured product listings (name, price, shipping, condition, location, series). Sponsored listings are skipped and duplicates removed; at most 50 products per page. Use next_page_url / has_next_page to paginate. If the marketplace blocks the request a single placeholder product may be returned.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Search results URL on the marketplace, e.g. https://www.ebay.com/sch/i.html?_nkw=nike"
                    },
                    "page": {
                        "type": "integer",
                        "minimum": 1,
                        "default": 1,
                        "description": "1-based results page to fetch"
                    },
                    "output_format": {
                        "type": "string",
                        "enum": ["text", "json"],
                        "default": "text",
                        "description": "'text' for a readable summary, 'json' for the raw result object"
                    }
                },
                "required": ["url"]
            }),
        },
        McpTool {
            name: "item_detail".to_string(),
            description: "Fetch a single item page and return its seller, item number and long description. Fields that cannot be found are returned as '-'.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Item page URL on the marketplace"
                    }
                },
                "required": ["url"]
            }),
        },
    ];

    Json(McpToolsResponse { tools })
}

fn render_listings(result: &ScrapeResult) -> String {
    if result.products.is_empty() {
        return format!("No products found on page {}.", result.current_page);
    }
    let mut text = format!(
        "Found {} products on page {}:\n\n",
        result.products.len(),
        result.current_page
    );
    for (i, p) in result.products.iter().enumerate() {
        text.push_str(&format!(
            "{}. **{}**\n   Price: {}  Shipping: {}\n   Condition: {}  Location: {}  Series: {}\n\n",
            i + 1,
            p.name,
            p.price,
            p.shipping,
            p.condition,
            p.location,
            p.series
        ));
    }
    match &result.next_page_url {
        Some(next) => text.push_str(&format!("Next page: {}\n", next)),
        None => text.push_str("No further pages.\n"),
    }
    text
}

pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<McpCallRequest>,
) -> Result<Json<McpCallResponse>, McpError> {
    info!("MCP tool call: {} with args: {:?}", request.name, request.arguments);

    let url = request
        .arguments
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing("url"))?;

    let url = match validate_source_url(&state, Some(url)) {
        Ok(url) => url,
        Err(message) => return Ok(Json(McpCallResponse::text(message, true))),
    };

    match request.name.as_str() {
        "scrape_listings" => {
            let page = request
                .arguments
                .get("page")
                .and_then(|v| v.as_u64())
                .map(|n| n.clamp(1, u32::MAX as u64) as u32)
                .unwrap_or(1);
            let output_format = request
                .arguments
                .get("output_format")
                .and_then(|v| v.as_str())
                .unwrap_or("text");

            match service::scrape_listings(&state, &url, page).await {
                Ok(result) => {
                    let text = if output_format == "json" {
                        serde_json::to_string_pretty(&result)
                            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize: {}"}}"#, e))
                    } else {
                        render_listings(&result)
                    };
                    Ok(Json(McpCallResponse::text(text, false)))
                }
                Err(e) => {
                    error!("Scrape tool error: {}", e);
                    Ok(Json(McpCallResponse::text(format!("Scraping failed: {}", e), true)))
                }
            }
        }
        "item_detail" => {
            let detail = service::fetch_item_detail(&state, &url).await;
            let text = serde_json::to_string_pretty(&detail)
                .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize: {}"}}"#, e));
            Ok(Json(McpCallResponse::text(text, false)))
        }
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(format!("Unknown tool: {}", request.name))),
        )),
    }
}
