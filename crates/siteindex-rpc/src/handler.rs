//! JSON-RPC request handlers.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use siteindex::{
    Document, IndexValue, MemoryDocumentSource, Operator, SearchOptions, SiteIndex,
    SiteIndexError, SortDirection,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state, method, &params).await {
        Ok(value) => (StatusCode::OK, Json(JsonRpcResponse::success(id, value))),
        Err(e) => {
            // Full error (may include SQL) goes to the log only
            error!("RPC error for {}: {}", method, e);
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(
                    id,
                    e.to_rpc_error_code(),
                    e.user_message(),
                )),
            )
        }
    }
}

// ============================================================================
// Helper macros for extracting parameters
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
macro_rules! get_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_str())
    };
}

/// Extract a required string parameter or return an error.
macro_rules! require_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        match get_str_param!($params, $snake, $camel) {
            Some(s) => s.to_string(),
            None => {
                return Err(SiteIndexError::invalid_argument(format!(
                    "Missing required parameter: {}",
                    $snake
                )));
            }
        }
    };
}

/// Extract an optional bool parameter.
macro_rules! get_bool_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_bool())
    };
}

/// Extract an optional non-negative integer parameter.
macro_rules! get_usize_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
    };
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Every method touches the shared connection, so the whole call runs on the
/// blocking pool and never holds the connection lock on a runtime worker.
async fn dispatch_method(
    state: &Arc<AppState>,
    method: &str,
    params: &Value,
) -> siteindex::Result<Value> {
    let documents_path = state.documents_path.clone();
    let method = method.to_string();
    let params = params.clone();
    run_blocking(Arc::clone(&state.site), move |site| {
        dispatch_blocking(site, documents_path.as_deref(), &method, &params)
    })
    .await
}

fn dispatch_blocking(
    site: &SiteIndex,
    documents_path: Option<&Path>,
    method: &str,
    params: &Value,
) -> siteindex::Result<Value> {
    match method {
        // ====================================================================
        // Search
        // ====================================================================
        "search" => {
            let query = require_str_param!(params, "query", "query");
            let options = SearchOptions {
                limit: get_usize_param!(params, "limit", "limit"),
                offset: get_usize_param!(params, "offset", "offset").unwrap_or(0),
                listable_only: get_bool_param!(params, "listable_only", "listableOnly")
                    .unwrap_or(false),
                templates: string_list(params.get("templates")),
            };
            let results = site.search().search(&query, &options)?;

            if get_bool_param!(params, "record", "record").unwrap_or(true) {
                if let Err(e) = site.search().record_query(&query, results.total) {
                    warn!("Failed to log search query: {}", e);
                }
            }
            Ok(serde_json::to_value(results)?)
        }

        "highlight" => {
            let html = require_str_param!(params, "html", "html");
            let query = require_str_param!(params, "query", "query");
            Ok(json!({ "html": site.search().highlight(&html, &query) }))
        }

        "popular_keywords" => {
            let limit = get_usize_param!(params, "limit", "limit")
                .unwrap_or(siteindex::text::DEFAULT_KEYWORD_LIMIT);
            Ok(serde_json::to_value(site.search().popular_keywords(limit)?)?)
        }

        // ====================================================================
        // Structured indexes
        // ====================================================================
        "list" => list(site, params),

        "list_indexes" => Ok(json!(site.index_names())),

        "get_stats" => match get_str_param!(params, "index", "index") {
            Some(name) => Ok(serde_json::to_value(site.get_stats(name)?)?),
            None => Ok(serde_json::to_value(site.all_stats()?)?),
        },

        // ====================================================================
        // Rebuilds and incremental updates
        // ====================================================================
        "rebuild" => {
            let name = require_str_param!(params, "index", "index");
            let source = load_documents(documents_path)?;
            Ok(serde_json::to_value(site.rebuild_index(&name, &source)?)?)
        }

        "rebuild_search" => {
            let source = load_documents(documents_path)?;
            Ok(serde_json::to_value(
                site.search().rebuild_from_source(&source)?,
            )?)
        }

        "rebuild_all" => {
            let source = load_documents(documents_path)?;
            Ok(serde_json::to_value(site.rebuild_all(&source))?)
        }

        "upsert_document" => {
            let document: Document = serde_json::from_value(
                params
                    .get("document")
                    .cloned()
                    .ok_or_else(|| missing_param("document"))?,
            )
            .map_err(|e| SiteIndexError::invalid_argument(format!("Invalid document: {}", e)))?;
            let outcomes: serde_json::Map<String, Value> = site
                .upsert_document(&document)
                .into_iter()
                .map(|(name, outcome)| {
                    let value = match outcome {
                        Ok(outcome) => json!(outcome),
                        Err(e) => json!({ "status": "error", "error": e.user_message() }),
                    };
                    (name, value)
                })
                .collect();
            Ok(Value::Object(outcomes))
        }

        "remove_document" => {
            let page_id = require_str_param!(params, "page_id", "pageId");
            let template = require_str_param!(params, "template", "template");
            let removed = site.remove_document(&Document::new(page_id, template))?;
            Ok(json!({ "removed": removed }))
        }

        _ => Err(SiteIndexError::NotFound {
            what: format!("method {}", method),
        }),
    }
}

fn missing_param(name: &str) -> SiteIndexError {
    SiteIndexError::invalid_argument(format!("Missing required parameter: {}", name))
}

/// Read the document file fresh for each rebuild.
fn load_documents(documents_path: Option<&Path>) -> siteindex::Result<MemoryDocumentSource> {
    let path = documents_path.ok_or_else(|| SiteIndexError::Config {
        message: "no document source configured (start with --documents)".to_string(),
    })?;
    MemoryDocumentSource::from_path(path)
}

/// Run a synchronous index operation off the async runtime.
async fn run_blocking<F>(site: Arc<SiteIndex>, f: F) -> siteindex::Result<Value>
where
    F: FnOnce(&SiteIndex) -> siteindex::Result<Value> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&site))
        .await
        .map_err(|e| SiteIndexError::Query {
            message: format!("background task failed: {}", e),
            source: None,
        })?
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn index_value(value: &Value) -> siteindex::Result<IndexValue> {
    Ok(match value {
        Value::Null => IndexValue::Null,
        Value::Bool(b) => IndexValue::from(*b),
        Value::String(s) => IndexValue::from(s.as_str()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => IndexValue::Integer(i),
            None => IndexValue::Real(n.as_f64().unwrap_or_default()),
        },
        other => {
            return Err(SiteIndexError::invalid_argument(format!(
                "Unsupported filter value: {}",
                other
            )))
        }
    })
}

fn date_param(value: Option<&Value>, name: &str) -> siteindex::Result<NaiveDate> {
    let raw = value
        .and_then(|v| v.as_str())
        .ok_or_else(|| missing_param(name))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        SiteIndexError::invalid_argument(format!("{} must be YYYY-MM-DD, got {:?}", name, raw))
    })
}

/// Structured listing over one index.
///
/// ```json
/// {
///   "index": "events",
///   "where": [{ "column": "featured", "op": "=", "value": 1 }],
///   "contains": [{ "column": "categories", "values": ["Botany"] }],
///   "dates": [{ "column": "start_date", "from": "2025-01-01", "to": "2025-12-31" }],
///   "order_by": [{ "column": "start_date", "direction": "asc" }],
///   "limit": 10,
///   "offset": 0
/// }
/// ```
fn list(site: &SiteIndex, params: &Value) -> siteindex::Result<Value> {
    let name = require_str_param!(params, "index", "index");
    let mut query = site.registry().require(&name)?.query();

    for clause in array_param(params, "where") {
        let column = require_str_param!(clause, "column", "column");
        let op = get_str_param!(clause, "op", "op").unwrap_or("=");
        let value = index_value(clause.get("value").unwrap_or(&Value::Null))?;
        query = query.where_cmp(&column, Operator::from_str(op)?, value);
    }

    for clause in array_param(params, "contains") {
        let column = require_str_param!(clause, "column", "column");
        let values = string_list(clause.get("values").or_else(|| clause.get("value")));
        query = query.where_contains_any(&column, &values);
    }

    for clause in array_param(params, "dates") {
        let column = require_str_param!(clause, "column", "column");
        query = match (clause.get("from"), clause.get("to"), clause.get("before")) {
            (Some(from), Some(to), _) => query.where_date_between(
                &column,
                date_param(Some(from), "from")?,
                date_param(Some(to), "to")?,
            ),
            (Some(from), None, _) => {
                query.where_date_on_or_after(&column, date_param(Some(from), "from")?)
            }
            (None, _, Some(before)) => {
                query.where_date_before(&column, date_param(Some(before), "before")?)
            }
            _ => {
                return Err(SiteIndexError::invalid_argument(
                    "date clause needs from, from/to or before",
                ))
            }
        };
    }

    for clause in array_param(params, "order_by") {
        let column = require_str_param!(clause, "column", "column");
        let direction = match get_str_param!(clause, "direction", "direction") {
            Some(d) => SortDirection::from_str(d)?,
            None => SortDirection::Asc,
        };
        query = query.order_by(&column, direction);
    }

    let total = query.count()?;
    if let Some(limit) = get_usize_param!(params, "limit", "limit") {
        query = query.limit(limit);
    }
    if let Some(offset) = get_usize_param!(params, "offset", "offset") {
        query = query.offset(offset);
    }

    let page_ids = query.get_page_ids()?;
    Ok(json!({ "total": total, "pageIds": page_ids }))
}

fn array_param<'a>(params: &'a Value, name: &str) -> &'a [Value] {
    params
        .get(name)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
