use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use anyhow::Context;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use depot_core::{FileRecord, LevelControl};
use depot_engine::Coordinator;
use tokio::net::TcpListener;
use tokio_util::io::StreamReader;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::ApiError;

const FILE_FIELD: &str = "file";
const NAME_FIELD: &str = "name";
const DEFAULT_PAGE_SIZE: u64 = 100;

/// Everything a request handler needs.
pub struct DepotServer {
    pub coordinator: Coordinator,
    /// Directory blobs are written to and read from.
    pub storage_folder: PathBuf,
    pub levels: Arc<dyn LevelControl>,
    pub max_page_size: u64,
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
struct AppState {
    server: Arc<DepotServer>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LogLevelRequest {
    layer: String,
    level: String,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    code: u16,
    message: String,
}

impl MessageBody {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreatedBody {
    code: u16,
    message: &'static str,
    id: String,
    name: String,
    size_bytes: u64,
}

#[derive(Debug, Serialize)]
struct ListBody {
    code: u16,
    message: &'static str,
    limit: u64,
    offset: u64,
    files: Vec<FileRecord>,
}

#[derive(Debug, Serialize)]
struct LevelsBody {
    code: u16,
    message: &'static str,
    levels: BTreeMap<String, String>,
}

impl DepotServer {
    pub fn router(self: Arc<Self>) -> Router {
        let body_limit = self.max_upload_bytes;
        let app_state = AppState { server: self };

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/healthz", get(healthz))
            .route("/files", get(list_files).post(upload_file))
            .route("/files/:id", get(download_file).delete(delete_file))
            .route("/buckets", post(add_bucket))
            .route("/admin/log-level", put(set_log_level).get(get_log_levels))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Bind and serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self: Arc<Self>, host: &str, port: u16, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let storage_folder = self.storage_folder.clone();
        let app = self.router();

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!(
            storage = %storage_folder.display(),
            "depot listening on {}",
            addr
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("server error")?;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let terminate = async {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Received SIGINT, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

/// GET /healthz
async fn healthz(State(state): State<AppState>) -> Response {
    match state.server.coordinator.health_check().await {
        Ok(()) => Json(MessageBody::new(StatusCode::OK, "Alive!")).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            let status = StatusCode::SERVICE_UNAVAILABLE;
            (status, Json(MessageBody::new(status, e.message()))).into_response()
        }
    }
}

/// GET /files?limit=&offset=
async fn list_files(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(state.server.max_page_size);
    let offset = params.offset.unwrap_or(0);

    let page = state.server.coordinator.list_files(limit, offset).await?;
    debug!(limit, offset, returned = page.len(), "Listed files");

    Ok(Json(ListBody {
        code: StatusCode::OK.as_u16(),
        message: "Ok",
        limit: page.limit,
        offset: page.offset,
        files: page.records,
    })
    .into_response())
}

/// POST /files (multipart)
///
/// The `file` part is streamed straight into the coordinator. Its filename is
/// the logical name unless a `name` part arrives before it.
async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut name_override: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(NAME_FIELD) => {
                name_override = Some(field.text().await.map_err(bad_multipart)?);
            }
            Some(FILE_FIELD) => {
                let logical_name = name_override
                    .take()
                    .or_else(|| field.file_name().map(str::to_string))
                    .unwrap_or_default();

                let reader = StreamReader::new(Box::pin(field.map_err(io::Error::other)));
                let record = state
                    .server
                    .coordinator
                    .write_file(Some(reader), &logical_name, &state.server.storage_folder)
                    .await?;

                return Ok((
                    StatusCode::CREATED,
                    Json(CreatedBody {
                        code: StatusCode::CREATED.as_u16(),
                        message: "File created",
                        id: record.id,
                        name: record.logical_name,
                        size_bytes: record.size_bytes,
                    }),
                )
                    .into_response());
            }
            other => debug!(field = ?other, "Ignoring multipart field"),
        }
    }

    Err(ApiError::bad_request(format!(
        "missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// GET /files/:id
async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .server
        .coordinator
        .get_file(&id, &state.server.storage_folder)
        .await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe(&file.record.logical_name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response())
}

/// DELETE /files/:id
async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    state
        .server
        .coordinator
        .delete_file(&id, &state.server.storage_folder)
        .await?;
    Ok(Json(MessageBody::new(StatusCode::OK, "File deleted")))
}

/// POST /buckets
///
/// Buckets are not modelled yet; the endpoint only acknowledges the call.
async fn add_bucket() -> Json<MessageBody> {
    Json(MessageBody::new(StatusCode::OK, "Bucket created"))
}

/// PUT /admin/log-level
async fn set_log_level(
    State(state): State<AppState>,
    body: Result<Json<LogLevelRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.server.levels.set_level(&req.layer, &req.level)?;

    info!(layer = %req.layer, level = %req.level, "Log level changed");
    Ok(Json(MessageBody::new(
        StatusCode::OK,
        format!("Logging level for {} set to {}", req.layer, req.level),
    )))
}

/// GET /admin/log-level
async fn get_log_levels(State(state): State<AppState>) -> Json<LevelsBody> {
    Json(LevelsBody {
        code: StatusCode::OK.as_u16(),
        message: "Ok",
        levels: state.server.levels.levels(),
    })
}

fn bad_multipart(err: MultipartError) -> ApiError {
    ApiError::bad_request(err.body_text())
}

/// Keep a name usable inside a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_safe() {
        assert_eq!(header_safe("report 2024.pdf"), "report 2024.pdf");
        assert_eq!(header_safe("a\"b\\c"), "a_b_c");
        assert_eq!(header_safe("résumé\n.txt"), "r_sum__.txt");
    }
}
