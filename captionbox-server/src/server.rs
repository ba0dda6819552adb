use crate::config::Config;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use captionbox_core::{AssetDescriptor, AssetRegistry, CaptionboxError, Namespace, Result};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub registry: AssetRegistry,
    pub config: Config,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    filename: String,
    text_filename: String,
    description: String,
    image_url: String,
    text_url: String,
}

#[derive(Debug, Serialize)]
struct AssetView {
    filename: String,
    original_filename: String,
    description: String,
    upload_time: f64,
    image_url: String,
    text_url: String,
}

#[derive(Debug, Serialize)]
struct AssetResponse {
    success: bool,
    #[serde(flatten)]
    asset: AssetView,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    success: bool,
    count: usize,
    images: Vec<AssetView>,
}

/// Turns any failure into the `{success: false, message}` envelope.
enum ApiError {
    Core(CaptionboxError),
    /// The request body went over `server.max_upload_bytes`.
    TooLarge(String),
}

impl From<CaptionboxError> for ApiError {
    fn from(error: CaptionboxError) -> Self {
        Self::Core(error)
    }
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Core(CaptionboxError::InvalidInput(message.into()))
    }

    fn multipart(context: &str, error: MultipartError) -> Self {
        if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge(format!("{}: upload exceeds size limit", context))
        } else {
            Self::bad_request(format!("{}: {}", context, error))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::TooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
            ApiError::Core(error) => {
                let status = match &error {
                    CaptionboxError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    CaptionboxError::NotFound(_) | CaptionboxError::BlobNotFound { .. } => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", error);
                }
                (status, error.to_string())
            }
        };

        let body = MessageResponse {
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

pub async fn run_server(config: Config) -> Result<()> {
    let registry = AssetRegistry::from_config(&config.storage)?;
    let bind_addr = config.server.bind_addr.clone();

    let state = Arc::new(ServerState { registry, config });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(health_handler))
        .route("/upload", post(upload_image))
        .route("/images", get(list_images))
        .route("/image/:filename", get(get_image_info))
        .route("/images/:filename", get(serve_image))
        .route("/texts/:filename", get(serve_text))
        .route("/clear_all", get(clear_all))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> ApiResult<impl IntoResponse> {
    let count = state.registry.indexed_count().await?;

    let response = serde_json::json!({
        "status": "ok",
        "count": count,
    });

    Ok((StatusCode::OK, Json(response)))
}

async fn upload_image(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut image: Option<(Option<String>, Bytes)> = None;
    let mut description = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::multipart("malformed multipart body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" if image.is_none() => {
                let file_name = field.file_name().map(|name| name.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::multipart("failed to read image", e))?;
                image = Some((file_name, data));
            }
            "description" => {
                description = field
                    .text()
                    .await
                    .map_err(|e| ApiError::multipart("failed to read description", e))?;
            }
            _ => {}
        }
    }

    let (file_name, data) = image.ok_or_else(|| ApiError::bad_request("no image file uploaded"))?;
    let file_name = file_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::bad_request("no file selected"))?;

    let descriptor = state
        .registry
        .upload(data, &file_name, &description)
        .await?;

    let base = base_url(&state.config, &headers);
    let text_filename = descriptor.text_filename.clone();
    let view = asset_view(&base, descriptor);

    Ok(Json(UploadResponse {
        success: true,
        message: "image uploaded".to_string(),
        filename: view.filename,
        text_filename,
        description: view.description,
        image_url: view.image_url,
        text_url: view.text_url,
    }))
}

async fn list_images(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ListResponse>> {
    let assets = state.registry.list().await?;
    let base = base_url(&state.config, &headers);

    let images: Vec<AssetView> = assets
        .into_iter()
        .map(|descriptor| asset_view(&base, descriptor))
        .collect();

    Ok(Json(ListResponse {
        success: true,
        count: images.len(),
        images,
    }))
}

async fn get_image_info(
    State(state): State<Arc<ServerState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<AssetResponse>> {
    let descriptor = state.registry.get(&filename).await?;
    let base = base_url(&state.config, &headers);

    Ok(Json(AssetResponse {
        success: true,
        asset: asset_view(&base, descriptor),
    }))
}

async fn serve_image(
    State(state): State<Arc<ServerState>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    serve_blob(&state, Namespace::Images, &filename).await
}

async fn serve_text(
    State(state): State<Arc<ServerState>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    serve_blob(&state, Namespace::Texts, &filename).await
}

async fn serve_blob(state: &ServerState, namespace: Namespace, filename: &str) -> ApiResult<Response> {
    let data = state.registry.read_blob(namespace, filename).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type_for(filename))],
        data,
    )
        .into_response())
}

async fn clear_all(State(state): State<Arc<ServerState>>) -> ApiResult<Json<MessageResponse>> {
    state.registry.clear().await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "all images and descriptions cleared".to_string(),
    }))
}

fn asset_view(base: &str, descriptor: AssetDescriptor) -> AssetView {
    AssetView {
        image_url: format!("{}/images/{}", base, descriptor.filename),
        text_url: format!("{}/texts/{}", base, descriptor.text_filename),
        filename: descriptor.filename,
        original_filename: descriptor.original_filename,
        description: descriptor.description,
        upload_time: descriptor.upload_time,
    }
}

/// Absolute URL prefix for links in responses.
fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(public_url) = config.server.public_url() {
        return public_url.to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .unwrap_or(&config.server.bind_addr);

    format!("http://{}", host)
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
