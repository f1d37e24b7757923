use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use expander_core::{albums_to_csv, ArtistAlbumRow, ClientError, ExpandError};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/{*path}", any(proxy))
        .route("/mp3tag/album/{album_id}", get(expand_album))
        .route(
            "/spmusic/albums/by-artist/{artist_name}",
            get(albums_by_artist),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Headers that describe this hop's transfer, not the payload. The outbound
/// client already decompressed the body, so they must not be forwarded.
const HOP_BY_HOP_HEADERS: [&str; 4] = [
    "content-encoding",
    "transfer-encoding",
    "content-length",
    "connection",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|header| name.eq_ignore_ascii_case(header))
}

/// Transparent pass-through to the catalog API. The query string and body are
/// forwarded untouched; only the bearer token is added upstream.
async fn proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut target = format!("/v1/{path}");
    if let Some(query) = query {
        target.push('?');
        target.push_str(&query);
    }

    let upstream = state.api.raw(method, &target, body.to_vec()).await?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut headers = HeaderMap::new();
    for (name, value) in &upstream.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            headers.insert(name, value);
        }
    }

    Ok((status, headers, Body::from(upstream.body)).into_response())
}

#[derive(Debug, Deserialize)]
struct ExpandQuery {
    /// Two-letter market code, e.g. ?market=US
    market: Option<String>,
}

fn is_valid_market(market: &str) -> bool {
    market.len() == 2 && market.bytes().all(|b| b.is_ascii_alphabetic())
}

async fn expand_album(
    State(state): State<AppState>,
    Path(album_id): Path<String>,
    Query(params): Query<ExpandQuery>,
) -> Result<Json<Value>, ApiError> {
    if let Some(market) = &params.market {
        if !is_valid_market(market) {
            return Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "market must be a two-letter country code",
            ));
        }
    }

    let album = state
        .expander
        .expand_album(&album_id, params.market.as_deref())
        .await?;
    Ok(Json(album))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AlbumsQuery {
    /// Return CSV if true, else JSON
    #[serde(default)]
    down: bool,
    /// Include appears_on albums
    #[serde(default)]
    appears: bool,
    /// Include compilations
    #[serde(default = "default_true")]
    compilation: bool,
}

fn csv_filename(artist_name: &str) -> String {
    format!("{}_spotify_albums.csv", artist_name.replace(' ', "_"))
}

async fn albums_by_artist(
    State(state): State<AppState>,
    Path(artist_name): Path<String>,
    Query(params): Query<AlbumsQuery>,
) -> Result<Response, ApiError> {
    let mut include_groups = vec!["album", "single"];
    if params.appears {
        include_groups.push("appears_on");
    }
    if params.compilation {
        include_groups.push("compilation");
    }

    let (artist, albums) = state
        .expander
        .albums_by_artist(&artist_name, &include_groups)
        .await?;

    if params.down {
        let rows: Vec<ArtistAlbumRow> = albums
            .iter()
            .map(|album| ArtistAlbumRow::from_album(album, &artist_name))
            .collect();
        let headers = [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", csv_filename(&artist_name)),
            ),
        ];
        Ok((headers, albums_to_csv(&rows)).into_response())
    } else {
        Ok(Json(json!({ "artist": artist, "albums": albums })).into_response())
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match &err {
            // The upstream status is the most honest one to return.
            ClientError::Status { status, message } => ApiError::new(
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                message.clone(),
            ),
            ClientError::Transport(_) => ApiError::new(StatusCode::BAD_GATEWAY, err.to_string()),
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl From<ExpandError> for ApiError {
    fn from(err: ExpandError) -> Self {
        match err {
            ExpandError::ArtistNotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, err.to_string())
            }
            ExpandError::Provider(client_err) => client_err.into(),
            ExpandError::Merge(_)
            | ExpandError::MissingTrackId { .. }
            | ExpandError::DetailCount { .. }
            | ExpandError::Malformed(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}
