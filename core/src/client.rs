use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Method;
use rspotify::ClientCredsSpotify;
use serde_json::Value;
use thiserror::Error;

use crate::auth::{self, AuthError};
use crate::expand::{CatalogSource, DETAIL_BATCH_LIMIT};
use crate::models::TrackPage;

const API_ROOT: &str = "https://api.spotify.com";
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request to the catalog failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Catalog returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Unexpected catalog response shape: {0}")]
    Decode(String),
    #[error("Batch of {0} ids exceeds the catalog limit of {DETAIL_BATCH_LIMIT}")]
    BatchTooLarge(usize),
}

/// Raw upstream response handed back to the reverse proxy.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Thin JSON client for the Spotify Web API.
///
/// Auth is delegated to the injected `rspotify` handle; every call injects the
/// bearer token it yields. Responses are kept as schema-less `Value` trees so
/// the expansion pipeline can merge them without a fixed schema.
#[derive(Clone)]
pub struct SpotifyApi {
    http: reqwest::Client,
    auth: ClientCredsSpotify,
}

impl SpotifyApi {
    pub fn new(auth: ClientCredsSpotify) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()?;
        Ok(Self { http, auth })
    }

    async fn get_json(&self, path_and_query: &str) -> Result<Value, ClientError> {
        let token = auth::bearer(&self.auth).await?;
        debug!("GET {path_and_query}");

        let response = self
            .http
            .get(format!("{API_ROOT}{path_and_query}"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json().await?)
    }

    /// Forwards an arbitrary request to the catalog, injecting the bearer
    /// token. The body is attached only when non-empty, and response headers
    /// come back as they arrived (hop-by-hop filtering is the caller's job).
    pub async fn raw(
        &self,
        method: Method,
        path_and_query: &str,
        body: Vec<u8>,
    ) -> Result<RawResponse, ClientError> {
        let token = auth::bearer(&self.auth).await?;
        debug!("proxy {method} {path_and_query}");

        let mut request = self
            .http
            .request(method, format!("{API_ROOT}{path_and_query}"))
            .bearer_auth(token);
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl CatalogSource for SpotifyApi {
    async fn album(&self, album_id: &str, market: Option<&str>) -> Result<Value, ClientError> {
        let mut path = format!("/v1/albums/{}", urlencoding::encode(album_id));
        if let Some(market) = market {
            path.push_str(&format!("?market={}", urlencoding::encode(market)));
        }
        self.get_json(&path).await
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u64,
        offset: u64,
        market: Option<&str>,
    ) -> Result<TrackPage, ClientError> {
        let mut path = format!(
            "/v1/albums/{}/tracks?limit={limit}&offset={offset}",
            urlencoding::encode(album_id)
        );
        if let Some(market) = market {
            path.push_str(&format!("&market={}", urlencoding::encode(market)));
        }
        let body = self.get_json(&path).await?;
        serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn tracks(&self, ids: &[String], market: Option<&str>) -> Result<Vec<Value>, ClientError> {
        if ids.len() > DETAIL_BATCH_LIMIT {
            return Err(ClientError::BatchTooLarge(ids.len()));
        }

        let mut path = format!(
            "/v1/tracks?ids={}",
            urlencoding::encode(&ids.join(","))
        );
        if let Some(market) = market {
            path.push_str(&format!("&market={}", urlencoding::encode(market)));
        }

        let mut body = self.get_json(&path).await?;
        match body.get_mut("tracks").map(Value::take) {
            Some(Value::Array(tracks)) => Ok(tracks),
            _ => Err(ClientError::Decode(
                "tracks response has no 'tracks' array".to_string(),
            )),
        }
    }

    async fn artist(&self, artist_id: &str) -> Result<Value, ClientError> {
        self.get_json(&format!("/v1/artists/{}", urlencoding::encode(artist_id)))
            .await
    }

    async fn search_artist(&self, name: &str) -> Result<Option<Value>, ClientError> {
        let path = format!(
            "/v1/search?q={}&type=artist&limit=1",
            urlencoding::encode(name)
        );
        let mut body = self.get_json(&path).await?;
        match body
            .pointer_mut("/artists/items")
            .map(Value::take)
        {
            Some(Value::Array(mut items)) if !items.is_empty() => Ok(Some(items.swap_remove(0))),
            Some(Value::Array(_)) => Ok(None),
            _ => Err(ClientError::Decode(
                "search response has no 'artists.items' array".to_string(),
            )),
        }
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        include_group: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Value>, ClientError> {
        let path = format!(
            "/v1/artists/{}/albums?include_groups={}&limit={limit}&offset={offset}",
            urlencoding::encode(artist_id),
            urlencoding::encode(include_group)
        );
        let mut body = self.get_json(&path).await?;
        match body.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ClientError::Decode(
                "artist albums response has no 'items' array".to_string(),
            )),
        }
    }
}

/// Pulls the human-readable message out of the provider's error envelope
/// (`{"error": {"status": ..., "message": ...}}`), falling back to the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
