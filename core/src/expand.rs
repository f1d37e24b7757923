use std::collections::HashSet;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::client::ClientError;
use crate::merge::{self, MergeError};
use crate::models::TrackPage;

/// Hard cap of the catalog's batch detail endpoint (`/v1/tracks?ids=`).
pub const DETAIL_BATCH_LIMIT: usize = 50;

/// Page size used when walking an artist's album listing.
const ARTIST_ALBUMS_PAGE_LIMIT: u64 = 50;

#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("Catalog request failed: {0}")]
    Provider(#[from] ClientError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("Track {index} in the listing has no id")]
    MissingTrackId { index: usize },
    #[error("Detail lookup returned {actual} tracks for {expected} requested ids")]
    DetailCount { expected: usize, actual: usize },
    #[error("Artist '{0}' not found")]
    ArtistNotFound(String),
    #[error("Malformed catalog response: {0}")]
    Malformed(&'static str),
}

/// The catalog operations the expansion pipeline depends on. Implemented by
/// the real Web API client and by in-memory sources in tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn album(&self, album_id: &str, market: Option<&str>) -> Result<Value, ClientError>;

    async fn album_tracks(
        &self,
        album_id: &str,
        limit: u64,
        offset: u64,
        market: Option<&str>,
    ) -> Result<TrackPage, ClientError>;

    /// Full detail for up to [`DETAIL_BATCH_LIMIT`] track ids, in request order.
    async fn tracks(&self, ids: &[String], market: Option<&str>) -> Result<Vec<Value>, ClientError>;

    async fn artist(&self, artist_id: &str) -> Result<Value, ClientError>;

    /// Best match for an artist name, if any.
    async fn search_artist(&self, name: &str) -> Result<Option<Value>, ClientError>;

    async fn artist_albums(
        &self,
        artist_id: &str,
        include_group: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Value>, ClientError>;
}

/// Turns a partially-populated album into a complete one.
///
/// The album endpoint returns only the first page of tracks, and those track
/// stubs lack most fields. The expander paginates the listing to completeness,
/// pulls full detail through the batch endpoint, merges the detail into the
/// paginated skeleton without overwriting anything already present, and then
/// attaches the derived `mp3tag` block (disc total, compilation flag,
/// copyright, inferred genres).
pub struct Expander<S> {
    source: S,
}

impl<S: CatalogSource> Expander<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn expand_album(
        &self,
        album_id: &str,
        market: Option<&str>,
    ) -> Result<Value, ExpandError> {
        let mut album = self.source.album(album_id, market).await?;

        let (mut items, total, limit) = {
            let tracks = album
                .get_mut("tracks")
                .and_then(Value::as_object_mut)
                .ok_or(ExpandError::Malformed("album response has no 'tracks' object"))?;
            let total = tracks
                .get("total")
                .and_then(Value::as_u64)
                .ok_or(ExpandError::Malformed("track listing has no numeric 'total'"))?;
            let limit = tracks
                .get("limit")
                .and_then(Value::as_u64)
                .ok_or(ExpandError::Malformed("track listing has no numeric 'limit'"))?;
            let items = match tracks.get_mut("items").map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => return Err(ExpandError::Malformed("track listing has no 'items' array")),
            };
            (items, total, limit)
        };

        // Walk the remaining pages. `total` is a snapshot from the first page,
        // so a shrinking listing may yield fewer items; we never request past it.
        if limit > 0 {
            let mut offset = limit;
            while offset < total {
                let page = self
                    .source
                    .album_tracks(album_id, limit, offset, market)
                    .await?;
                items.extend(page.items);
                offset += limit;
            }
        }
        debug!("album {album_id}: {} of {total} tracks after pagination", items.len());

        let mut ids = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or(ExpandError::MissingTrackId { index })?;
            ids.push(id.to_string());
        }

        let mut detailed = Vec::with_capacity(ids.len());
        for batch in ids.chunks(DETAIL_BATCH_LIMIT) {
            detailed.extend(self.source.tracks(batch, market).await?);
        }
        if detailed.len() != items.len() {
            return Err(ExpandError::DetailCount {
                expected: items.len(),
                actual: detailed.len(),
            });
        }

        merge::merge_missing_by_id(&mut items, &detailed, "id")?;

        let disc_total = items
            .last()
            .and_then(|track| track.get("disc_number"))
            .cloned()
            .unwrap_or(json!(1));
        let track_count = items.len();

        {
            let tracks = album
                .get_mut("tracks")
                .and_then(Value::as_object_mut)
                .ok_or(ExpandError::Malformed("album response has no 'tracks' object"))?;
            tracks.insert("items".to_string(), Value::Array(items));
            tracks.remove("next");
            tracks.remove("previous");
            tracks.insert("limit".to_string(), json!(track_count));
        }

        let mut mp3tag = Map::new();
        if album.get("album_type").and_then(Value::as_str) == Some("compilation") {
            mp3tag.insert("compilation".to_string(), json!(1));
        }
        mp3tag.insert("disc_total".to_string(), disc_total);
        if let Some(text) = album
            .get("copyrights")
            .and_then(Value::as_array)
            .and_then(|copyrights| copyrights.first())
            .and_then(|entry| entry.get("text"))
        {
            mp3tag.insert("copyright".to_string(), text.clone());
        }
        mp3tag.insert(
            "genres".to_string(),
            Value::Array(self.inferred_genres(&album).await?),
        );

        album
            .as_object_mut()
            .ok_or(ExpandError::Malformed("album response is not an object"))?
            .insert("mp3tag".to_string(), Value::Object(mp3tag));

        Ok(album)
    }

    /// Collects genre tags from the album's contributing artists, capitalized
    /// and de-duplicated in first-seen order.
    async fn inferred_genres(&self, album: &Value) -> Result<Vec<Value>, ExpandError> {
        let artist_ids: Vec<String> = album
            .get("artists")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|artist| artist.get("id").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let mut genres = Vec::new();
        let mut seen = HashSet::new();
        for artist_id in &artist_ids {
            let artist = self.source.artist(artist_id).await?;
            let artist_genres = artist
                .get("genres")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(capitalize)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            for genre in artist_genres {
                if seen.insert(genre.clone()) {
                    genres.push(json!({ "text": genre }));
                }
            }
        }
        Ok(genres)
    }

    /// Resolves an artist by name and walks their full album listing, one
    /// include-group at a time (the combined filter misbehaves upstream).
    pub async fn albums_by_artist(
        &self,
        artist_name: &str,
        include_groups: &[&str],
    ) -> Result<(Value, Vec<Value>), ExpandError> {
        let artist = self
            .source
            .search_artist(artist_name)
            .await?
            .ok_or_else(|| ExpandError::ArtistNotFound(artist_name.to_string()))?;
        let artist_id = artist
            .get("id")
            .and_then(Value::as_str)
            .ok_or(ExpandError::Malformed("artist result has no id"))?
            .to_string();

        let mut albums = Vec::new();
        for group in include_groups {
            let mut offset = 0;
            loop {
                let page = self
                    .source
                    .artist_albums(&artist_id, group, ARTIST_ALBUMS_PAGE_LIMIT, offset)
                    .await?;
                if page.is_empty() {
                    break;
                }
                let fetched = page.len() as u64;
                albums.extend(page);
                if fetched < ARTIST_ALBUMS_PAGE_LIMIT {
                    break;
                }
                offset += ARTIST_ALBUMS_PAGE_LIMIT;
            }
        }
        debug!("artist {artist_id}: {} albums across {include_groups:?}", albums.len());

        Ok((artist, albums))
    }
}

/// Uppercases the first character and lowercases the rest, like the original
/// tag formatter did ("indie ROCK" becomes "Indie rock").
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
