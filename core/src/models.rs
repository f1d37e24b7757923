/*
    spotify-expander | Spotify proxy and album deep-expansion service.
    Copyright (C) 2025  The spotify-expander developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a paginated track listing, as returned by the catalog.
///
/// Items stay schema-less (`Value`): the expansion pipeline merges them with
/// detail lookups rather than projecting them into a fixed shape.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackPage {
    pub items: Vec<Value>,
    pub total: u64,
    pub limit: u64,
}

/// Flat row of the artist-albums CSV export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistAlbumRow {
    pub release_date: String,
    pub album_type: String,
    pub albumartist: String,
    pub name: String,
    pub id: String,
    pub total_tracks: u64,
    pub external_url: String,
}

const CSV_HEADER: [&str; 7] = [
    "release_date",
    "album_type",
    "albumartist",
    "name",
    "id",
    "total_tracks",
    "external_url",
];

impl ArtistAlbumRow {
    /// Extracts the export columns from a raw album object. Absent fields
    /// become empty strings (or zero for the track count) rather than errors.
    pub fn from_album(album: &Value, albumartist: &str) -> Self {
        let text = |key: &str| {
            album
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            release_date: text("release_date"),
            album_type: text("album_type"),
            albumartist: albumartist.to_string(),
            name: text("name"),
            id: text("id"),
            total_tracks: album
                .get("total_tracks")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            external_url: album
                .pointer("/external_urls/spotify")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn fields(&self) -> [String; 7] {
        [
            self.release_date.clone(),
            self.album_type.clone(),
            self.albumartist.clone(),
            self.name.clone(),
            self.id.clone(),
            self.total_tracks.to_string(),
            self.external_url.clone(),
        ]
    }
}

/// Renders the CSV document for the album export: UTF-8 BOM (for Excel),
/// header row, CRLF line endings, fields quoted when they need it.
pub fn albums_to_csv(rows: &[ArtistAlbumRow]) -> String {
    let mut out = String::from("\u{feff}");
    push_record(&mut out, CSV_HEADER.iter().copied());
    for row in rows {
        let fields = row.fields();
        push_record(&mut out, fields.iter().map(String::as_str));
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&csv_escape(field));
    }
    out.push_str("\r\n");
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_page_deserializes_from_catalog_json() {
        let page: TrackPage = serde_json::from_value(json!({
            "items": [{"id": "t1"}, {"id": "t2"}],
            "total": 120,
            "limit": 50,
            "offset": 0,
            "next": "https://api.spotify.com/v1/...",
        }))
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 120);
        assert_eq!(page.limit, 50);
    }

    #[test]
    fn test_row_extraction_defaults() {
        let album = json!({
            "name": "Album",
            "id": "alb1",
            "external_urls": {"spotify": "https://open.spotify.com/album/alb1"}
        });
        let row = ArtistAlbumRow::from_album(&album, "Artist");

        assert_eq!(row.name, "Album");
        assert_eq!(row.albumartist, "Artist");
        assert_eq!(row.release_date, "");
        assert_eq!(row.total_tracks, 0);
        assert_eq!(row.external_url, "https://open.spotify.com/album/alb1");
    }

    #[test]
    fn test_csv_quoting_and_layout() {
        let rows = vec![ArtistAlbumRow {
            release_date: "2001-05-01".to_string(),
            album_type: "album".to_string(),
            albumartist: "Quote \"Me\", Please".to_string(),
            name: "Plain".to_string(),
            id: "alb1".to_string(),
            total_tracks: 12,
            external_url: String::new(),
        }];

        let csv = albums_to_csv(&rows);
        assert!(csv.starts_with('\u{feff}'));

        let mut lines = csv.trim_start_matches('\u{feff}').split("\r\n");
        assert_eq!(
            lines.next().unwrap(),
            "release_date,album_type,albumartist,name,id,total_tracks,external_url"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("\"Quote \"\"Me\"\", Please\""));
        assert!(row.starts_with("2001-05-01,album,"));
        assert!(row.ends_with(",alb1,12,"));
    }

    #[test]
    fn test_csv_row_with_embedded_newline_quotes_the_field() {
        let rows = vec![ArtistAlbumRow {
            release_date: String::new(),
            album_type: "single".to_string(),
            albumartist: "A".to_string(),
            name: "Two\nLines".to_string(),
            id: "x".to_string(),
            total_tracks: 1,
            external_url: String::new(),
        }];
        let csv = albums_to_csv(&rows);
        assert!(csv.contains("\"Two\nLines\""));
    }
}
