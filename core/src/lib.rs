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

pub mod auth;
pub mod client;
pub mod expand;
pub mod merge;
pub mod models;

// Re-export key items for convenience
pub use auth::get_spotify_auth;
pub use client::{ClientError, RawResponse, SpotifyApi};
pub use expand::{CatalogSource, ExpandError, Expander, DETAIL_BATCH_LIMIT};
pub use merge::{is_missing, merge_missing_by_id, MergeError};
pub use models::{albums_to_csv, ArtistAlbumRow, TrackPage};
