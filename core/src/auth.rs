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

use rspotify::{ClientCredsSpotify, Config, Credentials};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to initialize Spotify client: {0}")]
    ClientConfig(String),
    #[error("Spotify authentication failed: {0}")]
    Spotify(#[from] rspotify::ClientError),
    #[error("Token cache is empty or unavailable")]
    TokenCache,
}

/// Initializes and authenticates a Spotify client using the Client Credentials Flow.
///
/// This function:
/// 1. Reads credentials (`RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET`) from the environment.
/// 2. Requests an initial application token (no user interaction involved).
/// 3. Enables token refreshing, so expired tokens are re-requested on demand.
///
/// The returned handle is cheap to clone and is constructed once per process;
/// the catalog client borrows it for every outbound call.
pub async fn get_spotify_auth() -> Result<ClientCredsSpotify, AuthError> {
    // Load credentials from env. `rspotify` expects RSPOTIFY_CLIENT_ID/SECRET.
    let creds = Credentials::from_env().ok_or_else(|| {
        AuthError::ClientConfig("Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET".to_string())
    })?;

    let config = Config {
        token_refreshing: true,
        ..Default::default()
    };

    let spotify = ClientCredsSpotify::with_config(creds, config);
    spotify.request_token().await?;

    Ok(spotify)
}

/// Returns a currently valid bearer token, re-requesting one when the cached
/// token is absent or expired.
pub async fn bearer(spotify: &ClientCredsSpotify) -> Result<String, AuthError> {
    let needs_refresh = {
        let guard = spotify
            .token
            .lock()
            .await
            .map_err(|_| AuthError::TokenCache)?;
        guard.as_ref().map_or(true, |token| token.is_expired())
    };

    if needs_refresh {
        spotify.request_token().await?;
    }

    let guard = spotify
        .token
        .lock()
        .await
        .map_err(|_| AuthError::TokenCache)?;
    guard
        .as_ref()
        .map(|token| token.access_token.clone())
        .ok_or(AuthError::TokenCache)
}
