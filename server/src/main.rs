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

mod routes;
mod state;

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use expander_core::{get_spotify_auth, SpotifyApi};
use log::info;
use tokio::net::TcpListener;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "spotify-expander")]
#[command(about = "Spotify proxy with album deep expansion", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        // Silently ignore
    }
    env_logger::init();

    let cli = Cli::parse();

    let auth = get_spotify_auth()
        .await
        .context("Spotify authentication failed")?;
    let api = SpotifyApi::new(auth).context("Failed to build the catalog client")?;
    let state = AppState::new(api);
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
