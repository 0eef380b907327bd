//! MongoDB client construction.

use std::time::Duration;

use anyhow::Result;
use mongodb::{options::ClientOptions, Client};

/// Parse the connection string and build a client with bounded connect and
/// server-selection timeouts, so a bad URI fails fast instead of hanging.
pub async fn connect(uri: &str) -> Result<Client> {
    let mut options = ClientOptions::parse(uri).await?;
    options.connect_timeout = Some(Duration::from_secs(10));
    options.server_selection_timeout = Some(Duration::from_secs(10));
    Ok(Client::with_options(options)?)
}
