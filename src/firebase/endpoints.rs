use anyhow::{Context, Result};
use url::Url;

use crate::session::DeviceIdentity;

/// URL layout of the scoreboard database.
///
/// Paths are appended to the base verbatim (game ids are stored as absolute
/// database paths such as `/games/-KHx9`), then the auth token is attached as
/// a query parameter.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
    auth: Option<String>,
}

impl Endpoints {
    pub fn new(base: &str, auth: Option<String>) -> Result<Self> {
        let parsed = Url::parse(base).with_context(|| format!("Invalid database URL '{}'", base))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Database URL must be http(s), got '{}'", parsed.scheme());
        }
        Ok(Endpoints {
            base: base.trim_end_matches('/').to_string(),
            auth: auth.filter(|t| !t.is_empty()),
        })
    }

    /// Stream naming the game currently assigned to a table.
    pub fn table(&self, device: &DeviceIdentity) -> Result<Url> {
        self.build(&format!("/tables/{}/current_game", device))
    }

    /// Stream of a game's live document.
    pub fn game(&self, game_id: &str) -> Result<Url> {
        self.build(game_id)
    }

    /// Write endpoint recording hits against one button.
    pub fn hits(&self, button_id: &str) -> Result<Url> {
        self.build(&format!("/switches/{}/hits", button_id))
    }

    fn build(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{}.json", self.base, path);
        let mut url = Url::parse(&raw).with_context(|| format!("Invalid resource URL '{}'", raw))?;
        if let Some(token) = &self.auth {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

/// `url` without its query string, safe to log.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
