//! Catalog fetcher collaborators: the owned-items list and the wishlist.
//!
//! Both sources return plain [`ReferenceEntry`] lists; the run tags them with
//! their [`Source`](crate::models::Source). Payloads are either a bare JSON
//! array or the Web API envelope (`{"response": {"games": [...]}}`, or
//! `"items"` for wishlists).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::ReferenceEntry;

/// Default Web API host for [`WebCatalog`]
pub const DEFAULT_API_URL: &str = "https://api.steampowered.com";

/// Source of reference catalog snapshots.
pub trait CatalogSource: Send + Sync {
    /// Owned-items list. Always required.
    fn fetch_owned(&self) -> Result<Vec<ReferenceEntry>>;

    /// Wishlist, or `Ok(None)` when this source has no wishlist available.
    fn fetch_wishlist(&self) -> Result<Option<Vec<ReferenceEntry>>>;
}

// ============================================================================
// Payload Parsing
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogPayload {
    Bare(Vec<ReferenceEntry>),
    Envelope { response: ResponseBody },
}

#[derive(Deserialize, Default)]
struct ResponseBody {
    #[serde(default, alias = "items")]
    games: Vec<ReferenceEntry>,
}

impl CatalogPayload {
    fn into_entries(self) -> Vec<ReferenceEntry> {
        match self {
            CatalogPayload::Bare(entries) => entries,
            CatalogPayload::Envelope { response } => response.games,
        }
    }
}

/// Parse a catalog payload in either accepted shape.
pub fn parse_catalog(json: &str) -> serde_json::Result<Vec<ReferenceEntry>> {
    serde_json::from_str::<CatalogPayload>(json).map(CatalogPayload::into_entries)
}

// ============================================================================
// In-Memory
// ============================================================================

/// Fixed catalog lists held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    owned: Vec<ReferenceEntry>,
    wishlist: Option<Vec<ReferenceEntry>>,
}

impl StaticCatalog {
    pub fn new(owned: Vec<ReferenceEntry>, wishlist: Option<Vec<ReferenceEntry>>) -> Self {
        Self { owned, wishlist }
    }
}

impl CatalogSource for StaticCatalog {
    fn fetch_owned(&self) -> Result<Vec<ReferenceEntry>> {
        Ok(self.owned.clone())
    }

    fn fetch_wishlist(&self) -> Result<Option<Vec<ReferenceEntry>>> {
        Ok(self.wishlist.clone())
    }
}

// ============================================================================
// JSON Snapshot Files
// ============================================================================

/// Catalog snapshots exported to local JSON files.
#[derive(Clone, Debug)]
pub struct JsonSnapshotCatalog {
    owned: PathBuf,
    wishlist: Option<PathBuf>,
}

impl JsonSnapshotCatalog {
    pub fn new(owned: impl Into<PathBuf>, wishlist: Option<PathBuf>) -> Self {
        Self {
            owned: owned.into(),
            wishlist,
        }
    }

    fn read(path: &Path) -> Result<Vec<ReferenceEntry>> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::fetch(0, format!("failed to read {}: {e}", path.display())))?;
        parse_catalog(&json)
            .map_err(|e| Error::fetch(0, format!("invalid catalog payload in {}: {e}", path.display())))
    }
}

impl CatalogSource for JsonSnapshotCatalog {
    fn fetch_owned(&self) -> Result<Vec<ReferenceEntry>> {
        if !self.owned.exists() {
            return Err(Error::config(format!(
                "owned catalog snapshot not found: {}",
                self.owned.display()
            )));
        }
        Self::read(&self.owned)
    }

    fn fetch_wishlist(&self) -> Result<Option<Vec<ReferenceEntry>>> {
        match &self.wishlist {
            None => Ok(None),
            Some(path) if !path.exists() => {
                warn!(path = %path.display(), "wishlist snapshot missing, matching library only");
                Ok(None)
            }
            Some(path) => Self::read(path).map(Some),
        }
    }
}

// ============================================================================
// Web API
// ============================================================================

/// Catalog fetched live from the store Web API.
pub struct WebCatalog {
    agent: ureq::Agent,
    base_url: String,
    api_key: Option<String>,
    account_id: Option<String>,
    include_wishlist: bool,
}

impl WebCatalog {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, account_id: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            account_id,
            include_wishlist: true,
        }
    }

    /// Skip the wishlist endpoint; runs then match against the library only.
    pub fn without_wishlist(mut self) -> Self {
        self.include_wishlist = false;
        self
    }

    /// Both credentials are required before any request is made.
    fn credentials(&self) -> Result<(&str, &str)> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("catalog api key is not set"))?;
        let account = self
            .account_id
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Error::config("catalog account id is not set"))?;
        Ok((key, account))
    }

    fn get(&self, path: &str, extra: &[(&str, &str)]) -> Result<Vec<ReferenceEntry>> {
        let (key, account) = self.credentials()?;
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.agent.get(&url).query("key", key).query("steamid", account);
        for (name, value) in extra {
            request = request.query(name, value);
        }

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, response) => {
                let text = response.status_text().to_string();
                Error::fetch(code, text)
            }
            ureq::Error::Transport(transport) => Error::fetch(0, transport.to_string()),
        })?;

        let payload: CatalogPayload = response
            .into_json()
            .map_err(|e| Error::fetch(0, format!("invalid catalog payload: {e}")))?;
        Ok(payload.into_entries())
    }
}

impl CatalogSource for WebCatalog {
    fn fetch_owned(&self) -> Result<Vec<ReferenceEntry>> {
        self.get(
            "IPlayerService/GetOwnedGames/v1/",
            &[("include_appinfo", "1"), ("include_played_free_games", "1")],
        )
    }

    fn fetch_wishlist(&self) -> Result<Option<Vec<ReferenceEntry>>> {
        if !self.include_wishlist {
            return Ok(None);
        }
        self.get("IWishlistService/GetWishlist/v1/", &[]).map(Some)
    }
}
