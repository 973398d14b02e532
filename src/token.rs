//! Anti-forgery token store
//!
//! Lookup order is cookie, then cache, then the token-issuing endpoint.
//! Server fetches are serialized behind one async lock so concurrent callers
//! share a single in-flight request.

use crate::config::ClientConfig;
use crate::error::Result;
use crate::telemetry::redact;
use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    csrf_token: String,
}

/// Process-wide anti-forgery token, owned by whoever builds the transport
pub struct TokenStore {
    http: reqwest::Client,
    jar: Arc<Jar>,
    origin: Url,
    token_url: Url,
    cookie_name: String,
    cached: RwLock<Option<String>>,
    /// Last value the server refused; a cookie still holding it is ignored
    rejected: RwLock<Option<String>>,
    fetch_lock: tokio::sync::Mutex<()>,
    fetches: AtomicU64,
    /// Bumped whenever a new value lands in the cache
    generation: AtomicU64,
}

/// A token together with the cache generation it was read at
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub value: Option<String>,
    pub generation: u64,
}

impl TokenStore {
    /// Create a store that shares `http`'s cookie jar
    pub fn new(http: reqwest::Client, jar: Arc<Jar>, config: &ClientConfig) -> Result<Self> {
        let origin = Url::parse(&config.base_url)?;
        let token_url = Url::parse(&format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.token_path
        ))?;
        Ok(Self {
            http,
            jar,
            origin,
            token_url,
            cookie_name: config.csrf_cookie_name.clone(),
            cached: RwLock::new(None),
            rejected: RwLock::new(None),
            fetch_lock: tokio::sync::Mutex::new(()),
            fetches: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        })
    }

    /// Current token, or None when none can be obtained. Never fails.
    pub async fn token(&self) -> Option<String> {
        self.snapshot().await.value
    }

    /// Current token and the generation it belongs to; hand the generation
    /// back to `refresh` if the server refuses the token
    pub async fn snapshot(&self) -> TokenSnapshot {
        let value = self.lookup().await;
        TokenSnapshot {
            value,
            generation: self.generation(),
        }
    }

    async fn lookup(&self) -> Option<String> {
        if let Some(token) = self.cookie_token() {
            tracing::debug!("Using anti-forgery token from cookie");
            return Some(token);
        }
        if let Some(token) = self.cached() {
            tracing::debug!("Using cached anti-forgery token");
            return Some(token);
        }

        let _guard = self.fetch_lock.lock().await;
        // Another caller may have finished a fetch while we waited
        if let Some(token) = self.cached() {
            return Some(token);
        }
        self.fetch_locked().await
    }

    /// Drop the cached token. The cookie is left alone.
    pub fn invalidate(&self) {
        tracing::debug!("Clearing cached anti-forgery token");
        *self.cached.write() = None;
    }

    /// Explicitly override the cached token
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        tracing::debug!("Setting anti-forgery token {}", redact(&token));
        *self.cached.write() = Some(token);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace a token the server just refused with a freshly issued one.
    ///
    /// `seen` is the snapshot the refused request was sent with. A cached
    /// value is reused only when it was stored after that snapshot was taken
    /// (another caller already refreshed); otherwise the server is asked.
    pub async fn refresh(&self, seen: &TokenSnapshot) -> Option<String> {
        let stale = seen.value.as_deref();
        if let Some(stale) = stale {
            *self.rejected.write() = Some(stale.to_string());
        }
        {
            let mut cached = self.cached.write();
            if cached.is_some() && cached.as_deref() == stale {
                *cached = None;
            }
        }

        let _guard = self.fetch_lock.lock().await;
        if self.generation() > seen.generation {
            if let Some(current) = self.cached() {
                if stale != Some(current.as_str()) {
                    tracing::debug!("Reusing anti-forgery token refreshed by another request");
                    return Some(current);
                }
            }
        }
        self.invalidate();
        self.fetch_locked().await
    }

    /// Cached value, without consulting the cookie or the server
    pub fn cached(&self) -> Option<String> {
        self.cached.read().clone()
    }

    /// Incremented on every cache store
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Number of token-endpoint requests issued so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn cookie_token(&self) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        let token = parse_cookie(header, &self.cookie_name)?;
        if self.rejected.read().as_deref() == Some(token.as_str()) {
            return None;
        }
        Some(token)
    }

    /// Caller must hold `fetch_lock`
    async fn fetch_locked(&self) -> Option<String> {
        tracing::info!("Fetching anti-forgery token from server");
        self.fetches.fetch_add(1, Ordering::SeqCst);

        match self.request_token().await {
            Ok(token) => {
                tracing::info!("Anti-forgery token fetched {}", redact(&token));
                *self.cached.write() = Some(token.clone());
                self.generation.fetch_add(1, Ordering::SeqCst);
                Some(token)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch anti-forgery token: {}", e);
                None
            }
        }
    }

    async fn request_token(&self) -> Result<String> {
        let response = self
            .http
            .get(self.token_url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body: TokenResponse = response.json().await?;
        Ok(body.csrf_token)
    }
}

/// Find `name` in a `Cookie:` header value
fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
