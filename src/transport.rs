//! HTTP transport
//!
//! One configured client with a shared cookie jar. Mutating requests carry the
//! anti-forgery header; a 403 on such a request triggers exactly one
//! refresh-and-resend. A 401 is handed back untouched.

use crate::config::ClientConfig;
use crate::error::{FormError, Result};
use crate::token::{TokenSnapshot, TokenStore};
use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::multipart::{Form as MultipartForm, Part};
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Body of an outbound request, rebuilt on every attempt
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

/// Multipart payload kept in memory so it can be resent
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    texts: Vec<(String, String)>,
    files: Vec<FilePart>,
}

/// One binary part of a multipart payload
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.texts.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    pub fn text_fields(&self) -> &[(String, String)] {
        &self.texts
    }

    pub fn file_parts(&self) -> &[FilePart] {
        &self.files
    }

    fn to_form(&self) -> Result<MultipartForm> {
        let mut form = MultipartForm::new();
        for (name, value) in &self.texts {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let mut part = Part::stream_with_length(
                reqwest::Body::from(file.data.clone()),
                file.data.len() as u64,
            )
            .file_name(file.file_name.clone());
            if !file.content_type.is_empty() {
                part = part.mime_str(&file.content_type)?;
            }
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

impl RequestBody {
    fn apply(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match self {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(body) => request.multipart(body.to_form()?),
        })
    }
}

/// Configured HTTP transport
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    header_name: String,
    tokens: Arc<TokenStore>,
}

impl Transport {
    /// Build the client, cookie jar and token store from `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let jar = Arc::new(Jar::default());

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        let tokens = Arc::new(TokenStore::new(http.clone(), jar, config)?);
        Ok(Self::with_token_store(http, config, tokens))
    }

    /// Assemble a transport around an existing client and token store
    pub fn with_token_store(
        http: reqwest::Client,
        config: &ClientConfig,
        tokens: Arc<TokenStore>,
    ) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            header_name: config.csrf_header_name.clone(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with optional query pairs
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: Option<&[(&str, &str)]>,
    ) -> Result<T> {
        self.send(Method::GET, path, params, &RequestBody::Empty).await
    }

    /// POST `body` to `path`
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &RequestBody) -> Result<T> {
        self.send(Method::POST, path, None, body).await
    }

    /// Send a request, attaching and refreshing the anti-forgery token as needed
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Option<&[(&str, &str)]>,
        body: &RequestBody,
    ) -> Result<T> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if let Some(params) = params {
            for (key, value) in params {
                url.query_pairs_mut().append_pair(key, value);
            }
        }

        let mutating = is_mutating(&method);
        let seen = if mutating {
            self.tokens.snapshot().await
        } else {
            TokenSnapshot::default()
        };
        let mut token = seen.value.clone();
        if mutating && token.is_none() {
            tracing::warn!("Sending {} {} without anti-forgery token", method, path);
        }

        let mut retried = false;
        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(t) = &token {
                request = request.header(self.header_name.as_str(), t.as_str());
            }
            request = body.apply(request)?;

            let response = request.send().await?;
            let status = response.status();
            let body_bytes = response.bytes().await?;

            if status.is_success() {
                if body_bytes.is_empty() {
                    return Ok(serde_json::from_str("null")?);
                }
                return Ok(serde_json::from_slice(&body_bytes)?);
            }

            if status == StatusCode::UNAUTHORIZED {
                tracing::info!("{} {} rejected as unauthenticated", method, path);
                let message = match FormError::rejected(status, &body_bytes) {
                    FormError::Rejected { message, .. } => message,
                    other => other.to_string(),
                };
                return Err(FormError::Unauthenticated { message });
            }

            if status == StatusCode::FORBIDDEN && mutating && !retried {
                retried = true;
                tracing::info!("{} {} forbidden, refreshing anti-forgery token", method, path);
                match self.tokens.refresh(&seen).await {
                    Some(fresh) => {
                        token = Some(fresh);
                        tracing::debug!("Retrying {} {} with new token", method, path);
                        continue;
                    }
                    None => {
                        tracing::warn!("No fresh anti-forgery token, giving up on {}", path);
                        return Err(FormError::Token);
                    }
                }
            }

            return Err(FormError::rejected(status, &body_bytes));
        }
    }
}

/// Methods that change server state and therefore need the token
fn is_mutating(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}
