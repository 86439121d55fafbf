use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_utils::{RetryError, RetryPolicy};

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Supabase is not configured")]
    NotConfigured,

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("{0}")]
    Exhausted(String),
}

impl SupabaseError {
    /// Unique-constraint violations surface as 409 from PostgREST.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Api { status: 409, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SupabaseError::Api { status: 404, .. })
    }

    /// Worth retrying: network failures and server-side errors. A body that
    /// does not decode will not decode on the next attempt either.
    pub fn is_transient(&self) -> bool {
        match self {
            SupabaseError::Transport(e) => !e.is_decode(),
            SupabaseError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Thin PostgREST client authenticated with the service-role key.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
    read_retry: RetryPolicy,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.supabase_service_role_key.clone(),
            read_retry: RetryPolicy::default(),
        }
    }

    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    fn get_headers(&self) -> Result<HeaderMap, SupabaseError> {
        if self.base_url.is_empty() || self.service_key.is_empty() {
            return Err(SupabaseError::NotConfigured);
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;

        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Array(vec![]))
                .or_else(|_| serde_json::from_value(Value::Null))
                .map_err(|e| SupabaseError::Api { status: 204, body: e.to_string() });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// GET rows, retrying transient failures.
    pub async fn select<T>(&self, path: &str) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.read_retry
            .run(
                &format!("GET {}", path),
                SupabaseError::is_transient,
                move || self.request::<Vec<T>>(Method::GET, path, None),
            )
            .await
            .map_err(|e| match e {
                RetryError::Exhausted { last_error, .. } => last_error,
                other => SupabaseError::Exhausted(other.to_string()),
            })
    }

    pub async fn select_one<T>(&self, path: &str) -> Result<Option<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let mut rows = self.select::<T>(path).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.swap_remove(0)))
    }

    /// Insert or update with `Prefer: return=representation` plus any extra preferences.
    pub async fn write<T>(
        &self,
        method: Method,
        path: &str,
        body: Value,
        prefer: &[&str],
    ) -> Result<Vec<T>, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let mut preferences = vec!["return=representation"];
        preferences.extend_from_slice(prefer);

        let mut headers = HeaderMap::new();
        let prefer_value = HeaderValue::from_str(&preferences.join(","))
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;
        headers.insert("Prefer", prefer_value);

        self.request_with_headers(method, path, Some(body), Some(headers)).await
    }

    /// Call a Postgres function exposed under `/rest/v1/rpc/`.
    pub async fn rpc<T>(&self, function: &str, params: Value) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/rpc/{}", function);
        self.request(Method::POST, &path, Some(params)).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
