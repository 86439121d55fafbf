use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// How concurrent requests for the same (doctor, slot) are arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPolicy {
    /// A slot held by a pending or confirmed appointment rejects new requests.
    Exclusive,
    /// Several pending requests may target one slot; only one may be confirmed.
    SoftHold,
}

impl FromStr for BookingPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Ok(BookingPolicy::Exclusive),
            "soft_hold" | "soft-hold" => Ok(BookingPolicy::SoftHold),
            other => Err(format!("unknown booking policy '{}'", other)),
        }
    }
}

/// What the report pipeline does when prescription drafting fails after
/// the visit summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftFailurePolicy {
    Abort,
    KeepSummary,
}

impl FromStr for DraftFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(DraftFailurePolicy::Abort),
            "keep_summary" | "keep-summary" => Ok(DraftFailurePolicy::KeepSummary),
            other => Err(format!("unknown draft failure policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub ai_api_base_url: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
    pub ai_max_retries: u32,
    pub ai_retry_base_delay_ms: u64,
    pub booking_policy: BookingPolicy,
    pub draft_failure_policy: DraftFailurePolicy,
    pub outbox_poll_interval_ms: u64,
    pub outbox_batch_size: usize,
    pub storage_backend: StorageBackend,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                String::new()
            });

        let storage_backend = match env::var("STORAGE_BACKEND").ok().as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("supabase") => StorageBackend::Supabase,
            Some(other) => {
                warn!("Unknown STORAGE_BACKEND '{}', choosing from Supabase settings", other);
                Self::default_backend(&supabase_url, &supabase_service_role_key)
            }
            None => Self::default_backend(&supabase_url, &supabase_service_role_key),
        };

        let config = Self {
            supabase_url,
            supabase_service_role_key,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            ai_api_base_url: env::var("AI_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("AI_API_BASE_URL not set, using default");
                    "https://api.together.xyz/v1".to_string()
                }),
            ai_api_key: env::var("AI_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("AI_API_KEY not set, using empty value");
                    String::new()
                }),
            ai_model: env::var("AI_MODEL")
                .unwrap_or_else(|_| "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".to_string()),
            ai_timeout_seconds: parse_or("AI_TIMEOUT_SECONDS", 8),
            ai_max_retries: parse_or("AI_MAX_RETRIES", 2),
            ai_retry_base_delay_ms: parse_or("AI_RETRY_BASE_DELAY_MS", 250),
            booking_policy: parse_or("BOOKING_POLICY", BookingPolicy::Exclusive),
            draft_failure_policy: parse_or("REPORT_DRAFT_FAILURE", DraftFailurePolicy::Abort),
            outbox_poll_interval_ms: parse_or("OUTBOX_POLL_INTERVAL_MS", 500),
            outbox_batch_size: parse_or("OUTBOX_BATCH_SIZE", 50),
            storage_backend,
            port: parse_or("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Configuration for tests and local runs: in-memory storage, no external services.
    pub fn local(jwt_secret: &str) -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: jwt_secret.to_string(),
            ai_api_base_url: "http://localhost:8089/v1".to_string(),
            ai_api_key: String::new(),
            ai_model: "test-model".to_string(),
            ai_timeout_seconds: 8,
            ai_max_retries: 2,
            ai_retry_base_delay_ms: 250,
            booking_policy: BookingPolicy::Exclusive,
            draft_failure_policy: DraftFailurePolicy::Abort,
            outbox_poll_interval_ms: 500,
            outbox_batch_size: 50,
            storage_backend: StorageBackend::Memory,
            port: 3000,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_role_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_ai_configured(&self) -> bool {
        !self.ai_api_base_url.is_empty() && !self.ai_api_key.is_empty()
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_seconds)
    }

    pub fn ai_retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.ai_retry_base_delay_ms)
    }

    pub fn outbox_poll_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_poll_interval_ms)
    }

    fn default_backend(url: &str, key: &str) -> StorageBackend {
        if url.is_empty() || key.is_empty() {
            StorageBackend::Memory
        } else {
            StorageBackend::Supabase
        }
    }
}

fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid value for {}: {}, using default", name, e);
            default
        }),
        Err(_) => default,
    }
}
