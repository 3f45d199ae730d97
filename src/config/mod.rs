use std::env;

/// Access engine configuration, injected into the gateway at construction.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Maximum upload size in bytes (default: 10 MB)
    pub max_upload_size: usize,

    /// MIME types accepted on upload
    pub allowed_mime_types: Vec<String>,

    /// Secure link lifetime used when the caller does not pick one (default: 60)
    pub secure_link_ttl_minutes: i64,

    /// Upper bound for a requested secure link lifetime (default: 7 days)
    pub max_secure_link_ttl_minutes: i64,

    /// How long expired secure links are kept before the sweep purges them (default: 24)
    pub secure_link_retention_hours: i64,

    /// Seconds between two sweeps of the background worker (default: 3600)
    pub sweep_interval_secs: u64,

    /// Base URL used to build public secure link URLs
    pub public_base_url: String,

    /// JWT Secret Key (Required)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

fn default_mime_types() -> Vec<String> {
    [
        "application/pdf",
        "image/jpeg",
        "image/png",
        "image/gif",
        "text/plain",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_list(key: &str) -> Option<Vec<String>> {
    env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 10 * 1024 * 1024, // 10 MB
            allowed_mime_types: default_mime_types(),
            secure_link_ttl_minutes: 60,
            max_secure_link_ttl_minutes: 7 * 24 * 60,
            secure_link_retention_hours: 24,
            sweep_interval_secs: 3600,
            public_base_url: "http://localhost:3000".to_string(),
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AccessConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: parse_env("MAX_UPLOAD_SIZE").unwrap_or(default.max_upload_size),
            allowed_mime_types: parse_list("ALLOWED_MIME_TYPES")
                .unwrap_or(default.allowed_mime_types),
            secure_link_ttl_minutes: parse_env("SECURE_LINK_TTL_MINUTES")
                .unwrap_or(default.secure_link_ttl_minutes),
            max_secure_link_ttl_minutes: parse_env("MAX_SECURE_LINK_TTL_MINUTES")
                .unwrap_or(default.max_secure_link_ttl_minutes),
            secure_link_retention_hours: parse_env("SECURE_LINK_RETENTION_HOURS")
                .unwrap_or(default.secure_link_retention_hours),
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS")
                .unwrap_or(default.sweep_interval_secs),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.public_base_url),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret), // production() requires it
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (short sweeps, generous uploads)
    pub fn development() -> Self {
        Self {
            max_upload_size: 256 * 1024 * 1024,
            sweep_interval_secs: 300,
            ..Self::default()
        }
    }

    /// Create config for production (strict security): JWT_SECRET must be set
    pub fn production() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("CRITICAL: JWT_SECRET must be set"))?;
        Ok(Self {
            jwt_secret,
            ..Self::from_env()
        })
    }

    /// Normalizes a declared content type ("Text/Plain; charset=utf-8" -> "text/plain")
    /// and checks it against the allowlist.
    pub fn is_mime_allowed(&self, content_type: &str) -> bool {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        self.allowed_mime_types.iter().any(|m| m == &normalized)
    }
}
