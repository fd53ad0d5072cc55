use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:5000")]
    pub server_addr: String,

    // --- Message Store Args ---
    /// Conversation store type (memory, redis)
    #[arg(long, env = "STORE_TYPE", default_value = "memory")]
    pub store_type: String,

    /// Redis endpoint for the conversation store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "STORE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub store_redis_url: String,

    /// Prefix for Redis conversation keys.
    #[arg(long, env = "STORE_REDIS_PREFIX", default_value = "chat:")]
    pub store_redis_prefix: String,

    // --- Completion Provider Args ---
    /// Completion endpoint URL (OpenRouter-compatible chat completions API)
    #[arg(
        long,
        env = "PROVIDER_BASE_URL",
        default_value = "https://openrouter.ai/api/v1/chat/completions"
    )]
    pub provider_base_url: String,

    /// API key for the completion provider. Chat requests fail without one.
    #[arg(long, env = "PROVIDER_API_KEY", default_value = "")]
    pub provider_api_key: String,

    /// Model identifier sent with every completion request.
    #[arg(long, env = "PROVIDER_MODEL", default_value = "openai/gpt-4o")]
    pub provider_model: String,

    /// Optional HTTP-Referer header value (OpenRouter ranking metadata).
    #[arg(long, env = "PROVIDER_REFERER")]
    pub provider_referer: Option<String>,

    /// Optional X-Title header value (OpenRouter ranking metadata).
    #[arg(long, env = "PROVIDER_TITLE")]
    pub provider_title: Option<String>,

    // --- Upload Args ---
    /// Directory where uploaded images are written and served from.
    #[arg(long, env = "UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: String,

    /// Path to the prompt configuration file. Missing file means defaults.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json")]
    pub prompts_path: String,

    // --- Retrieval Args ---
    /// Enable the knowledge-base retrieval fallback.
    #[arg(long, env = "ENABLE_RETRIEVAL", default_value = "false")]
    pub enable_retrieval: bool,

    /// Base URL of the records service queried for retrieval context.
    #[arg(long, env = "RETRIEVAL_BASE_URL")]
    pub retrieval_base_url: Option<String>,

    /// API key for the records service.
    #[arg(long, env = "RETRIEVAL_API_KEY", default_value = "")]
    pub retrieval_api_key: String,

    /// Default number of snippets to retrieve per query.
    #[arg(long, env = "RETRIEVAL_LIMIT", default_value = "5")]
    pub retrieval_limit: usize,

    // --- TLS Args ---
    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,
}
