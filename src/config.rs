use std::env;
use std::time::Duration;

/// Environment-driven configuration, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,

    pub inference_base_url: String,
    pub inference_api_key: String,
    pub vision_model: String,
    pub text_model: String,
    pub gateway_timeout: Duration,
    pub moderation_timeout: Duration,

    pub storage_base_url: String,
    pub storage_api_key: String,
    pub storage_bucket: String,

    pub worker_counts: WorkerCounts,
    pub poll_interval: Duration,
    pub profile_cache_ttl: Duration,
}

/// Number of worker loops spawned per task group.
#[derive(Debug, Clone, Copy)]
pub struct WorkerCounts {
    pub food_image: usize,
    pub food_text: usize,
    pub health_report: usize,
    pub comment: usize,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}, using default", key);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let inference_api_key = env::var("INFERENCE_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .map_err(|_| anyhow::anyhow!("INFERENCE_API_KEY (or API_KEY) must be set"))?;

        // Worker counts are clamped to a small range; worker count is the only
        // throughput throttle, there is no other backpressure.
        let clamp = |n: usize| n.clamp(1, 8);

        Ok(Config {
            host: var_or("HOST", "127.0.0.1"),
            port: parse_or("PORT", 3010u16),
            database_url,
            inference_base_url: var_or(
                "INFERENCE_BASE_URL",
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
            ),
            inference_api_key,
            vision_model: var_or("VISION_MODEL", "qwen-vl-max"),
            text_model: var_or("TEXT_MODEL", "qwen-plus"),
            gateway_timeout: Duration::from_secs(parse_or("GATEWAY_TIMEOUT_SECS", 60u64)),
            moderation_timeout: Duration::from_secs(parse_or("MODERATION_TIMEOUT_SECS", 30u64)),
            storage_base_url: var_or("STORAGE_BASE_URL", ""),
            storage_api_key: var_or("STORAGE_API_KEY", ""),
            storage_bucket: var_or("STORAGE_BUCKET", "meal-images"),
            worker_counts: WorkerCounts {
                food_image: clamp(parse_or("FOOD_IMAGE_WORKERS", 2usize)),
                food_text: clamp(parse_or("FOOD_TEXT_WORKERS", 1usize)),
                health_report: clamp(parse_or("HEALTH_REPORT_WORKERS", 1usize)),
                comment: clamp(parse_or("COMMENT_WORKERS", 1usize)),
            },
            poll_interval: Duration::from_millis(parse_or("POLL_INTERVAL_MS", 2000u64)),
            profile_cache_ttl: Duration::from_secs(parse_or("PROFILE_CACHE_TTL_SECS", 300u64)),
        })
    }
}
