use serde::{Deserialize, Serialize};

/// Main configuration structure for mapsmith
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Conversation and batch limits
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Target shape naming filters per artifact kind
    #[serde(default)]
    pub filters: ShapeFilterConfig,

    /// LLM vendor configuration
    #[serde(default)]
    pub vendor: VendorConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// External compiler configuration
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Conversation and batch limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestrationConfig {
    /// Trial ceiling: maximum vendor rounds per conversation
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Timeout of a single vendor round in seconds
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,

    /// Maximum conversations running at once within a batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Maximum correction rounds per artifact within one pass
    #[serde(default = "default_correction_budget")]
    pub correction_budget: u32,

    /// Delay before retrying a timed-out or failed vendor round
    #[serde(default)]
    pub retry_cooldown_ms: u64,
}

const fn default_max_rounds() -> u32 {
    8
}

const fn default_round_timeout_secs() -> u64 {
    180
}

const fn default_max_concurrency() -> usize {
    8
}

const fn default_correction_budget() -> u32 {
    2
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            round_timeout_secs: default_round_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            correction_budget: default_correction_budget(),
            retry_cooldown_ms: 0,
        }
    }
}

/// Target shape naming filters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShapeFilterConfig {
    /// Name suffixes of shapes never planned as transformers
    #[serde(default = "default_transformer_exclusions")]
    pub transformer_exclude_suffixes: Vec<String>,

    /// Name suffixes of the only shapes planned as collectors
    #[serde(default = "default_collector_inclusions")]
    pub collector_include_suffixes: Vec<String>,
}

fn default_transformer_exclusions() -> Vec<String> {
    vec![".ICreate".to_string(), ".IUpdate".to_string(), ".IRequest".to_string()]
}

fn default_collector_inclusions() -> Vec<String> {
    vec![".ICreate".to_string()]
}

impl Default for ShapeFilterConfig {
    fn default() -> Self {
        Self {
            transformer_exclude_suffixes: default_transformer_exclusions(),
            collector_include_suffixes: default_collector_inclusions(),
        }
    }
}

/// LLM vendor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VendorConfig {
    /// API key (can also be set via ANTHROPIC_API_KEY env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL for API (for testing/proxies)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API version header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Max tokens to generate per round
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

const fn default_max_tokens() -> u32 {
    8192
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> u32 {
    4
}

const fn default_burst_size() -> u32 {
    8
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// External compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompilerConfig {
    /// Command and arguments, run inside `working_dir`
    #[serde(default = "default_compiler_command")]
    pub command: Vec<String>,

    /// Directory the generated sources are written into before compiling
    #[serde(default = "default_compiler_working_dir")]
    pub working_dir: String,
}

fn default_compiler_command() -> Vec<String> {
    vec![
        "npx".to_string(),
        "tsc".to_string(),
        "--noEmit".to_string(),
        "--pretty".to_string(),
        "false".to_string(),
    ]
}

fn default_compiler_working_dir() -> String {
    ".mapsmith/workspace".to_string()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            command: default_compiler_command(),
            working_dir: default_compiler_working_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling JSON log files (stderr only when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation of log files: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
