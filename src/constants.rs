/// Constants module to avoid magic numbers in the codebase

// Provider sentinels that arrive as ordinary content deltas but must never
// reach the timeline
pub const CONTROL_STRINGS: &[&str] = &[
    "[DONE]",
    "Model loaded successfully",
    "<|loading_model|>",
    "Loading the model",
    "<|processing_prompt|>",
];

// Lifecycle status strings
pub const STATUS_MODEL_LOADING: &str = "Model Loading, please wait";
pub const STATUS_MODEL_READY: &str = "Model Ready, please wait";
pub const STATUS_MODEL_PROCESSING: &str = "Model Processing, please wait";
pub const STATUS_DOWNLOAD_STARTING: &str = "Download starting...";
pub const STATUS_DOWNLOAD_VERIFYING: &str = "Download successful, please wait.";

// Message roles on the wire
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

// Config files mark unfilled values with this marker
pub const CONFIG_PLACEHOLDER: &str = "<";

// Credential storage
pub const TOKEN_TYPE_DEVELOPER: &str = "Developer Token";

// Download progress is displayed with two decimals
pub const PROGRESS_SCALE: f64 = 10_000.0;
pub const PROGRESS_DIVISOR: f64 = 100.0;
pub const PROGRESS_COMPLETE: &str = "100.00";

// Timing
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 250;
pub const DEFAULT_RESTART_DELAY_MS: u64 = 1_000;

// Default Model Configuration
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CLOUD_PROVIDER: &str = "gemini";
pub const DEFAULT_CLOUD_MODEL: &str = "gemini-2.0-flash";

// Environment
pub const ENV_PREFIX: &str = "PARLEY_";
pub const APP_NAME: &str = "parley";
