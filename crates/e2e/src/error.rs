//! Error types for browser verification

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("App server failed to start: {0}")]
    AppStartup(String),

    #[error("App not reachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npm install -D @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Flow parse error: {0}")]
    FlowParse(String),

    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Timed out after {timeout_ms} ms waiting for: {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Screenshot not written: {0}")]
    ScreenshotMissing(String),

    #[error("Screenshot is empty: {0}")]
    ScreenshotEmpty(String),

    #[error("Account provisioning failed: {0}")]
    Provision(String),

    #[error("Flow '{0}' needs a provisioned account; set NEXT_PUBLIC_SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY")]
    ProvisioningUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;
