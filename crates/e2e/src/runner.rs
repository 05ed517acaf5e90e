//! Flow runner that orchestrates the app server, account fixtures, Playwright, and evidence checks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::credentials::Credentials;
use crate::error::{E2eError, E2eResult};
use crate::flow::{Flow, Provision};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, StepResult};
use crate::provision::{ProvisionedUser, SupabaseAdmin};
use crate::server::{AppServer, AppServerConfig};
use crate::visual::{self, ScreenshotArtifact};

/// Result of running a single flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    /// Email the flow logged in with
    pub account: Option<String>,
    pub steps: Vec<StepResult>,
    pub screenshots: Vec<ScreenshotArtifact>,
    pub error: Option<String>,
}

impl FlowResult {
    fn errored(name: &str, error: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            account: None,
            steps: vec![],
            screenshots: vec![],
            error: Some(error.to_string()),
        }
    }
}

/// Result of running a batch of flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<FlowResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Runs verification flows one at a time, each in its own browser
pub struct FlowRunner {
    server_config: AppServerConfig,
    playwright_config: PlaywrightConfig,
    provisioning: Option<SupabaseAdmin>,

    /// Running app handle (if any)
    server: Option<AppServer>,

    /// Created on first use so listing or scripting flows never needs node
    playwright: Option<PlaywrightHandle>,

    /// Directory for YAML flows
    flows_dir: PathBuf,

    /// Output directory for results
    output_dir: PathBuf,
}

impl FlowRunner {
    /// Create a new runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            server_config: config.server,
            playwright_config: config.playwright,
            provisioning: config.provisioning,
            server: None,
            playwright: None,
            flows_dir: config.flows_dir,
            output_dir: config.output_dir,
        }
    }

    /// Make sure the app is reachable
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() {
            return Ok(()); // Already running
        }

        let server = AppServer::ensure(self.server_config.clone()).await?;

        // Flows run against wherever the app actually answers
        if self.playwright_config.base_url != server.base_url() {
            self.playwright_config.base_url = server.base_url().to_string();
            self.playwright = None;
        }

        self.server = Some(server);
        Ok(())
    }

    /// Stop the app if this runner started it
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run flows in order; a failing flow does not stop the ones after it
    pub async fn run_flows(&mut self, flows: &[Flow]) -> E2eResult<SuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        // Ensure the app is up
        self.start_server().await?;

        info!("Running {} flow(s)...", flows.len());

        for flow in flows {
            let result = match self.run_flow(flow).await {
                Ok(result) => result,
                Err(e) => FlowResult::errored(&flow.name, &e),
            };

            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                let reason = result.error.as_deref().unwrap_or("unknown error");
                error!("✗ {} - {}", result.name, reason);
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Flow results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(SuiteResult {
            started_at,
            total: flows.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run a single flow in a fresh browser session
    pub async fn run_flow(&mut self, flow: &Flow) -> E2eResult<FlowResult> {
        let handle = match self.playwright.take() {
            Some(handle) => handle,
            None => PlaywrightHandle::new(self.playwright_config.clone())?,
        };
        let playwright = self.playwright.insert(handle);
        let admin = self.provisioning.as_ref();

        let start = Instant::now();
        debug!("Running flow: {}", flow.name);

        let credentials = flow.account.resolve();
        let provisioned = provision(flow, credentials.as_ref(), admin).await?;

        let outcome = playwright.run_flow(&flow.bind(credentials.as_ref())).await;

        // Tear down the account on every path
        if let (Some(user), Some(admin)) = (&provisioned, admin) {
            if let Err(e) = admin.delete_user(&user.id).await {
                warn!("Failed to delete provisioned user {}: {}", user.email, e);
            }
        }

        let outcome = outcome?;
        let mut error = outcome.error.clone();
        let mut screenshots = Vec::new();

        // Evidence is only expected from flows that reached the end
        if outcome.success {
            let paths: Vec<PathBuf> = flow
                .screenshot_paths()
                .into_iter()
                .map(|p| playwright.artifact_path(p))
                .collect();
            match visual::inspect_all(&paths) {
                Ok(artifacts) => screenshots = artifacts,
                Err(e) => error = Some(e.to_string()),
            }
        }

        Ok(FlowResult {
            name: flow.name.clone(),
            success: error.is_none() && outcome.success,
            duration_ms: start.elapsed().as_millis() as u64,
            account: credentials.map(|c| c.email),
            steps: outcome.steps,
            screenshots,
            error: error.or_else(|| (!outcome.success).then(|| "flow did not finish".to_string())),
        })
    }

    /// Load YAML flows from the configured directory
    pub fn load_flows(&self) -> E2eResult<Vec<Flow>> {
        if !self.flows_dir.exists() {
            return Ok(Vec::new());
        }
        Flow::load_all(&self.flows_dir)
    }

    /// Write flow results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for FlowRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FlowRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Create the flow's account when its policy asks for it.
///
/// Returns the user this run created, which the caller deletes afterwards.
async fn provision(
    flow: &Flow,
    credentials: Option<&Credentials>,
    admin: Option<&SupabaseAdmin>,
) -> E2eResult<Option<ProvisionedUser>> {
    let Some(credentials) = credentials else {
        return Ok(None);
    };

    match (flow.provision, admin) {
        (Provision::Never, _) => Ok(None),
        (Provision::IfConfigured, None) => {
            debug!("No admin client; assuming {} is pre-seeded", credentials.email);
            Ok(None)
        }
        (Provision::Required, None) => Err(E2eError::ProvisioningUnavailable(flow.name.clone())),
        // Shared accounts are only created when missing and never replaced
        (Provision::IfConfigured, Some(admin)) => admin.ensure_user(credentials).await,
        (Provision::Required, Some(admin)) => admin.recreate_user(credentials).await.map(Some),
    }
}

/// Configuration for the flow runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub server: AppServerConfig,
    pub playwright: PlaywrightConfig,
    /// Admin client for flows that provision accounts
    pub provisioning: Option<SupabaseAdmin>,
    pub flows_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server: AppServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            provisioning: None,
            flows_dir: PathBuf::from("flows"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows;

    #[tokio::test]
    async fn test_required_provisioning_without_admin() {
        let flow = flows::main_page();
        let creds = flow.account.resolve();
        let err = provision(&flow, creds.as_ref(), None).await.unwrap_err();
        assert!(matches!(err, E2eError::ProvisioningUnavailable(name) if name == "main-page"));
    }

    #[tokio::test]
    async fn test_if_configured_without_admin_assumes_seeded() {
        let flow = flows::integration_connect();
        let creds = flow.account.resolve();
        assert!(provision(&flow, creds.as_ref(), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_account_never_provisions() {
        let flow = flows::roster_screenshot();
        assert!(provision(&flow, None, None).await.unwrap().is_none());
    }

    #[test]
    fn test_errored_result() {
        let result = FlowResult::errored("roster-test", &E2eError::PlaywrightNotFound);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Playwright not found"));
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FlowRunner::with_config(RunnerConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let suite = SuiteResult {
            started_at: Utc::now(),
            total: 1,
            passed: 0,
            failed: 1,
            duration_ms: 3,
            results: vec![FlowResult::errored("roster-test", &E2eError::PlaywrightNotFound)],
        };
        let path = runner.write_results(&suite).unwrap();
        let written: SuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.failed, 1);
        assert!(!written.success());
    }

    #[test]
    fn test_missing_flows_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FlowRunner::with_config(RunnerConfig {
            flows_dir: dir.path().join("absent"),
            ..Default::default()
        });
        assert!(runner.load_flows().unwrap().is_empty());
    }
}
