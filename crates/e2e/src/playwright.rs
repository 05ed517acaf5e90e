//! Playwright browser automation

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::flow::{Flow, Step};
use crate::locator::js_string;

/// Playwright browser handle
pub struct PlaywrightHandle {
    /// Base URL of the app under test
    base_url: String,

    /// Absolute directory screenshots are written under
    artifacts_dir: PathBuf,

    /// Absolute directory mock-route fixtures are read from
    fixtures_dir: PathBuf,

    /// node_modules containing @playwright/test
    node_modules: PathBuf,

    /// node executable that runs the generated scripts
    node: PathBuf,

    /// Browser type
    browser: Browser,

    headless: bool,

    /// Upper bound on one flow's node process
    flow_timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// Result of executing a flow step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// What one browser session did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub success: bool,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl FlowOutcome {
    /// The step that stopped the flow, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }
}

/// Lines the generated script prints on stdout
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    Step {
        index: usize,
        ok: bool,
        duration_ms: u64,
        #[serde(default)]
        error: Option<String>,
    },
    Log {
        message: String,
    },
    Done {
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        let handle = Self::without_install_check(config)?;
        // Verify playwright is installed
        handle.check_playwright_installed()?;
        Ok(handle)
    }

    /// Create a handle without probing for a Playwright install.
    ///
    /// Script generation does not need node and touches nothing on disk; only
    /// [`run_flow`](Self::run_flow) does.
    pub fn without_install_check(config: PlaywrightConfig) -> E2eResult<Self> {
        let cwd = std::env::current_dir()?;

        Ok(Self {
            base_url: config.base_url,
            artifacts_dir: cwd.join(&config.artifacts_dir),
            fixtures_dir: cwd.join(&config.fixtures_dir),
            node_modules: cwd.join(&config.node_modules),
            node: config.node,
            browser: config.browser,
            headless: config.headless,
            flow_timeout: config.flow_timeout,
        })
    }

    /// Check that node can resolve @playwright/test the way the scripts will
    fn check_playwright_installed(&self) -> E2eResult<()> {
        let output = Command::new(&self.node)
            .args(["-e", "require.resolve('@playwright/test')"])
            .env("NODE_PATH", &self.node_modules)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where a screenshot step's file lands
    pub fn artifact_path(&self, path: &Path) -> PathBuf {
        self.artifacts_dir.join(path)
    }

    /// Absolute URL for a step target
    pub fn resolve_url(&self, url: &str) -> String {
        resolve_url(&self.base_url, url)
    }

    /// Generate a display name for a step
    pub fn step_name(step: &Step) -> String {
        match step {
            Step::Goto { url } => format!("goto:{}", url),
            Step::Fill { target, .. } => format!("fill:{}", target),
            Step::Click { target, .. } => format!("click:{}", target),
            Step::WaitForUrl { url, .. } => format!("wait_for_url:{}", url),
            Step::ExpectVisible { target, .. } => format!("expect_visible:{}", target),
            Step::ExpectText { target, .. } => format!("expect_text:{}", target),
            Step::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
            Step::MockRoute { url, .. } => format!("mock_route:{}", url),
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }

    /// Build the node script that runs a whole flow in one browser session
    pub fn build_script(&self, flow: &Flow) -> String {
        let mut script = String::new();

        // Header
        let _ = write!(
            script,
            r#"const {{ chromium, firefox, webkit, expect }} = require('@playwright/test');

const emit = (event) => console.log(JSON.stringify(event));
const message = (error) => String((error && error.message) || error);

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  let ok = true;
  try {{
    const context = await browser.newContext({{
      viewport: {{ width: {width}, height: {height} }}
    }});
    const page = await context.newPage();
    const run = async (index, name, body) => {{
      const started = Date.now();
      try {{
        await body();
        emit({{ event: 'step', index, name, ok: true, duration_ms: Date.now() - started }});
      }} catch (error) {{
        emit({{ event: 'step', index, name, ok: false, duration_ms: Date.now() - started, error: message(error) }});
        throw error;
      }}
    }};
"#,
            browser = self.browser.as_str(),
            headless = self.headless,
            width = flow.viewport.width,
            height = flow.viewport.height,
        );

        // Step code
        for (i, step) in flow.steps.iter().enumerate() {
            let name = Self::step_name(step);
            let _ = write!(
                script,
                "\n    // Step {}: {}\n    await run({}, {}, async () => {{\n{}\n    }});\n",
                i + 1,
                comment_safe(&name),
                i,
                js_string(&name),
                self.step_to_js(step)
            );
        }

        // Footer
        script.push_str(
            r#"
    emit({ event: 'done', ok: true });
  } catch (error) {
    ok = false;
    emit({ event: 'done', ok: false, error: message(error) });
  } finally {
    await browser.close();
  }
  process.exit(ok ? 0 : 1);
})();
"#,
        );

        script
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &Step) -> String {
        match step {
            Step::Goto { url } => {
                format!("      await page.goto({});", js_string(&self.resolve_url(url)))
            }
            Step::Fill { target, value } => {
                format!("      await {}.fill({});", target.to_js(), js_string(value))
            }
            Step::Click { target, timeout_ms } => {
                format!("      await {}.click({});", target.to_js(), timeout_option(*timeout_ms))
            }
            Step::WaitForUrl { url, timeout_ms } => format!(
                "      await page.waitForURL({}, {});",
                js_string(&self.resolve_url(url)),
                timeout_option(*timeout_ms)
            ),
            Step::ExpectVisible { target, timeout_ms } => format!(
                "      await expect({}).toBeVisible({});",
                target.to_js(),
                timeout_option(*timeout_ms)
            ),
            Step::ExpectText {
                target,
                text,
                timeout_ms,
            } => format!(
                "      await expect({}).toHaveText({}, {});",
                target.to_js(),
                js_string(text),
                timeout_option(*timeout_ms)
            ),
            Step::Screenshot { path, full_page } => {
                let path = self.artifact_path(path);
                format!(
                    "      await page.screenshot({{ path: {}, fullPage: {} }});",
                    js_string(&path.to_string_lossy()),
                    full_page
                )
            }
            Step::MockRoute { url, fixture } => {
                let fixture = self.fixtures_dir.join(fixture);
                format!(
                    "      await page.route({}, (route) => route.fulfill({{ path: {} }}));",
                    js_string(url),
                    js_string(&fixture.to_string_lossy())
                )
            }
            Step::Sleep { ms } => format!("      await page.waitForTimeout({});", ms),
            Step::Log { message } => {
                format!("      emit({{ event: 'log', message: {} }});", js_string(message))
            }
        }
    }

    /// Run a flow in a fresh browser and collect per-step results
    pub async fn run_flow(&self, flow: &Flow) -> E2eResult<FlowOutcome> {
        std::fs::create_dir_all(&self.artifacts_dir)?;
        for path in flow.screenshot_paths() {
            if let Some(parent) = self.artifact_path(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join(format!("{}.js", flow.name));
        std::fs::write(&script_path, self.build_script(flow))?;

        debug!("Running Playwright script: {}", script_path.display());
        let start = Instant::now();

        let child = TokioCommand::new(&self.node)
            .arg(&script_path)
            .env("NODE_PATH", &self.node_modules)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!("Failed to spawn {}: {}", self.node.display(), e))
            })?;

        let output = match tokio::time::timeout(self.flow_timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(E2eError::Timeout {
                    what: format!("flow '{}'", flow.name),
                    timeout_ms: self.flow_timeout.as_millis() as u64,
                })
            }
        };

        debug!(
            "Playwright exited with {} after {} ms",
            output.status,
            start.elapsed().as_millis()
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut outcome = self.parse_output(flow, &stdout);

        if !output.status.success() && outcome.error.is_none() {
            // node died before the script could report, e.g. a missing module
            outcome.success = false;
            outcome.error = Some(format!(
                "Script failed ({}):\nstdout: {}\nstderr: {}",
                output.status,
                stdout.trim(),
                strip_ansi(stderr.trim())
            ));
        } else if !stderr.trim().is_empty() {
            debug!("Playwright stderr: {}", stderr.trim());
        }

        Ok(outcome)
    }

    /// Turn the script's event lines into step results
    fn parse_output(&self, flow: &Flow, stdout: &str) -> FlowOutcome {
        let mut steps = Vec::new();
        let mut done: Option<(bool, Option<String>)> = None;

        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let event = match serde_json::from_str::<ScriptEvent>(line) {
                Ok(event) => event,
                Err(_) => {
                    debug!("[node] {}", line);
                    continue;
                }
            };

            match event {
                ScriptEvent::Step {
                    index,
                    ok,
                    duration_ms,
                    error,
                } => {
                    let Some(step) = flow.steps.get(index) else {
                        warn!("Script reported unknown step index {}", index);
                        continue;
                    };
                    let screenshot_path = match step {
                        Step::Screenshot { path, .. } if ok => Some(self.artifact_path(path)),
                        _ => None,
                    };
                    steps.push(StepResult {
                        success: ok,
                        step_name: Self::step_name(step),
                        duration_ms,
                        error: error.map(|e| strip_ansi(&e)),
                        screenshot_path,
                    });
                }
                ScriptEvent::Log { message } => info!("[{}] {}", flow.name, message),
                ScriptEvent::Done { ok, error } => done = Some((ok, error.map(|e| strip_ansi(&e)))),
            }
        }

        let failed = steps.iter().find(|s| !s.success).map(|s| {
            E2eError::StepFailed {
                step: s.step_name.clone(),
                reason: s.error.clone().unwrap_or_default(),
            }
            .to_string()
        });

        match (done, failed) {
            (_, Some(error)) => FlowOutcome {
                success: false,
                steps,
                error: Some(error),
            },
            (Some((true, _)), None) => FlowOutcome {
                success: true,
                steps,
                error: None,
            },
            (Some((false, error)), None) => FlowOutcome {
                success: false,
                steps,
                error: Some(error.unwrap_or_else(|| "browser session failed".to_string())),
            },
            (None, None) => FlowOutcome {
                success: false,
                steps,
                error: None,
            },
        }
    }
}

/// Flatten every JavaScript line terminator so text can sit in a `//` comment
fn comment_safe(text: &str) -> String {
    text.replace(&['\n', '\r', '\u{2028}', '\u{2029}'][..], " ")
}

fn timeout_option(timeout_ms: Option<u64>) -> String {
    match timeout_ms {
        Some(ms) => format!("{{ timeout: {} }}", ms),
        None => "{}".to_string(),
    }
}

/// Join a step URL onto the base URL; absolute URLs pass through.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.contains("://") || url.starts_with("data:") || url.starts_with("about:") {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}

/// Remove terminal colour codes Playwright puts in assertion messages
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<regex::Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        regex::Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI escape pattern is valid")
    });
    re.replace_all(text, "").into_owned()
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub artifacts_dir: PathBuf,
    pub fixtures_dir: PathBuf,
    pub node_modules: PathBuf,
    pub node: PathBuf,
    pub browser: Browser,
    pub headless: bool,
    pub flow_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9002".to_string(),
            artifacts_dir: PathBuf::from("verification"),
            fixtures_dir: PathBuf::from("crates/e2e"),
            node_modules: PathBuf::from("node_modules"),
            node: PathBuf::from("node"),
            browser: Browser::Chromium,
            headless: true,
            flow_timeout: Duration::from_secs(120),
        }
    }
}
