//! App server management - reusing or spawning the dev server and waiting for it

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to the app under test.
///
/// When an already-running app was reused the handle owns no process and
/// stopping it is a no-op.
pub struct AppServer {
    child: Option<Child>,
    base_url: String,
}

impl AppServer {
    /// Make sure the app answers at `config.base_url`, spawning it if allowed
    pub async fn ensure(config: AppServerConfig) -> E2eResult<Self> {
        let client = probe_client()?;

        // Without permission to spawn, whatever is answering is the app under test
        if (config.reuse_existing || !config.spawn) && is_up(&client, &config.base_url).await {
            info!("Using app already running at {}", config.base_url);
            return Ok(Self {
                child: None,
                base_url: config.base_url,
            });
        }

        if !config.spawn {
            return Err(E2eError::AppUnreachable {
                url: config.base_url,
                attempts: 1,
            });
        }

        Self::spawn(config, &client).await
    }

    async fn spawn(config: AppServerConfig, client: &reqwest::Client) -> E2eResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| E2eError::AppStartup("empty server command".to_string()))?;

        info!("Spawning app server: {}", config.command.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args).stdout(Stdio::null()).stderr(Stdio::null());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::AppStartup(format!("Failed to spawn {}: {}", config.command.join(" "), e))
        })?;

        let mut server = AppServer {
            child: Some(child),
            base_url: config.base_url,
        };

        // Wait for the app to answer
        if let Err(e) = server.wait_until_up(client, config.startup_timeout).await {
            server.shutdown().await;
            return Err(e);
        }

        info!("App is up at {}", server.base_url);
        Ok(server)
    }

    /// Poll the base URL until it answers
    async fn wait_until_up(
        &mut self,
        client: &reqwest::Client,
        timeout_duration: Duration,
    ) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            if is_up(client, &self.base_url).await {
                return Ok(());
            }
            if attempts == 1 {
                info!("Waiting for app to start...");
            }

            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(E2eError::AppStartup(format!(
                        "server command exited early with {}",
                        status
                    )));
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::AppUnreachable {
            url: self.base_url.clone(),
            attempts,
        })
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this handle started the app itself
    pub fn is_owned(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the server if this handle spawned it
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if terminate(&child) {
            std::thread::sleep(SHUTDOWN_GRACE);
        }
        force_kill(&mut child);

        Ok(())
    }

    /// Same as [`stop`](Self::stop) without blocking the runtime during the grace period
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if terminate(&child) {
            sleep(SHUTDOWN_GRACE).await;
        }
        force_kill(&mut child);
    }
}

/// Time a SIGTERM'd server gets before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Ask the server to exit; true when a signal was delivered
fn terminate(child: &Child) -> bool {
    info!("Stopping app server (pid: {})", child.id());

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).is_ok()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn force_kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn probe_client() -> E2eResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// Statuses that mean "something is serving", matching Playwright's web server check
pub fn is_up_status(status: reqwest::StatusCode) -> bool {
    status.is_success() || status.is_redirection() || (400..=403).contains(&status.as_u16())
}

async fn is_up(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) if is_up_status(resp.status()) => true,
        Ok(resp) => {
            warn!("App at {} answered {}", url, resp.status());
            false
        }
        Err(e) => {
            // Connection refused is expected while the app is starting
            if !e.is_connect() {
                debug!("Probe error for {}: {}", url, e);
            }
            false
        }
    }
}

/// Configuration for reaching the app under test
#[derive(Debug, Clone)]
pub struct AppServerConfig {
    /// URL the flows run against
    pub base_url: String,

    /// Command that starts the app
    pub command: Vec<String>,

    /// Directory the command runs in
    pub working_dir: Option<PathBuf>,

    /// Timeout for app startup
    pub startup_timeout: Duration,

    /// Use an app that is already answering instead of spawning one
    pub reuse_existing: bool,

    /// Whether this runner may start the app at all
    pub spawn: bool,
}

impl Default for AppServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9002".to_string(),
            command: vec!["npm".to_string(), "run".to_string(), "dev".to_string()],
            working_dir: None,
            startup_timeout: Duration::from_secs(120),
            reuse_existing: std::env::var_os("CI").is_none(),
            spawn: false,
        }
    }
}
