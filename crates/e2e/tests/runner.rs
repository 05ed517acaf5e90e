//! FlowRunner against a stub app, a stub auth server, and a scripted stand-in for node

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use common::{AuthStub, SERVICE_ROLE_KEY};
use matchup_e2e::flows;
use matchup_e2e::playwright::PlaywrightConfig;
use matchup_e2e::provision::SupabaseAdmin;
use matchup_e2e::runner::FlowResult;
use matchup_e2e::server::AppServerConfig;
use matchup_e2e::{Flow, FlowRunner, RunnerConfig};

/// Tests here write executables and then run them; one at a time keeps a
/// concurrent fork from holding a script open for writing.
static SERIAL: Mutex<()> = Mutex::new(());

const ROSTER_PASSES: &str = r#"
echo '{"event":"step","index":0,"name":"goto","ok":true,"duration_ms":3}'
echo 'node chatter that is not an event'
echo '{"event":"step","index":1,"name":"screenshot","ok":true,"duration_ms":4}'
echo '{"event":"done","ok":true}'
"#;

const LOGIN_FAILS_AT_EMAIL: &str = r#"
echo '{"event":"step","index":0,"name":"goto","ok":true,"duration_ms":3}'
echo '{"event":"step","index":1,"name":"fill","ok":false,"duration_ms":5000,"error":"locator not found"}'
echo '{"event":"done","ok":false,"error":"locator not found"}'
exit 1
"#;

const NODE_CRASHES: &str = r#"
echo "Error: Cannot find module '@playwright/test'" >&2
exit 1
"#;

struct Harness {
    dir: tempfile::TempDir,
    stub: AuthStub,
    runner: FlowRunner,
}

impl Harness {
    async fn new(node_body: &str, flow_timeout: Duration, provisioning: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let node = fake_node(dir.path(), node_body);

        let app_url = common::serve(Router::new().route("/", get(|| async { "matchup" }))).await;
        let stub = AuthStub::default();
        let admin = if provisioning {
            Some(SupabaseAdmin::new(stub.serve().await, SERVICE_ROLE_KEY).unwrap())
        } else {
            None
        };

        let runner = FlowRunner::with_config(RunnerConfig {
            server: AppServerConfig {
                base_url: app_url.clone(),
                spawn: false,
                ..Default::default()
            },
            playwright: PlaywrightConfig {
                base_url: app_url,
                artifacts_dir: dir.path().join("verification"),
                node,
                flow_timeout,
                ..Default::default()
            },
            provisioning: admin,
            output_dir: dir.path().join("results"),
            ..Default::default()
        });

        Self { dir, stub, runner }
    }

    fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join("verification").join(name)
    }

    fn write_png(&self, name: &str) {
        let path = self.artifact(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::new(4, 3).save(path).unwrap();
    }

    async fn run(&mut self, flow: Flow) -> FlowResult {
        let mut suite = self.runner.run_flows(&[flow]).await.unwrap();
        assert_eq!(suite.total, 1);
        suite.results.remove(0)
    }
}

/// An executable that answers the install check and otherwise runs `body`
fn fake_node(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("node");
    std::fs::write(
        &path,
        format!("#!/bin/sh\nif [ \"$1\" = \"-e\" ]; then exit 0; fi\n{}\n", body),
    )
    .unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn serial() -> std::sync::MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

#[tokio::test]
async fn passing_flow_records_its_screenshot() {
    let _guard = serial();
    let mut h = Harness::new(ROSTER_PASSES, Duration::from_secs(10), false).await;
    h.write_png(flows::VERIFICATION_SCREENSHOT);

    let result = h.run(flows::roster_screenshot()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.screenshots.len(), 1);
    assert_eq!((result.screenshots[0].width, result.screenshots[0].height), (4, 3));
    assert!(result.account.is_none());
}

#[tokio::test]
async fn passing_flow_without_its_screenshot_fails() {
    let _guard = serial();
    let mut h = Harness::new(ROSTER_PASSES, Duration::from_secs(10), false).await;

    let result = h.run(flows::roster_screenshot()).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("Screenshot not written"), "{}", error);
    assert!(error.contains("verification.png"), "{}", error);
}

#[tokio::test]
async fn failed_step_skips_evidence_and_removes_the_account() {
    let _guard = serial();
    let mut h = Harness::new(LOGIN_FAILS_AT_EMAIL, Duration::from_secs(10), true).await;
    // a stale file from an earlier run must not be picked up
    h.write_png("main_page.png");

    let result = h.run(flows::main_page()).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("fill:label[Email]"), "{}", error);
    assert!(error.contains("locator not found"), "{}", error);
    assert!(result.screenshots.is_empty());
    assert!(result.account.unwrap().ends_with("@test.com"));

    assert!(h.stub.users.lock().unwrap().is_empty());
    assert_eq!(h.stub.deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn flow_timeout_kills_node_and_removes_the_account() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let survived = dir.path().join("survived");
    let body = format!("sleep 2 && touch '{}'", survived.display());
    let mut h = Harness::new(&body, Duration::from_millis(300), true).await;

    let started = Instant::now();
    let result = h.run(flows::main_page()).await;
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("Timed out after 300 ms"), "{}", error);
    assert!(error.contains("main-page"), "{}", error);
    assert!(h.stub.users.lock().unwrap().is_empty());
    assert_eq!(h.stub.deleted.lock().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!survived.exists(), "node outlived the flow timeout");
}

#[tokio::test]
async fn node_dying_before_done_reports_stderr() {
    let _guard = serial();
    let mut h = Harness::new(NODE_CRASHES, Duration::from_secs(10), false).await;

    let result = h.run(flows::roster_screenshot()).await;

    assert!(!result.success);
    assert!(result.steps.is_empty());
    let error = result.error.unwrap();
    assert!(error.contains("Script failed"), "{}", error);
    assert!(error.contains("Cannot find module '@playwright/test'"), "{}", error);
}

#[tokio::test]
async fn seeded_shared_account_survives_a_provisioned_run() {
    let _guard = serial();
    let mut h = Harness::new(NODE_CRASHES, Duration::from_secs(10), true).await;
    h.stub.seed("seeded", "test@test.com");

    let result = h.run(flows::integration_connect()).await;

    assert_eq!(result.account.as_deref(), Some("test@test.com"));
    assert_eq!(
        *h.stub.users.lock().unwrap(),
        vec![("seeded".to_string(), "test@test.com".to_string())]
    );
    assert!(h.stub.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_shared_account_is_created_for_the_run_only() {
    let _guard = serial();
    let mut h = Harness::new(NODE_CRASHES, Duration::from_secs(10), true).await;

    h.run(flows::integration_connect()).await;

    assert!(h.stub.emails().is_empty());
    assert_eq!(h.stub.deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn required_account_without_admin_fails_before_the_browser() {
    let _guard = serial();
    let mut h = Harness::new(ROSTER_PASSES, Duration::from_secs(10), false).await;

    let result = h.run(flows::main_page()).await;

    assert!(!result.success);
    assert!(result.steps.is_empty());
    assert!(result.error.unwrap().contains("needs a provisioned account"));
}
