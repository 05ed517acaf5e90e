//! `run` - execute flows in the browser

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use matchup_e2e::playwright::{Browser, PlaywrightConfig};
use matchup_e2e::provision::SupabaseAdmin;
use matchup_e2e::runner::FlowResult;
use matchup_e2e::server::AppServerConfig;
use matchup_e2e::{FlowRunner, RunnerConfig};

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    /// Flows to run (default: register-login, integrations-connect, roster-test)
    pub flows: Vec<String>,

    /// Run every built-in and YAML flow
    #[arg(long, conflicts_with = "flows")]
    pub all: bool,

    /// Run only flows with this tag
    #[arg(short, long, conflicts_with_all = ["flows", "all"])]
    pub tag: Option<String>,

    /// Directory of YAML flows
    #[arg(long, default_value = "flows")]
    pub flows_dir: PathBuf,

    /// Base URL of the app under test
    #[arg(long, env = "MATCHUP_BASE_URL", default_value = "http://localhost:9002")]
    pub base_url: String,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Directory screenshots are written under
    #[arg(long, default_value = "verification")]
    pub artifacts_dir: PathBuf,

    /// node_modules containing @playwright/test
    #[arg(long, default_value = "node_modules")]
    pub node_modules: PathBuf,

    /// Directory mock-route fixture paths are relative to
    #[arg(long, env = "MATCHUP_FIXTURES_DIR", default_value = "crates/e2e")]
    pub fixtures_dir: PathBuf,

    /// node executable used to run flows
    #[arg(long, env = "MATCHUP_NODE", default_value = "node")]
    pub node: PathBuf,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: Browser,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Upper bound on a single flow, in seconds
    #[arg(long, default_value = "120")]
    pub flow_timeout: u64,

    /// Start the app if it is not already answering
    #[arg(long)]
    pub start_server: bool,

    /// Command that starts the app
    #[arg(long, default_value = "npm run dev")]
    pub server_command: String,

    /// Directory the app command runs in
    #[arg(long, env = "MATCHUP_APP_DIR")]
    pub app_dir: Option<PathBuf>,

    /// Never create or delete accounts, even when Supabase admin credentials are set
    #[arg(long)]
    pub no_provision: bool,
}

struct FlowRow<'a> {
    result: &'a FlowResult,
}

impl TableDisplay for FlowRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Flow", "Status", "Duration", "Account", "Screenshots", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let r = self.result;
        vec![
            r.name.clone(),
            output::status(r.success),
            format!("{} ms", r.duration_ms),
            r.account.clone().unwrap_or_else(|| "-".to_string()),
            r.screenshots
                .iter()
                .map(|s| format!("{} ({} B)", s.path.display(), s.size_bytes))
                .collect::<Vec<_>>()
                .join("\n"),
            r.error.clone().unwrap_or_default(),
        ]
    }
}

/// Returns whether every flow passed
pub async fn execute(args: RunArgs, format: OutputFormat) -> anyhow::Result<bool> {
    let flows = super::select_flows(&args.flows, args.tag.as_deref(), args.all, &args.flows_dir)?;
    if flows.is_empty() {
        anyhow::bail!("no flows selected");
    }

    let provisioning = if args.no_provision {
        None
    } else {
        SupabaseAdmin::from_env()?
    };
    match &provisioning {
        Some(admin) => info!("Provisioning test accounts through {}", admin.url()),
        None => warn!("No Supabase admin credentials; flows that need fresh accounts will fail"),
    }

    let config = RunnerConfig {
        server: AppServerConfig {
            base_url: args.base_url.clone(),
            command: args.server_command.split_whitespace().map(String::from).collect(),
            working_dir: args.app_dir,
            spawn: args.start_server,
            ..Default::default()
        },
        playwright: PlaywrightConfig {
            base_url: args.base_url,
            artifacts_dir: args.artifacts_dir,
            fixtures_dir: args.fixtures_dir,
            node_modules: args.node_modules,
            node: args.node,
            browser: args.browser,
            headless: !args.headed,
            flow_timeout: Duration::from_secs(args.flow_timeout),
            ..Default::default()
        },
        provisioning,
        flows_dir: args.flows_dir,
        output_dir: args.output,
    };

    let mut runner = FlowRunner::with_config(config);
    let suite = runner.run_flows(&flows).await?;
    runner.write_results(&suite)?;
    runner.stop_server()?;

    let rows: Vec<FlowRow> = suite.results.iter().map(|result| FlowRow { result }).collect();
    output::print_report(&suite, &rows, format);

    if suite.success() {
        output::print_success(&format!("{} flow(s) passed", suite.passed));
    } else {
        output::print_error(&format!("{} of {} flow(s) failed", suite.failed, suite.total));
    }

    Ok(suite.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cmd {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_fixtures_dir_flag() {
        let cmd = Cmd::parse_from([
            "run",
            "--fixtures-dir",
            "/srv/matchup/crates/e2e",
            "ottoneu-matchup",
        ]);
        assert_eq!(cmd.run.fixtures_dir, PathBuf::from("/srv/matchup/crates/e2e"));
        assert_eq!(cmd.run.flows, vec!["ottoneu-matchup".to_string()]);
    }

    #[test]
    fn test_fixtures_dir_default_is_relative() {
        if std::env::var_os("MATCHUP_FIXTURES_DIR").is_some() {
            return;
        }
        let cmd = Cmd::parse_from(["run"]);
        assert_eq!(cmd.run.fixtures_dir, PathBuf::from("crates/e2e"));
        assert!(cmd.run.fixtures_dir.is_relative());
    }
}
