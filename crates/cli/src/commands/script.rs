//! `script` - print the generated Playwright script for a flow

use clap::Args;
use std::path::PathBuf;

use matchup_e2e::playwright::{Browser, PlaywrightConfig, PlaywrightHandle};

#[derive(Args)]
pub struct ScriptArgs {
    /// Flow name
    pub name: String,

    /// Directory of YAML flows
    #[arg(long, default_value = "flows")]
    pub flows_dir: PathBuf,

    /// Base URL of the app under test
    #[arg(long, env = "MATCHUP_BASE_URL", default_value = "http://localhost:9002")]
    pub base_url: String,

    /// Directory screenshots are written under
    #[arg(long, default_value = "verification")]
    pub artifacts_dir: PathBuf,

    /// Directory mock-route fixture paths are relative to
    #[arg(long, env = "MATCHUP_FIXTURES_DIR", default_value = "crates/e2e")]
    pub fixtures_dir: PathBuf,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    pub browser: Browser,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
}

pub fn execute(args: ScriptArgs) -> anyhow::Result<()> {
    let flows = super::select_flows(&[args.name], None, false, &args.flows_dir)?;

    let playwright = PlaywrightHandle::without_install_check(PlaywrightConfig {
        base_url: args.base_url,
        artifacts_dir: args.artifacts_dir,
        fixtures_dir: args.fixtures_dir,
        browser: args.browser,
        headless: !args.headed,
        ..Default::default()
    })?;

    for flow in flows {
        let credentials = flow.account.resolve();
        print!("{}", playwright.build_script(&flow.bind(credentials.as_ref())));
    }
    Ok(())
}
