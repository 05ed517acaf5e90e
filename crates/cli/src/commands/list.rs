//! `list` - show available flows

use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::FlowSource;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    /// Directory of YAML flows
    #[arg(long, default_value = "flows")]
    pub flows_dir: PathBuf,

    /// Show only flows with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[derive(Serialize)]
struct FlowInfo {
    name: String,
    source: FlowSource,
    account: String,
    steps: usize,
    tags: Vec<String>,
    description: String,
}

impl TableDisplay for FlowInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Source", "Account", "Steps", "Tags", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{:?}", self.source).to_lowercase(),
            self.account.clone(),
            self.steps.to_string(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let infos: Vec<FlowInfo> = super::available_flows(&args.flows_dir)?
        .into_iter()
        .filter(|(f, _)| args.tag.as_ref().map_or(true, |t| f.tags.contains(t)))
        .map(|(f, source)| FlowInfo {
            account: f.account.describe(),
            steps: f.steps.len(),
            name: f.name,
            source,
            tags: f.tags,
            description: f.description,
        })
        .collect();

    output::print_list(&infos, format);
    Ok(())
}
