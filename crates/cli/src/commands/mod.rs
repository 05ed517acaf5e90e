//! CLI Commands

pub mod list;
pub mod run;
pub mod script;

use std::path::Path;

use matchup_e2e::{flows, Flow};

/// Built-in flows followed by YAML flows from `flows_dir`
pub fn available_flows(flows_dir: &Path) -> anyhow::Result<Vec<(Flow, FlowSource)>> {
    let mut all: Vec<(Flow, FlowSource)> = flows::catalog()
        .into_iter()
        .map(|f| (f, FlowSource::Builtin))
        .collect();

    if flows_dir.is_dir() {
        for flow in Flow::load_all(flows_dir)? {
            if all.iter().any(|(f, _)| f.name == flow.name) {
                anyhow::bail!(
                    "flow '{}' in {} shadows a built-in flow",
                    flow.name,
                    flows_dir.display()
                );
            }
            all.push((flow, FlowSource::File));
        }
    }

    Ok(all)
}

/// Pick flows by name (in the order given) or by tag
pub fn select_flows(
    names: &[String],
    tag: Option<&str>,
    all: bool,
    flows_dir: &Path,
) -> anyhow::Result<Vec<Flow>> {
    let available = available_flows(flows_dir)?;

    if let Some(tag) = tag {
        return Ok(available
            .into_iter()
            .map(|(f, _)| f)
            .filter(|f| f.tags.iter().any(|t| t == tag))
            .collect());
    }

    if all {
        return Ok(available.into_iter().map(|(f, _)| f).collect());
    }

    let wanted: Vec<String> = if names.is_empty() {
        flows::DEFAULT_FLOWS.iter().map(|n| n.to_string()).collect()
    } else {
        names.to_vec()
    };

    wanted
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|(f, _)| &f.name == name)
                .map(|(f, _)| f.clone())
                .ok_or_else(|| {
                    anyhow::anyhow!("unknown flow '{}' (see `matchup-verify list`)", name)
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowSource {
    Builtin,
    File,
}
