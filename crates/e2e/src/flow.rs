//! Declarative verification flows

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::credentials::{Account, Credentials};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// Placeholder replaced with the resolved account email
pub const EMAIL_PLACEHOLDER: &str = "${email}";

/// Placeholder replaced with the resolved account password
pub const PASSWORD_PLACEHOLDER: &str = "${password}";

/// A linear browser session: steps run in order against one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default)]
    pub viewport: Viewport,

    /// Account the flow types into the forms
    #[serde(default)]
    pub account: Account,

    /// Whether the account must exist before the flow starts
    #[serde(default)]
    pub provision: Provision,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Account provisioning policy for a flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provision {
    /// Never touch accounts (the flow registers its own, or needs none)
    #[default]
    Never,
    /// Recreate the account when an admin client is configured,
    /// otherwise assume it is pre-seeded
    IfConfigured,
    /// The flow cannot run without creating its account first
    Required,
}

/// A single step in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to base)
    Goto { url: String },

    /// Fill an input field
    Fill { target: Locator, value: String },

    /// Click an element
    Click {
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Block until the page URL matches
    WaitForUrl {
        url: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Block until an element is visible
    ExpectVisible {
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Block until an element's text equals the expected value
    ExpectText {
        target: Locator,
        text: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Take a screenshot (path relative to the artifacts directory)
    Screenshot {
        path: PathBuf,
        #[serde(default)]
        full_page: bool,
    },

    /// Answer requests matching `url` with the contents of a local file
    MockRoute { url: String, fixture: PathBuf },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message (for debugging)
    Log { message: String },
}

impl Flow {
    /// Parse a flow from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let flow: Flow = serde_yaml::from_str(yaml)?;
        flow.validate()?;
        Ok(flow)
    }

    /// Parse a flow from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::FlowParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all flows from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut flows = Vec::new();

        let mut entries: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .collect();
        entries.sort_by(|a, b| a.path().cmp(b.path()));

        for entry in entries {
            flows.push(Self::from_file(entry.path())?);
        }

        Ok(flows)
    }

    /// Filter flows by tag
    pub fn filter_by_tag<'a>(flows: &'a [Self], tag: &str) -> Vec<&'a Self> {
        flows.iter().filter(|f| f.tags.iter().any(|t| t == tag)).collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::FlowParse("flow name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::FlowParse(format!("flow '{}' has no steps", self.name)));
        }
        if self.account == Account::None && self.uses_placeholders() {
            return Err(E2eError::FlowParse(format!(
                "flow '{}' uses credential placeholders but declares no account",
                self.name
            )));
        }
        Ok(())
    }

    fn uses_placeholders(&self) -> bool {
        self.steps.iter().any(|step| match step {
            Step::Fill { value, .. } => {
                value.contains(EMAIL_PLACEHOLDER) || value.contains(PASSWORD_PLACEHOLDER)
            }
            _ => false,
        })
    }

    /// Substitute credential placeholders in fill values.
    pub fn bind(&self, credentials: Option<&Credentials>) -> Flow {
        let mut bound = self.clone();
        if let Some(creds) = credentials {
            for step in &mut bound.steps {
                if let Step::Fill { value, .. } = step {
                    *value = value
                        .replace(EMAIL_PLACEHOLDER, &creds.email)
                        .replace(PASSWORD_PLACEHOLDER, &creds.password);
                }
            }
        }
        bound
    }

    /// Screenshot paths declared by this flow, in step order
    pub fn screenshot_paths(&self) -> Vec<&Path> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Screenshot { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }
}
