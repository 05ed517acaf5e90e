//! Matchup browser verification
//!
//! This crate drives the Matchup web app through a real browser and checks
//! what a signed-in user sees:
//! - Reuses or spawns the app's dev server and waits until it answers
//! - Describes each check as a linear [`Flow`] (built in, or YAML)
//! - Runs every flow in its own Playwright browser session via node
//! - Creates and removes test accounts through the Supabase admin API
//! - Verifies the screenshots each flow leaves behind
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   FlowRunner (Rust)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │    ├── start_server() -> AppServer                          │
//! │    ├── provision(flow) -> ProvisionedUser                   │
//! │    ├── PlaywrightHandle::run_flow(flow) -> FlowOutcome      │
//! │    └── visual::inspect(screenshot) -> ScreenshotArtifact    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Flow                                                       │
//! │    ├── name, account, provision                             │
//! │    └── steps: [Step]                                        │
//! │          ├── goto { url }                                   │
//! │          ├── fill { target, value }                         │
//! │          ├── click { target }                               │
//! │          ├── wait_for_url { url, timeout_ms? }              │
//! │          ├── expect_visible { target, timeout_ms? }         │
//! │          └── screenshot { path }                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod credentials;
pub mod error;
pub mod flow;
pub mod flows;
pub mod locator;
pub mod playwright;
pub mod provision;
pub mod runner;
pub mod server;
pub mod visual;

pub use credentials::{Account, Credentials};
pub use error::{E2eError, E2eResult};
pub use flow::{Flow, Provision, Step};
pub use locator::Locator;
pub use runner::{FlowRunner, RunnerConfig, SuiteResult};
