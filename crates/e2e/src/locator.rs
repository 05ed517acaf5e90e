//! Element locators resolved by accessible label, role, or visible text

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a step finds its element on the page.
///
/// In YAML a locator is a small map; the keys present pick the variant:
///
/// ```yaml
/// target: { label: Email }
/// target: { role: button, name: Sign In }
/// target: { text: Weekly Matchups }
/// target: { css: h1 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    /// ARIA role with an optional accessible name
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Form control by its associated label text
    Label { label: String },
    /// Element by its visible text
    Text { text: String },
    /// Raw CSS selector
    Css { css: String },
}

impl Locator {
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label { label: label.into() }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css { css: selector.into() }
    }

    /// Playwright expression that resolves this locator against `page`.
    pub fn to_js(&self) -> String {
        match self {
            Locator::Role { role, name: Some(name) } => format!(
                "page.getByRole({}, {{ name: {} }})",
                js_string(role),
                js_string(name)
            ),
            Locator::Role { role, name: None } => format!("page.getByRole({})", js_string(role)),
            Locator::Label { label } => format!("page.getByLabel({})", js_string(label)),
            Locator::Text { text } => format!("page.getByText({})", js_string(text)),
            Locator::Css { css } => format!("page.locator({})", js_string(css)),
        }
    }

    /// Short form used in step names and log lines
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Role { role, name: Some(name) } => write!(f, "{}[{}]", role, name),
            Locator::Role { role, name: None } => write!(f, "{}", role),
            Locator::Label { label } => write!(f, "label[{}]", label),
            Locator::Text { text } => write!(f, "text[{}]", text),
            Locator::Css { css } => write!(f, "css[{}]", css),
        }
    }
}

/// Quote a value as a JavaScript string literal.
///
/// JSON string syntax is a subset of JS string syntax, so quotes, backslashes
/// and control characters in user data cannot escape the literal.
pub fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}
