//! Built-in verification flows for the Matchup app

use std::path::PathBuf;

use crate::credentials::Account;
use crate::error::{E2eError, E2eResult};
use crate::flow::{Flow, Provision, Step, Viewport, EMAIL_PLACEHOLDER, PASSWORD_PLACEHOLDER};
use crate::locator::Locator;

pub const REGISTER_LOGIN: &str = "register-login";
pub const INTEGRATIONS_CONNECT: &str = "integrations-connect";
pub const ROSTER_TEST: &str = "roster-test";
pub const MAIN_PAGE: &str = "main-page";
pub const OTTONEU_MATCHUP: &str = "ottoneu-matchup";
pub const LOGIN: &str = "login";
pub const REGISTER: &str = "register";

/// Flows run when no names are given
pub const DEFAULT_FLOWS: [&str; 3] = [REGISTER_LOGIN, INTEGRATIONS_CONNECT, ROSTER_TEST];

/// Evidence screenshot shared by the verification flows
pub const VERIFICATION_SCREENSHOT: &str = "verification.png";

/// Time allowed for the post-login redirect home
pub const LOGIN_REDIRECT_TIMEOUT_MS: u64 = 10_000;

/// Sleeper account linked by the integrations flow
pub const SLEEPER_TEST_USERNAME: &str = "test";

/// Every built-in flow
pub fn catalog() -> Vec<Flow> {
    vec![
        registration_login(),
        integration_connect(),
        roster_screenshot(),
        main_page(),
        ottoneu_matchup(),
        login_flow(),
        register_flow(),
    ]
}

pub fn names() -> Vec<String> {
    catalog().into_iter().map(|f| f.name).collect()
}

pub fn find(name: &str) -> E2eResult<Flow> {
    catalog()
        .into_iter()
        .find(|f| f.name == name)
        .ok_or_else(|| E2eError::UnknownFlow(name.to_string()))
}

fn flow(
    name: &str,
    description: &str,
    tags: &[&str],
    account: Account,
    provision: Provision,
    steps: Vec<Step>,
) -> Flow {
    Flow {
        name: name.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        viewport: Viewport::default(),
        account,
        provision,
        steps,
    }
}

fn goto(url: &str) -> Step {
    Step::Goto { url: url.to_string() }
}

fn fill(target: Locator, value: &str) -> Step {
    Step::Fill {
        target,
        value: value.to_string(),
    }
}

fn click(name: &str) -> Step {
    Step::Click {
        target: Locator::button(name),
        timeout_ms: None,
    }
}

fn expect_visible(text: &str) -> Step {
    Step::ExpectVisible {
        target: Locator::text(text),
        timeout_ms: None,
    }
}

fn expect_button(name: &str) -> Step {
    Step::ExpectVisible {
        target: Locator::button(name),
        timeout_ms: None,
    }
}

fn screenshot(path: &str) -> Step {
    Step::Screenshot {
        path: PathBuf::from(path),
        full_page: false,
    }
}

/// Fill the credential form and submit it with `button`
fn submit_credentials(button: &str) -> Vec<Step> {
    vec![
        fill(Locator::label("Email"), EMAIL_PLACEHOLDER),
        fill(Locator::label("Password"), PASSWORD_PLACEHOLDER),
        click(button),
    ]
}

fn login(redirect_timeout_ms: Option<u64>) -> Vec<Step> {
    let mut steps = vec![goto("/login")];
    steps.extend(submit_credentials("Sign In"));
    steps.push(Step::WaitForUrl {
        url: "/".to_string(),
        timeout_ms: redirect_timeout_ms,
    });
    steps
}

/// Register a fresh account, log in with it, and expect the matchups view.
pub fn registration_login() -> Flow {
    let mut steps = vec![goto("/register"), screenshot("register_page.png")];
    steps.extend(submit_credentials("Sign Up"));
    steps.extend(login(Some(LOGIN_REDIRECT_TIMEOUT_MS)));
    steps.push(expect_visible("Weekly Matchups"));
    steps.push(screenshot(VERIFICATION_SCREENSHOT));

    flow(
        REGISTER_LOGIN,
        "Register a random user, log in, and see Weekly Matchups",
        &["auth", "smoke"],
        Account::Generated,
        Provision::Never,
        steps,
    )
}

/// Connect a Sleeper username and expect both roster sections at home.
pub fn integration_connect() -> Flow {
    let mut steps = login(None);
    steps.extend([
        goto("/integrations"),
        fill(Locator::label("Sleeper Username"), SLEEPER_TEST_USERNAME),
        click("Connect"),
        goto("/"),
        expect_visible("My Players"),
        expect_visible("Opponent Players"),
        screenshot(VERIFICATION_SCREENSHOT),
    ]);

    flow(
        INTEGRATIONS_CONNECT,
        "Connect a Sleeper account and see both rosters",
        &["integrations", "smoke"],
        Account::test_account(),
        Provision::IfConfigured,
        steps,
    )
}

/// Screenshot the unauthenticated roster test route.
pub fn roster_screenshot() -> Flow {
    flow(
        ROSTER_TEST,
        "Screenshot the roster test page",
        &["roster", "smoke"],
        Account::None,
        Provision::Never,
        vec![goto("/roster-test"), screenshot(VERIFICATION_SCREENSHOT)],
    )
}

/// Log in with a freshly provisioned account and expect the matchups view.
pub fn main_page() -> Flow {
    let mut steps = login(None);
    steps.push(expect_visible("Weekly Matchups"));
    steps.push(expect_button("Sign Out"));
    steps.push(screenshot("main_page.png"));

    flow(
        MAIN_PAGE,
        "Log in with a provisioned account and see Weekly Matchups",
        &["auth"],
        Account::Generated,
        Provision::Required,
        steps,
    )
}

/// Open the Ottoneu matchup page with Ottoneu itself served from fixtures.
pub fn ottoneu_matchup() -> Flow {
    let mut steps = vec![
        Step::MockRoute {
            url: "https://ottoneu.fangraphs.com/football/309/team/2540".to_string(),
            fixture: PathBuf::from("fixtures/ottoneu_team_page.html"),
        },
        Step::MockRoute {
            url: "https://ottoneu.fangraphs.com/football/309/game/7282725".to_string(),
            fixture: PathBuf::from("fixtures/ottoneu_matchup_page.html"),
        },
    ];
    steps.extend(login(None));
    steps.extend([
        goto("/integrations/ottoneu/league/309/matchup"),
        Step::ExpectText {
            target: Locator::css("h1"),
            text: "Ottoneu Matchup".to_string(),
            timeout_ms: None,
        },
        screenshot("ottoneu_matchup.png"),
    ]);

    flow(
        OTTONEU_MATCHUP,
        "Render the Ottoneu matchup page from golden fixtures",
        &["integrations"],
        Account::Generated,
        Provision::Required,
        steps,
    )
}

/// Log in with a provisioned account and expect the signed-in header.
pub fn login_flow() -> Flow {
    let mut steps = login(None);
    steps.push(expect_button("Sign Out"));
    steps.push(screenshot("login.png"));

    flow(
        LOGIN,
        "Log in with a provisioned account and see Sign Out",
        &["auth"],
        Account::Generated,
        Provision::Required,
        steps,
    )
}

/// Create an account through the register form and land on the login page.
pub fn register_flow() -> Flow {
    let mut steps = vec![goto("/register")];
    steps.extend(submit_credentials("Create Account"));
    steps.extend([
        Step::WaitForUrl {
            url: "/login".to_string(),
            timeout_ms: None,
        },
        expect_button("Sign In"),
        screenshot("register.png"),
    ]);

    flow(
        REGISTER,
        "Register through the form and get sent to login",
        &["auth"],
        Account::Generated,
        Provision::Never,
        steps,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_unique() {
        let names = names();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn test_default_flows_exist() {
        for name in DEFAULT_FLOWS {
            assert!(find(name).is_ok(), "missing default flow {}", name);
        }
    }

    #[test]
    fn test_find_unknown() {
        assert!(matches!(find("nope"), Err(E2eError::UnknownFlow(_))));
    }

    #[test]
    fn test_registration_waits_ten_seconds_for_home() {
        let flow = registration_login();
        assert!(flow.steps.contains(&Step::WaitForUrl {
            url: "/".to_string(),
            timeout_ms: Some(LOGIN_REDIRECT_TIMEOUT_MS),
        }));
        assert_eq!(flow.steps.last(), Some(&screenshot(VERIFICATION_SCREENSHOT)));
    }

    #[test]
    fn test_roster_has_no_assertions() {
        let flow = roster_screenshot();
        assert!(flow
            .steps
            .iter()
            .all(|s| matches!(s, Step::Goto { .. } | Step::Screenshot { .. })));
        assert_eq!(flow.account, Account::None);
    }

    #[test]
    fn test_login_expects_sign_out() {
        let flow = login_flow();
        assert_eq!(flow.provision, Provision::Required);
        assert!(flow.steps.contains(&expect_button("Sign Out")));
        assert!(main_page().steps.contains(&expect_button("Sign Out")));
    }

    #[test]
    fn test_register_lands_on_login() {
        let flow = register_flow();
        let landed = flow
            .steps
            .iter()
            .position(|s| matches!(s, Step::WaitForUrl { url, .. } if url == "/login"))
            .unwrap();
        assert_eq!(flow.steps[landed + 1], expect_button("Sign In"));
        assert!(flow.steps.contains(&click("Create Account")));
    }
}
