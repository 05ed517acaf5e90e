//! Login credentials used as form input by verification flows

use rand::distributions::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain used for generated accounts
pub const GENERATED_EMAIL_DOMAIN: &str = "test.com";

/// Password given to generated accounts
pub const GENERATED_PASSWORD: &str = "password";

/// Length of the random part of a generated email
pub const RANDOM_PART_LEN: usize = 10;

/// Pre-seeded account used by flows that do not register their own user
pub const TEST_ACCOUNT_EMAIL: &str = "test@test.com";
pub const TEST_ACCOUNT_PASSWORD: &str = "test";

/// Email/password pair typed into the login and registration forms
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Fresh `test_<random>@test.com` account with the fixed password
    pub fn generated() -> Self {
        Self::new(
            format!("test_{}@{}", random_string(RANDOM_PART_LEN), GENERATED_EMAIL_DOMAIN),
            GENERATED_PASSWORD,
        )
    }

    pub fn fixed_test_account() -> Self {
        Self::new(TEST_ACCOUNT_EMAIL, TEST_ACCOUNT_PASSWORD)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Which account a flow logs in with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Account {
    /// The flow never types credentials
    #[default]
    None,
    /// A new random account per run
    Generated,
    /// A known account
    Fixed { email: String, password: String },
}

impl Account {
    pub fn test_account() -> Self {
        Account::Fixed {
            email: TEST_ACCOUNT_EMAIL.to_string(),
            password: TEST_ACCOUNT_PASSWORD.to_string(),
        }
    }

    /// Produce the concrete credentials for one run.
    pub fn resolve(&self) -> Option<Credentials> {
        match self {
            Account::None => None,
            Account::Generated => Some(Credentials::generated()),
            Account::Fixed { email, password } => Some(Credentials::new(email, password)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Account::None => "-".to_string(),
            Account::Generated => format!("test_*@{}", GENERATED_EMAIL_DOMAIN),
            Account::Fixed { email, .. } => email.clone(),
        }
    }
}

/// Random string of lowercase ascii letters
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(Uniform::new_inclusive(b'a', b'z'))
        .take(len)
        .map(char::from)
        .collect()
}
