//! Test account provisioning through the Supabase admin API

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::error::{E2eError, E2eResult};

pub const SUPABASE_URL_ENV: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const SERVICE_ROLE_KEY_ENV: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Page size requested from the admin user list
pub const USERS_PER_PAGE: usize = 50;

/// Admin client able to create and delete auth users
#[derive(Clone)]
pub struct SupabaseAdmin {
    client: reqwest::Client,
    url: String,
    service_role_key: String,
}

/// A user created for one flow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct AdminUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminUserList {
    #[serde(default)]
    users: Vec<AdminUser>,
}

#[derive(Serialize)]
struct CreateUser<'a> {
    email: &'a str,
    password: &'a str,
    email_confirm: bool,
}

impl SupabaseAdmin {
    pub fn new(url: impl Into<String>, service_role_key: impl Into<String>) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        })
    }

    /// Build a client from the environment; `None` unless both variables are set
    pub fn from_env() -> E2eResult<Option<Self>> {
        let url = std::env::var(SUPABASE_URL_ENV).ok().filter(|v| !v.is_empty());
        let key = std::env::var(SERVICE_ROLE_KEY_ENV).ok().filter(|v| !v.is_empty());

        match (url, key) {
            (Some(url), Some(key)) => Ok(Some(Self::new(url, key)?)),
            _ => Ok(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn users_endpoint(&self) -> String {
        format!("{}/auth/v1/admin/users", self.url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    /// Create a confirmed user with the given credentials
    pub async fn create_user(&self, credentials: &Credentials) -> E2eResult<ProvisionedUser> {
        debug!("Creating user {}", credentials.email);

        let resp = self
            .authorized(self.client.post(self.users_endpoint()))
            .json(&CreateUser {
                email: &credentials.email,
                password: &credentials.password,
                email_confirm: true,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(E2eError::Provision(format!(
                "Failed to create user {}: {} {}",
                credentials.email, status, body
            )));
        }

        let user: AdminUser = resp.json().await?;
        info!("Created user {} ({})", credentials.email, user.id);

        Ok(ProvisionedUser {
            id: user.id,
            email: user.email.unwrap_or_else(|| credentials.email.clone()),
        })
    }

    /// Delete a user by id
    pub async fn delete_user(&self, id: &str) -> E2eResult<()> {
        debug!("Deleting user {}", id);

        let resp = self
            .authorized(self.client.delete(format!("{}/{}", self.users_endpoint(), id)))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(E2eError::Provision(format!(
                "Failed to delete user {}: {} {}",
                id, status, body
            )));
        }

        info!("Deleted user {}", id);
        Ok(())
    }

    /// Look a user up by email, walking every page of the user list
    pub async fn find_user_by_email(&self, email: &str) -> E2eResult<Option<ProvisionedUser>> {
        for page in 1.. {
            let resp = self
                .authorized(self.client.get(self.users_endpoint()))
                .query(&[("page", page), ("per_page", USERS_PER_PAGE)])
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(E2eError::Provision(format!("Failed to list users: {}", status)));
            }

            let list: AdminUserList = resp.json().await?;
            let count = list.users.len();

            let found = list
                .users
                .into_iter()
                .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)));
            if let Some(user) = found {
                return Ok(Some(ProvisionedUser {
                    id: user.id,
                    email: email.to_string(),
                }));
            }

            if count < USERS_PER_PAGE {
                break;
            }
            debug!("{} not on page {}, fetching next", email, page);
        }

        Ok(None)
    }

    /// Create a user, first deleting any existing user with the same email
    pub async fn recreate_user(&self, credentials: &Credentials) -> E2eResult<ProvisionedUser> {
        if let Some(existing) = self.find_user_by_email(&credentials.email).await? {
            info!("Removing existing user {}", existing.email);
            self.delete_user(&existing.id).await?;
        }
        self.create_user(credentials).await
    }

    /// Create the user only if nobody holds the email yet.
    ///
    /// Returns the new user, or `None` when an existing account was left in place.
    pub async fn ensure_user(
        &self,
        credentials: &Credentials,
    ) -> E2eResult<Option<ProvisionedUser>> {
        if let Some(existing) = self.find_user_by_email(&credentials.email).await? {
            info!("Using existing user {} ({})", existing.email, existing.id);
            return Ok(None);
        }
        self.create_user(credentials).await.map(Some)
    }
}

impl std::fmt::Debug for SupabaseAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAdmin")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
