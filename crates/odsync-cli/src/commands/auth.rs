//! Auth commands - Login, Logout, and Status for OneDrive authentication
//!
//! Single-account: tokens are stored in the system keyring under one fixed
//! identifier, since this synchronizer only ever drives one sync root
//! against one drive at a time.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use odsync_core::config::Config;
use odsync_graph::auth::{GraphAuthAdapter, KeyringTokenStorage};
use odsync_graph::client::GraphClient;

use crate::output::{get_formatter, OutputFormat};

/// Keyring username under which the single account's tokens are stored.
const KEYRING_USER: &str = "default";

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate with OneDrive via OAuth2
    Login {
        /// Custom Azure App ID
        #[arg(long)]
        app_id: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        match self {
            AuthCommand::Login { app_id } => self.execute_login(app_id.as_deref(), &*fmt).await,
            AuthCommand::Logout => self.execute_logout(&*fmt).await,
            AuthCommand::Status => self.execute_status(&*fmt, format).await,
        }
    }

    async fn execute_login(
        &self,
        cli_app_id: Option<&str>,
        fmt: &dyn crate::output::OutputFormatter,
    ) -> Result<()> {
        let config_path = Config::default_path();
        let config = Config::load_or_default(&config_path);

        let app_id = cli_app_id
            .map(str::to_string)
            .or(config.auth.app_id.clone())
            .context("No app_id provided. Use --app-id flag or set auth.app_id in config.yaml")?;

        info!(app_id = %app_id, "starting OAuth2 login");

        fmt.info("Opening browser for Microsoft login...");
        let auth_adapter = GraphAuthAdapter::with_app_id(app_id);
        let tokens = auth_adapter.login().await.context("OAuth2 login failed")?;

        fmt.info("Retrieving account information...");
        let user_info = GraphClient::new(tokens.access_token.clone())
            .get_user_info()
            .await
            .context("failed to retrieve user info from Graph API")?;

        KeyringTokenStorage::store(KEYRING_USER, &tokens)
            .context("failed to store tokens in keyring")?;

        info!(email = %user_info.email, "stored tokens");

        fmt.success(&format!(
            "Authenticated as {} ({})",
            user_info.display_name, user_info.email
        ));
        fmt.info(&format!("Sync root: {}", config.sync.root.display()));

        Ok(())
    }

    async fn execute_logout(&self, fmt: &dyn crate::output::OutputFormatter) -> Result<()> {
        KeyringTokenStorage::clear(KEYRING_USER).context("failed to clear tokens from keyring")?;
        fmt.success("Logged out successfully");
        fmt.info("Credentials removed from keyring");
        Ok(())
    }

    async fn execute_status(
        &self,
        fmt: &dyn crate::output::OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let tokens = KeyringTokenStorage::load(KEYRING_USER)
            .context("failed to read tokens from keyring")?;

        let Some(tokens) = tokens else {
            if matches!(format, OutputFormat::Json) {
                fmt.print_json(&serde_json::json!({"authenticated": false}));
            } else {
                fmt.info("Authentication status: not configured");
                fmt.info("Run 'odsync auth login' to authenticate");
            }
            return Ok(());
        };

        let token_status = if tokens.is_expired() { "expired" } else { "valid" };

        let user_info = GraphClient::new(tokens.access_token.clone()).get_user_info().await.ok();

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::json!({
                "authenticated": true,
                "token_status": token_status,
                "email": user_info.as_ref().map(|u| u.email.clone()),
                "display_name": user_info.as_ref().map(|u| u.display_name.clone()),
            }));
        } else {
            match &user_info {
                Some(u) => fmt.success(&format!("Authenticated as {} ({})", u.display_name, u.email)),
                None => fmt.success("Authenticated"),
            }
            fmt.info(&format!("Token status: {token_status}"));
        }

        Ok(())
    }
}
