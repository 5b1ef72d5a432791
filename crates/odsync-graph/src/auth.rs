//! OAuth2 PKCE authentication flow for Microsoft Graph API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for
//! authenticating native desktop applications with Microsoft identity
//! platform.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Configuration for the OAuth2 flow
//! - [`Tokens`] - An access/refresh token pair with its expiry
//! - [`KeyringTokenStorage`] - Secure token storage using the system keyring
//! - [`PKCEFlow`] - OAuth2 PKCE challenge/exchange logic
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`GraphAuthAdapter`] - Orchestrates the full authentication flow

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default Microsoft OAuth2 authorization endpoint (consumers tenant).
const AUTH_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";

/// Default Microsoft OAuth2 token endpoint (consumers tenant).
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";

/// Default redirect URI for the local callback server.
const REDIRECT_URI: &str = "http://127.0.0.1:8400/callback";

/// Keyring service name for storing tokens.
const KEYRING_SERVICE: &str = "odsync";

/// Default OAuth2 scopes for OneDrive access.
const DEFAULT_SCOPES: &[&str] = &["Files.ReadWrite.All", "User.Read", "offline_access"];

// ============================================================================
// Tokens
// ============================================================================

/// An OAuth2 access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token presented on every Graph API request.
    pub access_token: String,
    /// Long-lived token used to mint new access tokens without a browser.
    pub refresh_token: Option<String>,
    /// When `access_token` stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Whether `access_token` has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 PKCE authentication flow.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Application (client) ID from the Azure AD app registration.
    pub app_id: String,
    /// Redirect URI for receiving the authorization code.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    /// Creates a new `OAuth2Config` with the given app id and default settings.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            redirect_uri: REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Creates a config with custom scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Creates a config with a custom redirect URI.
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }
}

// ============================================================================
// KeyringTokenStorage
// ============================================================================

/// Stores and retrieves OAuth tokens from the system keyring.
///
/// Uses the `keyring` crate to store tokens securely in the OS credential
/// store (e.g. GNOME Keyring, KDE Wallet, macOS Keychain). Tokens are
/// serialized as JSON under the service name `"odsync"`, keyed by the user's
/// email.
pub struct KeyringTokenStorage;

impl KeyringTokenStorage {
    /// Stores tokens in the system keyring for the given user.
    pub fn store(username: &str, tokens: &Tokens) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, username)
            .context("failed to create keyring entry")?;
        let json = serde_json::to_string(tokens).context("failed to serialize tokens")?;
        entry
            .set_password(&json)
            .context("failed to store tokens in keyring")?;
        debug!(username, "stored tokens in keyring");
        Ok(())
    }

    /// Loads tokens from the system keyring for the given user.
    pub fn load(username: &str) -> Result<Option<Tokens>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, username)
            .context("failed to create keyring entry")?;
        match entry.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("failed to deserialize tokens from keyring")?;
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("failed to read from keyring")),
        }
    }

    /// Removes tokens from the system keyring for the given user.
    pub fn clear(username: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, username)
            .context("failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) => {
                info!(username, "cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("failed to delete from keyring")),
        }
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate.
pub struct PKCEFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
}

impl PKCEFlow {
    /// Creates a new `PKCEFlow` with the given configuration.
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.app_id.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("invalid redirect URI")?,
            );

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge.
    ///
    /// Returns `(authorization_url, csrf_token, pkce_verifier)`. The verifier
    /// must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self.client.authorize_url(CsrfToken::new_random);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token) = auth_request.set_pkce_challenge(pkce_challenge).url();

        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens.
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
    ) -> Result<Tokens> {
        info!("exchanging authorization code for tokens");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("failed to exchange authorization code")?;

        Ok(Self::to_tokens(&token_result, None))
    }

    /// Refreshes an expired access token using a refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("refreshing access token");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .context("failed to refresh token")?;

        Ok(Self::to_tokens(&token_result, Some(refresh_token)))
    }

    fn to_tokens(
        token_result: &impl TokenResponse,
        fallback_refresh_token: Option<&str>,
    ) -> Tokens {
        let expires_at = token_result
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| fallback_refresh_token.map(str::to_string)),
            expires_at,
        }
    }
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// Minimal HTTP server that listens on localhost for the OAuth2 redirect
/// callback.
///
/// Starts an HTTP server on `127.0.0.1:8400` that waits for the OAuth
/// provider to redirect the user's browser back with an authorization code,
/// then responds with a success page and shuts down.
pub struct LocalCallbackServer;

/// Parameters extracted from the OAuth2 callback.
#[derive(Debug)]
pub struct CallbackParams {
    /// The authorization code.
    pub code: String,
    /// The CSRF state parameter.
    pub state: String,
}

impl LocalCallbackServer {
    /// Starts the local callback server and waits for the OAuth redirect.
    pub async fn start() -> Result<CallbackParams> {
        use http_body_util::Full;
        use hyper::body::Bytes;
        use hyper::server::conn::http1;
        use hyper::service::service_fn;
        use hyper::{Request, Response, StatusCode};
        use hyper_util::rt::TokioIo;
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        info!("starting local OAuth callback server on 127.0.0.1:8400");

        let listener = TcpListener::bind("127.0.0.1:8400")
            .await
            .context("failed to bind callback server to 127.0.0.1:8400")?;

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = std::sync::Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let (stream, _addr) = listener
            .accept()
            .await
            .context("failed to accept connection on callback server")?;

        let io = TokioIo::new(stream);
        let tx_clone = tx.clone();

        let service = service_fn(move |req: Request<hyper::body::Incoming>| {
            let tx_inner = tx_clone.clone();
            async move {
                let params = parse_callback_params(&req.uri().to_string());
                match params {
                    Some(callback_params) => {
                        if let Some(sender) = tx_inner.lock().await.take() {
                            let _ = sender.send(callback_params);
                        }
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(StatusCode::OK)
                                .header("Content-Type", "text/html; charset=utf-8")
                                .body(Full::new(Bytes::from(success_html())))
                                .unwrap(),
                        )
                    }
                    None => Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .header("Content-Type", "text/html; charset=utf-8")
                        .body(Full::new(Bytes::from(error_html(
                            "Missing authorization code in callback",
                        ))))
                        .unwrap()),
                }
            }
        });

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!("callback server connection error: {e}");
            }
        });

        let params = rx
            .await
            .context("callback server channel closed without receiving parameters")?;
        Ok(params)
    }
}

/// Parses the authorization code and state from a callback URI.
fn parse_callback_params(uri: &str) -> Option<CallbackParams> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            _ => {}
        }
    }
    Some(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Authentication Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Successful</h1>
    <p>You have been authenticated with OneDrive.</p>
    <p>You can close this window and return to the application.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Authentication Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authentication Error</h1>
    <p>{message}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

// ============================================================================
// GraphAuthAdapter
// ============================================================================

/// High-level authentication adapter that orchestrates the full OAuth2 PKCE
/// flow: generate the authorization URL, open the browser, wait for the
/// local callback, exchange the code for tokens.
pub struct GraphAuthAdapter {
    config: OAuth2Config,
}

impl GraphAuthAdapter {
    /// Creates a new `GraphAuthAdapter` with the given configuration.
    pub fn new(config: OAuth2Config) -> Self {
        Self { config }
    }

    /// Creates a new `GraphAuthAdapter` with just an app id.
    pub fn with_app_id(app_id: impl Into<String>) -> Self {
        Self {
            config: OAuth2Config::new(app_id),
        }
    }

    /// Performs the full interactive OAuth2 PKCE login flow.
    pub async fn login(&self) -> Result<Tokens> {
        info!("starting OAuth2 PKCE login flow");

        let flow = PKCEFlow::new(&self.config)?;
        let (auth_url, _csrf_token, pkce_verifier) = flow.generate_auth_url();

        webbrowser::open(&auth_url).context("failed to open browser for authentication")?;

        let callback = LocalCallbackServer::start().await?;
        let tokens = flow.exchange_code(callback.code, pkce_verifier).await?;

        info!("OAuth2 PKCE login completed successfully");
        Ok(tokens)
    }

    /// Refreshes an expired access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        let flow = PKCEFlow::new(&self.config)?;
        flow.refresh_token(refresh_token).await
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }
}
