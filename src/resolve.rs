// Token resolution.
//
// The protocol is linear: cached token, else prompt for credentials, look
// for an authorization already labelled for the application, else create
// one, then cache whatever was obtained. Any remote step may be answered
// with a two-factor challenge; the user is asked for a code and the same
// step is retried.

use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthorizationStore, Credentials, TwoFactorMethod};
use crate::cache::TokenCache;
use crate::config::Settings;
use crate::error::{ApiError, AuthError};
use crate::ui::Prompter;

/// Two-factor prompts allowed in one run before giving up.
pub const MAX_TWO_FACTOR_PROMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cache,
    Found,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub source: TokenSource,
}

pub struct TokenResolver<P> {
    settings: Settings,
    prompter: P,
    read_cache: bool,
}

impl<P: Prompter> TokenResolver<P> {
    pub fn new(settings: Settings, prompter: P) -> Self {
        TokenResolver {
            settings,
            prompter,
            read_cache: true,
        }
    }

    /// Ignore an existing cached token. A freshly obtained one is still
    /// written back.
    pub fn skip_cache_read(mut self, skip: bool) -> Self {
        self.read_cache = !skip;
        self
    }

    /// Resolve a token against the configured API.
    pub fn resolve(&mut self, app_name: &str, scopes: &[String]) -> Result<Token, AuthError> {
        let api_url = self.settings.api_url.clone();
        self.resolve_with(app_name, scopes, |credentials| {
            ApiClient::new(&api_url, credentials)
        })
    }

    /// Resolve a token using `connect` to build the remote store once
    /// credentials are known.
    pub fn resolve_with<S, F>(
        &mut self,
        app_name: &str,
        scopes: &[String],
        connect: F,
    ) -> Result<Token, AuthError>
    where
        S: AuthorizationStore,
        F: FnOnce(Credentials) -> Result<S, ApiError>,
    {
        let app_name = app_name.trim();
        if app_name.is_empty() {
            return Err(AuthError::EmptyAppName);
        }

        let cache = TokenCache::for_app(&self.settings.cache_dir, app_name);
        if self.read_cache {
            if let Some(value) = cache.load()? {
                info!(path = %cache.path().display(), "using cached token");
                return Ok(Token {
                    value,
                    source: TokenSource::Cache,
                });
            }
        }

        let scopes = dedup_scopes(scopes);
        let credentials = self.prompter.credentials().map_err(AuthError::Prompt)?;
        debug!(login = %credentials.login, "credentials collected");
        let mut store = connect(credentials)?;

        let result = self.acquire(&mut store, app_name, &scopes);
        self.prompter.done();
        let token = result?;

        cache.store(&token.value)?;
        info!(path = %cache.path().display(), source = ?token.source, "token cached");
        Ok(token)
    }

    fn acquire<S: AuthorizationStore>(
        &mut self,
        store: &mut S,
        app_name: &str,
        scopes: &[String],
    ) -> Result<Token, AuthError> {
        let mut prompts = 0;

        self.prompter.status("Looking for an existing token...");
        let found =
            self.with_two_factor(store, &mut prompts, |s| s.find_authorization(app_name))?;
        match found {
            Some(auth) if !auth.token.is_empty() => {
                return Ok(Token {
                    value: auth.token,
                    source: TokenSource::Found,
                });
            }
            Some(auth) => {
                warn!(
                    id = auth.id,
                    "existing authorization does not expose its token, creating a new one"
                );
            }
            None => debug!(app_name, "no existing authorization"),
        }

        self.prompter.status("Creating a new token...");
        let created = self.with_two_factor(store, &mut prompts, |s| {
            s.create_authorization(app_name, scopes)
        })?;
        if created.token.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(Token {
            value: created.token,
            source: TokenSource::Created,
        })
    }

    /// Run `step`, answering two-factor challenges until it settles.
    fn with_two_factor<S, T, F>(
        &mut self,
        store: &mut S,
        prompts: &mut u32,
        mut step: F,
    ) -> Result<T, AuthError>
    where
        S: AuthorizationStore,
        F: FnMut(&S) -> Result<T, ApiError>,
    {
        loop {
            let method = match step(&*store) {
                Err(ApiError::OtpRequired(method)) => method,
                other => return other.map_err(AuthError::from),
            };
            if *prompts >= MAX_TWO_FACTOR_PROMPTS {
                return Err(AuthError::TwoFactorFailed(*prompts));
            }
            *prompts += 1;
            info!(%method, attempt = *prompts, "two-factor code required");

            if method == TwoFactorMethod::Sms {
                store.request_sms_challenge()?;
            }
            let code = self
                .prompter
                .two_factor_code(&method)
                .map_err(AuthError::Prompt)?;
            store.set_otp((!code.is_empty()).then_some(code));
        }
    }
}

/// Drop blank and repeated scopes, keeping first-seen order.
fn dedup_scopes(scopes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(scopes.len());
    for scope in scopes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|s| s == scope) {
            out.push(scope.to_string());
        }
    }
    out
}
