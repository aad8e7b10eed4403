// API client module: a small blocking HTTP client for the service's
// `/authorizations` resource. Every request is authenticated with basic
// auth plus, once the user has entered one, a two-factor code header.

use std::fmt;
use std::ops::ControlFlow;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;

/// Header carrying the one-time two-factor code, and announcing that one is
/// required on a 401.
pub const OTP_HEADER: &str = "X-GitHub-OTP";

const ACCEPT_VALUE: &str = "application/vnd.github+json";
const USER_AGENT_VALUE: &str = concat!("ghauth/", env!("CARGO_PKG_VERSION"));
const MAX_PAGES: usize = 100;

/// Login details collected from the user.
#[derive(Clone, Default)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub otp: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("otp", &self.otp.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Delivery channel the service announced for the two-factor code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoFactorMethod {
    Sms,
    App,
    Other(String),
}

impl TwoFactorMethod {
    /// Parse an `X-GitHub-OTP` response header such as `required; sms`.
    /// Returns `None` unless the header says a code is required.
    pub fn from_header(value: &str) -> Option<Self> {
        let mut parts = value.split(';').map(str::trim);
        if !parts.next()?.eq_ignore_ascii_case("required") {
            return None;
        }
        let method = match parts.next().unwrap_or_default().to_ascii_lowercase().as_str() {
            "sms" => TwoFactorMethod::Sms,
            "app" => TwoFactorMethod::App,
            other => TwoFactorMethod::Other(other.to_string()),
        };
        Some(method)
    }
}

impl fmt::Display for TwoFactorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TwoFactorMethod::Sms => f.write_str("sms"),
            TwoFactorMethod::App => f.write_str("app"),
            TwoFactorMethod::Other(m) if m.is_empty() => f.write_str("unknown"),
            TwoFactorMethod::Other(m) => f.write_str(m),
        }
    }
}

/// One entry of the `errors` array in a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub code: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.resource, self.field, self.code)
    }
}

/// An access token record as returned by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorization {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub app: Option<AppInfo>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub note_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl Authorization {
    /// Whether this authorization was created for `app_name`. The service
    /// labels personal tokens `"<note> (API)"` in the `app.name` field and
    /// does not always echo `note` back.
    pub fn matches_app(&self, app_name: &str) -> bool {
        if self.note.as_deref() == Some(app_name) {
            return true;
        }
        let generated = format!("{} (API)", app_name);
        self.app.as_ref().is_some_and(|app| app.name == generated)
    }
}

#[derive(Serialize)]
struct CreateAuthorizationRequest<'a> {
    scopes: &'a [String],
    note: &'a str,
}

/// What the resolution protocol needs from the remote service.
pub trait AuthorizationStore {
    /// Replace the two-factor code sent with subsequent requests.
    fn set_otp(&mut self, otp: Option<String>);

    /// First authorization labelled for `app_name`, searching every page.
    fn find_authorization(&self, app_name: &str) -> Result<Option<Authorization>, ApiError>;

    fn create_authorization(
        &self,
        app_name: &str,
        scopes: &[String],
    ) -> Result<Authorization, ApiError>;

    /// Prod the service into sending an SMS code.
    fn request_sms_challenge(&self) -> Result<(), ApiError>;
}

/// Blocking client bound to one base URL and one set of credentials.
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .default_headers(accept_headers())
            .build()?;
        Ok(ApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn authorizations_url(&self) -> String {
        format!("{}/authorizations", self.base_url)
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ApiError> {
        let mut req = self.basic_request(method, url);
        if let Some(otp) = &self.credentials.otp {
            let value =
                HeaderValue::from_str(otp).map_err(|_| ApiError::InvalidHeader(OTP_HEADER))?;
            req = req.header(OTP_HEADER, value);
        }
        Ok(req)
    }

    fn basic_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.credentials.login, Some(&self.credentials.password))
    }

    /// Fetch one page of authorizations and the URL of the next page, if any.
    fn fetch_page(&self, url: &str) -> Result<(Vec<Authorization>, Option<String>), ApiError> {
        debug!(url, "fetching authorizations page");
        let res = self.request(Method::GET, url)?.send()?;
        let res = expect_status(res, StatusCode::OK)?;
        let next = res
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link)
            .and_then(|next| res.url().join(&next).ok())
            .map(String::from);
        let page: Vec<Authorization> = res.json()?;
        Ok((page, next))
    }

    /// Walk the paginated listing, handing each page to `visit` until it
    /// breaks or the last page has been seen.
    fn walk_pages<F>(&self, mut visit: F) -> Result<(), ApiError>
    where
        F: FnMut(Vec<Authorization>) -> ControlFlow<()>,
    {
        let mut url = self.authorizations_url();
        for _ in 0..MAX_PAGES {
            let (page, next) = self.fetch_page(&url)?;
            if visit(page).is_break() {
                return Ok(());
            }
            match next {
                Some(next) => url = next,
                None => return Ok(()),
            }
        }
        Err(ApiError::TooManyPages(MAX_PAGES))
    }

    /// Every authorization on the account, across all pages.
    pub fn list_authorizations(&self) -> Result<Vec<Authorization>, ApiError> {
        let mut all = Vec::new();
        self.walk_pages(|page| {
            all.extend(page);
            ControlFlow::Continue(())
        })?;
        Ok(all)
    }
}

impl AuthorizationStore for ApiClient {
    fn set_otp(&mut self, otp: Option<String>) {
        self.credentials.otp = otp;
    }

    fn find_authorization(&self, app_name: &str) -> Result<Option<Authorization>, ApiError> {
        let mut found = None;
        self.walk_pages(|page| match page.into_iter().find(|a| a.matches_app(app_name)) {
            Some(auth) => {
                found = Some(auth);
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        })?;
        if let Some(auth) = &found {
            info!(id = auth.id, app_name, "found existing authorization");
        }
        Ok(found)
    }

    fn create_authorization(
        &self,
        app_name: &str,
        scopes: &[String],
    ) -> Result<Authorization, ApiError> {
        let body = CreateAuthorizationRequest {
            scopes,
            note: app_name,
        };
        let res = self
            .request(Method::POST, &self.authorizations_url())?
            .json(&body)
            .send()?;
        let res = expect_status(res, StatusCode::CREATED)?;
        let auth: Authorization = res.json()?;
        info!(id = auth.id, app_name, ?scopes, "created authorization");
        Ok(auth)
    }

    fn request_sms_challenge(&self) -> Result<(), ApiError> {
        // sent without the otp header; the 401 it earns is expected
        let res = self
            .basic_request(Method::POST, &self.authorizations_url())
            .send()?;
        debug!(status = res.status().as_u16(), "sms challenge requested");
        Ok(())
    }
}

/// A client whose requests carry `Authorization: token <token>`.
pub fn authenticated_client(token: &str) -> Result<Client, ApiError> {
    let mut headers = accept_headers();
    let mut value = HeaderValue::from_str(&format!("token {}", token))
        .map_err(|_| ApiError::InvalidHeader("Authorization"))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(Client::builder()
        .user_agent(USER_AGENT_VALUE)
        .default_headers(headers)
        .build()?)
}

fn accept_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers
}

/// Pass `res` through when it has the expected status, otherwise turn it into
/// the matching error.
fn expect_status(res: Response, expected: StatusCode) -> Result<Response, ApiError> {
    let status = res.status();
    if status == expected {
        return Ok(res);
    }
    if status == StatusCode::UNAUTHORIZED {
        let method = res
            .headers()
            .get(OTP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(TwoFactorMethod::from_header);
        if let Some(method) = method {
            return Err(ApiError::OtpRequired(method));
        }
    }
    let body = res.text().unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), &body))
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';').map(str::trim);
        let target = parts.next()?.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });
        is_next.then(|| target.to_string())
    })
}
