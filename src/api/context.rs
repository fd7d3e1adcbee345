/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use crate::api::errors::ConfigError;
use crate::api::signer::{oauth_protocol_params, sign_legacy, sign_oauth1};
use crate::api::{
    Fields, HttpMethod, HttpTransport, Permission, ReqwestTransport, ResponseParser, SizeModifier,
    XmlMapper,
};
use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

pub const REST_API_ENDPOINT: &str = "https://api.flickr.com/services/rest/";
pub const PHOTO_SOURCE: &str = "https://static.flickr.com/";
pub const PHOTO_WEB_PAGE_SOURCE: &str = "https://www.flickr.com/photos/";
pub const AUTH_ENDPOINT: &str = "https://www.flickr.com/services/auth/";
pub const UPLOAD_ENDPOINT: &str = "https://up.flickr.com/services/upload/";
pub const OAUTH_ENDPOINT: &str = "https://www.flickr.com/services/oauth/";

/// URLs the library talks to. Every field falls back to Flickr's production value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub rest: Url,
    pub photo_source: Url,
    pub photo_web_page: Url,
    pub auth: Url,
    pub upload: Url,
    /// Base for `request_token`, `access_token` and `authorize`
    pub oauth: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        // SAFETY: the constants above are valid absolute URLs
        let parse = |s: &str| Url::parse(s).expect("default endpoint is a valid URL");
        Self {
            rest: parse(REST_API_ENDPOINT),
            photo_source: parse(PHOTO_SOURCE),
            photo_web_page: parse(PHOTO_WEB_PAGE_SOURCE),
            auth: parse(AUTH_ENDPOINT),
            upload: parse(UPLOAD_ENDPOINT),
            oauth: parse(OAUTH_ENDPOINT),
        }
    }
}

impl Endpoints {
    pub fn oauth_request_token(&self) -> Url {
        join_or_base(&self.oauth, "request_token")
    }

    pub fn oauth_access_token(&self) -> Url {
        join_or_base(&self.oauth, "access_token")
    }

    pub fn oauth_authorize(&self) -> Url {
        join_or_base(&self.oauth, "authorize")
    }
}

fn join_or_base(base: &Url, path: &str) -> Url {
    base.join(path).unwrap_or_else(|_| base.clone())
}

/// OAuth access (or request) token with its secret
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthTokenPair {
    pub token: String,
    pub secret: String,
}

impl OAuthTokenPair {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for OAuthTokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenPair")
            .field("token", &"xxx")
            .field("secret", &"xxx")
            .finish()
    }
}

/// Credentials used to sign a single call, captured when the call starts
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    OAuth(OAuthTokenPair),
    Legacy { auth_token: Option<String> },
}

impl std::fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::OAuth(_) => f.write_str("OAuth"),
            AuthMode::Legacy { auth_token } => f
                .debug_struct("Legacy")
                .field("auth_token", &auth_token.as_ref().map(|_| "xxx"))
                .finish(),
        }
    }
}

#[derive(Default)]
struct Tokens {
    auth_token: Option<String>,
    oauth: Option<OAuthTokenPair>,
}

/// Holds the API key and secret, the current tokens and the endpoints.
///
/// Create one per application session and share it with `Arc` between requests.
/// The key and secret are fixed at construction, tokens can be swapped any time
/// but a change is not atomic with respect to a request that is just starting.
pub struct ApiContext {
    api_key: String,
    shared_secret: String,
    tokens: RwLock<Tokens>,
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    parser: Arc<dyn ResponseParser>,
}

impl ApiContext {
    /// Creates a context using the default endpoints, transport and XML parser
    pub fn new(api_key: &str, shared_secret: &str) -> Self {
        Self {
            api_key: api_key.into(),
            shared_secret: shared_secret.into(),
            tokens: RwLock::new(Tokens::default()),
            endpoints: Endpoints::default(),
            transport: Arc::new(ReqwestTransport::default()),
            parser: Arc::new(XmlMapper),
        }
    }

    /// Builds a context from `FLICKR_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        fn var(name: &'static str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }
        fn endpoint(name: &'static str, fallback: &Url) -> Result<Url, ConfigError> {
            match var(name) {
                Some(v) => Url::parse(&v).map_err(|e| ConfigError::UrlParsing(name, e)),
                None => Ok(fallback.clone()),
            }
        }

        let api_key = var("FLICKR_API_KEY").ok_or(ConfigError::MissingVar("FLICKR_API_KEY"))?;
        let shared_secret =
            var("FLICKR_SHARED_SECRET").ok_or(ConfigError::MissingVar("FLICKR_SHARED_SECRET"))?;

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            rest: endpoint("FLICKR_REST_ENDPOINT", &defaults.rest)?,
            photo_source: endpoint("FLICKR_PHOTO_SOURCE", &defaults.photo_source)?,
            photo_web_page: endpoint("FLICKR_PHOTO_WEB_PAGE", &defaults.photo_web_page)?,
            auth: endpoint("FLICKR_AUTH_ENDPOINT", &defaults.auth)?,
            upload: endpoint("FLICKR_UPLOAD_ENDPOINT", &defaults.upload)?,
            oauth: endpoint("FLICKR_OAUTH_ENDPOINT", &defaults.oauth)?,
        };

        let context = Self::new(&api_key, &shared_secret).with_endpoints(endpoints);
        context.set_auth_token(var("FLICKR_AUTH_TOKEN"));
        match (var("FLICKR_OAUTH_TOKEN"), var("FLICKR_OAUTH_TOKEN_SECRET")) {
            (Some(token), Some(secret)) => context.set_oauth_token(token, secret),
            (None, None) => {}
            _ => {
                return Err(ConfigError::IncompleteTokenPair(
                    "FLICKR_OAUTH_TOKEN",
                    "FLICKR_OAUTH_TOKEN_SECRET",
                ));
            }
        }
        Ok(context)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn shared_secret(&self) -> &str {
        &self.shared_secret
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn parser(&self) -> &Arc<dyn ResponseParser> {
        &self.parser
    }

    /// A context missing its key or secret can not sign anything
    pub fn is_usable(&self) -> bool {
        !self.api_key.is_empty() && !self.shared_secret.is_empty()
    }

    pub fn auth_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .auth_token
            .clone()
    }

    pub fn set_auth_token(&self, auth_token: Option<String>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .auth_token = auth_token.filter(|t| !t.is_empty());
    }

    pub fn oauth_token(&self) -> Option<OAuthTokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .oauth
            .clone()
    }

    /// Sets the OAuth token and secret together. An empty token clears the pair.
    pub fn set_oauth_token(&self, token: impl Into<String>, secret: impl Into<String>) {
        let pair = OAuthTokenPair::new(token, secret);
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .oauth = Some(pair).filter(|p| !p.token.is_empty());
    }

    pub fn clear_oauth_token(&self) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .oauth = None;
    }

    /// Credentials to sign with right now. OAuth wins over a legacy auth token.
    pub fn auth_mode(&self) -> AuthMode {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        match &tokens.oauth {
            Some(pair) => AuthMode::OAuth(pair.clone()),
            None => AuthMode::Legacy {
                auth_token: tokens.auth_token.clone(),
            },
        }
    }

    /// Adds the `api_key` and the authentication parameters for `mode` to `params`
    pub fn sign_params(
        &self,
        mode: &AuthMode,
        method: HttpMethod,
        url: &Url,
        mut params: Vec<(String, String)>,
    ) -> Vec<(String, String)> {
        params.push(("api_key".to_string(), self.api_key.clone()));
        match mode {
            AuthMode::OAuth(pair) => {
                params.extend(oauth_protocol_params(&self.api_key, Some(pair.token.as_str())));
                let signature = sign_oauth1(
                    &self.shared_secret,
                    Some(pair.secret.as_str()),
                    method,
                    url,
                    &params,
                );
                params.push(("oauth_signature".to_string(), signature));
            }
            AuthMode::Legacy { auth_token } => {
                if let Some(token) = auth_token {
                    params.push(("auth_token".to_string(), token.clone()));
                }
                let signature = sign_legacy(&self.shared_secret, &params);
                params.push(("api_sig".to_string(), signature));
            }
        }
        params
    }

    /// URL to send the user to for approving a request token
    pub fn authorization_url(&self, request_token: &str, permission: Permission) -> Url {
        let mut url = self.endpoints.oauth_authorize();
        url.query_pairs_mut()
            .append_pair("oauth_token", request_token)
            .append_pair("perms", permission.as_str());
        url
    }

    /// Direct URL of a photo file.
    ///
    /// `id`, `server` and `secret` must be present, `farm` is optional.
    pub fn photo_source_url<D: Fields + ?Sized>(&self, photo: &D, size: SizeModifier) -> Option<Url> {
        let id = photo.field("id").filter(|v| !v.is_empty())?;
        let server = photo.field("server").filter(|v| !v.is_empty())?;
        let secret = photo.field("secret").filter(|v| !v.is_empty())?;

        let mut url = self.endpoints.photo_source.clone();
        if let Some(farm) = photo.field("farm").filter(|v| !v.is_empty()) {
            let host = format!("farm{}.{}", farm, url.host_str()?);
            url.set_host(Some(&host)).ok()?;
        }

        let file_name = match size.suffix() {
            "" => format!("{id}_{secret}.jpg"),
            suffix => format!("{id}_{secret}_{suffix}.jpg"),
        };
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(server)
            .push(&file_name);
        Some(url)
    }

    /// Web page of a photo, needs `owner` and `id`
    pub fn photo_web_page_url<D: Fields + ?Sized>(&self, photo: &D) -> Option<Url> {
        let owner = photo.field("owner").filter(|v| !v.is_empty())?;
        let id = photo.field("id").filter(|v| !v.is_empty())?;

        let mut url = self.endpoints.photo_web_page.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push(owner)
            .push(id);
        Some(url)
    }

    /// Legacy authentication URL for a frob.
    ///
    /// `frob` may be the `frob` node of a `flickr.auth.getFrob` response or a plain field.
    pub fn legacy_login_url<D: Fields + ?Sized>(&self, frob: &D, permission: Permission) -> Option<Url> {
        let frob = frob.field("frob").filter(|v| !v.is_empty())?;
        let params = [
            ("api_key", self.api_key.as_str()),
            ("frob", frob),
            ("perms", permission.as_str()),
        ];
        let signature = sign_legacy(&self.shared_secret, &params);

        let mut url = self.endpoints.auth.clone();
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("api_sig", &signature);
        Some(url)
    }
}

impl std::fmt::Debug for ApiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiContext")
            .field("api_key", &"xxx")
            .field("shared_secret", &"xxx")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}
