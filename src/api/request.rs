/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use crate::api::errors::{FlickrError, TransportError};
use crate::api::multipart::{MultipartBody, UploadStream};
use crate::api::parsers::{access_token_response, request_token_response, rest_response};
use crate::api::signer::{oauth_protocol_params, sign_oauth1};
use crate::api::transport::{CallBody, HttpCall, InFlightCall, TransportEvents};
use crate::api::{ApiContext, HttpMethod, OAuthFlow, OAuthTokenPair, RequestState, ResponseEnvelope};
use bytes::Bytes;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use url::Url;

/// Arguments for an API method. This can be filters as well as other parameters the method expects
pub type ApiParams<'a> = [(&'a str, &'a str)];

/// Opaque value a caller can hang on a request for its own bookkeeping
pub type SessionInfo = Arc<dyn Any + Send + Sync>;

/// Response format requested from the REST endpoint
const RESPONSE_FORMAT: &str = "rest";

/// Result of the second OAuth leg.
///
/// Persisting the token pair (for example with [`ApiContext::set_oauth_token`]) is up to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
    pub full_name: String,
    pub user_name: String,
    pub user_nsid: String,
}

impl AccessToken {
    pub fn token_pair(&self) -> OAuthTokenPair {
        OAuthTokenPair::new(self.token.as_str(), self.secret.as_str())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"xxx")
            .field("secret", &"xxx")
            .field("full_name", &self.full_name)
            .field("user_name", &self.user_name)
            .field("user_nsid", &self.user_nsid)
            .finish()
    }
}

/// Gets told how a [`Request`] went.
///
/// Every method has an empty default, implement the ones you care about.
/// Calls arrive on whatever thread the transport reports from, never two at once
/// for the same request.
pub trait Receiver: Send + Sync {
    fn did_complete(&self, _request: &Request, _response: &ResponseEnvelope) {}

    fn did_fail(&self, _request: &Request, _error: &FlickrError) {}

    /// Upload progress, `sent` never decreases and never exceeds `total`
    fn upload_sent_bytes(&self, _request: &Request, _sent: u64, _total: u64) {}

    fn did_obtain_request_token(&self, _request: &Request, _token: &OAuthTokenPair) {}

    fn did_obtain_access_token(&self, _request: &Request, _token: &AccessToken) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Method,
    Upload,
    OAuth(OAuthFlow),
}

#[derive(Default)]
struct CallState {
    state: RequestState,
    kind: Option<CallKind>,
    in_flight: Option<Box<dyn InFlightCall>>,
    bytes_sent: u64,
}

enum Outcome {
    Response(ResponseEnvelope),
    RequestToken(OAuthTokenPair),
    AccessToken(AccessToken),
    Failure(FlickrError),
}

struct Inner {
    context: Arc<ApiContext>,
    call: Mutex<CallState>,
    receiver: Mutex<Option<Weak<dyn Receiver>>>,
    session_info: Mutex<Option<SessionInfo>>,
    timeout: Mutex<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A single call to the Flickr API.
///
/// A request runs at most one call in its lifetime: once it completed, failed or was
/// cancelled every further start is refused. Clones share the same call.
///
/// ```rust,no_run
/// use flickr::api::{ApiContext, FlickrError, Receiver, Request, ResponseEnvelope};
/// use std::sync::Arc;
///
/// struct Printer;
///
/// impl Receiver for Printer {
///     fn did_complete(&self, _request: &Request, response: &ResponseEnvelope) {
///         println!("{:?}", response.text("method"));
///     }
///
///     fn did_fail(&self, _request: &Request, error: &FlickrError) {
///         println!("failed: {error}");
///     }
/// }
///
/// # async fn run() {
/// let context = Arc::new(ApiContext::new("api-key", "shared-secret"));
/// let printer = Arc::new(Printer);
/// let request = Request::new(context);
/// request.set_receiver(&printer);
/// assert!(request.call_method_get("flickr.test.echo", &[("hello", "world")]));
/// # }
/// ```
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(context: Arc<ApiContext>) -> Self {
        Self {
            inner: Arc::new(Inner {
                context,
                call: Mutex::new(CallState::default()),
                receiver: Mutex::new(None),
                session_info: Mutex::new(None),
                timeout: Mutex::new(Self::DEFAULT_TIMEOUT),
            }),
        }
    }

    pub fn context(&self) -> &Arc<ApiContext> {
        &self.inner.context
    }

    /// Only a weak reference is kept, the request does not keep `receiver` alive
    pub fn set_receiver<R: Receiver + 'static>(&self, receiver: &Arc<R>) {
        let receiver: Weak<R> = Arc::downgrade(receiver);
        let receiver: Weak<dyn Receiver> = receiver;
        *lock(&self.inner.receiver) = Some(receiver);
    }

    pub fn clear_receiver(&self) {
        *lock(&self.inner.receiver) = None;
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        lock(&self.inner.session_info).clone()
    }

    pub fn set_session_info(&self, info: Option<SessionInfo>) {
        *lock(&self.inner.session_info) = info;
    }

    pub fn timeout(&self) -> Duration {
        *lock(&self.inner.timeout)
    }

    /// Applies to calls started after this
    pub fn set_timeout(&self, timeout: Duration) {
        *lock(&self.inner.timeout) = timeout;
    }

    pub fn state(&self) -> RequestState {
        lock(&self.inner.call).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RequestState::Running
    }

    /// The OAuth leg in progress, if any
    pub fn oauth_flow(&self) -> Option<OAuthFlow> {
        match lock(&self.inner.call).kind {
            Some(CallKind::OAuth(flow)) => Some(flow),
            _ => None,
        }
    }

    /// Starts the first OAuth leg.
    ///
    /// `callback_url` is where the user is sent after authorizing, `oob` for out of band.
    pub fn fetch_oauth_request_token(&self, callback_url: &str) -> bool {
        if !self.begin(CallKind::OAuth(OAuthFlow::RequestToken)) {
            return false;
        }
        let context = self.context();
        let url = context.endpoints().oauth_request_token();

        let mut params = oauth_protocol_params(context.api_key(), None);
        params.push(("oauth_callback".to_string(), callback_url.to_string()));
        let signature = sign_oauth1(context.shared_secret(), None, HttpMethod::Get, &url, &params);
        params.push(("oauth_signature".to_string(), signature));

        self.dispatch(self.get_call(url, &params));
        true
    }

    /// Starts the second OAuth leg, exchanging an authorized request token.
    ///
    /// The signature uses the context's current OAuth token secret, which should be the
    /// request token secret at this point. The context is not updated with the result.
    pub fn fetch_oauth_access_token(&self, request_token: &str, verifier: &str) -> bool {
        if !self.begin(CallKind::OAuth(OAuthFlow::AccessToken)) {
            return false;
        }
        let context = self.context();
        let url = context.endpoints().oauth_access_token();
        let token_secret = context.oauth_token().map(|pair| pair.secret);

        let mut params = oauth_protocol_params(context.api_key(), Some(request_token));
        params.push(("oauth_verifier".to_string(), verifier.to_string()));
        let signature = sign_oauth1(
            context.shared_secret(),
            token_secret.as_deref(),
            HttpMethod::Get,
            &url,
            &params,
        );
        params.push(("oauth_signature".to_string(), signature));

        self.dispatch(self.get_call(url, &params));
        true
    }

    pub fn call_method_get(&self, method: &str, args: &ApiParams<'_>) -> bool {
        self.call_method(HttpMethod::Get, method, args)
    }

    pub fn call_method_post(&self, method: &str, args: &ApiParams<'_>) -> bool {
        self.call_method(HttpMethod::Post, method, args)
    }

    fn call_method(&self, http_method: HttpMethod, method: &str, args: &ApiParams<'_>) -> bool {
        if !self.begin(CallKind::Method) {
            return false;
        }
        let context = self.context();
        let url = context.endpoints().rest.clone();
        let auth_mode = context.auth_mode();

        let mut params = owned_params(args);
        params.push(("method".to_string(), method.to_string()));
        params.push(("format".to_string(), RESPONSE_FORMAT.to_string()));
        let params = context.sign_params(&auth_mode, http_method, &url, params);

        log::debug!("calling {method} with {:?} auth", auth_mode);
        let call = match http_method {
            HttpMethod::Get => self.get_call(url, &params),
            HttpMethod::Post => HttpCall {
                method: HttpMethod::Post,
                url,
                headers: Vec::new(),
                body: CallBody::Form(
                    url::form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(&params)
                        .finish(),
                ),
                timeout: self.timeout(),
            },
        };
        self.dispatch(call);
        true
    }

    /// Uploads a photo or video to the upload endpoint.
    ///
    /// `args` are the upload's optional fields such as `title`, `tags` or `is_public`.
    pub fn upload_stream(
        &self,
        stream: UploadStream,
        suggested_filename: &str,
        mime_type: &str,
        args: &ApiParams<'_>,
    ) -> bool {
        if !self.begin(CallKind::Upload) {
            return false;
        }
        let context = self.context();
        let url = context.endpoints().upload.clone();
        let auth_mode = context.auth_mode();
        let params = context.sign_params(&auth_mode, HttpMethod::Post, &url, owned_params(args));

        let body = MultipartBody::new(&params, suggested_filename, mime_type, stream);
        log::debug!("uploading {suggested_filename} ({} bytes)", body.len());
        self.dispatch(HttpCall {
            method: HttpMethod::Post,
            url,
            headers: Vec::new(),
            body: CallBody::Multipart(body),
            timeout: self.timeout(),
        });
        true
    }

    /// Aborts the running call. Nothing is reported to the receiver afterwards.
    pub fn cancel(&self) {
        let in_flight = {
            let mut call = lock(&self.inner.call);
            if call.state != RequestState::Running {
                return;
            }
            call.state = RequestState::Cancelled;
            call.kind = None;
            call.in_flight.take()
        };
        log::debug!("request cancelled");
        if let Some(in_flight) = in_flight {
            in_flight.cancel();
        }
    }

    fn begin(&self, kind: CallKind) -> bool {
        if !self.context().is_usable() {
            log::warn!("refusing to start {kind:?}: API key or shared secret missing");
            return false;
        }
        let mut call = lock(&self.inner.call);
        if call.state != RequestState::Idle {
            log::warn!("refusing to start {kind:?}: request is {}", call.state);
            return false;
        }
        call.state = RequestState::Running;
        call.kind = Some(kind);
        true
    }

    fn get_call(&self, mut url: Url, params: &[(String, String)]) -> HttpCall {
        url.query_pairs_mut().extend_pairs(params);
        HttpCall {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: CallBody::Empty,
            timeout: self.timeout(),
        }
    }

    fn dispatch(&self, call: HttpCall) {
        let transport = self.context().transport().clone();
        let in_flight = transport.start(call, TransportEvents::new(self.clone()));

        let mut state = lock(&self.inner.call);
        match state.state {
            RequestState::Running => state.in_flight = Some(in_flight),
            // Cancelled while the transport was starting up
            RequestState::Cancelled => {
                drop(state);
                in_flight.cancel();
            }
            _ => {}
        }
    }

    fn running_kind(&self) -> Option<CallKind> {
        let call = lock(&self.inner.call);
        match call.state {
            RequestState::Running => call.kind,
            _ => None,
        }
    }

    fn receiver(&self) -> Option<Arc<dyn Receiver>> {
        lock(&self.inner.receiver).as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn handle_bytes_sent(&self, sent: u64, total: u64) {
        let sent = {
            let mut call = lock(&self.inner.call);
            if call.state != RequestState::Running || call.kind != Some(CallKind::Upload) {
                return;
            }
            let sent = sent.min(total);
            if sent < call.bytes_sent {
                return;
            }
            call.bytes_sent = sent;
            sent
        };
        log::trace!("upload sent {sent} of {total} bytes");
        if let Some(receiver) = self.receiver() {
            receiver.upload_sent_bytes(self, sent, total);
        }
    }

    pub(crate) fn handle_completed(&self, status: u16, body: Bytes) {
        let Some(kind) = self.running_kind() else {
            log::debug!("ignoring response for a request that is not running");
            return;
        };
        let outcome = match kind {
            CallKind::OAuth(OAuthFlow::RequestToken) => match request_token_response(status, &body) {
                Ok(pair) => Outcome::RequestToken(pair),
                Err(err) => Outcome::Failure(err),
            },
            CallKind::OAuth(OAuthFlow::AccessToken) => match access_token_response(status, &body) {
                Ok(token) => Outcome::AccessToken(token),
                Err(err) => Outcome::Failure(err),
            },
            CallKind::Method | CallKind::Upload => {
                let parsed = self
                    .context()
                    .parser()
                    .parse(&body)
                    .map_err(FlickrError::from)
                    .and_then(rest_response);
                match parsed {
                    Ok(response) => Outcome::Response(response),
                    Err(err) => Outcome::Failure(err),
                }
            }
        };
        self.finish(outcome);
    }

    pub(crate) fn handle_failed(&self, error: TransportError) {
        let Some(kind) = self.running_kind() else {
            log::debug!("ignoring transport error for a request that is not running: {error}");
            return;
        };
        let error = match kind {
            CallKind::OAuth(_) => FlickrError::oauth(error.into()),
            CallKind::Method | CallKind::Upload => error.into(),
        };
        self.finish(Outcome::Failure(error));
    }

    // Moves to a terminal state and tells the receiver, unless someone got there first
    fn finish(&self, outcome: Outcome) {
        {
            let mut call = lock(&self.inner.call);
            if call.state != RequestState::Running {
                return;
            }
            call.state = match outcome {
                Outcome::Failure(_) => RequestState::Failed,
                _ => RequestState::Completed,
            };
            call.kind = None;
            call.in_flight = None;
        }

        if let Outcome::Failure(error) = &outcome {
            log::warn!("request failed: {error}");
        }
        let Some(receiver) = self.receiver() else {
            log::debug!("request finished without a receiver");
            return;
        };
        match outcome {
            Outcome::Response(response) => receiver.did_complete(self, &response),
            Outcome::RequestToken(pair) => receiver.did_obtain_request_token(self, &pair),
            Outcome::AccessToken(token) => receiver.did_obtain_access_token(self, &token),
            Outcome::Failure(error) => receiver.did_fail(self, &error),
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let call = lock(&self.inner.call);
        f.debug_struct("Request")
            .field("state", &call.state)
            .field("kind", &call.kind)
            .finish()
    }
}

fn owned_params(args: &ApiParams<'_>) -> Vec<(String, String)> {
    args.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
