/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use bytes::Bytes;
use flickr::api::signer::sign_oauth1;
use flickr::api::{
    AccessToken, ApiContext, CallBody, FlickrError, HttpCall, HttpMethod, HttpTransport,
    InFlightCall, OAuthTokenPair, Receiver, Request, ResponseEnvelope, TransportError,
    TransportEvents,
};
use futures::StreamExt;
use futures::executor::block_on;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const API_KEY: &str = "K1";
pub const SHARED_SECRET: &str = "S1";

#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A call the mock transport was asked to perform
#[allow(dead_code)]
#[derive(Debug)]
pub struct Dispatched {
    pub call: HttpCall,
    pub events: TransportEvents,
    pub cancelled: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl Dispatched {
    pub fn query(&self) -> HashMap<String, String> {
        query_map(&self.call.url)
    }

    pub fn form(&self) -> HashMap<String, String> {
        self.form_pairs().into_iter().collect()
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.call.url.query_pairs().into_owned().collect()
    }

    pub fn form_pairs(&self) -> Vec<(String, String)> {
        match &self.call.body {
            CallBody::Form(form) => url::form_urlencoded::parse(form.as_bytes())
                .into_owned()
                .collect(),
            other => panic!("expected a form body, got {other:?}"),
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.events.completed(status, Bytes::from(body.to_string()));
    }

    pub fn fail(&self, error: TransportError) {
        self.events.failed(error);
    }
}

/// Keeps every call around so the test can play the network
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<Dispatched>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Removes and returns the oldest dispatched call
    pub fn take_call(&self) -> Dispatched {
        let mut calls = self.calls.lock().unwrap();
        assert!(!calls.is_empty(), "no call was dispatched");
        calls.remove(0)
    }
}

struct MockCall(Arc<AtomicBool>);

impl InFlightCall for MockCall {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl HttpTransport for MockTransport {
    fn start(&self, call: HttpCall, events: TransportEvents) -> Box<dyn InFlightCall> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.calls.lock().unwrap().push(Dispatched {
            call,
            events,
            cancelled: cancelled.clone(),
        });
        Box::new(MockCall(cancelled))
    }
}

/// Fails every call before `start` even returns
#[allow(dead_code)]
#[derive(Debug)]
pub struct FailingTransport(pub TransportError);

impl HttpTransport for FailingTransport {
    fn start(&self, _call: HttpCall, events: TransportEvents) -> Box<dyn InFlightCall> {
        events.failed(self.0.clone());
        Box::new(MockCall(Arc::new(AtomicBool::new(false))))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Completed(ResponseEnvelope),
    Failed(FlickrError),
    Progress(u64, u64),
    RequestToken(OAuthTokenPair),
    AccessToken(AccessToken),
}

/// Writes down everything it is told
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    events: Mutex<Vec<Event>>,
}

#[allow(dead_code)]
impl RecordingReceiver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Events other than upload progress
    pub fn terminal_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Progress(..)))
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Receiver for RecordingReceiver {
    fn did_complete(&self, request: &Request, response: &ResponseEnvelope) {
        assert!(!request.is_running());
        self.push(Event::Completed(response.clone()));
    }

    fn did_fail(&self, request: &Request, error: &FlickrError) {
        assert!(!request.is_running());
        self.push(Event::Failed(error.clone()));
    }

    fn upload_sent_bytes(&self, _request: &Request, sent: u64, total: u64) {
        self.push(Event::Progress(sent, total));
    }

    fn did_obtain_request_token(&self, _request: &Request, token: &OAuthTokenPair) {
        self.push(Event::RequestToken(token.clone()));
    }

    fn did_obtain_access_token(&self, _request: &Request, token: &AccessToken) {
        self.push(Event::AccessToken(token.clone()));
    }
}

#[allow(dead_code)]
pub fn mock_context() -> (Arc<ApiContext>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::default());
    let context = ApiContext::new(API_KEY, SHARED_SECRET).with_transport(transport.clone());
    (Arc::new(context), transport)
}

/// A request wired to a fresh recording receiver
#[allow(dead_code)]
pub fn recorded_request(context: &Arc<ApiContext>) -> (Request, Arc<RecordingReceiver>) {
    let receiver = Arc::new(RecordingReceiver::default());
    let request = Request::new(context.clone());
    request.set_receiver(&receiver);
    (request, receiver)
}

#[allow(dead_code)]
pub fn query_map(url: &Url) -> HashMap<String, String> {
    url.query_pairs().into_owned().collect()
}

/// Streams a multipart body the way a transport would, reporting progress per chunk.
/// Returns the bytes that went out.
#[allow(dead_code)]
pub fn drain_upload(dispatched: Dispatched) -> (Vec<u8>, TransportEvents) {
    let Dispatched { call, events, .. } = dispatched;
    let CallBody::Multipart(body) = call.body else {
        panic!("expected a multipart body");
    };
    let total = body.len();
    let mut stream = body.into_stream();
    let mut sent = Vec::new();
    while let Some(chunk) = block_on(stream.next()) {
        sent.extend_from_slice(&chunk.unwrap());
        events.bytes_sent(sent.len() as u64, total);
    }
    (sent, events)
}

#[allow(dead_code)]
#[derive(Deserialize, Debug)]
struct FlickrOauth1Token {
    token: String,
    secret: String,
}

#[allow(dead_code)]
fn get_flickr_tokens(path: PathBuf) -> anyhow::Result<FlickrOauth1Token> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Context for the real service, from `FLICKR_*` variables (a `.env` file works too).
/// `FLICKR_AUTH_CACHE` may point at a JSON file holding an OAuth token and secret.
#[allow(dead_code)]
pub fn live_context() -> anyhow::Result<Arc<ApiContext>> {
    dotenvy::dotenv().ok();
    let context = ApiContext::from_env()?;
    if let Ok(cache) = std::env::var("FLICKR_AUTH_CACHE") {
        let tokens = get_flickr_tokens(cache.into())?;
        context.set_oauth_token(tokens.token, tokens.secret);
    }
    Ok(Arc::new(context))
}

/// The plain form fields of a multipart body, the file part left out
#[allow(dead_code)]
pub fn multipart_fields(body: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(body);
    text.split("Content-Disposition: form-data; name=\"")
        .skip(1)
        .filter_map(|part| {
            let (name, rest) = part.split_once("\"\r\n\r\n")?;
            let (value, _) = rest.split_once("\r\n")?;
            (!name.contains('"')).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

/// Recomputes `oauth_signature` over every other parameter of a call to `url`
#[allow(dead_code)]
pub fn oauth_signature_matches(
    method: HttpMethod,
    url: &Url,
    params: Vec<(String, String)>,
    token_secret: Option<&str>,
) -> bool {
    let mut base = url.clone();
    base.set_query(None);
    let (signature, rest): (Vec<_>, Vec<_>) = params
        .into_iter()
        .partition(|(k, _)| k == "oauth_signature");
    let [(_, signature)] = signature.as_slice() else {
        return false;
    };
    sign_oauth1(SHARED_SECRET, token_secret, method, &base, &rest) == *signature
}
