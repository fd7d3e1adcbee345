/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use crate::api::errors::TransportError;
use crate::api::multipart::MultipartBody;
use crate::api::{HttpMethod, Request};
use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::fmt::Debug;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use url::Url;

/// Body of an outgoing call
#[derive(Debug)]
pub enum CallBody {
    Empty,
    /// `application/x-www-form-urlencoded` payload
    Form(String),
    Multipart(MultipartBody),
}

/// Everything a transport needs to perform one call
#[derive(Debug)]
pub struct HttpCall {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: CallBody,
    pub timeout: Duration,
}

/// Performs network calls for a [`Request`].
///
/// `start` must not block. Results are reported through `events`, possibly
/// from another thread and possibly before `start` returns.
pub trait HttpTransport: Debug + Send + Sync + 'static {
    fn start(&self, call: HttpCall, events: TransportEvents) -> Box<dyn InFlightCall>;
}

/// Handle to a call the transport is working on
pub trait InFlightCall: Send + Sync {
    /// Best effort, the transport may still report events afterwards
    fn cancel(&self);
}

/// Sink for what happens to a call on the wire.
///
/// Events for a request that was cancelled or already finished are dropped.
#[derive(Clone)]
pub struct TransportEvents {
    request: Request,
}

impl TransportEvents {
    pub(crate) fn new(request: Request) -> Self {
        Self { request }
    }

    /// Body bytes written so far out of `total`
    pub fn bytes_sent(&self, sent: u64, total: u64) {
        self.request.handle_bytes_sent(sent, total);
    }

    /// The server answered; `body` is the full response body
    pub fn completed(&self, status: u16, body: Bytes) {
        self.request.handle_completed(status, body);
    }

    pub fn failed(&self, error: TransportError) {
        self.request.handle_failed(error);
    }
}

impl Debug for TransportEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEvents").finish()
    }
}

/// Default transport running calls with `reqwest` on the current tokio runtime
#[derive(Default, Clone)]
pub struct ReqwestTransport {
    https_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(https_client: reqwest::Client) -> Self {
        Self { https_client }
    }

    fn build(&self, call: HttpCall, events: &TransportEvents) -> reqwest::RequestBuilder {
        let mut builder = self
            .https_client
            .request(call.method.into(), call.url)
            .timeout(call.timeout);
        for (name, value) in call.headers {
            builder = builder.header(name, value);
        }

        match call.body {
            CallBody::Empty => builder,
            CallBody::Form(form) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(form),
            CallBody::Multipart(multipart) => {
                let total = multipart.len();
                let content_type = multipart.content_type();
                let mut chunks = multipart.into_stream();
                let progress = events.clone();

                let body = stream! {
                    let mut sent: u64 = 0;
                    while let Some(chunk) = chunks.next().await {
                        if let Ok(bytes) = &chunk {
                            sent = (sent + bytes.len() as u64).min(total);
                            progress.bytes_sent(sent, total);
                        }
                        yield chunk;
                    }
                };
                builder
                    .header(CONTENT_TYPE, content_type)
                    .header(CONTENT_LENGTH, total)
                    .body(reqwest::Body::wrap_stream(body))
            }
        }
    }
}

impl HttpTransport for ReqwestTransport {
    fn start(&self, call: HttpCall, events: TransportEvents) -> Box<dyn InFlightCall> {
        let Ok(handle) = Handle::try_current() else {
            events.failed(TransportError::Unclassified(
                "no tokio runtime available to run the call".to_string(),
            ));
            return Box::new(NoopCall);
        };

        log::debug!("{} {}", call.method, call.url.path());
        let builder = self.build(call, &events);
        let task = handle.spawn(async move {
            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    match resp.bytes().await {
                        Ok(body) => events.completed(status, body),
                        Err(err) => events.failed(err.into()),
                    }
                }
                Err(err) => events.failed(err.into()),
            }
        });
        Box::new(TokioCall(task.abort_handle()))
    }
}

impl Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

struct TokioCall(AbortHandle);

impl InFlightCall for TokioCall {
    fn cancel(&self) {
        self.0.abort();
    }
}

struct NoopCall;

impl InFlightCall for NoopCall {
    fn cancel(&self) {}
}
