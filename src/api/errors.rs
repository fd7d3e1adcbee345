/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */

use crate::api::ServiceErrorCode;
use thiserror::Error;

/// Error conditions delivered to a [`crate::api::Receiver`].
///
/// Every failure of a call ends up as exactly one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlickrError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API Response is malformed: {0}")]
    MalformedResponse(String),

    #[error("OAuth error. {0}")]
    OAuth(#[source] Box<FlickrError>),

    #[error("API Response was error: {code}, msg: {message}")]
    ServiceReturned { code: i64, message: String },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl FlickrError {
    pub const CONNECTION_ERROR_CODE: i64 = 0x7fff0001;
    pub const TIMEOUT_ERROR_CODE: i64 = 0x7fff0002;
    pub const MALFORMED_RESPONSE_ERROR_CODE: i64 = 0x7fff0003;
    pub const OAUTH_ERROR_CODE: i64 = 0x7fff0004;
    pub const UNKNOWN_ERROR_CODE: i64 = 0x7fff0042;

    /// Wraps a failure that happened during one of the OAuth token legs
    pub fn oauth(cause: FlickrError) -> Self {
        Self::OAuth(Box::new(cause))
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse(reason.into())
    }

    /// Numeric code for this error.
    ///
    /// Service errors carry the code Flickr sent, everything else uses the library's own range.
    pub fn code(&self) -> i64 {
        match self {
            Self::Connection(_) => Self::CONNECTION_ERROR_CODE,
            Self::Timeout => Self::TIMEOUT_ERROR_CODE,
            Self::MalformedResponse(_) => Self::MALFORMED_RESPONSE_ERROR_CODE,
            Self::OAuth(_) => Self::OAUTH_ERROR_CODE,
            Self::ServiceReturned { code, .. } => *code,
            Self::Unknown(_) => Self::UNKNOWN_ERROR_CODE,
        }
    }

    /// True if Flickr itself reported the failure
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::ServiceReturned { .. })
    }

    /// Looks up a service error code among the general errors every API method shares
    pub fn known_service_error(&self) -> Option<ServiceErrorCode> {
        match self {
            Self::ServiceReturned { code, .. } => ServiceErrorCode::try_from(*code).ok(),
            _ => None,
        }
    }
}

/// Failures a [`crate::api::HttpTransport`] can report
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out")]
    Timeout,

    #[error("{0}")]
    Unclassified(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Unclassified(err.to_string())
        }
    }
}

impl From<TransportError> for FlickrError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(msg) => FlickrError::Connection(msg),
            TransportError::Timeout => FlickrError::Timeout,
            TransportError::Unclassified(msg) => FlickrError::Unknown(msg),
        }
    }
}

/// Failure turning a response body into a [`crate::api::Value`] tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(String),

    #[error("Response body is empty")]
    Empty,

    #[error("Unbalanced element: {0}")]
    Unbalanced(String),
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Xml(err.to_string())
    }
}

impl From<ParseError> for FlickrError {
    fn from(err: ParseError) -> Self {
        FlickrError::MalformedResponse(err.to_string())
    }
}

/// Problems loading an [`crate::api::ApiContext`] from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingVar(&'static str),

    #[error("Both {0} and {1} must be set together")]
    IncompleteTokenPair(&'static str, &'static str),

    #[error("URL Parse error for {0}")]
    UrlParsing(&'static str, #[source] url::ParseError),
}
