/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use num_enum::TryFromPrimitive;
use serde::Serialize;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Size modifier used when building a photo source URL.
///
/// See [Flickr URL Docs](https://www.flickr.com/services/api/misc.urls.html) for the
/// dimensions behind each suffix.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
pub enum SizeModifier {
    /// 75x75
    #[strum(serialize = "s")]
    SmallSquare,
    /// 150x150
    #[strum(serialize = "q")]
    LargeSquare,
    /// 100 on longest side
    #[strum(serialize = "t")]
    Thumbnail,
    /// 240 on longest side
    #[strum(serialize = "m")]
    Small,
    /// 320 on longest side
    #[strum(serialize = "n")]
    Small320,
    /// 500 on longest side, has no suffix
    #[default]
    #[strum(serialize = "")]
    Medium,
    /// 640 on longest side
    #[strum(serialize = "z")]
    MediumSquare640,
    /// 800 on longest side
    #[strum(serialize = "c")]
    MediumSquare800,
    /// 1024 on longest side
    #[strum(serialize = "b")]
    Large,
}

impl SizeModifier {
    /// The suffix token appended to the file name, empty for the default size
    pub fn suffix(self) -> &'static str {
        self.into()
    }
}

/// Permission level requested during authorization.
///
/// Each level includes the ones before it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, EnumString, IntoStaticStr, Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl Permission {
    /// True when holding `self` also grants `other`
    pub fn includes(self, other: Permission) -> bool {
        self >= other
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Lifecycle of a [`crate::api::Request`]. The last three are terminal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
pub enum RequestState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Which leg of the OAuth exchange a request is performing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
pub enum OAuthFlow {
    RequestToken,
    AccessToken,
}

/// General error codes any Flickr API method may return.
///
/// See [Flickr API Docs](https://www.flickr.com/services/api/) "Error Codes" on any method page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoStaticStr)]
#[repr(i64)]
pub enum ServiceErrorCode {
    SslRequired = 95,
    InvalidSignature = 96,
    MissingSignature = 97,
    LoginFailed = 98,
    InsufficientPermissions = 99,
    InvalidApiKey = 100,
    ServiceUnavailable = 105,
    WriteOperationFailed = 106,
    FormatNotFound = 111,
    MethodNotFound = 112,
    InvalidSoapEnvelope = 114,
    InvalidXmlRpcCall = 115,
    BadUrlFound = 116,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn size_suffixes() {
        assert_eq!(SizeModifier::default(), SizeModifier::Medium);
        assert_eq!(SizeModifier::Medium.suffix(), "");
        assert_eq!(SizeModifier::Thumbnail.suffix(), "t");
        assert_eq!(SizeModifier::MediumSquare800.suffix(), "c");
        assert_eq!(SizeModifier::from_str("q").unwrap(), SizeModifier::LargeSquare);
    }

    #[test]
    fn permissions_include_lower_levels() {
        assert!(Permission::Delete.includes(Permission::Write));
        assert!(Permission::Write.includes(Permission::Read));
        assert!(!Permission::Read.includes(Permission::Write));
        assert_eq!(Permission::Delete.to_string(), "delete");
        assert_eq!(Permission::from_str("write").unwrap(), Permission::Write);
    }

    #[test]
    fn only_final_states_are_terminal() {
        assert!(!RequestState::Idle.is_terminal());
        assert!(!RequestState::Running.is_terminal());
        assert!(RequestState::Cancelled.is_terminal());
    }

    #[test]
    fn general_service_codes() {
        assert_eq!(
            ServiceErrorCode::try_from(96i64).ok(),
            Some(ServiceErrorCode::InvalidSignature)
        );
        assert!(ServiceErrorCode::try_from(1i64).is_err());
    }
}
