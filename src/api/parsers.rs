/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */
use crate::api::errors::FlickrError;
use crate::api::{AccessToken, Fields, OAuthTokenPair, ResponseEnvelope, Value, ValueMap};
use indexmap::IndexMap;

// Pulls the `rsp` element out of a parsed document and checks its status
pub(crate) fn rest_response(mut doc: ValueMap) -> Result<ResponseEnvelope, FlickrError> {
    let Some(Value::Map(rsp)) = doc.swap_remove("rsp") else {
        return Err(FlickrError::malformed("missing rsp element"));
    };

    let stat = rsp.field("stat").map(str::to_owned);
    match stat.as_deref() {
        Some("ok") => Ok(ResponseEnvelope::new(rsp)),
        Some("fail") => {
            let err = rsp.get("err");
            let code = err
                .and_then(|e| e.field("code"))
                .and_then(|c| c.trim().parse::<i64>().ok());
            match code {
                Some(code) => Err(FlickrError::ServiceReturned {
                    code,
                    message: err
                        .and_then(|e| e.field("msg"))
                        .unwrap_or_default()
                        .to_string(),
                }),
                None => Err(FlickrError::malformed("failure status without an error code")),
            }
        }
        Some(other) => Err(FlickrError::malformed(format!("unexpected status `{other}`"))),
        None => Err(FlickrError::malformed("missing stat attribute")),
    }
}

// Decodes an `application/x-www-form-urlencoded` body
pub(crate) fn from_query_string(body: &[u8]) -> IndexMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn token_pair(fields: &IndexMap<String, String>) -> Option<OAuthTokenPair> {
    let token = fields.field("oauth_token").filter(|v| !v.is_empty())?;
    let secret = fields.field("oauth_token_secret").filter(|v| !v.is_empty())?;
    Some(OAuthTokenPair::new(token, secret))
}

// Common checks for both OAuth legs
fn token_response(status: u16, body: &[u8]) -> Result<(OAuthTokenPair, IndexMap<String, String>), FlickrError> {
    let fields = from_query_string(body);
    if !is_success(status) {
        let message = fields
            .get("oauth_problem")
            .cloned()
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
        return Err(FlickrError::oauth(FlickrError::ServiceReturned {
            code: i64::from(status),
            message,
        }));
    }
    let pair = token_pair(&fields).ok_or_else(|| {
        FlickrError::oauth(FlickrError::malformed(
            "response has no oauth_token/oauth_token_secret",
        ))
    })?;
    Ok((pair, fields))
}

pub(crate) fn request_token_response(status: u16, body: &[u8]) -> Result<OAuthTokenPair, FlickrError> {
    token_response(status, body).map(|(pair, _)| pair)
}

pub(crate) fn access_token_response(status: u16, body: &[u8]) -> Result<AccessToken, FlickrError> {
    let (pair, fields) = token_response(status, body)?;
    let field = |key: &str| fields.field(key).unwrap_or_default().to_string();
    Ok(AccessToken {
        token: pair.token,
        secret: pair.secret,
        full_name: field("fullname"),
        user_name: field("username"),
        user_nsid: field("user_nsid"),
    })
}
