/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */

//! Request signing for the two schemes Flickr accepts.
//!
//! - The legacy scheme: an MD5 digest over the shared secret followed by every parameter
//!   key and value, sorted by key.
//! - [OAuth 1.0a](https://oauth.net/core/1.0a/#signing_process) with HMAC-SHA1.
//!
//! Everything in here is a pure function of its inputs, except
//! [`oauth_protocol_params`] which draws a nonce and reads the clock.

use crate::api::HttpMethod;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::borrow::Cow;
use url::Url;

pub const OAUTH_SIGNATURE_METHOD: &str = "HMAC-SHA1";
pub const OAUTH_VERSION: &str = "1.0";

/// Computes the legacy `api_sig` for a parameter set.
///
/// The input order does not matter, parameters are sorted by key first.
pub fn sign_legacy<K, V>(secret: &str, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    sorted.sort();

    let mut payload = String::from(secret);
    for (k, v) in sorted {
        payload.push_str(k);
        payload.push_str(v);
    }
    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Percent encodes per RFC 3986, leaving only `A-Z a-z 0-9 - . _ ~` untouched
pub fn percent_encode(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// The scheme, host, port (if not default) and path of `url`
pub fn normalized_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_query(None);
    normalized.set_fragment(None);
    normalized.to_string()
}

/// Builds the OAuth signature base string: `METHOD&url&params`, each part encoded.
pub fn signature_base_string<K, V>(method: HttpMethod, base_url: &Url, params: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded: Vec<(Cow<'_, str>, Cow<'_, str>)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(&normalized_url(base_url)),
        percent_encode(&param_string)
    )
}

/// Computes the `oauth_signature` for a request.
///
/// `token_secret` is absent while fetching a request token.
pub fn sign_oauth1<K, V>(
    consumer_secret: &str,
    token_secret: Option<&str>,
    method: HttpMethod,
    base_url: &Url,
    params: &[(K, V)],
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or_default())
    );
    let base = signature_base_string(method, base_url, params);
    base64_hmac_sha1(key.as_bytes(), base.as_bytes())
}

fn base64_hmac_sha1(key: &[u8], content: &[u8]) -> String {
    // SAFETY: HMAC's new_from_slice always returns Ok - it handles any key length
    let mut h = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts keys of any length");
    h.update(content);

    BASE64_STANDARD.encode(h.finalize().into_bytes())
}

/// Protocol parameters every OAuth signed request carries, minus the signature itself
pub fn oauth_protocol_params(consumer_key: &str, token: Option<&str>) -> Vec<(String, String)> {
    let mut params = vec![
        ("oauth_consumer_key".to_string(), consumer_key.to_string()),
        ("oauth_nonce".to_string(), nonce()),
        ("oauth_signature_method".to_string(), OAUTH_SIGNATURE_METHOD.to_string()),
        ("oauth_timestamp".to_string(), Utc::now().timestamp().to_string()),
        ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
    ];
    if let Some(token) = token {
        params.push(("oauth_token".to_string(), token.to_string()));
    }
    params
}

fn nonce() -> String {
    format!("{:016x}{:016x}", rand::random::<u64>(), rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_signature_matches_manual_digest() {
        let params = [("method", "flickr.test.echo"), ("api_key", "K1"), ("foo", "bar")];
        let expected = format!(
            "{:x}",
            md5::compute("S1api_keyK1foobarmethodflickr.test.echo")
        );
        assert_eq!(sign_legacy("S1", &params), expected);
    }

    #[test]
    fn legacy_signature_ignores_input_order() {
        let a = [("a", "1"), ("b", "2"), ("c", "3")];
        let b = [("c", "3"), ("a", "1"), ("b", "2")];
        assert_eq!(sign_legacy("secret", &a), sign_legacy("secret", &b));
    }

    #[test]
    fn legacy_signature_changes_with_a_value() {
        let a = [("a", "1"), ("b", "2")];
        let b = [("a", "1"), ("b", "3")];
        assert_ne!(sign_legacy("secret", &a), sign_legacy("secret", &b));
    }

    #[test]
    fn percent_encoding_uses_the_oauth_table() {
        assert_eq!(percent_encode("AZaz09-._~"), "AZaz09-._~");
        assert_eq!(percent_encode("a b+c/d=e&f"), "a%20b%2Bc%2Fd%3De%26f");
        assert_eq!(percent_encode("☃"), "%E2%98%83");
    }

    #[test]
    fn normalized_url_drops_query_fragment_and_default_port() {
        let url = Url::parse("HTTPS://API.Flickr.com:443/services/rest/?a=1#top").unwrap();
        assert_eq!(normalized_url(&url), "https://api.flickr.com/services/rest/");

        let url = Url::parse("http://example.com:8080/path").unwrap();
        assert_eq!(normalized_url(&url), "http://example.com:8080/path");
    }

    #[test]
    fn base_string_sorts_and_encodes() {
        let url = Url::parse("https://example.com/api").unwrap();
        let params = [("b", "x y"), ("a", "2"), ("a", "1")];
        assert_eq!(
            signature_base_string(HttpMethod::Get, &url, &params),
            "GET&https%3A%2F%2Fexample.com%2Fapi&a%3D1%26a%3D2%26b%3Dx%2520y"
        );
    }

    // Reference request from Twitter's "Creating a signature" guide
    #[test]
    fn oauth_signature_matches_reference_vector() {
        let url = Url::parse("https://api.twitter.com/1.1/statuses/update.json").unwrap();
        let params = [
            ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ("include_entities", "true"),
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            ("oauth_nonce", "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            ("oauth_token", "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb"),
            ("oauth_version", "1.0"),
        ];
        let signature = sign_oauth1(
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            Some("LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE"),
            HttpMethod::Post,
            &url,
            &params,
        );
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn oauth_signature_is_deterministic_and_method_sensitive() {
        let url = Url::parse("https://www.flickr.com/services/oauth/request_token").unwrap();
        let params = [("oauth_callback", "oob"), ("oauth_nonce", "n"), ("oauth_timestamp", "1")];
        let get_a = sign_oauth1("cs", None, HttpMethod::Get, &url, &params);
        let get_b = sign_oauth1("cs", None, HttpMethod::Get, &url, &params);
        let post = sign_oauth1("cs", None, HttpMethod::Post, &url, &params);
        assert_eq!(get_a, get_b);
        assert_ne!(get_a, post);
    }

    #[test]
    fn missing_token_secret_signs_like_an_empty_one() {
        let url = Url::parse("https://www.flickr.com/services/oauth/request_token").unwrap();
        let params = [("oauth_callback", "oob")];
        assert_eq!(
            sign_oauth1("cs", None, HttpMethod::Get, &url, &params),
            sign_oauth1("cs", Some(""), HttpMethod::Get, &url, &params)
        );
    }

    #[test]
    fn protocol_params_include_token_when_given() {
        let params = oauth_protocol_params("key", Some("tok"));
        assert!(params.contains(&("oauth_token".to_string(), "tok".to_string())));
        assert!(params.contains(&("oauth_consumer_key".to_string(), "key".to_string())));

        let params = oauth_protocol_params("key", None);
        assert!(params.iter().all(|(k, _)| k != "oauth_token"));
    }
}
