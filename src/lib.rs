/*
 * Copyright (c) 2025 Craig Hamilton and Contributors.
 * Licensed under either of
 *  - Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> OR
 *  - MIT license <http://opensource.org/licenses/MIT>
 *  at your option.
 */

//! # Flickr
//!
//! This library signs and runs calls against the Flickr REST API.
//!
//! For further details on the API refer to the [Flickr API Docs](https://www.flickr.com/services/api/)
//!
//! ## Features
//!
//! - Request signing
//!     - Legacy `api_sig` (MD5 over the shared secret and sorted parameters)
//!     - OAuth 1.0a with HMAC-SHA1
//! - OAuth token exchange (request token, user authorization URL, access token)
//! - Generic API method calls over GET or POST
//! - Photo uploads with progress reporting
//! - Photo source/web page URLs and the legacy login URL
//! - A uniform error type for connection, timeout, parse, OAuth and service failures
//!
//! *A [`api::Request`] runs a single call and reports back through a [`api::Receiver`].
//! Responses come back as a generic tree of [`api::Value`]s mirroring the XML Flickr sent.*
//!
//! ## Installation
//!
//! ```toml
//! [dependencies]
//! flickr = "0.1.0"
//! ```
//!
//! ## Usage
//!
//! **You will need to acquire an API key/secret from Flickr prior to using the API**
//!
//! ```rust,no_run
//! use flickr::api::{
//!     AccessToken, ApiContext, FlickrError, OAuthTokenPair, Permission, Receiver, Request,
//! };
//! use std::sync::Arc;
//!
//! struct Login {
//!     context: Arc<ApiContext>,
//! }
//!
//! impl Receiver for Login {
//!     fn did_obtain_request_token(&self, _request: &Request, token: &OAuthTokenPair) {
//!         // Keep the request token secret around for the access token leg
//!         self.context.set_oauth_token(token.token.as_str(), token.secret.as_str());
//!         let url = self.context.authorization_url(&token.token, Permission::Write);
//!         println!("Authorize at {url}");
//!     }
//!
//!     fn did_obtain_access_token(&self, _request: &Request, token: &AccessToken) {
//!         self.context.set_oauth_token(token.token.as_str(), token.secret.as_str());
//!         println!("Logged in as {}", token.user_name);
//!     }
//!
//!     fn did_fail(&self, _request: &Request, error: &FlickrError) {
//!         eprintln!("OAuth failed: {error}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     // The API key/secret is obtained from your Flickr account
//!     let context = Arc::new(ApiContext::new("api-key", "shared-secret"));
//!     let login = Arc::new(Login {
//!         context: context.clone(),
//!     });
//!
//!     let request = Request::new(context);
//!     request.set_receiver(&login);
//!     request.fetch_oauth_request_token("oob");
//!     # tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! }
//! ```
//!
pub mod api;
