// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Low-level HTTP transport.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

#[cfg(any(feature = "native-tls", feature = "rustls"))]
use std::fs;

use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use log::{debug, log_enabled, Level};
#[cfg(any(feature = "native-tls", feature = "rustls"))]
use reqwest::Certificate;
use reqwest::{redirect, Client, ClientBuilder, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use static_assertions::assert_impl_all;

use super::fault::{self, REQUEST_ID_HEADER};
use super::{Config, Error, ErrorKind};

/// User agent sent with every request.
pub const USER_AGENT_VALUE: &str = concat!("neutronclient-rust/", env!("CARGO_PKG_VERSION"));

/// Default content type of request and response bodies.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Marker that replaces the password in logged bodies.
pub const REDACTED: &str = "REDACTED";

/// Header with the authentication token.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Per-call options of an HTTP request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Serialized request body.
    pub body: Option<String>,
    /// Additional headers.
    pub headers: HeaderMap,
    /// Content type override (defaults to `application/json`).
    pub content_type: Option<String>,
}

/// Response received from the server.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body as text.
    pub body: String,
}

/// HTTP transport with header injection, logging and error normalization.
///
/// Keeps a second client that follows redirects, which can be swapped in for a single
/// call with [follow_redirects](#method.follow_redirects).
#[derive(Clone)]
pub struct Transport {
    client: Client,
    alternate: Client,
    follows_redirects: bool,
    secret: Option<String>,
    global_request_id: Option<String>,
}

assert_impl_all!(Transport: Send, Sync);

/// Transport with redirect following forced on; the previous policy is restored on drop.
#[derive(Debug)]
pub struct FollowRedirects<'t> {
    transport: &'t mut Transport,
    swapped: bool,
}

pub(crate) fn hash_token(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Replace the secret in a body that is going to be logged.
///
/// Both the raw secret and its JSON-escaped form are replaced.
pub fn redact<'b>(body: &'b str, secret: Option<&str>) -> Cow<'b, str> {
    let secret = match secret {
        Some(secret) if !secret.is_empty() => secret,
        _ => return Cow::Borrowed(body),
    };
    let escaped = serde_json::to_string(secret).ok().and_then(|quoted| {
        quoted
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .map(String::from)
    });

    let mut result = Cow::Borrowed(body);
    for candidate in escaped.iter().map(String::as_str).chain(Some(secret)) {
        if result.contains(candidate) {
            result = Cow::Owned(result.replace(candidate, REDACTED));
        }
    }
    result
}

/// Replace a token in logged text with its hash.
fn mask_token<'t>(text: &'t str, token: Option<&str>) -> Cow<'t, str> {
    match token {
        Some(token) if !token.is_empty() && text.contains(token) => {
            Cow::Owned(text.replace(token, &format!("hash({})", hash_token(token))))
        }
        _ => Cow::Borrowed(text),
    }
}

/// Token issued in an Identity response body.
fn issued_token(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body).ok()?["access"]["token"]["id"]
        .as_str()
        .map(From::from)
}

fn loggable_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            if name.as_str() == AUTH_TOKEN_HEADER {
                let token = value.to_str().unwrap_or_default();
                format!("{}: hash({})", name, hash_token(token))
            } else {
                format!("{}: {:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Create an HTTP client builder with the TLS settings from the configuration.
#[allow(unused_mut)] // mut builder unused with --no-default-features
fn client_builder(config: &Config) -> Result<ClientBuilder, Error> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }

    #[cfg(any(feature = "native-tls", feature = "rustls"))]
    {
        if let Some(ref cert_path) = config.ca_cert {
            let cert_content = fs::read(cert_path).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot open cacert file {}: {}", cert_path.display(), e),
                )
            })?;

            let cert = Certificate::from_pem(&cert_content).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot parse {} as PEM: {}", cert_path.display(), e),
                )
            })?;

            builder = builder.add_root_certificate(cert);
        }

        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    #[cfg(not(any(feature = "native-tls", feature = "rustls")))]
    if config.ca_cert.is_some() || config.insecure {
        return Err(Error::new(ErrorKind::InvalidConfig, "TLS support is disabled"));
    }

    Ok(builder)
}

fn build_client(config: &Config, follow: bool) -> Result<Client, Error> {
    let policy = if follow {
        redirect::Policy::default()
    } else {
        redirect::Policy::none()
    };
    client_builder(config)?.redirect(policy).build().map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot initialize HTTP backend: {}", e),
        )
    })
}

impl RequestOptions {
    /// Options with a JSON body.
    pub fn json<T: Serialize + ?Sized>(body: &T) -> Result<RequestOptions, Error> {
        let body = serde_json::to_string(body).map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Cannot serialize request body: {}", e),
            )
        })?;
        Ok(RequestOptions {
            body: Some(body),
            ..RequestOptions::default()
        })
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> RequestOptions {
        let _ = self.headers.insert(name, value);
        self
    }

    /// Override the content type.
    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> RequestOptions {
        self.content_type = Some(content_type.into());
        self
    }
}

impl RawResponse {
    /// Request IDs reported by the server.
    #[inline]
    pub fn request_ids(&self) -> Vec<String> {
        fault::request_ids(&self.headers)
    }

    /// Whether the body is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Deserialize the body from JSON.
    ///
    /// An empty body is treated as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let result = if self.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_str(&self.body)
        };
        result.map_err(Error::malformed_response)
    }
}

impl Transport {
    /// Create a transport from the configuration.
    pub fn new(config: &Config) -> Result<Transport, Error> {
        Ok(Transport {
            client: build_client(config, config.follow_redirects)?,
            alternate: build_client(config, !config.follow_redirects)?,
            follows_redirects: config.follow_redirects,
            secret: if config.log_credentials {
                None
            } else {
                config.password.clone()
            },
            global_request_id: config.global_request_id.clone(),
        })
    }

    /// Whether redirects are currently followed.
    #[inline]
    pub fn follows_redirects(&self) -> bool {
        self.follows_redirects
    }

    /// Force following redirects until the returned guard is dropped.
    pub fn follow_redirects(&mut self) -> FollowRedirects<'_> {
        let swapped = !self.follows_redirects;
        if swapped {
            self.swap_clients();
        }
        FollowRedirects {
            transport: self,
            swapped,
        }
    }

    fn swap_clients(&mut self) {
        std::mem::swap(&mut self.client, &mut self.alternate);
        self.follows_redirects = !self.follows_redirects;
    }

    fn prepare_headers(&self, options: &RequestOptions) -> HeaderMap {
        let mut headers = options.headers.clone();
        let content_type = options
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        if let Ok(value) = HeaderValue::from_str(content_type) {
            if !headers.contains_key(ACCEPT) {
                let _ = headers.insert(ACCEPT, value.clone());
            }
            if options.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
                let _ = headers.insert(CONTENT_TYPE, value);
            }
        }
        if let Some(ref request_id) = self.global_request_id {
            if let Ok(value) = HeaderValue::from_str(request_id) {
                let _ = headers.entry(REQUEST_ID_HEADER).or_insert(value);
            }
        }
        let _ = headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers
    }

    /// Perform one HTTP exchange.
    ///
    /// Transport failures become `ConnectionFailed` (or `SslCertificateValidation`), HTTP 401
    /// becomes `Unauthorized` and HTTP 403 becomes `Forbidden`. Any other status is returned
    /// as is.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        let headers = self.prepare_headers(options);
        let token = options
            .headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        let logged_url = mask_token(url.as_str(), token);
        debug!(
            "REQ: {} {} [{}]{}",
            method,
            logged_url,
            loggable_headers(&headers),
            match options.body {
                Some(ref body) => format!(" body: {}", redact(body, self.secret.as_deref())),
                None => String::new(),
            }
        );

        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        if let Some(ref body) = options.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            let err = Error::from(e);
            debug!(
                "{} request to {} failed: {}",
                method,
                logged_url,
                mask_token(&err.to_string(), token)
            );
            err
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(Error::from)?;
        if log_enabled!(Level::Debug) {
            let issued = issued_token(&body);
            let logged = mask_token(&body, token);
            let logged = mask_token(&logged, issued.as_deref());
            debug!("RESP: {} [{}] body: {}", status, loggable_headers(&headers), logged);
        }

        let result = RawResponse {
            status,
            headers,
            body,
        };
        let request_ids = result.request_ids();
        if let Some(request_id) = request_ids.first() {
            debug!(
                "{} call to neutron for {} used request id {}",
                method, logged_url, request_id
            );
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(Error::unauthorized(result.body)
                .with_status(status)
                .with_request_ids(request_ids)),
            StatusCode::FORBIDDEN => {
                let error = if result.is_empty() {
                    Error::from_kind(ErrorKind::Forbidden)
                } else {
                    Error::new(ErrorKind::Forbidden, result.body)
                };
                Err(error.with_status(status).with_request_ids(request_ids))
            }
            _ => Ok(result),
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("follows_redirects", &self.follows_redirects)
            .field("redacts_credentials", &self.secret.is_some())
            .field("global_request_id", &self.global_request_id)
            .finish()
    }
}

impl Deref for FollowRedirects<'_> {
    type Target = Transport;

    fn deref(&self) -> &Transport {
        self.transport
    }
}

impl Drop for FollowRedirects<'_> {
    fn drop(&mut self) {
        if self.swapped {
            self.transport.swap_clients();
        }
    }
}
