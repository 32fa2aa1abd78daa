// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Session structure definition.

use std::time::Duration;

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use static_assertions::assert_impl_all;

use super::identity::{AuthState, Authenticator};
use super::transport::{RawResponse, RequestOptions, Transport, AUTH_TOKEN_HEADER};
use super::{fault, url, Config, Error, ErrorKind};

/// Maximum length of a request URI.
pub const MAX_URI_LEN: usize = 8192;

/// Prefix of all Networking API actions.
pub const ACTION_PREFIX: &str = "/v2.0";

const SUCCESS_CODES: [StatusCode; 4] = [
    StatusCode::OK,
    StatusCode::CREATED,
    StatusCode::ACCEPTED,
    StatusCode::NO_CONTENT,
];

/// A decoded response of the Networking API.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    /// Response body.
    pub body: T,
    /// HTTP status code.
    pub status: StatusCode,
    /// Request IDs reported by the server.
    pub request_ids: Vec<String>,
}

/// A Networking service session.
///
/// The session owns the credentials and the current token. Calls that may need to
/// (re-)authenticate take `&mut self`, so one session serves one task at a time.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), neutronclient::Error> {
/// let config = neutronclient::Config::default()
///     .with_auth_url("http://keystone:5000/v2.0")
///     .with_username("admin")
///     .with_password("pa$$w0rd")
///     .with_tenant_name("admin")
///     .with_region_name("RegionOne");
/// let mut session = neutronclient::Session::new(config)?;
/// let networks = session.list("networks", "/networks", &[("shared", "true")]).await?;
/// println!("Found {} networks", networks.body.len());
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    transport: Transport,
    authenticator: Authenticator,
    state: AuthState,
    retries: u32,
    retry_interval: Duration,
}

assert_impl_all!(Session: Send, Sync);

/// Fail if the URI is longer than `MAX_URI_LEN`.
fn check_uri_length(url: &str) -> Result<(), Error> {
    let len = url.len();
    if len > MAX_URI_LEN {
        Err(Error::uri_too_long(len - MAX_URI_LEN))
    } else {
        Ok(())
    }
}

fn is_page_reverse<K: AsRef<str>, V: AsRef<str>>(query: &[(K, V)]) -> bool {
    query.iter().any(|(k, v)| {
        k.as_ref() == "page_reverse"
            && !matches!(
                v.as_ref().to_lowercase().as_str(),
                "" | "0" | "false" | "no" | "off"
            )
    })
}

/// Query of the next page from the `{collection}_links` of a page.
pub(crate) fn next_page_query(
    body: &Value,
    collection: &str,
    reverse: bool,
) -> Result<Option<Vec<(String, String)>>, Error> {
    let rel = if reverse { "previous" } else { "next" };
    let links = match body[format!("{}_links", collection).as_str()].as_array() {
        Some(links) => links,
        None => return Ok(None),
    };

    for link in links {
        if link["rel"].as_str() == Some(rel) {
            if let Some(href) = link["href"].as_str() {
                return url::query_pairs(href).map(Some);
            }
        }
    }

    Ok(None)
}

fn page_items(body: &Value, collection: &str) -> Result<Vec<Value>, Error> {
    body[collection].as_array().cloned().ok_or_else(|| {
        Error::malformed_response(format!("{} is not a list in the response", collection))
    })
}

fn to_owned_query<K: AsRef<str>, V: AsRef<str>>(query: &[(K, V)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect()
}

fn handle_response<T: DeserializeOwned>(resp: RawResponse) -> Result<ApiResponse<T>, Error> {
    let request_ids = resp.request_ids();
    if SUCCESS_CODES.contains(&resp.status) {
        let body = resp
            .json()
            .map_err(|e| e.with_status(resp.status).with_request_ids(request_ids.clone()))?;
        Ok(ApiResponse {
            body,
            status: resp.status,
            request_ids,
        })
    } else if resp.is_empty() {
        let reason = resp.status.canonical_reason().unwrap_or_default();
        Err(fault::classify(resp.status, reason, request_ids))
    } else {
        Err(fault::classify(resp.status, &resp.body, request_ids))
    }
}

/// Something that can dispatch an authenticated request.
#[async_trait]
pub(crate) trait Dispatch {
    async fn dispatch(
        &mut self,
        url_suffix: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error>;
}

#[async_trait]
impl Dispatch for Session {
    async fn dispatch(
        &mut self,
        url_suffix: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        self.do_request(url_suffix, method, options).await
    }
}

/// Dispatch a request, repeating it on `ConnectionFailed` only.
async fn retry_dispatch<D: Dispatch + Send>(
    dispatcher: &mut D,
    retries: u32,
    interval: Duration,
    method: Method,
    url_suffix: &str,
    options: &RequestOptions,
) -> Result<RawResponse, Error> {
    let max_attempts = retries.saturating_add(1);
    for attempt in 1..=max_attempts {
        match dispatcher.dispatch(url_suffix, method.clone(), options).await {
            Err(e) if e.kind() == ErrorKind::ConnectionFailed => {
                warn!(
                    "Attempt {} of {} for {} {} failed: {}",
                    attempt, max_attempts, method, url_suffix, e
                );
                if attempt < max_attempts {
                    tokio::time::sleep(interval).await;
                }
            }
            other => return other,
        }
    }

    let message = if retries > 0 {
        format!(
            "Failed to connect to Neutron server after {} attempts",
            max_attempts
        )
    } else {
        String::from("Failed to connect Neutron server")
    };
    Err(Error::connection_failed(message))
}

impl Session {
    /// Create a new session from the configuration.
    ///
    /// No network calls are made until the first request.
    pub fn new(config: Config) -> Result<Session, Error> {
        Ok(Session {
            transport: Transport::new(&config)?,
            authenticator: Authenticator::new(&config),
            state: AuthState::initial(config.token, config.endpoint_url),
            retries: config.retries,
            retry_interval: config.retry_interval,
        })
    }

    /// Create a session from `OS_*` environment variables.
    #[inline]
    pub fn from_env() -> Result<Session, Error> {
        Session::new(Config::from_env()?)
    }

    /// Create a session from the named cloud in `clouds.yaml`.
    #[inline]
    pub fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<Session, Error> {
        Session::new(Config::from_config(cloud_name)?)
    }

    /// Current authentication state: token, tenant, user and endpoint.
    #[inline]
    pub fn auth_info(&self) -> &AuthState {
        &self.state
    }

    /// Authenticate and resolve the endpoint, replacing the current state on success.
    pub async fn authenticate(&mut self) -> Result<(), Error> {
        let state = self
            .authenticator
            .authenticate(&mut self.transport)
            .await?;
        debug!("Authenticated, new state {:?}", state);
        self.state = state;
        Ok(())
    }

    /// Make sure there is a token and an endpoint.
    ///
    /// Without a token, authenticates. With a token but without an endpoint, looks the endpoint
    /// up, falling back to a full authentication if the token is rejected.
    pub async fn ensure_authenticated_and_endpoint(&mut self) -> Result<(), Error> {
        let token = match self.state.token {
            Some(ref token) => token.clone(),
            None => return self.authenticate().await,
        };

        if self.state.endpoint_url.is_none() {
            match self
                .authenticator
                .get_endpoint_url(&self.transport, &token)
                .await
            {
                Ok(endpoint_url) => {
                    debug!("Using endpoint {} for the provided token", endpoint_url);
                    self.state.endpoint_url = Some(endpoint_url);
                }
                Err(e) if e.kind() == ErrorKind::Unauthorized => {
                    debug!("Token was rejected during endpoint lookup, re-authenticating");
                    self.authenticate().await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn send_authenticated(
        &self,
        url_suffix: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        let endpoint = self
            .state
            .endpoint_url
            .as_deref()
            .ok_or_else(Error::endpoint_not_found)?;
        let full_url = url::concat(endpoint, url_suffix);
        check_uri_length(&full_url)?;
        let request_url = url::parse(&full_url)?;

        let token = self
            .state
            .token
            .as_deref()
            .ok_or_else(|| Error::unauthorized(""))?;
        let token = HeaderValue::from_str(token)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid token: {}", e)))?;
        let mut options = options.clone();
        let _ = options
            .headers
            .insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);

        self.transport.request(method, request_url, &options).await
    }

    /// Make an authenticated request to `{endpoint}{url_suffix}`.
    ///
    /// If the token is rejected with HTTP 401, authenticates again and retries exactly once.
    /// A second 401 is returned to the caller.
    pub async fn do_request(
        &mut self,
        url_suffix: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        self.ensure_authenticated_and_endpoint().await?;

        match self
            .send_authenticated(url_suffix, method.clone(), options)
            .await
        {
            Err(e) if e.kind() == ErrorKind::Unauthorized => {
                debug!("{} {} was rejected, re-authenticating", method, url_suffix);
                self.authenticate().await?;
                self.send_authenticated(url_suffix, method, options).await
            }
            other => other,
        }
    }

    /// Make a request, retrying on connection failures.
    ///
    /// Up to `retries` additional attempts are made with a fixed delay. Other errors are
    /// returned immediately.
    pub async fn retry_request(
        &mut self,
        method: Method,
        url_suffix: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        let (retries, interval) = (self.retries, self.retry_interval);
        retry_dispatch(self, retries, interval, method, url_suffix, options).await
    }

    /// Make a Networking API call and decode the response.
    ///
    /// The action is relative to the API root (e.g. `/networks`). `POST` is sent once,
    /// other methods are retried on connection failures.
    pub async fn request<T, K, V>(
        &mut self,
        method: Method,
        action: &str,
        query: &[(K, V)],
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url_suffix = url::with_query(&format!("{}{}", ACTION_PREFIX, action), query);
        let resp = if method == Method::POST {
            self.do_request(&url_suffix, method, &options).await?
        } else {
            self.retry_request(method, &url_suffix, &options).await?
        };
        handle_response(resp)
    }

    /// Issue a `GET` request.
    #[inline]
    pub async fn get<T: DeserializeOwned>(&mut self, action: &str) -> Result<ApiResponse<T>, Error> {
        let query: &[(&str, &str)] = &[];
        self.get_query(action, query).await
    }

    /// Issue a `GET` request with query parameters.
    pub async fn get_query<T, K, V>(
        &mut self,
        action: &str,
        query: &[(K, V)],
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.request(Method::GET, action, query, RequestOptions::default())
            .await
    }

    /// Issue a `POST` request with a JSON body.
    pub async fn post<B, T>(&mut self, action: &str, body: &B) -> Result<ApiResponse<T>, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query: &[(&str, &str)] = &[];
        self.request(Method::POST, action, query, RequestOptions::json(body)?)
            .await
    }

    /// Issue a `PUT` request with a JSON body.
    pub async fn put<B, T>(&mut self, action: &str, body: &B) -> Result<ApiResponse<T>, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let query: &[(&str, &str)] = &[];
        self.request(Method::PUT, action, query, RequestOptions::json(body)?)
            .await
    }

    /// Issue a `DELETE` request.
    pub async fn delete(&mut self, action: &str) -> Result<ApiResponse<Value>, Error> {
        let query: &[(&str, &str)] = &[];
        self.request(Method::DELETE, action, query, RequestOptions::default())
            .await
    }

    /// List a collection, following pagination links.
    ///
    /// Items of all pages are accumulated in one list together with the request IDs of all
    /// pages. Links with `rel` `next` are followed, or `previous` when `page_reverse` is set.
    pub async fn list<K, V>(
        &mut self,
        collection: &str,
        path: &str,
        query: &[(K, V)],
    ) -> Result<ApiResponse<Vec<Value>>, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let reverse = is_page_reverse(query);
        let mut query = to_owned_query(query);
        let mut result = ApiResponse {
            body: Vec::new(),
            status: StatusCode::OK,
            request_ids: Vec::new(),
        };

        loop {
            let page: ApiResponse<Value> = self.get_query(path, &query).await?;
            result.body.extend(page_items(&page.body, collection)?);
            result.request_ids.extend(page.request_ids);
            result.status = page.status;
            match next_page_query(&page.body, collection, reverse)? {
                Some(next) => query = next,
                None => break,
            }
        }

        Ok(result)
    }

    /// Stream pages of a collection, following pagination links.
    ///
    /// Every call starts from the first page. The stream ends after the first failure.
    #[cfg(feature = "stream")]
    pub fn list_pages<'s, K, V>(
        &'s mut self,
        collection: &str,
        path: &str,
        query: &[(K, V)],
    ) -> impl futures::Stream<Item = Result<ApiResponse<Value>, Error>> + 's
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let reverse = is_page_reverse(query);
        super::stream::pages(
            self,
            collection.to_string(),
            path.to_string(),
            to_owned_query(query),
            reverse,
        )
    }
}
