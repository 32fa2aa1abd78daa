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

//! Authentication using Identity API v2 (Keystone).
//!
//! Only password credentials are supported. The token response carries the service catalog,
//! which is used to find the Networking service endpoint.

use std::fmt;

use http::header::HeaderValue;
use log::{debug, error, trace};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::catalog::{ServiceCatalog, TokenInfo};
use super::config::KEYSTONE_STRATEGY;
use super::transport::{hash_token, RequestOptions, Transport, AUTH_TOKEN_HEADER};
use super::{fault, url, Config, EndpointType, Error, ErrorKind};

pub use protocol::{TenantRef, UserRef};

mod protocol;

const NO_AUTH_URL: &str = "auth_url was not provided to the Neutron client";

/// Current token and the endpoint resolved with it.
///
/// A new state is built by every successful authentication and replaces the old one as a whole.
#[derive(Clone, Default)]
pub struct AuthState {
    pub(crate) token: Option<String>,
    pub(crate) tenant_id: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) endpoint_url: Option<String>,
    pub(crate) token_info: Option<TokenInfo>,
}

impl AuthState {
    /// State before the first authentication.
    pub(crate) fn initial(token: Option<String>, endpoint_url: Option<String>) -> AuthState {
        AuthState {
            token,
            endpoint_url,
            ..AuthState::default()
        }
    }

    /// Authentication token (if any).
    #[inline]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Tenant the token is scoped to.
    #[inline]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// User the token belongs to.
    #[inline]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Networking service URL.
    #[inline]
    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    /// Token details from the last authentication.
    #[inline]
    pub fn token_info(&self) -> Option<&TokenInfo> {
        self.token_info.as_ref()
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AuthState {{ token: {:?}, tenant_id: {:?}, user_id: {:?}, endpoint_url: {:?} }}",
            self.token.as_deref().map(hash_token),
            self.tenant_id,
            self.user_id,
            self.endpoint_url
        )
    }
}

/// Password authentication against Identity API v2.
#[derive(Clone)]
pub struct Authenticator {
    auth_url: Option<String>,
    user: Option<UserRef>,
    password: Option<String>,
    tenant: Option<TenantRef>,
    region_name: Option<String>,
    service_type: String,
    endpoint_type: EndpointType,
    auth_strategy: String,
    endpoint_url: Option<String>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("auth_url", &self.auth_url)
            .field("user", &self.user)
            .field("tenant", &self.tenant)
            .field("region_name", &self.region_name)
            .field("service_type", &self.service_type)
            .field("endpoint_type", &self.endpoint_type)
            .field("auth_strategy", &self.auth_strategy)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl Authenticator {
    /// Create an authenticator from the configuration.
    pub fn new(config: &Config) -> Authenticator {
        Authenticator {
            auth_url: config.auth_url.clone(),
            user: UserRef::new(config.user_id.as_deref(), config.username.as_deref()),
            password: config.password.clone(),
            tenant: TenantRef::new(config.tenant_id.as_deref(), config.tenant_name.as_deref()),
            region_name: config.region_name.clone(),
            service_type: config.service_type.clone(),
            endpoint_type: config.endpoint_type,
            auth_strategy: config.auth_strategy.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    fn auth_url(&self) -> Result<&str, Error> {
        self.auth_url
            .as_deref()
            .ok_or_else(|| Error::unauthorized(NO_AUTH_URL))
    }

    /// Exchange the credentials for a token and resolve the endpoint.
    ///
    /// Redirects are followed for this call only. Nothing is modified on failure, the caller
    /// swaps in the returned state.
    pub async fn authenticate(&self, transport: &mut Transport) -> Result<AuthState, Error> {
        if self.auth_strategy != KEYSTONE_STRATEGY {
            return Err(Error::unauthorized(format!(
                "Unknown auth strategy: {}",
                self.auth_strategy
            )));
        }

        let auth_url = self.auth_url()?;
        let user = self
            .user
            .as_ref()
            .ok_or_else(|| Error::unauthorized("Either a username or a user ID is required"))?;
        let body = protocol::AuthRoot::new(user, self.password.as_deref(), self.tenant.as_ref());
        let options = RequestOptions::json(&body)?;
        let token_url = url::parse(&url::concat(auth_url, "/tokens"))?;

        debug!("Authenticating {:?} at {}", user, token_url);
        let resp = {
            let transport = transport.follow_redirects();
            transport.request(Method::POST, token_url, &options).await
        };
        let resp = match resp {
            Ok(resp) => resp,
            Err(e) if e.kind() == ErrorKind::Forbidden => {
                let status = e.status().unwrap_or(StatusCode::FORBIDDEN);
                return Err(Error::unauthorized(e.message())
                    .with_status(status)
                    .with_request_ids(e.request_ids().to_vec()));
            }
            Err(e) => return Err(e),
        };

        if resp.status != StatusCode::OK {
            error!("Authentication failed with HTTP {}", resp.status);
            return Err(Error::unauthorized(resp.body.clone())
                .with_status(resp.status)
                .with_request_ids(resp.request_ids()));
        }

        let body = serde_json::from_str::<Value>(&resp.body).unwrap_or(Value::Null);
        self.extract_service_catalog(body)
    }

    /// Build a new state from an identity response.
    pub fn extract_service_catalog(&self, body: Value) -> Result<AuthState, Error> {
        let catalog = ServiceCatalog::new(body);
        let token = catalog.get_token().map_err(|e| {
            error!("Identity response does not contain a token: {}", e);
            Error::unauthorized(e.message())
        })?;
        trace!("Received token {} expiring at {}", hash_token(&token.id), token.expires);

        let endpoint_url = match self.endpoint_url {
            Some(ref url) => url.clone(),
            None => catalog.url_for(
                "region",
                self.region_name.as_deref(),
                &self.service_type,
                self.endpoint_type.catalog_key(),
            )?,
        };

        Ok(AuthState {
            token: Some(token.id.clone()),
            tenant_id: token.tenant_id.clone(),
            user_id: token.user_id.clone(),
            endpoint_url: Some(endpoint_url),
            token_info: Some(token),
        })
    }

    /// Look up the endpoint for an existing token.
    ///
    /// Uses `GET {auth_url}/tokens/{token}/endpoints`. `Unauthorized` means the token is no
    /// longer valid and a full authentication is required.
    pub async fn get_endpoint_url(
        &self,
        transport: &Transport,
        token: &str,
    ) -> Result<String, Error> {
        let base = url::parse(self.auth_url()?)?;
        let lookup_url = url::extend(base, &["tokens", token, "endpoints"])?;
        let token_value = HeaderValue::from_str(token)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid token: {}", e)))?;
        let options = RequestOptions::default().with_header(
            http::header::HeaderName::from_static(AUTH_TOKEN_HEADER),
            token_value,
        );

        let resp = transport.request(Method::GET, lookup_url, &options).await?;
        if !resp.status.is_success() {
            return Err(fault::classify(resp.status, &resp.body, resp.request_ids()));
        }

        let body: Value = resp.json()?;
        let empty = Vec::new();
        let endpoints = body["endpoints"].as_array().unwrap_or(&empty);
        let key = self.endpoint_type.catalog_key();
        for endpoint in endpoints {
            if endpoint["type"].as_str() == Some(self.service_type.as_str())
                && endpoint["region"].as_str() == self.region_name.as_deref()
            {
                return endpoint[key]
                    .as_str()
                    .map(From::from)
                    .ok_or_else(|| Error::endpoint_type_not_found(key));
            }
        }

        Err(Error::endpoint_not_found())
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::{AuthState, Authenticator};
    use crate::catalog::test::demo_body;
    use crate::config::test::test_config;
    use crate::transport::Transport;
    use crate::{EndpointType, ErrorKind};

    #[test]
    fn test_extract_service_catalog() {
        let config = test_config().with_region_name("RegionOne");
        let state = Authenticator::new(&config)
            .extract_service_catalog(demo_body())
            .unwrap();
        assert_eq!(state.token(), Some("abcdef"));
        assert_eq!(state.tenant_id(), Some("tenant-id"));
        assert_eq!(state.user_id(), Some("user-id"));
        assert_eq!(state.endpoint_url(), Some("https://host.one:9696"));
        assert_eq!(
            state.token_info().unwrap().expires,
            "2030-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_extract_service_catalog_internal() {
        let config = test_config()
            .with_region_name("RegionOne")
            .with_endpoint_type(EndpointType::Internal);
        let state = Authenticator::new(&config)
            .extract_service_catalog(demo_body())
            .unwrap();
        assert_eq!(state.endpoint_url(), Some("http://192.168.22.1:9696"));
    }

    #[test]
    fn test_extract_service_catalog_configured_endpoint() {
        let config = test_config().with_endpoint_url("http://fixed:9696");
        let state = Authenticator::new(&config)
            .extract_service_catalog(demo_body())
            .unwrap();
        assert_eq!(state.endpoint_url(), Some("http://fixed:9696"));
    }

    #[test]
    fn test_extract_service_catalog_no_token() {
        let err = Authenticator::new(&test_config())
            .extract_service_catalog(json!({"access": {}}))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_extract_service_catalog_ambiguous() {
        let err = Authenticator::new(&test_config())
            .extract_service_catalog(demo_body())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::AmbiguousEndpoints);
    }

    #[test]
    fn test_auth_state_debug() {
        let state = AuthState::initial(Some("abcdef".into()), None);
        assert!(!format!("{:?}", state).contains("abcdef"));
    }

    #[tokio::test]
    async fn test_unknown_strategy() {
        let config = test_config()
            .with_auth_url("http://127.0.0.1:1/v2.0")
            .with_auth_strategy("noauth");
        let mut transport = Transport::new(&config).unwrap();
        let err = Authenticator::new(&config)
            .authenticate(&mut transport)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Unknown auth strategy: noauth");
    }

    #[tokio::test]
    async fn test_no_auth_url() {
        let config = test_config().with_username("admin").with_password("pwd");
        let mut transport = Transport::new(&config).unwrap();
        let err = Authenticator::new(&config)
            .authenticate(&mut transport)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            err.message(),
            "auth_url was not provided to the Neutron client"
        );
    }
}
