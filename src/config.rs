// Copyright 2018 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Client configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::loading;
use super::{EndpointType, Error};

/// The only supported authentication strategy.
pub const KEYSTONE_STRATEGY: &str = "keystone";

/// Default service type of the Networking service.
pub const DEFAULT_SERVICE_TYPE: &str = "network";

/// Default delay between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration of a [Session](../struct.Session.html).
///
/// Start with `Config::default()` and use the `with_*` methods, or load it with
/// [from_env](#method.from_env) and [from_config](#method.from_config).
#[derive(Clone)]
pub struct Config {
    /// Identity service URL (e.g. `http://keystone:5000/v2.0`).
    pub auth_url: Option<String>,
    /// User name.
    pub username: Option<String>,
    /// User ID, takes precedence over the user name.
    pub user_id: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Tenant (project) name.
    pub tenant_name: Option<String>,
    /// Tenant (project) ID, takes precedence over the tenant name.
    pub tenant_id: Option<String>,
    /// Pre-existing token.
    pub token: Option<String>,
    /// Networking service URL, skips catalog resolution when set.
    pub endpoint_url: Option<String>,
    /// Region to use from the catalog.
    pub region_name: Option<String>,
    /// Endpoint type (interface) to use from the catalog.
    pub endpoint_type: EndpointType,
    /// Service type in the catalog.
    pub service_type: String,
    /// Authentication strategy, only `keystone` is supported.
    pub auth_strategy: String,
    /// Disable TLS certificate validation.
    pub insecure: bool,
    /// Path to a CA bundle in PEM format.
    pub ca_cert: Option<PathBuf>,
    /// Log request bodies with credentials in clear.
    pub log_credentials: bool,
    /// Timeout covering connect and read.
    pub timeout: Option<Duration>,
    /// Additional attempts for idempotent requests that failed to connect.
    pub retries: u32,
    /// Delay between connection attempts.
    pub retry_interval: Duration,
    /// Request ID to send with every request.
    pub global_request_id: Option<String>,
    /// Whether to follow redirects outside of authentication.
    pub follow_redirects: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            auth_url: None,
            username: None,
            user_id: None,
            password: None,
            tenant_name: None,
            tenant_id: None,
            token: None,
            endpoint_url: None,
            region_name: None,
            endpoint_type: EndpointType::default(),
            service_type: DEFAULT_SERVICE_TYPE.into(),
            auth_strategy: KEYSTONE_STRATEGY.into(),
            insecure: false,
            ca_cert: None,
            log_credentials: false,
            timeout: None,
            retries: 0,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            global_request_id: None,
            follow_redirects: false,
        }
    }
}

impl Config {
    /// Load configuration from `OS_*` environment variables.
    ///
    /// If `OS_CLOUD` is set, the named cloud is loaded from `clouds.yaml` instead.
    #[inline]
    pub fn from_env() -> Result<Config, Error> {
        loading::from_env()
    }

    /// Load configuration of the named cloud from `clouds.yaml`.
    #[inline]
    pub fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<Config, Error> {
        loading::from_config(cloud_name)
    }

    /// Set the identity service URL.
    pub fn with_auth_url<S: Into<String>>(mut self, value: S) -> Self {
        self.auth_url = Some(value.into());
        self
    }

    /// Set the user name.
    pub fn with_username<S: Into<String>>(mut self, value: S) -> Self {
        self.username = Some(value.into());
        self
    }

    /// Set the user ID.
    pub fn with_user_id<S: Into<String>>(mut self, value: S) -> Self {
        self.user_id = Some(value.into());
        self
    }

    /// Set the password.
    pub fn with_password<S: Into<String>>(mut self, value: S) -> Self {
        self.password = Some(value.into());
        self
    }

    /// Set the tenant name.
    pub fn with_tenant_name<S: Into<String>>(mut self, value: S) -> Self {
        self.tenant_name = Some(value.into());
        self
    }

    /// Set the tenant ID.
    pub fn with_tenant_id<S: Into<String>>(mut self, value: S) -> Self {
        self.tenant_id = Some(value.into());
        self
    }

    /// Use an existing token.
    pub fn with_token<S: Into<String>>(mut self, value: S) -> Self {
        self.token = Some(value.into());
        self
    }

    /// Use a fixed Networking service URL.
    pub fn with_endpoint_url<S: Into<String>>(mut self, value: S) -> Self {
        self.endpoint_url = Some(value.into());
        self
    }

    /// Set the region.
    pub fn with_region_name<S: Into<String>>(mut self, value: S) -> Self {
        self.region_name = Some(value.into());
        self
    }

    /// Set the endpoint type.
    pub fn with_endpoint_type(mut self, value: EndpointType) -> Self {
        self.endpoint_type = value;
        self
    }

    /// Set the service type.
    pub fn with_service_type<S: Into<String>>(mut self, value: S) -> Self {
        self.service_type = value.into();
        self
    }

    /// Set the authentication strategy.
    pub fn with_auth_strategy<S: Into<String>>(mut self, value: S) -> Self {
        self.auth_strategy = value.into();
        self
    }

    /// Disable (or enable back) TLS certificate validation.
    pub fn with_insecure(mut self, value: bool) -> Self {
        self.insecure = value;
        self
    }

    /// Use a CA bundle.
    pub fn with_ca_cert<P: Into<PathBuf>>(mut self, value: P) -> Self {
        self.ca_cert = Some(value.into());
        self
    }

    /// Whether to log credentials in clear.
    pub fn with_log_credentials(mut self, value: bool) -> Self {
        self.log_credentials = value;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    /// Set the number of additional connection attempts.
    pub fn with_retries(mut self, value: u32) -> Self {
        self.retries = value;
        self
    }

    /// Set the delay between connection attempts.
    pub fn with_retry_interval(mut self, value: Duration) -> Self {
        self.retry_interval = value;
        self
    }

    /// Send a request ID with every request.
    pub fn with_global_request_id<S: Into<String>>(mut self, value: S) -> Self {
        self.global_request_id = Some(value.into());
        self
    }

    /// Whether to follow redirects outside of authentication.
    pub fn with_follow_redirects(mut self, value: bool) -> Self {
        self.follow_redirects = value;
        self
    }
}

fn hide(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("password", &hide(&self.password))
            .field("tenant_name", &self.tenant_name)
            .field("tenant_id", &self.tenant_id)
            .field("token", &hide(&self.token))
            .field("endpoint_url", &self.endpoint_url)
            .field("region_name", &self.region_name)
            .field("endpoint_type", &self.endpoint_type)
            .field("service_type", &self.service_type)
            .field("auth_strategy", &self.auth_strategy)
            .field("insecure", &self.insecure)
            .field("ca_cert", &self.ca_cert)
            .field("log_credentials", &self.log_credentials)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_interval", &self.retry_interval)
            .field("global_request_id", &self.global_request_id)
            .field("follow_redirects", &self.follow_redirects)
            .finish()
    }
}
