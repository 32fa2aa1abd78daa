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

//! Cloud record of a configuration file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::{Config, EndpointType, Error, ErrorKind};

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) struct Auth {
    #[serde(default)]
    pub(crate) auth_url: Option<String>,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default, alias = "tenant_id")]
    pub(crate) project_id: Option<String>,
    #[serde(default, alias = "tenant_name")]
    pub(crate) project_name: Option<String>,
    #[serde(default)]
    pub(crate) token: Option<String>,
}

/// A single cloud from `clouds.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CloudConfig {
    #[serde(default)]
    pub(crate) auth: Option<Auth>,
    #[serde(default)]
    pub(crate) auth_type: Option<String>,
    #[serde(default)]
    pub(crate) cacert: Option<String>,
    #[serde(default)]
    pub(crate) verify: Option<bool>,
    #[serde(default, alias = "endpoint_type")]
    pub(crate) interface: Option<String>,
    #[serde(default)]
    pub(crate) region_name: Option<String>,
    #[serde(default)]
    pub(crate) network_endpoint_override: Option<String>,
    #[serde(default)]
    pub(crate) network_service_type: Option<String>,
    #[serde(default)]
    pub(crate) api_timeout: Option<f64>,
}

#[inline]
fn require(value: Option<String>, message: &str) -> Result<String, Error> {
    value.ok_or_else(|| Error::new(ErrorKind::InvalidConfig, message))
}

impl CloudConfig {
    /// Convert the cloud record into a client configuration.
    pub(crate) fn into_config(self) -> Result<Config, Error> {
        let auth = self.auth.unwrap_or_default();
        let auth_type = self.auth_type.unwrap_or_else(|| {
            if auth.token.is_some() {
                "token"
            } else {
                "password"
            }
            .into()
        });

        let mut result = Config::default();
        match auth_type.as_str() {
            "password" | "v2password" => {
                result.auth_url = Some(require(
                    auth.auth_url,
                    "Password authentication requires an authentication URL",
                )?);
                if auth.username.is_none() && auth.user_id.is_none() {
                    return Err(Error::new(
                        ErrorKind::InvalidConfig,
                        "Password authentication requires a username or a user ID",
                    ));
                }
                result.password = Some(require(
                    auth.password,
                    "Password authentication requires a password",
                )?);
                result.username = auth.username;
                result.user_id = auth.user_id;
            }
            "token" | "v2token" => {
                result.token = Some(require(
                    auth.token,
                    "Token authentication requires a token",
                )?);
                result.auth_url = auth.auth_url;
                if result.auth_url.is_none() && self.network_endpoint_override.is_none() {
                    return Err(Error::new(
                        ErrorKind::InvalidConfig,
                        "Token authentication requires an authentication URL or an endpoint override",
                    ));
                }
            }
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Unsupported authentication type: {}", other),
                ));
            }
        }

        result.tenant_id = auth.project_id;
        result.tenant_name = auth.project_name;
        result.region_name = self.region_name;
        result.endpoint_url = self.network_endpoint_override;
        result.ca_cert = self.cacert.map(PathBuf::from);
        result.insecure = !self.verify.unwrap_or(true);
        if let Some(interface) = self.interface {
            result.endpoint_type = EndpointType::from_str(&interface)?;
        }
        if let Some(service_type) = self.network_service_type {
            result.service_type = service_type;
        }
        if let Some(timeout) = self.api_timeout {
            let value = Some(timeout)
                .filter(|value| *value > 0.0)
                .and_then(|value| Duration::try_from_secs_f64(value).ok())
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidConfig,
                        format!("api_timeout must be a positive number, got {}", timeout),
                    )
                })?;
            result.timeout = Some(value);
        }

        Ok(result)
    }
}
