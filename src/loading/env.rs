// Copyright 2018-2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Support for `OS_` environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::loading;
use crate::{Config, EndpointType, Error, ErrorKind};

// This is only used for unit testing.
trait Environment {
    fn get(&self, name: &'static str) -> Result<String, Error>;
}

#[derive(Debug, Clone, Copy)]
struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get(&self, name: &'static str) -> Result<String, Error> {
        env::var(name).map_err(|_| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("Required environment variable {} is not provided", name),
            )
        })
    }
}

#[inline]
fn first_of<E: Environment>(env: &E, names: &[&'static str]) -> Option<String> {
    names.iter().find_map(|name| env.get(*name).ok())
}

fn is_true(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[inline]
fn _from_env<E: Environment>(env: E) -> Result<Config, Error> {
    if let Ok(cloud_name) = env.get("OS_CLOUD") {
        return loading::from_config(cloud_name);
    }

    let mut config = Config {
        auth_url: env.get("OS_AUTH_URL").ok(),
        username: env.get("OS_USERNAME").ok(),
        user_id: env.get("OS_USER_ID").ok(),
        password: env.get("OS_PASSWORD").ok(),
        tenant_id: first_of(&env, &["OS_TENANT_ID", "OS_PROJECT_ID"]),
        tenant_name: first_of(&env, &["OS_TENANT_NAME", "OS_PROJECT_NAME"]),
        token: env.get("OS_TOKEN").ok(),
        endpoint_url: env.get("OS_URL").ok(),
        region_name: env.get("OS_REGION_NAME").ok(),
        ca_cert: env.get("OS_CACERT").ok().map(PathBuf::from),
        global_request_id: env.get("OS_GLOBAL_REQUEST_ID").ok(),
        ..Config::default()
    };

    if config.auth_url.is_none() && (config.token.is_none() || config.endpoint_url.is_none()) {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "Either OS_AUTH_URL or both OS_TOKEN and OS_URL must be provided",
        ));
    }

    if let Some(endpoint_type) = first_of(&env, &["OS_ENDPOINT_TYPE", "OS_INTERFACE"]) {
        config.endpoint_type = EndpointType::from_str(&endpoint_type)?;
    }

    if let Ok(strategy) = env.get("OS_AUTH_STRATEGY") {
        config.auth_strategy = strategy;
    }

    if let Ok(service_type) = env.get("OS_NETWORK_SERVICE_TYPE") {
        config.service_type = service_type;
    }

    if let Ok(insecure) = env.get("NEUTRONCLIENT_INSECURE") {
        config.insecure = is_true(&insecure);
    }

    if let Ok(timeout) = env.get("OS_NETWORK_TIMEOUT") {
        let value = f64::from_str(&timeout)
            .ok()
            .filter(|value| *value > 0.0)
            .and_then(|value| Duration::try_from_secs_f64(value).ok())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("OS_NETWORK_TIMEOUT must be a positive number, got {}", timeout),
                )
            })?;
        config.timeout = Some(value);
    }

    Ok(config)
}

/// Create a `Config` from environment variables.
///
/// If `OS_CLOUD` is set, the cloud is loaded from `clouds.yaml`. Otherwise either
/// `OS_AUTH_URL` or both `OS_TOKEN` and `OS_URL` are required.
pub fn from_env() -> Result<Config, Error> {
    _from_env(RealEnvironment)
}
