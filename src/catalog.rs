// Copyright 2017 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Low-level code to work with the service catalog.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::transport::hash_token;
use super::{Error, ErrorKind};

/// A single endpoint record from the service catalog.
///
/// Identity API v2 publishes one URL per interface under keys like `publicURL`, so the record
/// is kept as a free-form map.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Endpoint(Map<String, Value>);

/// Token information extracted from the service catalog.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token value.
    pub id: String,
    /// Expiration time as reported by the identity service.
    pub expires: String,
    /// Tenant the token is scoped to.
    pub tenant_id: Option<String>,
    /// User the token belongs to.
    pub user_id: Option<String>,
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TokenInfo {{ id: hash({}), expires: {:?}, tenant_id: {:?}, user_id: {:?} }}",
            hash_token(&self.id),
            self.expires,
            self.tenant_id,
            self.user_id
        )
    }
}

/// A read-only view over an identity service response.
#[derive(Clone, Debug)]
pub struct ServiceCatalog {
    catalog: Value,
}

impl Endpoint {
    /// String value of the given key (e.g. `region` or `publicURL`).
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Region of the endpoint.
    #[inline]
    pub fn region(&self) -> Option<&str> {
        self.get("region")
    }

    /// Whether the endpoint has the key at all.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

impl From<Map<String, Value>> for Endpoint {
    fn from(value: Map<String, Value>) -> Endpoint {
        Endpoint(value)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

impl TokenInfo {
    /// Parsed expiration time, if it is a valid RFC 3339 timestamp.
    pub fn expires_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.expires).ok()
    }
}

fn missing(what: &str) -> Error {
    Error::new(
        ErrorKind::MalformedResponseBody,
        format!("{} is missing from the identity response", what),
    )
}

impl ServiceCatalog {
    /// Wrap an identity service response.
    #[inline]
    pub fn new(catalog: Value) -> ServiceCatalog {
        ServiceCatalog { catalog }
    }

    /// Extract token information.
    ///
    /// The token ID and expiration time are required, the tenant and user are picked up
    /// when present.
    pub fn get_token(&self) -> Result<TokenInfo, Error> {
        let access = &self.catalog["access"];
        let token = &access["token"];
        let id = token["id"]
            .as_str()
            .ok_or_else(|| missing("access.token.id"))?;
        let expires = token["expires"]
            .as_str()
            .ok_or_else(|| missing("access.token.expires"))?;
        Ok(TokenInfo {
            id: id.to_string(),
            expires: expires.to_string(),
            tenant_id: token["tenant"]["id"].as_str().map(From::from),
            user_id: access["user"]["id"].as_str().map(From::from),
        })
    }

    /// Find all endpoints of the service type that pass the filter.
    ///
    /// An empty or missing `filter_value` lets all endpoints of the service through.
    pub fn matching_endpoints(
        &self,
        attr: &str,
        filter_value: Option<&str>,
        service_type: &str,
    ) -> Vec<Endpoint> {
        let filter_value = filter_value.filter(|v| !v.is_empty());
        let services = match self.catalog["access"]["serviceCatalog"].as_array() {
            Some(services) => services,
            None => return Vec::new(),
        };

        services
            .iter()
            .filter(|svc| svc["type"].as_str() == Some(service_type))
            .filter_map(|svc| svc["endpoints"].as_array())
            .flatten()
            .filter_map(|endp| endp.as_object())
            .filter(|endp| match filter_value {
                Some(value) => endp.get(attr).and_then(Value::as_str) == Some(value),
                None => true,
            })
            .map(|endp| Endpoint(endp.clone()))
            .collect()
    }

    /// Resolve an endpoint URL.
    ///
    /// Exactly one endpoint must match the service type and the filter, and it must have a
    /// URL for the requested endpoint type (e.g. `publicURL`).
    pub fn url_for(
        &self,
        attr: &str,
        filter_value: Option<&str>,
        service_type: &str,
        endpoint_type: &str,
    ) -> Result<String, Error> {
        let mut matching = self.matching_endpoints(attr, filter_value, service_type);
        trace!(
            "Endpoints matching {}={:?} for service {}: {:?}",
            attr,
            filter_value,
            service_type,
            matching
        );
        match matching.len() {
            0 => Err(Error::endpoint_not_found()),
            1 => {
                let endpoint = matching.remove(0);
                let url = endpoint
                    .get(endpoint_type)
                    .ok_or_else(|| Error::endpoint_type_not_found(endpoint_type))?;
                debug!(
                    "Using {} endpoint {} for service {}",
                    endpoint_type, url, service_type
                );
                Ok(url.to_string())
            }
            _ => Err(Error::ambiguous_endpoints(matching)),
        }
    }
}
