// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Endpoint types (interfaces) of catalog records.

use std::fmt;
use std::str::FromStr;

use super::{Error, ErrorKind};

/// Endpoint type: public, internal or admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndpointType {
    /// Public interface (used by default).
    #[default]
    Public,
    /// Internal interface.
    Internal,
    /// Administrator interface.
    Admin,
}

impl EndpointType {
    /// Key of the URL field in a catalog endpoint record.
    pub fn catalog_key(self) -> &'static str {
        match self {
            EndpointType::Public => "publicURL",
            EndpointType::Internal => "internalURL",
            EndpointType::Admin => "adminURL",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_key())
    }
}

impl FromStr for EndpointType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" | "publicURL" => Ok(EndpointType::Public),
            "internal" | "internalURL" => Ok(EndpointType::Internal),
            "admin" | "adminURL" => Ok(EndpointType::Admin),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unknown endpoint type: {}", other),
            )),
        }
    }
}
