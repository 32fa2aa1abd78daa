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

//! JSON structures of the Identity V2 API.

use serde::Serialize;

/// A user referenced by ID or by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum UserRef {
    #[serde(rename = "userId")]
    Id(String),
    #[serde(rename = "username")]
    Name(String),
}

/// A tenant referenced by ID or by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum TenantRef {
    #[serde(rename = "tenantId")]
    Id(String),
    #[serde(rename = "tenantName")]
    Name(String),
}

#[derive(Debug, Serialize)]
pub struct PasswordCredentials<'a> {
    #[serde(flatten)]
    pub user: &'a UserRef,
    pub password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct PasswordAuth<'a> {
    #[serde(rename = "passwordCredentials")]
    pub password_credentials: PasswordCredentials<'a>,
    #[serde(flatten)]
    pub tenant: Option<&'a TenantRef>,
}

#[derive(Debug, Serialize)]
pub struct AuthRoot<'a> {
    pub auth: PasswordAuth<'a>,
}

impl UserRef {
    /// User ID wins over the user name.
    pub fn new(user_id: Option<&str>, username: Option<&str>) -> Option<UserRef> {
        user_id
            .map(|id| UserRef::Id(id.into()))
            .or_else(|| username.map(|name| UserRef::Name(name.into())))
    }
}

impl TenantRef {
    /// Tenant ID wins over the tenant name.
    pub fn new(tenant_id: Option<&str>, tenant_name: Option<&str>) -> Option<TenantRef> {
        tenant_id
            .map(|id| TenantRef::Id(id.into()))
            .or_else(|| tenant_name.map(|name| TenantRef::Name(name.into())))
    }
}

impl<'a> AuthRoot<'a> {
    pub fn new(
        user: &'a UserRef,
        password: Option<&'a str>,
        tenant: Option<&'a TenantRef>,
    ) -> AuthRoot<'a> {
        AuthRoot {
            auth: PasswordAuth {
                password_credentials: PasswordCredentials { user, password },
                tenant,
            },
        }
    }
}
