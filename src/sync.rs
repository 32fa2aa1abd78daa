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

//! Synchronous wrapper for a session.
//!
//! Every call blocks the current thread until it finishes. Must not be used from within an
//! asynchronous runtime.

use std::fmt;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use super::identity::AuthState;
use super::session::ApiResponse;
use super::transport::{RawResponse, RequestOptions};
use super::{Config, Error, ErrorKind, Session};

/// A synchronous wrapper for an asynchronous session.
pub struct SyncSession {
    inner: Session,
    runtime: Runtime,
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("inner", &self.inner)
            .finish()
    }
}

impl From<SyncSession> for Session {
    fn from(value: SyncSession) -> Session {
        value.inner
    }
}

impl SyncSession {
    /// Wrap an existing session.
    pub fn new(session: Session) -> Result<SyncSession, Error> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot create a runtime: {}", e),
                )
            })?;
        Ok(SyncSession {
            inner: session,
            runtime,
        })
    }

    /// Create a session from the configuration.
    #[inline]
    pub fn from_config(config: Config) -> Result<SyncSession, Error> {
        SyncSession::new(Session::new(config)?)
    }

    /// Create a session from `OS_*` environment variables.
    #[inline]
    pub fn from_env() -> Result<SyncSession, Error> {
        SyncSession::new(Session::from_env()?)
    }

    /// Underlying asynchronous session.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.inner
    }

    /// Current authentication state.
    #[inline]
    pub fn auth_info(&self) -> &AuthState {
        self.inner.auth_info()
    }

    /// Authenticate and resolve the endpoint.
    pub fn authenticate(&mut self) -> Result<(), Error> {
        self.runtime.block_on(self.inner.authenticate())
    }

    /// Make an authenticated request, re-authenticating once on HTTP 401.
    pub fn do_request(
        &mut self,
        url_suffix: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        self.runtime
            .block_on(self.inner.do_request(url_suffix, method, options))
    }

    /// Make a request, retrying on connection failures.
    pub fn retry_request(
        &mut self,
        method: Method,
        url_suffix: &str,
        options: &RequestOptions,
    ) -> Result<RawResponse, Error> {
        self.runtime
            .block_on(self.inner.retry_request(method, url_suffix, options))
    }

    /// Issue a `GET` request.
    pub fn get<T: DeserializeOwned>(&mut self, action: &str) -> Result<ApiResponse<T>, Error> {
        self.runtime.block_on(self.inner.get(action))
    }

    /// Issue a `GET` request with query parameters.
    pub fn get_query<T, K, V>(
        &mut self,
        action: &str,
        query: &[(K, V)],
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.runtime.block_on(self.inner.get_query(action, query))
    }

    /// Issue a `POST` request with a JSON body.
    pub fn post<B, T>(&mut self, action: &str, body: &B) -> Result<ApiResponse<T>, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.runtime.block_on(self.inner.post(action, body))
    }

    /// Issue a `PUT` request with a JSON body.
    pub fn put<B, T>(&mut self, action: &str, body: &B) -> Result<ApiResponse<T>, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.runtime.block_on(self.inner.put(action, body))
    }

    /// Issue a `DELETE` request.
    pub fn delete(&mut self, action: &str) -> Result<ApiResponse<Value>, Error> {
        self.runtime.block_on(self.inner.delete(action))
    }

    /// List a collection, following pagination links.
    pub fn list<K, V>(
        &mut self,
        collection: &str,
        path: &str,
        query: &[(K, V)],
    ) -> Result<ApiResponse<Vec<Value>>, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.runtime
            .block_on(self.inner.list(collection, path, query))
    }
}
