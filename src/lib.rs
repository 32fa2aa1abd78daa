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

//! Asynchronous OpenStack Networking (Neutron) client core.
//!
//! The [Session](struct.Session.html) authenticates against Identity API v2, finds the
//! Networking endpoint in the service catalog and dispatches API calls, re-authenticating once
//! when the token expires. Error responses are mapped to [ErrorKind](enum.ErrorKind.html).
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), neutronclient::Error> {
//! let mut session = neutronclient::Session::from_env()?;
//! let network: neutronclient::ApiResponse<serde_json::Value> =
//!     session.get("/networks/4e8e5957-649f-477b-9e5b-f1f75b21c03c").await?;
//! println!("{}", network.body["network"]["name"]);
//! # Ok(()) }
//! ```

#![crate_name = "neutronclient"]
#![crate_type = "lib"]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
// Taken from https://github.com/rust-unofficial/patterns/
#![deny(
    improper_ctypes,
    missing_debug_implementations,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    trivial_casts,
    trivial_numeric_casts,
    unconditional_recursion,
    unsafe_code,
    unused_allocation,
    unused_comparisons,
    unused_doc_comments,
    unused_parens,
    while_true
)]
#![warn(
    missing_copy_implementations,
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]

mod catalog;
mod config;
mod endpointtype;
mod error;
mod fault;
pub mod identity;
mod loading;
mod session;
#[cfg(feature = "stream")]
mod stream;
#[cfg(feature = "sync")]
pub mod sync;
pub mod transport;
mod url;

pub use crate::catalog::{Endpoint, ServiceCatalog, TokenInfo};
pub use crate::config::{Config, DEFAULT_SERVICE_TYPE, KEYSTONE_STRATEGY};
pub use crate::endpointtype::EndpointType;
pub use crate::error::{Error, ErrorKind};
pub use crate::fault::REQUEST_ID_HEADER;
pub use crate::identity::AuthState;
pub use crate::loading::{from_config, from_config_file, from_env};
pub use crate::session::{ApiResponse, Session, ACTION_PREFIX, MAX_URI_LEN};
pub use crate::transport::{RawResponse, RequestOptions};
pub use reqwest::{Method, StatusCode};
