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

//! Classification of error responses.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::trace;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;

use super::{Error, ErrorKind};

/// Header carrying the request ID.
pub const REQUEST_ID_HEADER: &str = "x-openstack-request-id";

lazy_static! {
    /// Errors reported by the Networking service, keyed by `{type}Client`.
    static ref CLIENT_ERRORS: HashMap<&'static str, ErrorKind> = {
        let mut m = HashMap::new();
        let _ = m.insert("NetworkNotFoundClient", ErrorKind::NetworkNotFound);
        let _ = m.insert("PortNotFoundClient", ErrorKind::PortNotFound);
        let _ = m.insert("StateInvalidClient", ErrorKind::StateInvalid);
        let _ = m.insert("NetworkInUseClient", ErrorKind::NetworkInUse);
        let _ = m.insert("PortInUseClient", ErrorKind::PortInUse);
        let _ = m.insert("IpAddressInUseClient", ErrorKind::IpAddressInUse);
        let _ = m.insert("InvalidIpForNetworkClient", ErrorKind::InvalidIpForNetwork);
        let _ = m.insert("InvalidIpForSubnetClient", ErrorKind::InvalidIpForSubnet);
        let _ = m.insert("OverQuotaClient", ErrorKind::OverQuota);
        let _ = m.insert(
            "IpAddressGenerationFailureClient",
            ErrorKind::IpAddressGenerationFailure,
        );
        let _ = m.insert("MacAddressInUseClient", ErrorKind::MacAddressInUse);
        let _ = m.insert(
            "HostNotCompatibleWithFixedIpsClient",
            ErrorKind::HostNotCompatibleWithFixedIps,
        );
        let _ = m.insert(
            "ExternalIpAddressExhaustedClient",
            ErrorKind::ExternalIpAddressExhausted,
        );
        m
    };
}

/// Error kind for a server-reported error type, if one is registered.
pub fn client_error_kind(error_type: &str) -> Option<ErrorKind> {
    CLIENT_ERRORS
        .get(format!("{}Client", error_type).as_str())
        .copied()
}

/// Error kind for an HTTP status code, if one is defined.
pub fn status_error_kind(status: StatusCode) -> Option<ErrorKind> {
    match status.as_u16() {
        400 => Some(ErrorKind::BadRequest),
        401 => Some(ErrorKind::Unauthorized),
        403 => Some(ErrorKind::Forbidden),
        404 => Some(ErrorKind::NotFound),
        409 => Some(ErrorKind::Conflict),
        414 => Some(ErrorKind::RequestUriTooLong),
        500 => Some(ErrorKind::InternalServerError),
        503 => Some(ErrorKind::ServiceUnavailable),
        _ => None,
    }
}

/// Extract request IDs from response headers.
pub fn request_ids(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(REQUEST_ID_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(From::from)
        .collect()
}

/// Parse the `NeutronError` envelope: `{"NeutronError": {"type", "message", "detail"}}`.
///
/// Returns the error type (if recognizable) and the message.
fn parse_envelope(envelope: &Value) -> (Option<&str>, String) {
    match (envelope["type"].as_str(), envelope["message"].as_str()) {
        (Some(error_type), Some(message)) => {
            let message = match envelope["detail"].as_str() {
                Some(detail) if !detail.is_empty() => format!("{}\n{}", message, detail),
                _ => message.to_string(),
            };
            (Some(error_type), message)
        }
        _ => match envelope {
            Value::String(s) => (None, s.clone()),
            other => (None, other.to_string()),
        },
    }
}

/// Convert an error response into an `Error`.
///
/// Lookup order: the server-reported error type, the status code, the generic
/// `ClientError` as a fallback.
pub fn classify(status: StatusCode, body: &str, request_ids: Vec<String>) -> Error {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let (kind, message) = match parsed.as_ref().and_then(|v| v.get("NeutronError")) {
        Some(envelope) => {
            let (error_type, message) = parse_envelope(envelope);
            (error_type.and_then(client_error_kind), message)
        }
        None => {
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("message"))
                .and_then(Value::as_str)
                .unwrap_or(body);
            let message = if message.is_empty() {
                format!("{}-{}", status.as_u16(), body)
            } else {
                message.to_string()
            };
            (None, message)
        }
    };

    let kind = kind
        .or_else(|| status_error_kind(status))
        .unwrap_or(ErrorKind::ClientError);
    trace!("HTTP request returned {}; error {:?}: {}", status, kind, message);

    Error::new(kind, message)
        .with_status(status)
        .with_request_ids(request_ids)
}
