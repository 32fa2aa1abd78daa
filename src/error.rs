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

//! Error and result implementations.

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;

use crate::catalog::Endpoint;

/// Kind of an error.
///
/// Resource-specific kinds (e.g. `NetworkNotFound`) are reported by the Networking service in
/// its error envelope. Use [base_kind](#method.base_kind) to get the HTTP-level kind they
/// belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Any transport-level failure: refused connection, DNS, timeout, decoding.
    ConnectionFailed,
    /// TLS handshake or certificate validation failure.
    SslCertificateValidation,
    /// Authentication failed (HTTP 401) or credentials are unusable.
    Unauthorized,
    /// Access to the resource is denied (HTTP 403).
    Forbidden,
    /// No service or region matched in the service catalog.
    EndpointNotFound,
    /// The matching catalog endpoint has no URL for the requested interface.
    EndpointTypeNotFound,
    /// More than one catalog endpoint matched the filters.
    AmbiguousEndpoints,
    /// Malformed request (HTTP 400).
    BadRequest,
    /// Requested resource was not found (HTTP 404).
    NotFound,
    /// Request conflicts with the current state of the resource (HTTP 409).
    Conflict,
    /// Request URI exceeds the allowed length (HTTP 414 or a client-side check).
    RequestUriTooLong,
    /// Internal server error (HTTP 500).
    InternalServerError,
    /// Service is temporary unavailable (HTTP 503).
    ServiceUnavailable,
    /// Network was not found.
    NetworkNotFound,
    /// Port was not found.
    PortNotFound,
    /// Resource is in an invalid state.
    StateInvalid,
    /// Network is still in use.
    NetworkInUse,
    /// Port is still in use.
    PortInUse,
    /// IP address is already allocated.
    IpAddressInUse,
    /// IP address is not valid for the network.
    InvalidIpForNetwork,
    /// IP address is not valid for the subnet.
    InvalidIpForSubnet,
    /// Quota exceeded.
    OverQuota,
    /// No IP address could be generated.
    IpAddressGenerationFailure,
    /// MAC address is already in use.
    MacAddressInUse,
    /// Host is not compatible with the requested fixed IPs.
    HostNotCompatibleWithFixedIps,
    /// External network has no free IP addresses.
    ExternalIpAddressExhausted,
    /// Success response with a body that cannot be decoded.
    MalformedResponseBody,
    /// Invalid input was provided by the caller.
    InvalidInput,
    /// Invalid configuration.
    InvalidConfig,
    /// Any other HTTP error not covered by the kinds above.
    ClientError,
}

#[derive(Debug, Clone)]
enum Details {
    EndpointType(String),
    MatchingEndpoints(Vec<Endpoint>),
    Excess(usize),
}

/// Error from the Networking client.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    request_ids: Vec<String>,
    details: Option<Details>,
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::ConnectionFailed => "Connection failed",
            ErrorKind::SslCertificateValidation => "SSL certificate validation failed",
            ErrorKind::Unauthorized => "Authentication failed",
            ErrorKind::Forbidden => "Access denied",
            ErrorKind::EndpointNotFound => "Requested endpoint was not found",
            ErrorKind::EndpointTypeNotFound => "Requested endpoint type was not found",
            ErrorKind::AmbiguousEndpoints => "Found more than one matching endpoint",
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::NotFound => "Requested resource was not found",
            ErrorKind::Conflict => "Requested resource already exists or is in use",
            ErrorKind::RequestUriTooLong => "Request-URI Too Long",
            ErrorKind::InternalServerError => "Internal server error",
            ErrorKind::ServiceUnavailable => "Service unavailable",
            ErrorKind::NetworkNotFound => "Network not found",
            ErrorKind::PortNotFound => "Port not found",
            ErrorKind::StateInvalid => "Invalid resource state",
            ErrorKind::NetworkInUse => "Network in use",
            ErrorKind::PortInUse => "Port in use",
            ErrorKind::IpAddressInUse => "IP address in use",
            ErrorKind::InvalidIpForNetwork => "Invalid IP address for the network",
            ErrorKind::InvalidIpForSubnet => "Invalid IP address for the subnet",
            ErrorKind::OverQuota => "Quota exceeded",
            ErrorKind::IpAddressGenerationFailure => "IP address generation failed",
            ErrorKind::MacAddressInUse => "MAC address in use",
            ErrorKind::HostNotCompatibleWithFixedIps => "Host not compatible with fixed IPs",
            ErrorKind::ExternalIpAddressExhausted => "External IP addresses exhausted",
            ErrorKind::MalformedResponseBody => "Malformed response body",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::InvalidConfig => "Invalid configuration",
            ErrorKind::ClientError => "Unclassified client error",
        }
    }

    /// Message used when no other information is available.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "Unauthorized: bad credentials.",
            ErrorKind::Forbidden => {
                "Forbidden: your credentials don't give you access to this resource."
            }
            ErrorKind::EndpointNotFound => "Could not find Service or Region in Service Catalog.",
            ErrorKind::RequestUriTooLong => "Request-URI Too Long",
            _ => "An unknown exception occurred.",
        }
    }

    /// The HTTP-level kind this kind belongs to.
    ///
    /// For example, `NetworkNotFound` is a `NotFound` and `PortInUse` is a `Conflict`.
    /// HTTP-level and client-side kinds return themselves.
    pub fn base_kind(self) -> ErrorKind {
        match self {
            ErrorKind::NetworkNotFound | ErrorKind::PortNotFound => ErrorKind::NotFound,
            ErrorKind::StateInvalid
            | ErrorKind::InvalidIpForNetwork
            | ErrorKind::InvalidIpForSubnet
            | ErrorKind::ExternalIpAddressExhausted => ErrorKind::BadRequest,
            ErrorKind::NetworkInUse
            | ErrorKind::PortInUse
            | ErrorKind::IpAddressInUse
            | ErrorKind::OverQuota
            | ErrorKind::IpAddressGenerationFailure
            | ErrorKind::MacAddressInUse
            | ErrorKind::HostNotCompatibleWithFixedIps => ErrorKind::Conflict,
            other => other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl Error {
    /// Create a new error of the provided kind.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            message: message.into(),
            status: None,
            request_ids: Vec::new(),
            details: None,
        }
    }

    /// Create a new error with the default message of its kind.
    #[inline]
    pub fn from_kind(kind: ErrorKind) -> Error {
        Error::new(kind, kind.default_message())
    }

    /// Add an HTTP status code to the error.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Add request IDs to the error.
    #[inline]
    pub fn with_request_ids(mut self, request_ids: Vec<String>) -> Self {
        self.request_ids = request_ids;
        self
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code (if known).
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Request IDs reported by the server (for support diagnostics).
    #[inline]
    pub fn request_ids(&self) -> &[String] {
        &self.request_ids
    }

    /// Endpoint type that was not found (for `EndpointTypeNotFound`).
    pub fn endpoint_type(&self) -> Option<&str> {
        match self.details {
            Some(Details::EndpointType(ref value)) => Some(value),
            _ => None,
        }
    }

    /// Endpoints that matched the filters (for `AmbiguousEndpoints`).
    pub fn matching_endpoints(&self) -> &[Endpoint] {
        match self.details {
            Some(Details::MatchingEndpoints(ref value)) => value,
            _ => &[],
        }
    }

    /// Number of bytes the request URI should shrink by (for `RequestUriTooLong`).
    pub fn excess(&self) -> Option<usize> {
        match self.details {
            Some(Details::Excess(value)) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn connection_failed<D: fmt::Display>(reason: D) -> Error {
        Error::new(
            ErrorKind::ConnectionFailed,
            format!("Connection to neutron failed: {}", reason),
        )
    }

    pub(crate) fn ssl_validation_failed<D: fmt::Display>(reason: D) -> Error {
        Error::new(
            ErrorKind::SslCertificateValidation,
            format!("SSL certificate validation has failed: {}", reason),
        )
    }

    /// Unauthorized with the provided message or the default one when it is empty.
    pub(crate) fn unauthorized<S: Into<String>>(message: S) -> Error {
        let message = message.into();
        if message.is_empty() {
            Error::from_kind(ErrorKind::Unauthorized)
        } else {
            Error::new(ErrorKind::Unauthorized, message)
        }
    }

    #[inline]
    pub(crate) fn endpoint_not_found() -> Error {
        Error::from_kind(ErrorKind::EndpointNotFound)
    }

    pub(crate) fn endpoint_type_not_found<S: Into<String>>(endpoint_type: S) -> Error {
        let endpoint_type = endpoint_type.into();
        Error {
            details: Some(Details::EndpointType(endpoint_type.clone())),
            ..Error::new(
                ErrorKind::EndpointTypeNotFound,
                format!(
                    "Could not find endpoint type {} in Service Catalog.",
                    endpoint_type
                ),
            )
        }
    }

    pub(crate) fn ambiguous_endpoints(matching: Vec<Endpoint>) -> Error {
        let rendered = matching
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Error {
            details: Some(Details::MatchingEndpoints(matching)),
            ..Error::new(
                ErrorKind::AmbiguousEndpoints,
                format!(
                    "Found more than one matching endpoint in Service Catalog: [{}]",
                    rendered
                ),
            )
        }
    }

    pub(crate) fn uri_too_long(excess: usize) -> Error {
        Error {
            details: Some(Details::Excess(excess)),
            ..Error::new(
                ErrorKind::RequestUriTooLong,
                format!("Request-URI Too Long (exceeds the limit by {})", excess),
            )
        }
    }

    pub(crate) fn malformed_response<D: fmt::Display>(reason: D) -> Error {
        Error::new(
            ErrorKind::MalformedResponseBody,
            format!("Malformed response body: {}", reason),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

/// Whether a transport error was caused by TLS negotiation or certificate validation.
///
/// reqwest does not expose this directly. Only the causes are inspected: the error itself
/// renders the request URL, which must not influence the result.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    tls_in_chain(err.source())
}

fn tls_in_chain(mut source: Option<&(dyn StdError + 'static)>) -> bool {
    while let Some(current) = source {
        let text = current.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("ssl") || text.contains("tls") {
            return true;
        }
        source = current.source();
    }
    false
}

fn describe(err: &reqwest::Error) -> String {
    let mut result = err.to_string();
    let mut source = err.source();
    while let Some(current) = source {
        result.push_str(": ");
        result.push_str(&current.to_string());
        source = current.source();
    }
    result
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        if value.is_connect() && is_tls_failure(&value) {
            Error::ssl_validation_failed(describe(&value))
        } else {
            Error::connection_failed(describe(&value))
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::error::Error as StdError;
    use std::fmt;

    use super::{tls_in_chain, Error, ErrorKind};

    #[derive(Debug)]
    struct Cause(&'static str, Option<Box<Cause>>);

    impl fmt::Display for Cause {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for Cause {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_deref().map(|e| -> &(dyn StdError + 'static) { e })
        }
    }

    fn chain(outer: &'static str, inner: &'static str) -> Cause {
        Cause(outer, Some(Box::new(Cause(inner, None))))
    }

    #[test]
    fn test_default_messages() {
        assert_eq!(
            Error::from_kind(ErrorKind::Unauthorized).to_string(),
            "Unauthorized: bad credentials."
        );
        assert_eq!(
            Error::endpoint_not_found().to_string(),
            "Could not find Service or Region in Service Catalog."
        );
        assert_eq!(
            Error::from_kind(ErrorKind::ClientError).to_string(),
            "An unknown exception occurred."
        );
    }

    #[test]
    fn test_unauthorized_empty_message() {
        let err = Error::unauthorized("");
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.message(), "Unauthorized: bad credentials.");
        let err = Error::unauthorized("token expired");
        assert_eq!(err.message(), "token expired");
    }

    #[test]
    fn test_endpoint_type_not_found() {
        let err = Error::endpoint_type_not_found("adminURL");
        assert_eq!(err.kind(), ErrorKind::EndpointTypeNotFound);
        assert_eq!(err.endpoint_type(), Some("adminURL"));
        assert_eq!(
            err.to_string(),
            "Could not find endpoint type adminURL in Service Catalog."
        );
    }

    #[test]
    fn test_uri_too_long() {
        let err = Error::uri_too_long(42);
        assert_eq!(err.kind(), ErrorKind::RequestUriTooLong);
        assert_eq!(err.excess(), Some(42));
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "Request-URI Too Long (exceeds the limit by 42)"
        );
    }

    #[test]
    fn test_connection_failed() {
        let err = Error::connection_failed("timed out");
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert_eq!(err.to_string(), "Connection to neutron failed: timed out");
    }

    #[test]
    fn test_base_kind() {
        assert_eq!(ErrorKind::NetworkNotFound.base_kind(), ErrorKind::NotFound);
        assert_eq!(ErrorKind::PortInUse.base_kind(), ErrorKind::Conflict);
        assert_eq!(ErrorKind::StateInvalid.base_kind(), ErrorKind::BadRequest);
        assert_eq!(ErrorKind::Forbidden.base_kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_tls_in_chain() {
        let cert = chain("client error (Connect)", "invalid peer certificate: UnknownIssuer");
        assert!(tls_in_chain(Some(&cert)));
        let openssl = chain(
            "client error (Connect)",
            "error:0A000086:SSL routines:tls_post_process_server_certificate",
        );
        assert!(tls_in_chain(Some(&openssl)));
    }

    #[test]
    fn test_refused_is_not_tls() {
        let refused = chain("client error (Connect)", "tcp connect error: Connection refused");
        assert!(!tls_in_chain(Some(&refused)));
        assert!(!tls_in_chain(None));
    }

    #[test]
    fn test_ssl_validation_failed() {
        let err = Error::ssl_validation_failed("invalid peer certificate");
        assert_eq!(err.kind(), ErrorKind::SslCertificateValidation);
        assert_eq!(
            err.to_string(),
            "SSL certificate validation has failed: invalid peer certificate"
        );
    }
}
