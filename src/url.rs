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

//! Handy primitives for working with URLs.

use reqwest::Url;
use url::form_urlencoded;

use super::{Error, ErrorKind};

/// Append a suffix (e.g. `/v2.0/networks`) to a base URL, ignoring trailing slashes of the base.
#[inline]
pub fn concat(base: &str, suffix: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), suffix)
}

/// Parse a URL that was built from configuration.
pub fn parse(url: &str) -> Result<Url, Error> {
    Url::parse(url)
        .map_err(|e| Error::new(ErrorKind::InvalidConfig, format!("Invalid URL {}: {}", url, e)))
}

/// Append path segments, escaping each of them.
pub fn extend<I>(mut url: Url, segments: I) -> Result<Url, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    if url.cannot_be_a_base() {
        return Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("URL {} cannot be a base", url),
        ));
    }
    if let Ok(mut path) = url.path_segments_mut() {
        let _ = path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Append an encoded query string to an action.
///
/// Repeated keys are kept in order.
pub fn with_query<K, V>(action: &str, query: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    if query.is_empty() {
        return action.to_string();
    }

    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .finish();
    let separator = if action.contains('?') { '&' } else { '?' };
    format!("{}{}{}", action, separator, encoded)
}

/// Query parameters of a link.
pub fn query_pairs(href: &str) -> Result<Vec<(String, String)>, Error> {
    let url = Url::parse(href).map_err(Error::malformed_response)?;
    Ok(url.query_pairs().into_owned().collect())
}

#[cfg(test)]
pub mod test {
    use reqwest::Url;

    use super::{concat, extend, query_pairs, with_query};

    #[test]
    fn test_concat() {
        assert_eq!(concat("http://ep", "/networks"), "http://ep/networks");
        assert_eq!(concat("http://ep/", "/networks"), "http://ep/networks");
        assert_eq!(concat("http://ep/v2.0", "/tokens"), "http://ep/v2.0/tokens");
    }

    #[test]
    fn test_extend_escapes() {
        let url = Url::parse("http://keystone/v2.0/").unwrap();
        let url = extend(url, &["tokens", "a/b c", "endpoints"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://keystone/v2.0/tokens/a%2Fb%20c/endpoints"
        );
    }

    #[test]
    fn test_with_query() {
        let empty: &[(&str, &str)] = &[];
        assert_eq!(with_query("/v2.0/networks", empty), "/v2.0/networks");
        assert_eq!(
            with_query("/v2.0/networks", &[("fields", "id"), ("fields", "name")]),
            "/v2.0/networks?fields=id&fields=name"
        );
        assert_eq!(
            with_query("/v2.0/networks?limit=1", &[("name", "a b")]),
            "/v2.0/networks?limit=1&name=a+b"
        );
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs("http://ep/v2.0/networks?limit=2&marker=abc").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "2".to_string()),
                ("marker".to_string(), "abc".to_string())
            ]
        );
        let _ = query_pairs("/v2.0/networks?limit=2").err().unwrap();
    }
}
