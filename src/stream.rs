// Copyright 2020 Dmitry Tantsur <divius.inside@gmail.com>
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

//! A stream of collection pages.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::Value;

use super::session::{next_page_query, ApiResponse};
use super::{Error, Session};

#[async_trait]
pub(crate) trait FetchPage {
    async fn fetch_page(
        &mut self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse<Value>, Error>;
}

#[async_trait]
impl FetchPage for Session {
    async fn fetch_page(
        &mut self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse<Value>, Error> {
        self.get_query(path, query).await
    }
}

/// Creates a stream of pages following `{collection}_links`.
pub(crate) fn pages<'f, F>(
    fetcher: &'f mut F,
    collection: String,
    path: String,
    query: Vec<(String, String)>,
    reverse: bool,
) -> impl Stream<Item = Result<ApiResponse<Value>, Error>> + 'f
where
    F: FetchPage + Send,
{
    let mut query = query;

    try_stream! {
        loop {
            let page = fetcher.fetch_page(&path, &query).await?;
            let next = next_page_query(&page.body, &collection, reverse)?;
            yield page;
            match next {
                Some(next) => query = next,
                None => break,
            }
        }
    }
}

#[cfg(test)]
pub mod test {
    use async_trait::async_trait;
    use futures::pin_mut;
    use futures::stream::TryStreamExt;
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    use super::{pages, FetchPage};
    use crate::session::ApiResponse;
    use crate::{Error, ErrorKind};

    struct FakePages {
        pages: Vec<Value>,
        queries: Vec<Vec<(String, String)>>,
    }

    #[async_trait]
    impl FetchPage for FakePages {
        async fn fetch_page(
            &mut self,
            _path: &str,
            query: &[(String, String)],
        ) -> Result<ApiResponse<Value>, Error> {
            self.queries.push(query.to_vec());
            if self.pages.is_empty() {
                return Err(Error::connection_failed("no more pages"));
            }
            Ok(ApiResponse {
                body: self.pages.remove(0),
                status: StatusCode::OK,
                request_ids: vec![format!("req-{}", self.queries.len())],
            })
        }
    }

    #[tokio::test]
    async fn test_pages() {
        let mut fake = FakePages {
            pages: vec![
                json!({
                    "networks": [{"id": "1"}],
                    "networks_links": [
                        {"rel": "next", "href": "http://ep/v2.0/networks?limit=1&marker=1"}
                    ]
                }),
                json!({"networks": [{"id": "2"}]}),
            ],
            queries: Vec::new(),
        };

        let result: Vec<_> = {
            let stream = pages(
                &mut fake,
                "networks".into(),
                "/networks".into(),
                vec![("limit".into(), "1".into())],
                false,
            );
            pin_mut!(stream);
            let mut result = Vec::new();
            while let Some(page) = stream.try_next().await.unwrap() {
                result.push(page);
            }
            result
        };

        assert_eq!(result.len(), 2);
        assert_eq!(result[1].body["networks"][0]["id"], "2");
        assert_eq!(result[1].request_ids, vec!["req-2".to_string()]);
        assert_eq!(
            fake.queries[1],
            vec![
                ("limit".to_string(), "1".to_string()),
                ("marker".to_string(), "1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_pages_stop_on_failure() {
        let mut fake = FakePages {
            pages: vec![json!({
                "networks": [],
                "networks_links": [
                    {"rel": "next", "href": "http://ep/v2.0/networks?marker=1"}
                ]
            })],
            queries: Vec::new(),
        };

        let stream = pages(
            &mut fake,
            "networks".into(),
            "/networks".into(),
            Vec::new(),
            false,
        );
        pin_mut!(stream);
        let _ = stream.try_next().await.unwrap().unwrap();
        let err = stream.try_next().await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
        assert!(stream.try_next().await.unwrap().is_none());
    }
}
