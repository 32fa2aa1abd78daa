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

//! Session scenarios against a mock Identity and Networking service.

use std::time::Duration;

use neutronclient::{Config, ErrorKind, Method, RequestOptions, Session, StatusCode};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_body(token: &str, endpoints: Value) -> Value {
    json!({
        "access": {
            "token": {
                "id": token,
                "expires": "2030-01-01T00:00:00Z",
                "tenant": {"id": "tenant-id", "name": "t1"}
            },
            "user": {"id": "user-id", "name": "admin"},
            "serviceCatalog": [
                {"type": "network", "name": "neutron", "endpoints": endpoints}
            ]
        }
    })
}

fn one_endpoint(url: &str) -> Value {
    json!([{"region": "RegionOne", "publicURL": url}])
}

fn password_config(server: &MockServer) -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config::default()
        .with_auth_url(format!("{}/v2.0", server.uri()))
        .with_username("admin")
        .with_password("pa$$w0rd")
        .with_tenant_name("t1")
        .with_region_name("RegionOne")
        .with_retry_interval(Duration::from_millis(1))
}

fn token_config(server: &MockServer) -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config::default()
        .with_token("abcdef")
        .with_endpoint_url(server.uri())
        .with_retry_interval(Duration::from_millis(1))
}

async fn mount_tokens(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body(token, one_endpoint(&server.uri()))),
        )
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authenticate_and_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .and(body_partial_json(json!({
            "auth": {
                "passwordCredentials": {"username": "admin", "password": "pa$$w0rd"},
                "tenantName": "t1"
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("abcdef", one_endpoint(&server.uri()))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/networks"))
        .and(header("x-auth-token", "abcdef"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    assert!(session.auth_info().token().is_none());

    let resp = session
        .do_request("/networks", Method::GET, &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);

    let info = session.auth_info();
    assert_eq!(info.token(), Some("abcdef"));
    assert_eq!(info.tenant_id(), Some("tenant-id"));
    assert_eq!(info.user_id(), Some("user-id"));
    assert_eq!(info.endpoint_url(), Some(server.uri().as_str()));
}

#[tokio::test]
async fn test_tenant_id_precedence() {
    let server = MockServer::start().await;
    mount_tokens(&server, "abcdef", 1).await;

    let config = password_config(&server)
        .with_tenant_id("tid")
        .with_user_id("uid");
    let mut session = Session::new(config).unwrap();
    session.authenticate().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["auth"]["tenantId"], "tid");
    assert!(body["auth"].get("tenantName").is_none());
    assert_eq!(body["auth"]["passwordCredentials"]["userId"], "uid");
    assert!(body["auth"]["passwordCredentials"].get("username").is_none());
}

#[tokio::test]
async fn test_reauthenticate_once_on_401() {
    let server = MockServer::start().await;
    mount_tokens(&server, "abcdef", 2).await;
    Mock::given(method("GET"))
        .and(path("/networks"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    let resp = session
        .do_request("/networks", Method::GET, &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_second_401_propagates() {
    let server = MockServer::start().await;
    mount_tokens(&server, "abcdef", 2).await;
    Mock::given(method("GET"))
        .and(path("/networks"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(2)
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    let err = session
        .do_request("/networks", Method::GET, &RequestOptions::default())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.message(), "token expired");
    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn test_authentication_failure_keeps_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    let err = session.authenticate().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.message(), "bad credentials");
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(session.auth_info().token().is_none());
    assert!(session.auth_info().endpoint_url().is_none());
}

#[tokio::test]
async fn test_authentication_response_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    let err = session.authenticate().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_ambiguous_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "abcdef",
            json!([
                {"region": "RegionOne", "publicURL": "http://ep1"},
                {"region": "RegionOne", "publicURL": "http://ep2"}
            ]),
        )))
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    let err = session.authenticate().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::AmbiguousEndpoints);
    assert_eq!(err.matching_endpoints().len(), 2);
    assert!(session.auth_info().token().is_none());
}

#[tokio::test]
async fn test_legacy_endpoint_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tokens/abcdef/endpoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "endpoints": [
                {"type": "compute", "region": "RegionOne", "publicURL": "http://nova"},
                {"type": "network", "region": "RegionTwo", "publicURL": "http://other"},
                {"type": "network", "region": "RegionOne", "publicURL": server.uri()}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(header("x-auth-token", "abcdef"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .expect(2)
        .mount(&server)
        .await;

    let config = Config::default()
        .with_auth_url(format!("{}/v2.0", server.uri()))
        .with_token("abcdef")
        .with_region_name("RegionOne");
    let mut session = Session::new(config).unwrap();
    let _: neutronclient::ApiResponse<Value> = session.get("/networks").await.unwrap();
    assert_eq!(session.auth_info().endpoint_url(), Some(server.uri().as_str()));
    // The endpoint is not looked up again.
    let _: neutronclient::ApiResponse<Value> = session.get("/networks").await.unwrap();
}

#[tokio::test]
async fn test_legacy_endpoint_type_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tokens/abcdef/endpoints"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "endpoints": [
                {"type": "network", "region": "RegionOne", "publicURL": server.uri()}
            ]
        })))
        .mount(&server)
        .await;

    let config = Config::default()
        .with_auth_url(format!("{}/v2.0", server.uri()))
        .with_token("abcdef")
        .with_region_name("RegionOne")
        .with_endpoint_type(neutronclient::EndpointType::Admin);
    let mut session = Session::new(config).unwrap();
    let err = session.ensure_authenticated_and_endpoint().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::EndpointTypeNotFound);
    assert_eq!(err.endpoint_type(), Some("adminURL"));
}

#[tokio::test]
async fn test_legacy_endpoint_lookup_falls_back_to_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/tokens/old-token/endpoints"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    mount_tokens(&server, "new-token", 1).await;

    let config = password_config(&server).with_token("old-token");
    let mut session = Session::new(config).unwrap();
    session.ensure_authenticated_and_endpoint().await.unwrap();
    assert_eq!(session.auth_info().token(), Some("new-token"));
    assert_eq!(session.auth_info().endpoint_url(), Some(server.uri().as_str()));
}

#[tokio::test]
async fn test_configured_endpoint_is_kept() {
    let server = MockServer::start().await;
    mount_tokens(&server, "abcdef", 1).await;

    let config = password_config(&server).with_endpoint_url("http://fixed:9696");
    let mut session = Session::new(config).unwrap();
    session.authenticate().await.unwrap();
    assert_eq!(session.auth_info().endpoint_url(), Some("http://fixed:9696"));
}

#[tokio::test]
async fn test_error_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks/42"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("x-openstack-request-id", "req-42")
                .set_body_json(json!({
                    "NeutronError": {
                        "type": "NetworkNotFound",
                        "message": "Network 42 could not be found.",
                        "detail": ""
                    }
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/networks/43"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "NeutronError": {
                "type": "NetworkInUse",
                "message": "Unable to complete operation on network 43.",
                "detail": "There are one or more ports still in use."
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut session = Session::new(token_config(&server)).unwrap();

    let err = session.get::<Value>("/networks/42").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NetworkNotFound);
    assert_eq!(err.kind().base_kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "Network 42 could not be found.");
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.request_ids(), &["req-42".to_string()]);

    let err = session.delete("/networks/43").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::NetworkInUse);
    assert_eq!(
        err.message(),
        "Unable to complete operation on network 43.\nThere are one or more ports still in use."
    );

    let err = session.get::<Value>("/forbidden").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_post_and_put() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/networks"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({"network": {"name": "net1"}})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"network": {"id": "1", "name": "net1"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2.0/networks/1"))
        .and(body_partial_json(json!({"network": {"admin_state_up": false}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"network": {"id": "1", "name": "net1", "admin_state_up": false}}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v2.0/networks/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(token_config(&server)).unwrap();
    let created: neutronclient::ApiResponse<Value> = session
        .post("/networks", &json!({"network": {"name": "net1"}}))
        .await
        .unwrap();
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["network"]["id"], "1");

    let updated: neutronclient::ApiResponse<Value> = session
        .put("/networks/1", &json!({"network": {"admin_state_up": false}}))
        .await
        .unwrap();
    assert_eq!(updated.body["network"]["admin_state_up"], false);

    let deleted = session.delete("/networks/1").await.unwrap();
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(deleted.body.is_null());
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"invalid\": }"))
        .mount(&server)
        .await;

    let mut session = Session::new(token_config(&server)).unwrap();
    let err = session.get::<Value>("/networks").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MalformedResponseBody);
}

#[tokio::test]
async fn test_list_follows_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(query_param("marker", "n1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-openstack-request-id", "req-2")
                .set_body_json(json!({"networks": [{"id": "n2"}]})),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-openstack-request-id", "req-1")
                .set_body_json(json!({
                    "networks": [{"id": "n1"}],
                    "networks_links": [{
                        "rel": "next",
                        "href": format!("{}/v2.0/networks?limit=1&marker=n1", server.uri())
                    }]
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(token_config(&server)).unwrap();
    let result = session
        .list("networks", "/networks", &[("limit", "1")])
        .await
        .unwrap();
    let ids: Vec<_> = result.body.iter().map(|n| n["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["n1", "n2"]);
    assert_eq!(
        result.request_ids,
        vec!["req-1".to_string(), "req-2".to_string()]
    );
}

#[cfg(feature = "stream")]
#[tokio::test]
async fn test_list_pages_reverse() {
    use futures::TryStreamExt;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .and(query_param("marker", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ports": [{"id": "p1"}]})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ports": [{"id": "p2"}],
            "ports_links": [
                {"rel": "next", "href": format!("{}/v2.0/ports?marker=p3", server.uri())},
                {"rel": "previous", "href": format!("{}/v2.0/ports?marker=p2&page_reverse=True", server.uri())}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(token_config(&server)).unwrap();
    let pages: Vec<_> = session
        .list_pages("ports", "/ports", &[("page_reverse", "True")])
        .try_collect()
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[1].body["ports"][0]["id"], "p1");
}

#[tokio::test]
async fn test_uri_too_long_is_not_sent() {
    let server = MockServer::start().await;
    let mut session = Session::new(token_config(&server)).unwrap();

    let long_value = "x".repeat(neutronclient::MAX_URI_LEN);
    let err = session
        .get_query::<Value, _, _>("/networks", &[("name", long_value.as_str())])
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::RequestUriTooLong);
    assert!(err.excess().unwrap() > 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_exhaustion() {
    let config = Config::default()
        .with_token("abcdef")
        .with_endpoint_url("http://127.0.0.1:1")
        .with_retries(2)
        .with_retry_interval(Duration::from_millis(1));
    let mut session = Session::new(config).unwrap();

    let err = session.get::<Value>("/networks").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    assert_eq!(
        err.to_string(),
        "Connection to neutron failed: Failed to connect to Neutron server after 3 attempts"
    );

    let err = session
        .post::<_, Value>("/networks", &json!({"network": {}}))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::ConnectionFailed);
    assert!(!err.to_string().contains("attempts"));
}

#[tokio::test]
async fn test_retry_without_retries() {
    let config = Config::default()
        .with_token("abcdef")
        .with_endpoint_url("http://127.0.0.1:1");
    let mut session = Session::new(config).unwrap();

    let err = session.delete("/networks/1").await.err().unwrap();
    assert_eq!(
        err.to_string(),
        "Connection to neutron failed: Failed to connect Neutron server"
    );
}

#[tokio::test]
async fn test_redirects_only_followed_for_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2.0/tokens"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("location", format!("{}/identity/v2.0/tokens", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/identity/v2.0/tokens"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("abcdef", one_endpoint(&server.uri()))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/elsewhere", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = Session::new(password_config(&server)).unwrap();
    session.authenticate().await.unwrap();
    assert_eq!(session.auth_info().token(), Some("abcdef"));

    let err = session.get::<Value>("/networks").await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ClientError);
    assert_eq!(err.status(), Some(StatusCode::FOUND));
}

#[tokio::test]
async fn test_common_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.0/networks"))
        .and(header("x-openstack-request-id", "req-global"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"networks": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = token_config(&server).with_global_request_id("req-global");
    let mut session = Session::new(config).unwrap();
    let _: neutronclient::ApiResponse<Value> = session.get("/networks").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let user_agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(user_agent.starts_with("neutronclient-rust/"));
    assert!(requests[0].headers.get("content-type").is_none());
}
