//! Graph API client tests against a `wiremock` server
//!
//! Covers the code exchange request shape, token introspection outcomes and
//! authenticated resource calls.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fbsr::oauth::exchange::{CodeExchange, ExchangeOptions, GraphError, TokenMode};
use fbsr::oauth::token_verifier::{appsecret_proof, TokenIntrospector};
use fbsr::testing::constants::{TEST_CLIENT_ID, TEST_CLIENT_SECRET};
use fbsr::testing::fixtures::TestFixtures;

#[tokio::test]
async fn test_exchange_code_posts_form_and_parses_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains(format!("client_id={TEST_CLIENT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "EAAB-exchanged",
            "token_type": "bearer",
            "expires_in": 5_183_944
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let options = ExchangeOptions::new("https://app.example.com/auth/facebook/callback");
    let token = client.exchange_code("abc", &options).await.unwrap();

    assert_eq!(token.token(), "EAAB-exchanged");
    assert!(token.expires());
    assert!(token.expires_at().unwrap() > chrono::Utc::now());
}

#[tokio::test]
async fn test_exchange_code_sends_empty_redirect_uri() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let token = client
        .exchange_code("xyz", &ExchangeOptions::new(""))
        .await
        .unwrap();
    assert!(!token.expires());

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let fields: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    assert!(fields.contains(&("redirect_uri".to_string(), String::new())));
    assert!(fields.contains(&("code".to_string(), "xyz".to_string())));
}

#[tokio::test]
async fn test_exchange_code_rejected_by_provider() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "This authorization code has been used.", "type": "OAuthException"}
        })))
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let err = client
        .exchange_code("used", &ExchangeOptions::new(""))
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_introspection_returns_granted_scopes() {
    let server = MockServer::start().await;
    let app_proof = format!("{TEST_CLIENT_ID}|{TEST_CLIENT_SECRET}");

    Mock::given(method("GET"))
        .and(path("/debug_token"))
        .and(query_param("input_token", "user-token"))
        .and(query_param("access_token", app_proof.as_str()))
        .and(query_param(
            "appsecret_proof",
            appsecret_proof("user-token", TEST_CLIENT_SECRET.as_bytes()).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "app_id": TEST_CLIENT_ID,
                "is_valid": true,
                "scopes": ["email", "public_profile"]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let scopes = client.introspect("user-token", &app_proof).await.unwrap();

    assert_eq!(scopes.len(), 2);
    assert!(scopes.contains("public_profile"));
}

#[tokio::test]
async fn test_introspection_rejects_token_for_other_app() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/debug_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"app_id": "999", "is_valid": true, "scopes": ["email"]}
        })))
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let err = client
        .introspect("foreign-token", &TestFixtures::app_access_proof())
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_introspection_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/debug_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"message": "Invalid OAuth access token."}
        })))
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let err = client
        .introspect("garbage", &TestFixtures::app_access_proof())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Invalid OAuth access token."));
}

#[tokio::test]
async fn test_access_token_get_uses_authorization_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "OAuth user-token"))
        .and(query_param("fields", "name,email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "10001",
            "name": "Test User"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let token = client.wrap_token("user-token", &ExchangeOptions::new(""));
    let profile = token.get("/me", &[("fields", "name,email")]).await.unwrap();

    assert_eq!(profile["id"], "10001");
}

#[tokio::test]
async fn test_access_token_get_in_query_mode() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(query_param("access_token", "user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "10001"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestFixtures::graph_client(&server.uri());
    let mut options = ExchangeOptions::new("");
    options.mode = TokenMode::Query;
    let token = client.wrap_token("user-token", &options);

    assert!(token.get("me", &[]).await.is_ok());
}
