//! FxA, OAuth and restmail clients against mock servers.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tokenserver_e2e_fxa::onepw::{KEY_FETCH_TOKEN, StretchedPassword, TokenKeys, derive_key, xor};
use tokenserver_e2e_fxa::{AccountClient, FxaError, OAuthClient, RestmailAccount};
use wiremock::matchers::{body_json, body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMAIL: &str = "someone@restmail.net";
const PASSWORD: &str = "correct horse battery staple";
const SESSION_TOKEN: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const KEY_FETCH: &str = "2222222222222222222222222222222222222222222222222222222222222222";
const PASSWORD_CHANGE: &str = "3333333333333333333333333333333333333333333333333333333333333333";

fn timeout() -> Duration {
    Duration::from_secs(5)
}

fn auth_pw(password: &str) -> String {
    StretchedPassword::quick_stretch(EMAIL, password)
        .auth_pw_hex()
        .unwrap()
}

fn session_body() -> serde_json::Value {
    json!({ "uid": "0123456789abcdef0123456789abcdef", "sessionToken": SESSION_TOKEN, "verified": false })
}

#[tokio::test]
async fn test_create_account_sends_stretched_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/create"))
        .and(body_json(json!({ "email": EMAIL, "authPW": auth_pw(PASSWORD) })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    let session = client.create_account(EMAIL, PASSWORD).await.unwrap();

    assert_eq!(session.uid, "0123456789abcdef0123456789abcdef");
    assert_eq!(session.email, EMAIL);
    assert_eq!(session.session_token, SESSION_TOKEN);
    assert!(!session.verified);
}

#[tokio::test]
async fn test_api_errors_carry_errno() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "errno": 103,
            "error": "Bad Request",
            "message": "Incorrect password"
        })))
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    let err = client.login(EMAIL, "wrong").await.unwrap_err();

    assert_eq!(err.errno(), Some(103));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
    assert!(err.to_string().contains("Incorrect password"));
}

#[tokio::test]
async fn test_verify_email_code_posts_uid_and_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/recovery_email/verify_code"))
        .and(body_json(json!({ "uid": "0123456789abcdef0123456789abcdef", "code": "abc123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    let session = client.login(EMAIL, PASSWORD).await.unwrap();
    client.verify_email_code(&session, "abc123").await.unwrap();
}

fn key_bundle(request_key: &[u8], ka: &[u8; 32], wrap_kb: &[u8; 32]) -> String {
    let material = derive_key(request_key, "account/keys", 96).unwrap();
    let mut ciphertext: Vec<u8> = ka.iter().chain(wrap_kb.iter()).copied().collect();
    for (c, k) in ciphertext.iter_mut().zip(&material[32..]) {
        *c ^= k;
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(&material[..32]).unwrap();
    mac.update(&ciphertext);
    ciphertext.extend_from_slice(&mac.finalize().into_bytes());
    hex::encode(ciphertext)
}

#[tokio::test]
async fn test_change_password_rewraps_kb() {
    let server = MockServer::start().await;
    let new_password = "a brand new password";
    let old_unwrap = StretchedPassword::quick_stretch(EMAIL, PASSWORD)
        .unwrap_b_key()
        .unwrap();
    let new_unwrap = StretchedPassword::quick_stretch(EMAIL, new_password)
        .unwrap_b_key()
        .unwrap();
    let kb = [9u8; 32];
    let key_fetch = TokenKeys::derive(KEY_FETCH, KEY_FETCH_TOKEN).unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/password/change/start"))
        .and(body_json(json!({ "email": EMAIL, "oldAuthPW": auth_pw(PASSWORD) })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keyFetchToken": KEY_FETCH,
            "passwordChangeToken": PASSWORD_CHANGE,
            "verified": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/account/keys"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bundle": key_bundle(&key_fetch.request_key, &[1u8; 32], &xor(&kb, &old_unwrap))
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/password/change/finish"))
        .and(header_exists("authorization"))
        .and(body_json(json!({
            "authPW": auth_pw(new_password),
            "wrapKb": hex::encode(xor(&kb, &new_unwrap)),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    client
        .change_password(EMAIL, PASSWORD, new_password)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_change_password_rejects_tampered_bundle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/password/change/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keyFetchToken": KEY_FETCH,
            "passwordChangeToken": PASSWORD_CHANGE
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/account/keys"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "bundle": "00".repeat(96) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/password/change/finish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    let err = client
        .change_password(EMAIL, PASSWORD, "new")
        .await
        .unwrap_err();
    assert!(matches!(err, FxaError::Crypto(_)));
}

#[tokio::test]
async fn test_destroy_account_logs_in_then_signs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/account/destroy"))
        .and(header_exists("authorization"))
        .and(body_json(json!({ "email": EMAIL, "authPW": auth_pw(PASSWORD) })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = AccountClient::new(&server.uri(), timeout()).unwrap();
    client.destroy_account(EMAIL, PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_oauth_token_flow() {
    let accounts_server = MockServer::start().await;
    let oauth_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body()))
        .mount(&accounts_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "client_id": "5882386c6d801776",
            "grant_type": "fxa-credentials",
            "scope": "bad_scope",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "opaque-access-token",
            "token_type": "bearer",
            "scope": "bad_scope",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&accounts_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/verify"))
        .and(body_json(json!({ "token": "opaque-access-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": "0123456789abcdef0123456789abcdef",
            "client_id": "5882386c6d801776",
            "scope": ["bad_scope"],
        })))
        .mount(&oauth_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/destroy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&oauth_server)
        .await;

    let accounts = AccountClient::new(&accounts_server.uri(), timeout()).unwrap();
    let oauth =
        OAuthClient::new("5882386c6d801776", &oauth_server.uri(), accounts, timeout()).unwrap();

    let token = oauth
        .get_bearer_token(EMAIL, PASSWORD, &["bad_scope"])
        .await
        .unwrap();
    assert_eq!(token, "opaque-access-token");

    let info = oauth.verify_token(&token).await.unwrap();
    assert_eq!(info.user, "0123456789abcdef0123456789abcdef");
    assert_eq!(info.scope, vec!["bad_scope".to_string()]);

    oauth.destroy_token(&token).await.unwrap();
}

#[tokio::test]
async fn test_restmail_fetch_and_clear() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mail/someone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "headers": { "x-verify-code": "c0ffee" }, "subject": "Verify your account" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/mail/someone"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let inbox = RestmailAccount::new(&server.uri(), "someone", timeout()).unwrap();
    let messages = inbox.fetch().await.unwrap();

    assert_eq!(messages.len(), 1);
    assert_eq!(
        tokenserver_e2e_fxa::find_verification_code(&messages),
        Some("c0ffee")
    );
    inbox.clear().await.unwrap();
}

#[tokio::test]
async fn test_restmail_empty_inbox() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mail/nobody"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let inbox = RestmailAccount::new(&server.uri(), "nobody", timeout()).unwrap();
    assert!(inbox.fetch().await.unwrap().is_empty());
}
