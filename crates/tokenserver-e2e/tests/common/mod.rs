//! Fake deployment for harness tests.
//!
//! One wiremock server plays FxA (auth + OAuth) and restmail, another plays
//! the tokenserver. The fake tokenserver mints real tokenlib tokens with the
//! node secret derived from [`SIGNING_SECRET`], so the verification code
//! runs against genuine signatures.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hmac::{Hmac, Mac};
use serde_json::{Map, Value, json};
use sha2::Sha256;
use tokenserver_e2e::config::E2eConfig;
use tokenserver_e2e::scenarios::{invalid_credentials_body, unsupported_error_body};
use tokenserver_e2e::{InMemoryUserDirectory, Services, UserRecord};
use tokenserver_e2e_crypto::{
    TokenManager, derive_node_secret, hashed_fxa_uid, master_secret_from_raw,
};
use tokenserver_e2e_fxa::onepw::{KEY_FETCH_TOKEN, SESSION_TOKEN, TokenKeys, derive_key};
use wiremock::matchers::{body_partial_json, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const FXA_UID: &str = "6d940dd41e636cc156074109b8092f96";
pub const NODE_URL: &str = "https://spanner.example.com";
pub const SIGNING_SECRET: &str = "Ted Koppel is a robot";
pub const METRICS_SECRET: &str = "this is a metrics secret";
pub const SYNC_ACCESS_TOKEN: &str = "sync-scoped-access-token";
/// Sync token handed to the session issued after a password change.
pub const ROTATED_SYNC_ACCESS_TOKEN: &str = "rotated-sync-scoped-access-token";
pub const BAD_SCOPE_ACCESS_TOKEN: &str = "bad-scoped-access-token";
pub const TOKENSERVER_UID: i64 = 42;

const FIRST_SESSION: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const ROTATED_SESSION: &str = "4444444444444444444444444444444444444444444444444444444444444444";
const SYNC_SCOPE: &str = "https://identity.mozilla.com/apps/oldsync";
const KEY_FETCH: &str = "2222222222222222222222222222222222222222222222222222222222222222";
const PASSWORD_CHANGE: &str = "3333333333333333333333333333333333333333333333333333333333333333";

pub struct FakeDeployment {
    pub fxa: MockServer,
    pub tokenserver: MockServer,
    pub users: InMemoryUserDirectory,
}

impl FakeDeployment {
    /// Starts both servers with the account endpoints mounted; restmail and
    /// teardown mocks are left to the test so it can set expectations.
    pub async fn start() -> Self {
        let fxa = MockServer::start().await;
        let tokenserver = MockServer::start().await;
        let users = InMemoryUserDirectory::new();
        users.insert(UserRecord {
            uid: TOKENSERVER_UID,
            email: format!("{FXA_UID}@api.accounts.firefox.com"),
            generation: 0,
            client_state: "616161".into(),
            keys_changed_at: Some(1234),
            nodeid: 1,
            created_at: 1_700_000_000_000,
            replaced_at: None,
        });

        mount_account_endpoints(&fxa).await;
        mount_tokenserver(&tokenserver).await;

        Self {
            fxa,
            tokenserver,
            users,
        }
    }

    pub fn config(&self) -> E2eConfig {
        let mut cfg = E2eConfig::default();
        cfg.fxa.account_server_url = self.fxa.uri();
        cfg.fxa.oauth_server_url = self.fxa.uri();
        cfg.fxa.request_timeout_ms = 5_000;
        cfg.restmail.server_url = self.fxa.uri();
        cfg.restmail.poll_interval_ms = 5;
        cfg.restmail.max_attempts = 5;
        cfg.restmail.timeout_ms = 2_000;
        cfg.tokenserver.url = self.tokenserver.uri();
        cfg.tokenserver.node_url = NODE_URL.into();
        cfg.tokenserver.token_signing_secret = SIGNING_SECRET.into();
        cfg.tokenserver.fxa_metrics_hash_secret = METRICS_SECRET.into();
        cfg
    }

    pub fn services(&self) -> Services {
        let users: Arc<dyn tokenserver_e2e::UserDirectory> = Arc::new(self.users.clone());
        Services::with_users(&self.config(), Some(users)).unwrap()
    }

    /// Inbox that delivers the verification code on the first fetch.
    pub async fn mount_inbox_with_code(&self) {
        Mock::given(method("GET"))
            .and(path_regex("^/mail/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "headers": { "x-verify-code": "9f1c3d" }, "subject": "Verify your account" }
            ])))
            .mount(&self.fxa)
            .await;
    }

    /// Inbox that never receives anything.
    pub async fn mount_empty_inbox(&self) {
        Mock::given(method("GET"))
            .and(path_regex("^/mail/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.fxa)
            .await;
    }

    /// Teardown endpoints, each expected exactly `times` times.
    pub async fn expect_teardown(&self, times: u64) {
        Mock::given(method("DELETE"))
            .and(path_regex("^/mail/[^/]+$"))
            .respond_with(ResponseTemplate::new(200))
            .expect(times)
            .mount(&self.fxa)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/account/destroy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(times)
            .mount(&self.fxa)
            .await;
    }
}

fn session_body(session_token: &str) -> Value {
    json!({ "uid": FXA_UID, "sessionToken": session_token, "verified": true })
}

/// The `id` attribute of a Hawk `Authorization` header.
fn hawk_id(req: &Request) -> Option<String> {
    let header = req.headers.get("authorization")?.to_str().ok()?;
    let rest = header.strip_prefix("Hawk ")?.split("id=\"").nth(1)?;
    rest.split('"').next().map(str::to_owned)
}

/// Mounts the account surface. Sessions handed out after
/// `password/change/finish` differ from the original one, and OAuth tokens
/// depend on which session signed the request.
async fn mount_account_endpoints(fxa: &MockServer) {
    let rotated = Arc::new(AtomicBool::new(false));

    Mock::given(method("POST"))
        .and(path("/v1/account/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(FIRST_SESSION)))
        .mount(fxa)
        .await;
    let login_rotated = Arc::clone(&rotated);
    Mock::given(method("POST"))
        .and(path("/v1/account/login"))
        .respond_with(move |_req: &Request| {
            let token = if login_rotated.load(Ordering::SeqCst) {
                ROTATED_SESSION
            } else {
                FIRST_SESSION
            };
            ResponseTemplate::new(200).set_body_json(session_body(token))
        })
        .mount(fxa)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/recovery_email/verify_code"))
        .and(body_partial_json(json!({ "code": "9f1c3d" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(fxa)
        .await;

    let first_id = TokenKeys::derive(FIRST_SESSION, SESSION_TOKEN).unwrap().id;
    let rotated_id = TokenKeys::derive(ROTATED_SESSION, SESSION_TOKEN).unwrap().id;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .respond_with(move |req: &Request| {
            let body: Value = serde_json::from_slice(&req.body).unwrap_or_default();
            let scope = body["scope"].as_str().unwrap_or_default().to_owned();
            let signer = hawk_id(req);
            let token = match (scope.as_str(), signer.as_deref()) {
                ("bad_scope", Some(_)) => BAD_SCOPE_ACCESS_TOKEN,
                (SYNC_SCOPE, Some(id)) if id == first_id => SYNC_ACCESS_TOKEN,
                (SYNC_SCOPE, Some(id)) if id == rotated_id => ROTATED_SYNC_ACCESS_TOKEN,
                _ => {
                    return ResponseTemplate::new(401).set_body_json(json!({
                        "code": 401, "errno": 110, "message": "Invalid authentication token"
                    }));
                }
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "token_type": "bearer",
                "scope": scope,
                "expires_in": 3600
            }))
        })
        .mount(fxa)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/password/change/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keyFetchToken": KEY_FETCH,
            "passwordChangeToken": PASSWORD_CHANGE
        })))
        .mount(fxa)
        .await;
    let key_fetch = TokenKeys::derive(KEY_FETCH, KEY_FETCH_TOKEN).unwrap();
    Mock::given(method("GET"))
        .and(path("/v1/account/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bundle": key_bundle(&key_fetch.request_key, &[3u8; 64])
        })))
        .mount(fxa)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/password/change/finish"))
        .respond_with(move |_req: &Request| {
            rotated.store(true, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(json!({}))
        })
        .mount(fxa)
        .await;
}

fn key_bundle(request_key: &[u8], plaintext: &[u8; 64]) -> String {
    let material = derive_key(request_key, "account/keys", 96).unwrap();
    let mut ciphertext: Vec<u8> = plaintext
        .iter()
        .zip(&material[32..])
        .map(|(p, k)| p ^ k)
        .collect();
    let mut mac = Hmac::<Sha256>::new_from_slice(&material[..32]).unwrap();
    mac.update(&ciphertext);
    ciphertext.extend_from_slice(&mac.finalize().into_bytes());
    hex::encode(ciphertext)
}

/// Mints a token response the way the tokenserver does for [`FXA_UID`].
pub fn mint_token_response() -> serde_json::Value {
    let master = master_secret_from_raw(SIGNING_SECRET);
    let manager = TokenManager::new(derive_node_secret(&master, NODE_URL).unwrap()).unwrap();

    let mut payload = Map::new();
    payload.insert("uid".into(), json!(TOKENSERVER_UID));
    payload.insert("node".into(), json!(NODE_URL));
    payload.insert("fxa_uid".into(), json!(FXA_UID));
    payload.insert("fxa_kid".into(), json!("0000000001234-YWFh"));
    payload.insert("hashed_fxa_uid".into(), json!(hashed_fxa_uid(METRICS_SECRET, FXA_UID)));
    payload.insert("hashed_device_id".into(), json!("none"));
    let id = manager.make_token(&payload).unwrap();

    json!({
        "key": manager.get_derived_secret(&id).unwrap(),
        "id": id,
        "uid": TOKENSERVER_UID,
        "api_endpoint": format!("{NODE_URL}/1.5/{TOKENSERVER_UID}"),
        "duration": 300,
        "hashalg": "sha256",
        "hashed_fxa_uid": hashed_fxa_uid(METRICS_SECRET, FXA_UID),
        "node_type": "spanner"
    })
}

async fn mount_tokenserver(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1.0/sync/1.5"))
        .respond_with(|req: &Request| {
            let authorization = req
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            match authorization.strip_prefix("Bearer ") {
                None => ResponseTemplate::new(401).set_body_json(unsupported_error_body()),
                Some(SYNC_ACCESS_TOKEN | ROTATED_SYNC_ACCESS_TOKEN)
                    if req.headers.contains_key("x-keyid") =>
                {
                    ResponseTemplate::new(200).set_body_json(mint_token_response())
                }
                Some(_) => ResponseTemplate::new(401).set_body_json(invalid_credentials_body()),
            }
        })
        .mount(server)
        .await;
}
