//! Integration tests for the REST identity provider
//!
//! A local hyper server stands in for the hosted auth service.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};

use gatehouse::provider::ProviderConfig;
use gatehouse::{
    AuthorizationGate, FailureCause, GateResult, HttpIdentityProvider, IdentityProvider,
    LockoutPolicy, ManualClock, MemoryKeyValueStore, PersistedLockoutStore, PrivilegedIdentity,
    ProviderError,
};

const API_KEY: &str = "anon-key";

#[derive(Default)]
struct AuthServerState {
    logouts: Mutex<Vec<String>>,
}

fn json_response(status: StatusCode, body: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn handle(
    req: Request<Body>,
    state: Arc<AuthServerState>,
) -> Result<Response<Body>, Infallible> {
    let api_key_ok = req
        .headers()
        .get("apikey")
        .map(|v| v == API_KEY)
        .unwrap_or(false);
    if !api_key_ok {
        return Ok(json_response(
            StatusCode::UNAUTHORIZED,
            json!({ "message": "No API key found in request" }),
        ));
    }

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    match (req.method().clone(), path.as_str()) {
        (Method::POST, "/auth/v1/token") if query == "grant_type=password" => {
            let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            let email = body["email"].as_str().unwrap_or("");
            let password = body["password"].as_str().unwrap_or("");

            let response = match (email, password) {
                ("Admin@Shop.test", "correct") | ("admin@shop.test", "correct") => json_response(
                    StatusCode::OK,
                    json!({
                        "access_token": "tok-admin",
                        "token_type": "bearer",
                        "user": { "id": "1", "email": "admin@shop.test" }
                    }),
                ),
                ("clerk@shop.test", "correct") => json_response(
                    StatusCode::OK,
                    json!({
                        "access_token": "tok-clerk",
                        "token_type": "bearer",
                        "user": { "id": "2", "email": "clerk@shop.test" }
                    }),
                ),
                ("broken@shop.test", _) => json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "database unavailable" }),
                ),
                ("slow@shop.test", _) => {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    json_response(StatusCode::OK, json!({}))
                }
                _ => json_response(
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "invalid_grant",
                        "error_description": "Invalid login credentials"
                    }),
                ),
            };
            Ok(response)
        }
        (Method::POST, "/auth/v1/logout") => {
            let auth = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            state.logouts.lock().unwrap().push(auth);
            Ok(Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(Body::empty())
                .unwrap())
        }
        _ => Ok(json_response(StatusCode::NOT_FOUND, json!({}))),
    }
}

fn spawn_auth_server() -> (SocketAddr, Arc<AuthServerState>) {
    let state = Arc::new(AuthServerState::default());
    let service_state = Arc::clone(&state);

    let make_svc = make_service_fn(move |_conn| {
        let state = Arc::clone(&service_state);
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, Arc::clone(&state)))) }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);

    (addr, state)
}

fn provider_for(addr: SocketAddr, timeout_secs: u64) -> HttpIdentityProvider {
    HttpIdentityProvider::new(&ProviderConfig {
        base_url: format!("http://{}", addr),
        api_key: API_KEY.to_string(),
        timeout_secs,
    })
    .unwrap()
}

fn gate_for(provider: HttpIdentityProvider) -> AuthorizationGate {
    AuthorizationGate::new(
        LockoutPolicy::default(),
        PrivilegedIdentity::new("admin@shop.test").unwrap(),
        PersistedLockoutStore::new(Arc::new(MemoryKeyValueStore::new())),
        Arc::new(provider),
        Arc::new(ManualClock::new(1_700_000_000_000)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_authenticate_success_returns_provider_identity() {
    let (addr, _state) = spawn_auth_server();
    let provider = provider_for(addr, 5);

    let session = provider
        .authenticate("Admin@Shop.test", "correct")
        .await
        .unwrap();
    assert_eq!(session.identity, "admin@shop.test");
    assert_eq!(session.access_token.as_str(), "tok-admin");
}

#[tokio::test]
async fn test_authenticate_bad_password() {
    let (addr, _state) = spawn_auth_server();
    let provider = provider_for(addr, 5);

    let err = provider
        .authenticate("admin@shop.test", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::InvalidCredentials);
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let (addr, _state) = spawn_auth_server();
    let provider = provider_for(addr, 5);

    let err = provider
        .authenticate("broken@shop.test", "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_provider_is_transport() {
    // Grab a free port, then close it
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let provider = provider_for(addr, 5);

    let err = provider
        .authenticate("admin@shop.test", "correct")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let (addr, _state) = spawn_auth_server();
    let provider = provider_for(addr, 1);

    let err = provider
        .authenticate("slow@shop.test", "whatever")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn test_gate_over_http_provider() {
    let (addr, state) = spawn_auth_server();
    let gate = gate_for(provider_for(addr, 5));

    let result = gate.attempt_login("admin@shop.test", "wrong").await.unwrap();
    assert_eq!(
        result,
        GateResult::Rejected {
            attempts_remaining: 4,
            cause: FailureCause::InvalidCredentials
        }
    );

    let result = gate
        .attempt_login("clerk@shop.test", "correct")
        .await
        .unwrap();
    assert_eq!(result, GateResult::Forbidden);
    assert_eq!(
        *state.logouts.lock().unwrap(),
        vec!["Bearer tok-clerk".to_string()]
    );

    let result = gate
        .attempt_login("admin@shop.test", "correct")
        .await
        .unwrap();
    let session = result.into_session().expect("admin session");
    assert_eq!(session.identity, "admin@shop.test");
    assert_eq!(session.access_token.as_str(), "tok-admin");
    assert_eq!(state.logouts.lock().unwrap().len(), 1);

    // The returned session is the one the provider can sign out
    gate.sign_out(&session).await.unwrap();
    assert_eq!(
        *state.logouts.lock().unwrap(),
        vec!["Bearer tok-clerk".to_string(), "Bearer tok-admin".to_string()]
    );
}
