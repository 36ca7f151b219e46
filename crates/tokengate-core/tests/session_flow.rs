//! End-to-end tests of the request pipeline and session coordinator against
//! a local HTTP server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};

use tokengate_core::auth::error::CONNECTION_ERROR_MESSAGE;
use tokengate_core::{
    ApiError, AuthError, ClientContext, ClientSettings, MemoryBackend, SessionCoordinator,
    SessionPhase,
};

// ============================================================================
// Test backend
// ============================================================================

struct BackendState {
    login_status: StatusCode,
    login_body: Value,
    login_delay: Option<Duration>,
    login_requests: Vec<Value>,
    products_status: StatusCode,
    seen_authorization: Vec<Option<String>>,
}

#[derive(Clone)]
struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                login_status: StatusCode::OK,
                login_body: json!({}),
                login_delay: None,
                login_requests: Vec::new(),
                products_status: StatusCode::OK,
                seen_authorization: Vec::new(),
            })),
        }
    }

    fn login_returns(&self, status: StatusCode, body: Value) {
        let mut state = self.state.lock().unwrap();
        state.login_status = status;
        state.login_body = body;
    }

    fn login_issues(&self, token: &str) {
        self.login_returns(
            StatusCode::OK,
            json!({"title": "OK", "description": "Bienvenido", "result": {"jwt": token}}),
        );
    }

    fn products_return(&self, status: StatusCode) {
        self.state.lock().unwrap().products_status = status;
    }

    fn delay_login(&self, delay: Duration) {
        self.state.lock().unwrap().login_delay = Some(delay);
    }

    fn login_requests(&self) -> Vec<Value> {
        self.state.lock().unwrap().login_requests.clone()
    }

    fn seen_authorization(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().seen_authorization.clone()
    }
}

async fn login_handler(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let (status, response, delay) = {
        let mut state = backend.state.lock().unwrap();
        state.login_requests.push(body);
        (state.login_status, state.login_body.clone(), state.login_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    (status, Json(response))
}

async fn products_handler(
    State(backend): State<Backend>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let mut state = backend.state.lock().unwrap();
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.seen_authorization.push(auth);
    let body = if state.products_status == StatusCode::OK {
        json!({"title": "OK", "result": [{"id": 1, "name": "Tornillo"}]})
    } else {
        json!({"title": "Sesión expirada", "description": "Token inválido", "result": null})
    };
    (state.products_status, Json(body))
}

async fn spawn_server(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/products", get(products_handler))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Helpers
// ============================================================================

fn token_with_claims(claims: &str) -> String {
    format!(
        "{}.{}.firma",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims)
    )
}

fn context(base_url: &str) -> ClientContext {
    ClientContext::new(ClientSettings::new(base_url), Arc::new(MemoryBackend::new())).unwrap()
}

async fn setup() -> (Backend, ClientContext, SessionCoordinator) {
    let backend = Backend::new();
    let base_url = spawn_server(backend.clone()).await;
    let ctx = context(&base_url);
    let session = SessionCoordinator::new(&ctx);
    session.bootstrap().await;
    (backend, ctx, session)
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_sets_role_and_persists_token() {
    let (backend, ctx, session) = setup().await;
    let token = token_with_claims(r#"{"sub":"a@b.com","role":"Administrador"}"#);
    backend.login_issues(&token);

    session.login("a@b.com", "pw").await.unwrap();

    assert!(session.has_credential());
    assert_eq!(session.current_role().as_deref(), Some("Administrador"));
    assert_eq!(ctx.store().get().await.unwrap(), Some(token));
    assert_eq!(
        backend.login_requests(),
        vec![json!({"email": "a@b.com", "password": "pw"})]
    );
}

#[tokio::test]
async fn test_second_login_requires_logout_first() {
    let (backend, ctx, session) = setup().await;
    let first = token_with_claims(r#"{"role":"Usuario"}"#);
    backend.login_issues(&first);
    session.login("a@b.com", "pw").await.unwrap();

    backend.login_issues(&token_with_claims(r#"{"role":"Administrador"}"#));
    let err = session.login("b@c.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::AlreadyAuthenticated));
    assert_eq!(backend.login_requests().len(), 1);
    assert_eq!(session.current_role().as_deref(), Some("Usuario"));
    assert_eq!(ctx.store().get().await.unwrap(), Some(first));

    session.logout().await.unwrap();
    session.login("b@c.com", "pw").await.unwrap();
    assert_eq!(session.current_role().as_deref(), Some("Administrador"));
    assert_eq!(backend.login_requests().len(), 2);
}

#[tokio::test]
async fn test_login_rejected_uses_server_title() {
    let (backend, ctx, session) = setup().await;
    backend.login_returns(
        StatusCode::BAD_REQUEST,
        json!({
            "title": "Credenciales inválidas",
            "description": "Revise los campos",
            "result": [{"field": "password", "descriptions": ["incorrecta"]}]
        }),
    );

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert_eq!(err.user_message(), "Credenciales inválidas");
    assert_eq!(err.to_string(), "Credenciales inválidas");
    let fields = err.field_errors().unwrap();
    assert_eq!(fields.password, vec!["incorrecta".to_string()]);
    assert!(fields.email.is_empty());
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(ctx.store().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_rejects_token_without_role() {
    let (backend, ctx, session) = setup().await;
    backend.login_issues(&token_with_claims(r#"{"sub":"a@b.com"}"#));

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredential));
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(ctx.store().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_rejects_malformed_token() {
    let (backend, ctx, session) = setup().await;
    backend.login_issues("no-es-un-token");

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert!(matches!(err, AuthError::Decode(_)));
    assert!(!session.has_credential());
    assert_eq!(ctx.store().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_without_server_is_connection_error() {
    // Port 9 (discard) has no listener
    let ctx = context("http://127.0.0.1:9");
    let session = SessionCoordinator::new(&ctx);
    session.bootstrap().await;

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert_eq!(err.user_message(), CONNECTION_ERROR_MESSAGE);
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_login_timeout_is_connection_error() {
    let backend = Backend::new();
    backend.login_issues(&token_with_claims(r#"{"role":"Usuario"}"#));
    backend.delay_login(Duration::from_secs(2));
    let base_url = spawn_server(backend.clone()).await;

    let mut settings = ClientSettings::new(base_url);
    settings.timeout = Duration::from_millis(200);
    let ctx = ClientContext::new(settings, Arc::new(MemoryBackend::new())).unwrap();
    let session = SessionCoordinator::new(&ctx);
    session.bootstrap().await;

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert_eq!(err.user_message(), CONNECTION_ERROR_MESSAGE);
    assert!(!session.has_credential());
}

#[tokio::test]
async fn test_login_unauthorized_reports_title() {
    let (backend, _ctx, session) = setup().await;
    backend.login_returns(
        StatusCode::UNAUTHORIZED,
        json!({"title": "Usuario o contraseña incorrectos", "result": []}),
    );

    let err = session.login("a@b.com", "pw").await.unwrap_err();

    assert_eq!(err.user_message(), "Usuario o contraseña incorrectos");
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_bearer_header_follows_stored_credential() {
    let (backend, ctx, session) = setup().await;
    let token = token_with_claims(r#"{"role":"Usuario"}"#);
    backend.login_issues(&token);

    let _: Value = ctx.api().get("/api/products").await.unwrap();
    session.login("a@b.com", "pw").await.unwrap();
    let _: Value = ctx.api().get("/api/products").await.unwrap();
    session.logout().await.unwrap();
    let _: Value = ctx.api().get("/api/products").await.unwrap();

    assert_eq!(
        backend.seen_authorization(),
        vec![None, Some(format!("Bearer {}", token)), None]
    );
}

#[tokio::test]
async fn test_each_401_fires_handler_once_and_returns_error() {
    let backend = Backend::new();
    backend.products_return(StatusCode::UNAUTHORIZED);
    let base_url = spawn_server(backend.clone()).await;
    let ctx = context(&base_url);

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    ctx.expiry().set(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let api = ctx.api();
    let results = futures::future::join_all((0..3).map(|_| api.get::<Value>("/api/products"))).await;

    for result in &results {
        let err = result.as_ref().unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert_eq!(err.envelope().unwrap().title.as_deref(), Some("Sesión expirada"));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_401_before_handler_registration_still_returns_error() {
    let backend = Backend::new();
    backend.products_return(StatusCode::UNAUTHORIZED);
    let base_url = spawn_server(backend).await;
    let ctx = context(&base_url);

    let err = ctx.api().get::<Value>("/api/products").await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_other_errors_do_not_log_out() {
    let (backend, ctx, session) = setup().await;
    backend.login_issues(&token_with_claims(r#"{"role":"Usuario"}"#));
    session.login("a@b.com", "pw").await.unwrap();
    backend.products_return(StatusCode::FORBIDDEN);

    let err = ctx.api().get::<Value>("/api/products").await.unwrap_err();
    assert!(matches!(err, ApiError::AccessDenied(_)));

    tokio::task::yield_now().await;
    assert!(session.has_credential());
}

// ============================================================================
// Forced logout
// ============================================================================

#[tokio::test]
async fn test_401_forces_logout_after_error_is_returned() {
    let (backend, ctx, session) = setup().await;
    backend.login_issues(&token_with_claims(r#"{"role":"Administrador"}"#));
    session.login("a@b.com", "pw").await.unwrap();
    backend.products_return(StatusCode::UNAUTHORIZED);
    let mut rx = session.subscribe();

    let err = ctx.api().get::<Value>("/api/products").await.unwrap_err();
    assert!(err.is_unauthorized());

    // The logout runs as its own task; wait for it to publish
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.has_credential()))
        .await
        .expect("forced logout did not run")
        .unwrap();
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert_eq!(ctx.store().get().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_again_after_forced_logout() {
    let (backend, ctx, session) = setup().await;
    backend.login_issues(&token_with_claims(r#"{"role":"Usuario"}"#));
    session.login("a@b.com", "pw").await.unwrap();

    backend.products_return(StatusCode::UNAUTHORIZED);
    let mut rx = session.subscribe();
    let _ = ctx.api().get::<Value>("/api/products").await;
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.has_credential()))
        .await
        .expect("forced logout did not run")
        .unwrap();

    let token = token_with_claims(r#"{"role":"Administrador"}"#);
    backend.login_issues(&token);
    session.login("a@b.com", "pw").await.unwrap();
    assert_eq!(session.current_role().as_deref(), Some("Administrador"));
    assert_eq!(ctx.store().get().await.unwrap(), Some(token));
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_bootstrap_restores_without_network() {
    let backend = Backend::new();
    let base_url = spawn_server(backend.clone()).await;
    let ctx = context(&base_url);
    ctx.store()
        .set(&token_with_claims(r#"{"role":"Administrador"}"#))
        .await
        .unwrap();

    let session = SessionCoordinator::new(&ctx);
    assert_eq!(session.phase(), SessionPhase::Bootstrapping);
    let phase = session.bootstrap().await;

    assert_eq!(
        phase,
        SessionPhase::Authenticated {
            role: "Administrador".to_string()
        }
    );
    assert!(backend.login_requests().is_empty());
    assert!(backend.seen_authorization().is_empty());
}
