//! End-to-end HTTP flows over the in-memory stores.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        HeaderMap, Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
};
use gatehouse::{
    api::{
        handlers::auth::{AuthConfig, AuthState, CredentialVerifier},
        router,
    },
    identity::{MemoryUserStore, NewUser, UserStore},
    records::{Page, Pagination, RecordError, RecordStore},
    store::{MemorySessionStore, SessionKey, SessionStore, StoreError},
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;
use tower::ServiceExt;

#[derive(Serialize, Clone)]
struct Note {
    id: i64,
    text: String,
}

#[derive(Deserialize)]
struct NoteInput {
    text: String,
}

#[derive(Deserialize)]
struct NotePatch {
    text: Option<String>,
}

#[derive(Default)]
struct MemoryNotes {
    notes: Mutex<Vec<Note>>,
}

#[async_trait]
impl RecordStore for MemoryNotes {
    type Input = NoteInput;
    type Patch = NotePatch;
    type Output = Note;

    async fn create(&self, input: NoteInput) -> Result<Note, RecordError> {
        if input.text.trim().is_empty() {
            return Err(RecordError::Validation("text is required".to_string()));
        }
        let mut notes = self.notes.lock().await;
        let note = Note {
            id: i64::try_from(notes.len()).unwrap_or(i64::MAX) + 1,
            text: input.text,
        };
        notes.push(note.clone());
        Ok(note)
    }

    async fn list(&self, page: Page) -> Result<(Vec<Note>, Pagination), RecordError> {
        let notes = self.notes.lock().await;
        let data = notes
            .iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let total = i64::try_from(notes.len()).unwrap_or(i64::MAX);
        Ok((
            data,
            Pagination {
                limit: page.limit,
                offset: page.offset,
                total,
            },
        ))
    }

    async fn update(&self, id: i64, patch: NotePatch) -> Result<Note, RecordError> {
        let mut notes = self.notes.lock().await;
        let note = notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or(RecordError::NotFound)?;
        if let Some(text) = patch.text {
            note.text = text;
        }
        Ok(note.clone())
    }
}

struct App {
    router: Router,
    sessions: Arc<MemorySessionStore>,
    users: Arc<MemoryUserStore>,
}

fn app() -> Result<App> {
    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(3600)));
    let users = Arc::new(MemoryUserStore::new());
    let state = AuthState::new(AuthConfig::new(15, 60)?, sessions.clone(), users.clone())
        .with_verifier(CredentialVerifier::with_cost(8, 1, 1)?);
    let router = router(Arc::new(state), Arc::new(MemoryNotes::default()));
    Ok(App {
        router,
        sessions,
        users,
    })
}

/// Session store whose writes fail from the n-th `put` on (1-based), and
/// whose reads fail once `reads_down` is set.
struct UnreliableSessions {
    inner: MemorySessionStore,
    fail_from_put: usize,
    puts: AtomicUsize,
    reads_down: AtomicBool,
}

impl UnreliableSessions {
    fn new(fail_from_put: usize) -> Self {
        Self {
            inner: MemorySessionStore::new(Duration::from_secs(3600)),
            fail_from_put,
            puts: AtomicUsize::new(0),
            reads_down: AtomicBool::new(false),
        }
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("redis: timed out after 2000ms".to_string())
}

#[async_trait]
impl SessionStore for UnreliableSessions {
    async fn put(&self, key: &SessionKey, user_id: i64, ttl: Duration) -> Result<(), StoreError> {
        if self.puts.fetch_add(1, Ordering::SeqCst) + 1 >= self.fail_from_put {
            return Err(unavailable());
        }
        self.inner.put(key, user_id, ttl).await
    }

    async fn get(&self, key: &SessionKey) -> Result<i64, StoreError> {
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn revoke_all(&self, user_id: i64) -> Result<u64, StoreError> {
        self.inner.revoke_all(user_id).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

fn unreliable_app(sessions: Arc<UnreliableSessions>) -> Result<App> {
    let users = Arc::new(MemoryUserStore::new());
    let state = AuthState::new(AuthConfig::new(15, 60)?, sessions, users.clone())
        .with_verifier(CredentialVerifier::with_cost(8, 1, 1)?);
    Ok(App {
        router: router(Arc::new(state), Arc::new(MemoryNotes::default())),
        // Unused by these tests; the unreliable store is inspected directly.
        sessions: Arc::new(MemorySessionStore::new(Duration::from_secs(1))),
        users,
    })
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    fn cookies(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(String::from)
            .collect()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.cookies().into_iter().find(|c| c.starts_with(&prefix))
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        let cookie = self.cookie(name)?;
        let pair = cookie.split(';').next()?;
        pair.split_once('=').map(|(_, value)| value.to_string())
    }
}

async fn send(app: &App, request: Request<Body>) -> Result<Reply> {
    let response = app.router.clone().oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok(Reply {
        status,
        headers,
        body,
    })
}

fn json_request(method: Method, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

async fn sign_up(app: &App, email: &str, password: &str) -> Result<Reply> {
    send(
        app,
        json_request(
            Method::POST,
            "/api/auth/sign-up",
            &json!({"email": email, "password": password}),
        )?,
    )
    .await
}

async fn login(app: &App, email: &str, password: &str) -> Result<Reply> {
    send(
        app,
        json_request(
            Method::POST,
            "/api/auth/login",
            &json!({"email": email, "password": password}),
        )?,
    )
    .await
}

fn access_token(reply: &Reply) -> Result<String> {
    reply.body["access_token"]
        .as_str()
        .map(String::from)
        .context("no access_token in body")
}

#[tokio::test]
async fn login_mints_both_tokens_for_the_stored_user() -> Result<()> {
    let app = app()?;
    for n in 1..=6 {
        app.users
            .create(NewUser {
                email: format!("filler{n}@x.com"),
                password_hash: SecretString::from("unused".to_string()),
                display_name: None,
            })
            .await?;
    }
    let created = sign_up(&app, "a@x.com", "pw").await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["id"], 7);

    let reply = login(&app, "a@x.com", "pw").await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["user"]["id"], 7);
    assert_eq!(reply.body["user"]["email"], "a@x.com");
    assert!(reply.body["user"].get("password_hash").is_none());

    let access = access_token(&reply)?;
    assert_eq!(reply.cookie_value("access_token").as_deref(), Some(access.as_str()));
    assert!(reply.cookie_value("refresh_token").is_some());
    assert_eq!(reply.cookie_value("logged_in").as_deref(), Some("true"));
    assert_eq!(reply.cookies().len(), 3);
    assert_eq!(app.sessions.live_entries().await, 2);
    Ok(())
}

#[tokio::test]
async fn cookies_carry_transport_attributes() -> Result<()> {
    let app = app()?;
    sign_up(&app, "a@x.com", "pw").await?;
    let reply = login(&app, "a@x.com", "pw").await?;

    let access = reply.cookie("access_token").context("no access cookie")?;
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Path=/"));
    assert!(access.contains("SameSite=Lax"));
    assert!(access.contains("Max-Age=900"));

    let refresh = reply.cookie("refresh_token").context("no refresh cookie")?;
    assert!(refresh.contains("HttpOnly"));
    assert!(refresh.contains("Max-Age=3600"));

    let logged_in = reply.cookie("logged_in").context("no logged_in cookie")?;
    assert!(!logged_in.contains("HttpOnly"));
    assert!(logged_in.contains("Max-Age=900"));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_answer_400_with_one_message() -> Result<()> {
    let app = app()?;
    sign_up(&app, "a@x.com", "pw").await?;

    let wrong = login(&app, "a@x.com", "nope").await?;
    let unknown = login(&app, "b@x.com", "pw").await?;

    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.body, unknown.body);
    assert_eq!(wrong.body["success"], false);
    assert!(wrong.cookies().is_empty());
    assert_eq!(app.sessions.live_entries().await, 0);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_422() -> Result<()> {
    let app = app()?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))?;
    let reply = send(&app, request).await?;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["success"], false);

    let missing_field = send(
        &app,
        json_request(Method::POST, "/api/auth/login", &json!({"email": "a@x.com"}))?,
    )
    .await?;
    assert_eq!(missing_field.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn unknown_bearer_token_is_403() -> Result<()> {
    let app = app()?;
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(AUTHORIZATION, "Bearer abc123")
        .body(Body::empty())?;
    let reply = send(&app, request).await?;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["success"], false);
    assert!(reply.body["message"].is_string());
    assert!(reply.body.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn logout_without_token_is_401_and_leaves_the_store_alone() -> Result<()> {
    let app = app()?;
    sign_up(&app, "a@x.com", "pw").await?;
    let signed_in = login(&app, "a@x.com", "pw").await?;
    let refresh = signed_in
        .cookie_value("refresh_token")
        .context("no refresh cookie")?;

    let request = Request::builder()
        .uri("/api/auth/logout")
        .header(COOKIE, format!("refresh_token={refresh}"))
        .body(Body::empty())?;
    let reply = send(&app, request).await?;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.sessions.live_entries().await, 2);
    Ok(())
}

#[tokio::test]
async fn full_session_lifecycle() -> Result<()> {
    let app = app()?;
    sign_up(&app, "a@x.com", "pw").await?;
    let signed_in = login(&app, "a@x.com", "pw").await?;
    let access = access_token(&signed_in)?;
    let refresh = signed_in
        .cookie_value("refresh_token")
        .context("no refresh cookie")?;

    // Cookie transport works for the gate.
    let me = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header(COOKIE, format!("access_token={access}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "a@x.com");

    // Refresh re-mints the access token only.
    let refreshed = send(
        &app,
        Request::builder()
            .uri("/api/auth/refresh")
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(refreshed.status, StatusCode::OK);
    let new_access = access_token(&refreshed)?;
    assert_ne!(new_access, access);
    assert!(refreshed.body.get("user").is_none());
    assert!(refreshed.cookie("refresh_token").is_none());
    assert_eq!(
        refreshed.cookie_value("access_token").as_deref(),
        Some(new_access.as_str())
    );
    assert_eq!(app.sessions.live_entries().await, 3);

    // Logout with the new access token and the refresh cookie.
    let logout = send(
        &app,
        Request::builder()
            .uri("/api/auth/logout")
            .header(AUTHORIZATION, format!("Bearer {new_access}"))
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body, Value::Null);
    assert_eq!(logout.cookies().len(), 3);
    for cookie in logout.cookies() {
        assert!(cookie.contains("Max-Age=0"));
    }

    // The old access token was never revoked; the new one and the refresh are.
    assert_eq!(app.sessions.live_entries().await, 1);
    let revoked = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header(AUTHORIZATION, format!("Bearer {new_access}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(revoked.status, StatusCode::FORBIDDEN);

    let refresh_again = send(
        &app,
        Request::builder()
            .uri("/api/auth/refresh")
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(refresh_again.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn refresh_without_cookie_is_401() -> Result<()> {
    let app = app()?;
    let reply = send(
        &app,
        Request::builder()
            .uri("/api/auth/refresh")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "no refresh token");
    Ok(())
}

#[tokio::test]
async fn logout_all_revokes_every_session() -> Result<()> {
    let app = app()?;
    sign_up(&app, "a@x.com", "pw").await?;
    let first = access_token(&login(&app, "a@x.com", "pw").await?)?;
    let second = access_token(&login(&app, "a@x.com", "pw").await?)?;

    let reply = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/logout-all")
            .header(AUTHORIZATION, format!("Bearer {first}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["revoked"], 4);
    assert_eq!(app.sessions.live_entries().await, 0);

    let me = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header(AUTHORIZATION, format!("Bearer {second}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(me.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn records_are_gated_and_enveloped() -> Result<()> {
    let app = app()?;

    let anonymous = send(
        &app,
        json_request(Method::POST, "/api/add", &json!({"text": "hello"}))?,
    )
    .await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    sign_up(&app, "a@x.com", "pw").await?;
    let access = access_token(&login(&app, "a@x.com", "pw").await?)?;
    let authed = |method: Method, uri: &str, body: Option<Value>| -> Result<Request<Body>> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {access}"));
        Ok(match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        })
    };

    let created = send(
        &app,
        authed(Method::POST, "/api/add", Some(json!({"text": "hello"})))?,
    )
    .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body, json!({"success": true, "data": {"id": 1, "text": "hello"}}));

    send(
        &app,
        authed(Method::POST, "/api/add", Some(json!({"text": "second"})))?,
    )
    .await?;

    let listed = send(&app, authed(Method::GET, "/api/list?limit=1&offset=1", None)?).await?;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["data"], json!([{"id": 2, "text": "second"}]));
    assert_eq!(
        listed.body["pagination"],
        json!({"limit": 1, "offset": 1, "total": 2})
    );

    let edited = send(
        &app,
        authed(Method::POST, "/api/edit/1", Some(json!({"text": "changed"})))?,
    )
    .await?;
    assert_eq!(edited.status, StatusCode::CREATED);
    assert_eq!(edited.body["data"]["text"], "changed");

    let missing = send(
        &app,
        authed(Method::POST, "/api/edit/99", Some(json!({"text": "x"})))?,
    )
    .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let invalid = send(
        &app,
        authed(Method::POST, "/api/add", Some(json!({"text": " "})))?,
    )
    .await?;
    assert_eq!(invalid.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid.body["message"], "text is required");

    let bad_page = send(&app, authed(Method::GET, "/api/list?limit=0", None)?).await?;
    assert_eq!(bad_page.status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn responses_carry_a_request_id() -> Result<()> {
    let app = app()?;
    let generated = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .body(Body::empty())?,
    )
    .await?;
    assert!(generated.headers.contains_key("x-request-id"));

    let propagated = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header("x-request-id", "req-42")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(
        propagated
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
    Ok(())
}

#[tokio::test]
async fn health_reports_both_stores() -> Result<()> {
    let app = app()?;
    let reply = send(
        &app,
        Request::builder().uri("/health").body(Body::empty())?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["database"], "ok");
    assert_eq!(reply.body["session_store"], "ok");
    assert!(reply.headers.contains_key("x-app"));
    Ok(())
}

#[tokio::test]
async fn store_failure_during_login_is_a_generic_400() -> Result<()> {
    let sessions = Arc::new(UnreliableSessions::new(2));
    let app = unreliable_app(sessions.clone())?;
    sign_up(&app, "a@x.com", "pw").await?;

    let reply = login(&app, "a@x.com", "pw").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        json!({"success": false, "message": "service temporarily unavailable"})
    );
    assert!(reply.cookies().is_empty());
    assert_eq!(sessions.inner.live_entries().await, 0);
    Ok(())
}

#[tokio::test]
async fn store_failure_behind_the_gate_and_on_refresh_is_a_generic_400() -> Result<()> {
    let sessions = Arc::new(UnreliableSessions::new(3));
    let app = unreliable_app(sessions.clone())?;
    sign_up(&app, "a@x.com", "pw").await?;
    let signed_in = login(&app, "a@x.com", "pw").await?;
    let access = access_token(&signed_in)?;
    let refresh = signed_in
        .cookie_value("refresh_token")
        .context("no refresh cookie")?;

    // The third put is the refresh's new access entry.
    let refreshed = send(
        &app,
        Request::builder()
            .uri("/api/auth/refresh")
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(refreshed.status, StatusCode::BAD_REQUEST);
    assert_eq!(refreshed.body["message"], "service temporarily unavailable");
    assert!(refreshed.cookies().is_empty());

    sessions.reads_down.store(true, Ordering::SeqCst);
    let me = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header(AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(me.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        me.body,
        json!({"success": false, "message": "service temporarily unavailable"})
    );
    assert_eq!(sessions.inner.live_entries().await, 2);
    Ok(())
}

#[tokio::test]
async fn health_is_503_when_the_session_store_is_down() -> Result<()> {
    let app = unreliable_app(Arc::new(UnreliableSessions::new(1)))?;
    let reply = send(
        &app,
        Request::builder().uri("/health").body(Body::empty())?,
    )
    .await?;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.body["session_store"], "error");
    assert_eq!(reply.body["database"], "ok");
    Ok(())
}
