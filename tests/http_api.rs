//! Integration tests for the HTTP API, driven through the router with `oneshot`.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use learn_assist::adapters::ai::{MockChatAdapter, OpenAiAdapter};
use learn_assist::adapters::http::{AppState, USER_ID_HEADER, router};
use learn_assist::adapters::persistence::SqliteRepo;
use learn_assist::domain::{DomainError, Role};
use learn_assist::ports::ChatCompletionPort;
use learn_assist::usecases::ChangeFeed;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Harness {
    _dir: tempfile::TempDir,
    state: AppState,
}

impl Harness {
    async fn new(chat: Arc<dyn ChatCompletionPort>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteRepo::connect(dir.path()).await.unwrap());
        let state = AppState::new(chat, repo, ChangeFeed::new(64));
        state.profiles.seed_admins(&["admin".into()]).await.unwrap();
        state
            .profiles
            .set_role("admin", "prof", Role::Instructor)
            .await
            .unwrap();
        state.warm().await.unwrap();
        Self { _dir: dir, state }
    }

    fn app(&self) -> Router {
        router(self.state.clone())
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = ServiceExt::<Request<Body>>::oneshot(self.app(), req)
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn raw_post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn integrate_question() -> Value {
    json!({ "question": "How do I integrate?", "subject": "Math", "difficulty": "medium" })
}

/// Local provider that always answers with HTTP 500.
async fn failing_upstream() -> String {
    let app = Router::new().route(
        "/v1/chat/completions",
        axum::routing::post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1/chat/completions", addr)
}

// --- AI endpoints ---

#[tokio::test]
async fn test_enhancer_passes_json_object_through() {
    let reply = json!({
        "analysis": "ok",
        "suggestions": ["a"],
        "improvedQuestion": "How do I compute definite integrals?",
        "additionalTips": "tip"
    });
    let h = Harness::new(Arc::new(MockChatAdapter::replying(reply.to_string()))).await;

    let (status, first) = h
        .send(request("POST", "/ai-question-enhancer", None, Some(integrate_question())))
        .await;
    let (_, second) = h
        .send(request("POST", "/ai-question-enhancer", None, Some(integrate_question())))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, reply);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_enhancer_upstream_500_returns_fallback_shape() {
    let url = failing_upstream().await;
    let chat = OpenAiAdapter::new(
        url,
        Some("test-key".into()),
        "gpt-4o-mini".into(),
        Duration::from_secs(5),
    )
    .unwrap();
    let h = Harness::new(Arc::new(chat)).await;

    let (status, body) = h
        .send(request("POST", "/ai-question-enhancer", None, Some(integrate_question())))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["improvedQuestion"], "How do I integrate?");
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 3);
    assert!(!body["analysis"].as_str().unwrap().is_empty());
    assert!(!body["additionalTips"].as_str().unwrap().is_empty());
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_enhancer_prose_reply_becomes_raw_text_result() {
    let prose = "Try rewriting your question more specifically.";
    let h = Harness::new(Arc::new(MockChatAdapter::replying(prose))).await;

    let (status, body) = h
        .send(request("POST", "/ai-question-enhancer", None, Some(integrate_question())))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["improvedQuestion"], prose);
    assert_eq!(body["suggestions"].as_array().unwrap().len(), 3);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_missing_key_never_reaches_provider_and_hides_cause() {
    let chat = OpenAiAdapter::new(
        "http://127.0.0.1:9/v1/chat/completions".into(),
        None,
        "gpt-4o-mini".into(),
        Duration::from_secs(1),
    )
    .unwrap();
    let h = Harness::new(Arc::new(chat)).await;

    let (status, body) = h
        .send(request("POST", "/ai-question-enhancer", None, Some(integrate_question())))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(!error.to_lowercase().contains("key"));
    assert_eq!(body["improvedQuestion"], "How do I integrate?");
}

#[tokio::test]
async fn test_enhancer_rejects_bad_bodies_with_full_shape() {
    let mock = Arc::new(MockChatAdapter::replying("{}"));
    let h = Harness::new(mock.clone()).await;

    for req in [
        raw_post("/ai-question-enhancer", "not json"),
        request(
            "POST",
            "/ai-question-enhancer",
            None,
            Some(json!({ "question": "   " })),
        ),
    ] {
        let (status, body) = h.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert!(body["suggestions"].is_array());
        assert!(body["improvedQuestion"].is_string());
    }
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_study_assistant_success_and_failure() {
    let ok = Harness::new(Arc::new(MockChatAdapter::replying("Recursion is..."))).await;
    let (status, body) = ok
        .send(request(
            "POST",
            "/ai-study-assistant",
            None,
            Some(json!({ "question": "What is recursion?", "context": "CS101" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "Recursion is..." }));

    let down = Harness::new(Arc::new(MockChatAdapter::failing(|| DomainError::Timeout))).await;
    let (status, body) = down
        .send(request(
            "POST",
            "/ai-study-assistant",
            None,
            Some(json!({ "question": "What is recursion?" })),
        ))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["response"].as_str().unwrap().starts_with("I apologize"));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_preflight_allows_any_origin() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/ai-question-enhancer")
        .header("origin", "https://example.org")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,authorization")
        .body(Body::empty())
        .unwrap();

    let resp = ServiceExt::<Request<Body>>::oneshot(h.app(), req)
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "*"
    );
    let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    let (status, body) = h.send(request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

// --- Questions ---

#[tokio::test]
async fn test_question_lifecycle() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;

    let (status, created) = h
        .send(request(
            "POST",
            "/questions",
            Some("alice"),
            Some(json!({
                "title": "Chain rule",
                "content": "When do I apply it?",
                "subject": "Math",
                "tags": ["calculus", "derivatives"]
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, voted) = h
        .send(request(
            "POST",
            &format!("/questions/{}/vote", id),
            Some("bob"),
            Some(json!({ "vote": "up" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voted["upvotes"], 1);

    let (status, _) = h
        .send(request(
            "POST",
            &format!("/questions/{}/answers", id),
            Some("bob"),
            Some(json!({ "content": "Whenever functions are composed." })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, answers) = h
        .send(request("GET", &format!("/questions/{}/answers", id), None, None))
        .await;
    assert_eq!(answers.as_array().unwrap().len(), 1);

    let (_, listed) = h
        .send(request("GET", "/questions?tags=Calculus&sort=popular", None, None))
        .await;
    assert_eq!(listed[0]["id"], id.as_str());
    assert_eq!(listed[0]["answer_count"], 1);

    let (status, _) = h
        .send(request(
            "PATCH",
            &format!("/questions/{}", id),
            Some("bob"),
            Some(json!({ "title": "Hijacked" })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .send(request("DELETE", &format!("/questions/{}", id), Some("alice"), None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = h
        .send(request("GET", &format!("/questions/{}", id), None, None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_mutations_require_identity() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    let (status, body) = h
        .send(request(
            "POST",
            "/questions",
            None,
            Some(json!({ "title": "t", "content": "c" })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = h.send(request("GET", "/dashboard", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_sort_is_bad_request() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    let (status, body) = h
        .send(request("GET", "/questions?sort=sideways", None, None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

// --- Announcements, profiles, dashboard ---

#[tokio::test]
async fn test_announcement_permissions() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    let post = json!({ "title": "Midterm", "content": "Friday", "priority": "urgent", "is_pinned": true });

    let (status, _) = h
        .send(request("POST", "/announcements", Some("alice"), Some(post.clone())))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = h
        .send(request("POST", "/announcements", Some("prof"), Some(post)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["priority"], "urgent");

    let (_, active) = h.send(request("GET", "/announcements", None, None)).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_profiles_and_dashboard() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;

    let (status, me) = h
        .send(request(
            "PUT",
            "/profiles/me",
            Some("alice"),
            Some(json!({ "display_name": "Alice" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "student");

    let (status, _) = h
        .send(request(
            "PUT",
            "/profiles/bob/role",
            Some("alice"),
            Some(json!({ "role": "admin" })),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bob) = h
        .send(request(
            "PUT",
            "/profiles/bob/role",
            Some("admin"),
            Some(json!({ "role": "instructor" })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bob["role"], "instructor");

    let (_, alice) = h.send(request("GET", "/profiles/alice", None, None)).await;
    assert_eq!(alice["display_name"], "Alice");

    let (status, stats) = h
        .send(request("GET", "/dashboard", Some("alice"), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalQuestions"], 0);
    assert_eq!(stats["recentActivity"]["announcements"], 0);
}

#[tokio::test]
async fn test_listings_include_author_profile() {
    let h = Harness::new(Arc::new(MockChatAdapter::replying("{}"))).await;
    h.send(request(
        "PUT",
        "/profiles/me",
        Some("prof"),
        Some(json!({ "display_name": "Dr. Kim" })),
    ))
    .await;
    h.send(request(
        "POST",
        "/questions",
        Some("alice"),
        Some(json!({ "title": "Limits", "content": "Epsilon-delta?" })),
    ))
    .await;
    h.send(request(
        "POST",
        "/announcements",
        Some("prof"),
        Some(json!({ "title": "Quiz", "content": "Monday" })),
    ))
    .await;

    let (_, questions) = h.send(request("GET", "/questions", None, None)).await;
    assert_eq!(questions[0]["author"]["role"], "student");
    assert!(questions[0]["author"]["display_name"].is_null());

    let (_, announcements) = h.send(request("GET", "/announcements", None, None)).await;
    assert_eq!(announcements[0]["author"]["display_name"], "Dr. Kim");
    assert_eq!(announcements[0]["author"]["role"], "instructor");
}
