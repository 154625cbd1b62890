use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use foodlink_api::{AppState, AppStateInner, auth};
use foodlink_db::Database;
use foodlink_gateway::dispatcher::Dispatcher;
use foodlink_types::models::Role;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            token_ttl: chrono::Duration::days(1),
            dispatcher: Dispatcher::new(),
        });
        Self {
            router: foodlink_api::router(state.clone()),
            state,
        }
    }

    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register through the API and return (user_id, token).
    pub async fn register(&self, name: &str, role: &str) -> (Uuid, String) {
        let (status, body) = self
            .call(
                "POST",
                "/auth/register",
                None,
                Some(json!({
                    "email": format!("{}@example.org", name.to_lowercase()),
                    "password": "hunter2hunter2",
                    "full_name": name,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {name}: {body}");
        (
            body["user_id"].as_str().unwrap().parse().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// Admins cannot self-register; seed one in the store and log in.
    pub async fn admin(&self) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let hash = auth::hash_password("root-password").unwrap();
        self.state
            .db
            .create_user(id, "root@example.org", &hash, "Root", Role::Admin)
            .unwrap();

        let (status, body) = self
            .call(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "root@example.org", "password": "root-password" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        (id, body["token"].as_str().unwrap().to_string())
    }

    /// A donor's listing with a six-hour shelf life. Returns its id.
    pub async fn donate(&self, token: &str, title: &str) -> Uuid {
        let (status, body) = self
            .call(
                "POST",
                "/donations",
                Some(token),
                Some(json!({
                    "title": title,
                    "food_type": "cooked",
                    "quantity": "10 plates",
                    "estimated_meals": 10,
                    "pickup_address": "12 MG Road",
                    "pickup_latitude": 12.9716,
                    "pickup_longitude": 77.5946,
                    "shelf_life": "3-6 Hours",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }
}
