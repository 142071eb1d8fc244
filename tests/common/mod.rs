#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use tripmate::api::create_router;
use tripmate::config::Config;
use tripmate::db::init_in_memory;
use tripmate::notifications::MemoryMailer;
use tripmate::AppState;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<MemoryMailer>,
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.auth.generated_secret = false;
    config.rate_limit.enabled = false;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(), MemoryMailer::new()).await
}

pub async fn spawn_app_with(config: Config, mailer: MemoryMailer) -> TestApp {
    let db = init_in_memory().await.expect("in-memory database");
    let mailer = Arc::new(mailer);
    let state = Arc::new(AppState::new(config, db, mailer.clone()));
    TestApp {
        router: create_router(state.clone()),
        state,
        mailer,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    /// Run a prepared request through the router
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn register(&self, name: &str, email: &str) -> TestUser {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["id"].as_str().unwrap().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Create a one-day trip with a single activity and hotel
    pub async fn create_trip(&self, organizer: &TestUser, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/trips",
                &organizer.token,
                json!({
                    "name": name,
                    "destination": "Lisbon",
                    "number_of_persons": 3,
                    "start_date": "2026-05-01",
                    "end_date": "2026-05-03",
                    "preferences": ["food", "museums"],
                    "itinerary": {
                        "best_time_to_visit": "Spring",
                        "days": [{
                            "day": 1,
                            "activities": [{
                                "time": "10:00",
                                "activity": "Tram 28",
                                "location": "Alfama",
                                "description": "Ride across the old town",
                                "category": "sightseeing",
                                "image": ""
                            }],
                            "hotels": [{
                                "name": "Casa do Rio",
                                "attractions": "River views",
                                "address": "Rua Augusta 1",
                                "rating": "4.5",
                                "website_url": "https://example.com"
                            }]
                        }]
                    }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create trip failed: {}", body);
        body["trip"]["id"].as_str().unwrap().to_string()
    }

    /// Invite `invitee` and return the new invite id
    pub async fn invite(&self, organizer: &TestUser, trip_id: &str, invitee: &TestUser) -> String {
        let (status, body) = self
            .post(
                &format!("/api/trips/{}/invite", trip_id),
                &organizer.token,
                json!({ "email": invitee.email }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "invite failed: {}", body);
        body["invite"]["id"].as_str().unwrap().to_string()
    }
}
