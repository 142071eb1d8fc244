mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{spawn_app, spawn_app_with, test_config};
use tripmate::notifications::MemoryMailer;

#[tokio::test]
async fn health_check() {
    let app = spawn_app().await;
    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn trip_routes_require_a_valid_token() {
    let app = spawn_app().await;

    let (status, body) = app.request(Method::GET, "/api/trips/my", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = app.get("/api/trips/my", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/users/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_trip_has_organizer_as_only_member() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;

    let (status, body) = app.get(&format!("/api/trips/{}", trip_id), &alice.token).await;
    assert_eq!(status, StatusCode::OK);

    let trip = &body["trip"];
    assert_eq!(trip["organizer"]["name"], "Alice");
    assert_eq!(trip["members"].as_array().unwrap().len(), 1);
    assert_eq!(trip["members"][0]["role"], "Organizer");
    assert_eq!(trip["members"][0]["user"]["id"], alice.id.as_str());
    assert_eq!(trip["itinerary"]["days"][0]["activities"][0]["activity"], "Tram 28");
}

#[tokio::test]
async fn create_trip_validates_input() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;

    let (status, body) = app
        .post(
            "/api/trips",
            &alice.token,
            json!({
                "name": " ",
                "destination": "Lisbon",
                "number_of_persons": 0,
                "start_date": "2026-05-04",
                "end_date": "2026-05-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    let details = body["details"].as_object().unwrap();
    assert!(details.contains_key("name"));
    assert!(details.contains_key("number_of_persons"));
    assert!(details.contains_key("end_date"));
}

#[tokio::test]
async fn invite_accept_makes_invitee_a_member() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;

    let invite_id = app.invite(&alice, &trip_id, &bob).await;

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@example.com");
    assert!(sent[0].html.contains("Lisbon weekend"));

    let (status, body) = app.get("/api/trips/invites/my", &bob.token).await;
    assert_eq!(status, StatusCode::OK);
    let invites = body["invites"].as_array().unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0]["trip_name"], "Lisbon weekend");
    assert_eq!(invites[0]["invited_by_name"], "Alice");

    let (status, body) = app
        .post(&format!("/api/trips/invites/{}/accept", invite_id), &bob.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Invite accepted");
    let members = body["trip"]["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[1]["user"]["id"], bob.id.as_str());
    assert_eq!(members[1]["role"], "Member");
    assert_eq!(members[1]["status"], "accepted");

    // Bob now sees the trip and has no open invites
    let (_, body) = app.get("/api/trips/my", &bob.token).await;
    assert_eq!(body["trips"].as_array().unwrap().len(), 1);
    let (_, body) = app.get("/api/trips/invites/my", &bob.token).await;
    assert!(body["invites"].as_array().unwrap().is_empty());

    // Resolved invites stay resolved
    let (status, _) = app
        .post(&format!("/api/trips/invites/{}/accept", invite_id), &bob.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(&format!("/api/trips/invites/{}/decline", invite_id), &bob.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A member cannot be invited again
    let (status, _) = app
        .post(
            &format!("/api/trips/{}/invite", trip_id),
            &alice.token,
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn declined_invite_leaves_trip_untouched() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let trip_id = app.create_trip(&alice, "Porto").await;
    let invite_id = app.invite(&alice, &trip_id, &bob).await;

    let (status, body) = app
        .post(&format!("/api/trips/invites/{}/decline", invite_id), &bob.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Invite declined");

    let (_, body) = app.get(&format!("/api/trips/{}", trip_id), &alice.token).await;
    assert_eq!(body["trip"]["members"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&format!("/api/trips/{}", trip_id), &bob.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A fresh invite is allowed once the old one is resolved
    app.invite(&alice, &trip_id, &bob).await;
}

#[tokio::test]
async fn invite_rules() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let carol = app.register("Carol", "carol@example.com").await;
    let trip_id = app.create_trip(&alice, "Madeira").await;
    let invite_url = format!("/api/trips/{}/invite", trip_id);

    let invite_id = app.invite(&alice, &trip_id, &bob).await;

    // One pending invite per user
    let (status, body) = app
        .post(&invite_url, &alice.token, json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invite already sent");

    // Only the organizer invites
    let (status, _) = app
        .post(&invite_url, &carol.token, json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown invitee
    let (status, _) = app
        .post(&invite_url, &alice.token, json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The organizer is already a member
    let (status, _) = app
        .post(&invite_url, &alice.token, json!({ "email": "alice@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Only the invitee resolves the invite
    let (status, _) = app
        .post(&format!("/api/trips/invites/{}/accept", invite_id), &carol.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/trips/invites/00000000-0000-4000-8000-000000000000/accept",
            &bob.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invite_email_failure_is_upstream_error() {
    let app = spawn_app_with(test_config(), MemoryMailer::failing()).await;
    let alice = app.register("Alice", "alice@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let trip_id = app.create_trip(&alice, "Azores").await;

    let (status, body) = app
        .post(
            &format!("/api/trips/{}/invite", trip_id),
            &alice.token,
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "external_service_error");

    // The invite was recorded before delivery was attempted
    let (_, body) = app.get("/api/trips/invites/my", &bob.token).await;
    assert_eq!(body["invites"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reaction_like_like_dislike() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;
    let url = format!("/api/trips/{}/day/0/activity/0/react", trip_id);

    let (status, body) = app.post(&url, &alice.token, json!({ "type": "like" })).await;
    assert_eq!(status, StatusCode::OK);
    let activity = &body["trip"]["itinerary"]["days"][0]["activities"][0];
    assert_eq!(activity["reactions"].as_array().unwrap().len(), 1);
    assert_eq!(activity["reactions"][0]["type"], "like");
    assert_eq!(activity["reactions"][0]["user"]["name"], "Alice");

    let (_, body) = app.post(&url, &alice.token, json!({ "type": "like" })).await;
    assert_eq!(body["message"], "Reaction removed");
    let activity = &body["trip"]["itinerary"]["days"][0]["activities"][0];
    assert!(activity["reactions"].as_array().unwrap().is_empty());

    let (_, body) = app.post(&url, &alice.token, json!({ "type": "dislike" })).await;
    let activity = &body["trip"]["itinerary"]["days"][0]["activities"][0];
    assert_eq!(activity["reactions"].as_array().unwrap().len(), 1);
    assert_eq!(activity["reactions"][0]["type"], "dislike");
    assert_eq!(activity["votes"], -1);
}

#[tokio::test]
async fn hotel_reaction_switches_in_place() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;
    let url = format!("/api/trips/{}/day/0/hotel/0/react", trip_id);

    app.post(&url, &alice.token, json!({ "type": "like" })).await;
    let (status, body) = app.post(&url, &alice.token, json!({ "type": "dislike" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Reaction updated");
    let hotel = &body["trip"]["itinerary"]["days"][0]["hotels"][0];
    assert_eq!(hotel["reactions"].as_array().unwrap().len(), 1);
    assert_eq!(hotel["reactions"][0]["type"], "dislike");
}

#[tokio::test]
async fn reaction_errors() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let mallory = app.register("Mallory", "mallory@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;

    let (status, _) = app
        .post(
            &format!("/api/trips/{}/day/0/activity/0/react", trip_id),
            &alice.token,
            json!({ "type": "love" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for path in ["day/5/activity/0", "day/0/activity/9", "day/x/activity/0"] {
        let (status, _) = app
            .post(
                &format!("/api/trips/{}/{}/react", trip_id, path),
                &alice.token,
                json!({ "type": "like" }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
    }

    let (status, _) = app
        .post(
            &format!("/api/trips/{}/day/0/hotel/0/react", trip_id),
            &mallory.token,
            json!({ "type": "like" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/trips/00000000-0000-4000-8000-000000000000/day/0/hotel/0/react",
            &alice.token,
            json!({ "type": "like" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_member_expense_is_forbidden_and_ledger_unchanged() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let mallory = app.register("Mallory", "mallory@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;

    let (status, body) = app
        .post(
            &format!("/api/trips/{}/expenses", trip_id),
            &mallory.token,
            json!({ "description": "Dinner", "amount": 50.0, "paid_by": "Mallory" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    // Membership is checked before the body
    let (status, _) = app
        .post(
            &format!("/api/trips/{}/expenses", trip_id),
            &mallory.token,
            json!({ "description": "", "amount": -1.0, "paid_by": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get(&format!("/api/trips/{}", trip_id), &alice.token).await;
    assert!(body["trip"]["expenses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn expenses_resolve_payer_by_name() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let bob = app.register("Bob", "bob@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;
    let invite_id = app.invite(&alice, &trip_id, &bob).await;
    app.post(&format!("/api/trips/invites/{}/accept", invite_id), &bob.token, json!({}))
        .await;
    let url = format!("/api/trips/{}/expenses", trip_id);

    let (status, body) = app
        .post(&url, &alice.token, json!({ "description": "Dinner", "amount": 60.0, "paid_by": "Bob" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["trip"]["expenses"][0]["paid_by"]["id"], bob.id.as_str());

    // Unknown names fall back to the caller
    let (_, body) = app
        .post(&url, &bob.token, json!({ "description": "Taxi", "amount": 15.5, "paid_by": "Someone" }))
        .await;
    assert_eq!(body["trip"]["expenses"][1]["paid_by"]["id"], bob.id.as_str());
    assert_eq!(body["trip"]["total_expenses"], 75.5);

    for bad in [
        json!({ "description": "  ", "amount": 10.0, "paid_by": "Bob" }),
        json!({ "description": "Lunch", "amount": 0.0, "paid_by": "Bob" }),
        json!({ "description": "Lunch", "amount": -3.0, "paid_by": "Bob" }),
        json!({ "description": "Lunch", "amount": 3.0, "paid_by": " " }),
    ] {
        let (status, _) = app.post(&url, &alice.token, bad.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", bad);
    }

    let (_, body) = app.get(&format!("/api/trips/{}", trip_id), &alice.token).await;
    assert_eq!(body["trip"]["expenses"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn chat_messages_append() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let mallory = app.register("Mallory", "mallory@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;
    let url = format!("/api/trips/{}/chat", trip_id);

    let (status, _) = app.post(&url, &alice.token, json!({ "message": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&url, &mallory.token, json!({ "message": "hi" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.post(&url, &alice.token, json!({ "message": "Booked the tram tickets" }))
        .await;
    let (status, body) = app.post(&url, &alice.token, json!({ "message": "See you" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let chat = body["trip"]["chat_messages"].as_array().unwrap();
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[0]["message"], "Booked the tram tickets");
    assert_eq!(chat[1]["user"]["name"], "Alice");
}

#[tokio::test]
async fn trip_lookup_errors() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;

    let (status, body) = app.get("/api/trips/not-a-uuid", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = app
        .get("/api/trips/00000000-0000-4000-8000-000000000000", &alice.token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn my_trips_lists_newest_first() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    app.create_trip(&alice, "First").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    app.create_trip(&alice, "Second").await;

    let (status, body) = app.get("/api/trips/my", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    let trips = body["trips"].as_array().unwrap();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0]["name"], "Second");
    assert_eq!(trips[0]["organizer"]["email"], "alice@example.com");
    assert!(trips[0].get("itinerary").is_none());
}

#[tokio::test]
async fn long_chat_messages_are_accepted() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;
    let long = "tram ".repeat(2_000);

    let (status, body) = app
        .post(&format!("/api/trips/{}/chat", trip_id), &alice.token, json!({ "message": long }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let stored = body["trip"]["chat_messages"][0]["message"].as_str().unwrap();
    assert_eq!(stored, long.trim());
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = spawn_app().await;
    let alice = app.register("Alice", "alice@example.com").await;
    let trip_id = app.create_trip(&alice, "Lisbon weekend").await;

    let (status, body) = app
        .post(
            &format!("/api/trips/{}/expenses", trip_id),
            &alice.token,
            json!({ "description": "Dinner", "amount": "ten", "paid_by": "Alice" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("amount"));

    let (status, body) = app
        .post(
            &format!("/api/trips/{}/day/0/activity/0/react", trip_id),
            &alice.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("`type`"));

    // Nothing was recorded
    let (_, body) = app.get(&format!("/api/trips/{}", trip_id), &alice.token).await;
    assert!(body["trip"]["expenses"].as_array().unwrap().is_empty());
    let activity = &body["trip"]["itinerary"]["days"][0]["activities"][0];
    assert!(activity["reactions"].as_array().unwrap().is_empty());
}
