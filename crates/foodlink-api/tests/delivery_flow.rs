mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use foodlink_types::events::{ChangeKind, GatewayEvent, Table};

#[tokio::test]
async fn health_and_auth_guards() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.call("GET", "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, _) = app.call("GET", "/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_rules() {
    let app = TestApp::new();
    let (_, token) = app.register("Meera", "donor").await;

    let (status, body) = app.call("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "donor");
    assert_eq!(body["profile"]["full_name"], "Meera");

    let dup = json!({ "email": "MEERA@example.org", "password": "hunter2hunter2", "full_name": "M", "role": "ngo" });
    let (status, _) = app.call("POST", "/auth/register", None, Some(dup)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let admin = json!({ "email": "x@example.org", "password": "hunter2hunter2", "full_name": "X", "role": "admin" });
    let (status, _) = app.call("POST", "/auth/register", None, Some(admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let short = json!({ "email": "y@example.org", "password": "short", "full_name": "Y", "role": "ngo" });
    let (status, _) = app.call("POST", "/auth/register", None, Some(short)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let wrong = json!({ "email": "meera@example.org", "password": "wrong-password" });
    let (status, _) = app.call("POST", "/auth/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn donation_to_delivery() {
    let app = TestApp::new();
    let (donor_id, donor) = app.register("Meera", "donor").await;
    let (_, ngo) = app.register("Akshaya", "ngo").await;
    let (volunteer_id, volunteer) = app.register("Ravi", "volunteer").await;
    let (_, rival) = app.register("Sana", "volunteer").await;

    let mut notifications_rx = app.state.dispatcher.register_connection(donor_id).await.1;
    let mut changes_rx = app.state.dispatcher.subscribe();

    // Only donors post, and expiry must be given exactly one way
    let (status, _) = app
        .call("POST", "/donations", Some(&volunteer), Some(json!({
            "title": "Rice", "food_type": "raw", "quantity": "5 kg", "pickup_address": "x", "shelf_life": "1 Day"
        })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call("POST", "/donations", Some(&donor), Some(json!({
            "title": "Rice", "food_type": "raw", "quantity": "5 kg", "pickup_address": "x"
        })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let donation_id = app.donate(&donor, "Leftover biryani").await;
    let change = changes_rx.recv().await.unwrap();
    assert_eq!((change.table, change.kind), (Table::Donations, ChangeKind::Insert));

    let (_, available) = app.call("GET", "/donations/available?food_type=cooked", Some(&ngo), None).await;
    assert_eq!(available.as_array().unwrap().len(), 1);
    let (_, available) = app.call("GET", "/donations/available?food_type=raw", Some(&ngo), None).await;
    assert!(available.as_array().unwrap().is_empty());

    // NGO claims it; a second claim loses
    let uri = format!("/donations/{donation_id}/request");
    let (status, task) = app.call("POST", &uri, Some(&ngo), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "available");
    let task_id = task["id"].as_str().unwrap().to_string();
    let (status, _) = app.call("POST", &uri, Some(&ngo), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    match notifications_rx.recv().await.unwrap() {
        GatewayEvent::Notification(n) => assert_eq!(n.kind, "donation_requested"),
        other => panic!("unexpected {other:?}"),
    }

    // Volunteer board shows the task with contacts
    let (_, tasks) = app.call("GET", "/tasks", Some(&volunteer), None).await;
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["donor"]["full_name"], "Meera");
    assert_eq!(tasks[0]["ngo"]["full_name"], "Akshaya");

    // Lifecycle, with the guard rejecting the rival
    let (status, body) = app.call("POST", &format!("/tasks/{task_id}/accept"), Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["volunteer_id"], volunteer_id.to_string());
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/accept"), Some(&rival), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/pickup"), Some(&rival), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/deliver"), Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "cannot skip pickup");

    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/pickup"), Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, card) = app.call("GET", &format!("/donations/{donation_id}/task"), Some(&donor), None).await;
    assert_eq!(card["status"], "in_progress");
    assert_eq!(card["volunteer"]["full_name"], "Ravi");

    let (status, body) = app.call("POST", &format!("/tasks/{task_id}/deliver"), Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (_, donation) = app.call("GET", &format!("/donations/{donation_id}"), Some(&donor), None).await;
    assert_eq!(donation["status"], "delivered");

    let (_, profile) = app.call("GET", &format!("/profiles/{volunteer_id}"), Some(&donor), None).await;
    assert_eq!(profile["total_deliveries"], 1);

    let (_, badges) = app.call("GET", &format!("/users/{volunteer_id}/badges"), Some(&donor), None).await;
    assert_eq!(badges[0]["badge"]["name"], "First Delivery");
    let (_, badges) = app.call("GET", &format!("/users/{donor_id}/badges"), Some(&donor), None).await;
    assert_eq!(badges[0]["badge"]["name"], "First Donation");

    let (_, board) = app.call("GET", "/leaderboard", Some(&volunteer), None).await;
    assert_eq!(board["top"][0]["full_name"], "Ravi");
    assert_eq!(board["my_rank"], 1);

    // Ratings after completion
    let rate = |stars: u8| json!({ "rated_user_id": volunteer_id, "rating": stars, "category": "volunteer" });
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/ratings"), Some(&donor), Some(rate(9))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/ratings"), Some(&donor), Some(rate(5))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/ratings"), Some(&donor), Some(rate(4))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/ratings"), Some(&ngo), Some(rate(4))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, profile) = app.call("GET", &format!("/profiles/{volunteer_id}"), Some(&donor), None).await;
    assert_eq!(profile["average_rating"], 4.5);

    // Kudos arrive as a notification with the message quoted
    let kudos = json!({ "recipient_id": volunteer_id, "message": "Thank you!" });
    let (status, _) = app.call("POST", &format!("/tasks/{task_id}/kudos"), Some(&ngo), Some(kudos)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, inbox) = app.call("GET", "/notifications?unread_only=true", Some(&volunteer), None).await;
    let kudos = inbox
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["type"] == "kudos")
        .unwrap();
    assert_eq!(kudos["message"], "\"Thank you!\"");

    let (_, inbox) = app.call("GET", "/notifications", Some(&ngo), None).await;
    let kinds: Vec<_> = inbox.as_array().unwrap().iter().map(|n| n["type"].clone()).collect();
    assert!(kinds.contains(&json!("pickup_confirmed")));
    assert!(kinds.contains(&json!("delivery_complete")));

    let (status, body) = app.call("POST", "/notifications/read-all", Some(&ngo), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn release_and_cancel() {
    let app = TestApp::new();
    let (_, donor) = app.register("Meera", "donor").await;
    let (_, ngo) = app.register("Akshaya", "ngo").await;
    let (_, volunteer) = app.register("Ravi", "volunteer").await;

    let donation_id = app.donate(&donor, "Bread").await;
    let (_, task) = app.call("POST", &format!("/donations/{donation_id}/request"), Some(&ngo), None).await;
    let task_id = task["id"].as_str().unwrap().to_string();

    app.call("POST", &format!("/tasks/{task_id}/accept"), Some(&volunteer), None).await;

    let (status, _) = app.call("POST", &format!("/donations/{donation_id}/cancel"), Some(&donor), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "volunteer already on the way");

    let (status, body) = app.call("POST", &format!("/tasks/{task_id}/release"), Some(&volunteer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "available");
    assert!(body["volunteer_id"].is_null());

    let (_, donation) = app.call("GET", &format!("/donations/{donation_id}"), Some(&donor), None).await;
    assert_eq!(donation["status"], "requested");

    let (status, body) = app.call("POST", &format!("/donations/{donation_id}/cancel"), Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (_, task) = app.call("GET", &format!("/tasks/{task_id}"), Some(&ngo), None).await;
    assert_eq!(task["status"], "cancelled");

    let (_, inbox) = app.call("GET", "/notifications", Some(&ngo), None).await;
    assert_eq!(inbox[0]["type"], "donation_cancelled");
}

#[tokio::test]
async fn chat_is_limited_to_participants() {
    let app = TestApp::new();
    let (donor_id, donor) = app.register("Meera", "donor").await;
    let (ngo_id, ngo) = app.register("Akshaya", "ngo").await;
    let (_, outsider) = app.register("Sana", "volunteer").await;

    let donation_id = app.donate(&donor, "Idli").await;
    let (_, task) = app.call("POST", &format!("/donations/{donation_id}/request"), Some(&ngo), None).await;
    let messages = format!("/tasks/{}/messages", task["id"].as_str().unwrap());

    let (status, body) = app
        .call("POST", &messages, Some(&donor), Some(json!({ "receiver_id": ngo_id, "message": "  Ready at 6  " })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Ready at 6");
    assert_eq!(body["sender_name"], "Meera");

    let (status, _) = app
        .call("POST", &messages, Some(&donor), Some(json!({ "receiver_id": donor_id, "message": "hi" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.call("GET", &messages, Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, thread) = app.call("GET", &messages, Some(&ngo), None).await;
    assert_eq!(thread.as_array().unwrap().len(), 1);

    let mut changes = app.state.dispatcher.subscribe();
    let (_, read) = app.call("POST", &format!("{messages}/read"), Some(&ngo), None).await;
    assert_eq!(read["count"], 1);

    let change = changes.try_recv().unwrap();
    assert_eq!((change.table, change.kind), (Table::ChatMessages, ChangeKind::Update));
    assert_eq!(change.record["message"], "Ready at 6");
    assert_eq!(change.record["is_read"], true);
    assert!(changes.try_recv().is_err());
}
