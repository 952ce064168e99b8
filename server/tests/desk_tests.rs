//! Dashboard workflows over the REST API

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::*;

fn ids(rows: &Value, field: &str) -> Vec<String> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|r| r[field].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_complaints_sorted_and_filtered() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, rows) = send(&app, "GET", "/api/v1/complaints", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&rows, "id"), vec!["c1", "c2", "c3"]);
    assert_eq!(rows[0]["complainant_name"], "Ana Reyes");
    assert_eq!(rows[0]["type"], "Noise");

    let (_, rows) = send(&app, "GET", "/api/v1/complaints?status=resolved", auth, None).await;
    assert_eq!(ids(&rows, "id"), vec!["c3"]);

    let (_, rows) = send(&app, "GET", "/api/v1/complaints?complaint_type=noise", auth, None).await;
    assert_eq!(ids(&rows, "id"), vec!["c1", "c3"]);

    let (_, rows) = send(&app, "GET", "/api/v1/complaints?search=videoke", auth, None).await;
    assert_eq!(ids(&rows, "id"), vec!["c1"]);
}

#[tokio::test]
async fn test_complaint_status_moves_forward_only() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());
    let uri = "/api/v1/complaints/u1/c1/status";

    let (status, body) = send(&app, "PUT", uri, auth, Some(json!({ "status": "in-progress" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "in-progress", "changed": true }));

    let (status, body) = send(&app, "PUT", uri, auth, Some(json!({ "status": "in-progress" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);

    let (status, body) = send(&app, "PUT", uri, auth, Some(json!({ "status": "pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, _) = send(&app, "PUT", uri, auth, Some(json!({ "status": "closed" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/complaints/u1/nope/status",
        auth,
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stored) = send(&app, "GET", "/api/v1/db/users/u1/userComplaints/c1/status", auth, None).await;
    assert_eq!(stored, json!("in-progress"));
}

#[tokio::test]
async fn test_open_conversation_marks_citizen_messages_read() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, list) = send(&app, "GET", "/api/v1/conversations", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["key"]["complaint_id"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["c1", "c2", "c3"]);
    assert_eq!(list[0]["unread_count"], 2);
    assert_eq!(list[0]["status"], "unread");

    let (status, conversation) =
        send(&app, "POST", "/api/v1/conversations/u1/c1/open", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(conversation["unread_count"], 0);
    assert_eq!(conversation["status"], "read");

    let (_, chat) = send(&app, "GET", "/api/v1/db/users/u1/userComplaints/c1/chat", auth, None).await;
    assert_eq!(chat["m1"]["read"], true);
    assert_eq!(chat["m2"]["read"], true);

    let (status, _) = send(&app, "POST", "/api/v1/conversations/u9/c9/open", auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reply_appends_admin_message() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());
    let uri = "/api/v1/conversations/u1/c2/reply";

    let (status, body) = send(&app, "POST", uri, auth, Some(json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, body) = send(&app, "POST", uri, auth, Some(json!({ "text": "x".repeat(201) }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, message) = send(&app, "POST", uri, auth, Some(json!({ "text": " On our way " }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["sender_id"], "admin");
    assert_eq!(message["body"], "On our way");
    assert_eq!(message["read"], false);

    let (_, list) = send(&app, "GET", "/api/v1/conversations?search=garbage", auth, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["last_message"]["body"], "On our way");
    // Staff messages never count as unread.
    assert_eq!(list[0]["unread_count"], 0);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/conversations/u1/missing/reply",
        auth,
        Some(json!({ "text": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_decisions_are_final() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, rows) = send(&app, "GET", "/api/v1/validations", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&rows, "id"), vec!["u1", "u2"]);
    assert_eq!(rows[0]["has_id_image"], true);

    let (_, rows) = send(&app, "GET", "/api/v1/validations?status=approved", auth, None).await;
    assert_eq!(ids(&rows, "id"), vec!["u2"]);

    let uri = "/api/v1/validations/u1/decision";
    let (status, body) = send(&app, "POST", uri, auth, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "user_id": "u1", "idstatus": "approved" }));

    let (status, _) = send(&app, "POST", uri, auth, Some(json!({ "decision": "decline" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/validations/nobody/decision",
        auth,
        Some(json!({ "decision": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_roster_ratings_and_maintenance() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, officials) = send(&app, "GET", "/api/v1/staff/officials", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&officials, "id"), vec!["o1", "o2"]);
    assert_eq!(officials[0]["average_rating"], 4.5);
    assert_eq!(officials[0]["rating_count"], 2);
    assert!(officials[1]["average_rating"].is_null());

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/staff/employees",
        auth,
        Some(json!({ "name": "", "position": "Tanod" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/staff/employee",
        auth,
        Some(json!({ "name": "Lito", "position": "Tanod" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/staff/employees/{}", id),
        auth,
        Some(json!({ "name": "Lito Ramos", "position": "Chief Tanod", "contact": "0918" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, employees) = send(&app, "GET", "/api/v1/staff/employees", auth, None).await;
    assert_eq!(employees[0]["name"], "Lito Ramos");
    assert_eq!(employees[0]["contact"], "0918");

    let uri = format!("/api/v1/staff/employees/{}", id);
    let (status, _) = send(&app, "DELETE", &uri, auth, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "DELETE", &uri, auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/staff/janitors", auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_monthly_and_weekly_reports() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, report) = send(&app, "GET", "/api/v1/analytics/monthly?year=2024", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["labels"][2], "Mar");
    assert_eq!(report["counts"][2], 2);
    assert!(report["error"].is_null());

    let (_, report) = send(
        &app,
        "GET",
        "/api/v1/analytics/monthly?start=2024-03-10&end=2024-03-31",
        auth,
        None,
    )
    .await;
    assert_eq!(report["counts"][2], 1);

    let (status, report) = send(
        &app,
        "GET",
        "/api/v1/analytics/monthly?start=2024-04-01&end=2024-03-01",
        auth,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["error"], "Start date must be on or before end date");
    assert!(report["counts"].as_array().unwrap().iter().all(|c| c == 0));

    let (_, report) = send(
        &app,
        "GET",
        "/api/v1/analytics/weekly?reference=2024-03-15",
        auth,
        None,
    )
    .await;
    assert_eq!(report["labels"], json!(["Week 1", "Week 2", "Week 3", "Week 4"]));
    assert_eq!(report["counts"], json!([1, 0, 1, 0]));
}

#[tokio::test]
async fn test_breakdown_and_puroks() {
    let (app, token) = seeded_app().await;
    let auth = Some(token.as_str());

    let (status, breakdown) = send(&app, "GET", "/api/v1/analytics/breakdown", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        breakdown["status"],
        json!({ "total": 3, "pending": 1, "in_progress": 1, "resolved": 1, "urgent": 1 })
    );
    assert_eq!(breakdown["types"][0], json!({ "type": "Noise", "count": 2 }));

    let (_, puroks) = send(&app, "GET", "/api/v1/puroks", auth, None).await;
    assert_eq!(
        puroks,
        json!([
            { "purok": "Purok 1", "residents": 1, "complaints": 2, "pending": 1, "urgent": 1 },
            { "purok": "Unassigned", "residents": 1, "complaints": 1, "pending": 0, "urgent": 0 },
        ])
    );
}

#[tokio::test]
async fn test_dashboard_summary_sidebar() {
    let (app, token) = seeded_app().await;

    let (status, snapshot) = send(
        &app,
        "GET",
        "/api/v1/dashboard/summary?dismissed=k1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        snapshot["sidebar"],
        json!({
            "pending_complaints": 1,
            "unread_messages": 2,
            "pending_validations": 1,
            "new_feedback": 1,
        })
    );
    assert_eq!(snapshot["feedback"][0]["key"], "k2");
    assert_eq!(snapshot["officials"][0]["average_rating"], 4.5);
}
