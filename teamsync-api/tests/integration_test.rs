/// Integration tests for the TeamSync API
///
/// Drive the full router with `tower::ServiceExt::oneshot` over the
/// in-memory store:
/// - authentication and public routes
/// - team structure changes and role propagation
/// - task assignment policy
/// - notification inbox

mod common;

use axum::http::StatusCode;
use common::{token_for, TestContext};
use serde_json::json;
use teamsync_shared::models::Role;

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let ctx = TestContext::new().await;

    let (status, _) = ctx.send("GET", "/v1/teams", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.send("GET", "/v1/teams", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let ctx = TestContext::new().await;

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/users",
            None,
            Some(json!({ "name": "", "email": "not-an-email" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"].as_array().map(|d| d.len()), Some(2));

    ctx.register("Alice").await;
    let (status, body) = ctx
        .send(
            "POST",
            "/v1/users",
            None,
            Some(json!({ "name": "Alice", "email": "ALICE@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_team_lifecycle_over_http() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin_token();
    let (alice, alice_token) = ctx.register("Alice").await;
    let (bob, _) = ctx.register("Bob").await;

    let (status, team) = ctx
        .send(
            "POST",
            "/v1/teams",
            Some(&admin),
            Some(json!({ "name": "platform", "members": [alice.id, bob.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(team["leader"], json!(alice.id));
    let team_id = team["id"].as_str().unwrap().to_string();

    let (status, teams) = ctx.send("GET", "/v1/teams", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teams.as_array().unwrap().len(), 1);

    let (status, _) = ctx.send("GET", "/v1/admin/teams", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, team) = ctx
        .send(
            "DELETE",
            &format!("/v1/teams/{}/members/{}", team_id, alice.id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["leader"], json!(bob.id));

    let (_, users) = ctx.send("GET", "/v1/users", Some(&admin), None).await;
    let role_of = |id: String| {
        users
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["id"] == json!(id))
            .map(|u| u["role"].clone())
    };
    assert_eq!(role_of(alice.id.to_string()), Some(json!("member")));
    assert_eq!(role_of(bob.id.to_string()), Some(json!("team-leader")));

    let (status, _) = ctx
        .send("DELETE", &format!("/v1/teams/{}", team_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_member_assignment_forbidden() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin_token();
    let (alice, _) = ctx.register("Alice").await;
    let (bob, bob_token) = ctx.register("Bob").await;
    ctx.send(
        "POST",
        "/v1/teams",
        Some(&admin),
        Some(json!({ "name": "platform", "members": [alice.id, bob.id] })),
    )
    .await;

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/tasks",
            Some(&bob_token),
            Some(json!({ "title": "Ship it", "assigned_to": [alice.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_stale_token_role_is_not_trusted() {
    let ctx = TestContext::new().await;
    let (alice, _) = ctx.register("Alice").await;
    let (bob, _) = ctx.register("Bob").await;

    // Token claims admin, store says member
    let forged = token_for(alice.id, Role::Admin);
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/tasks",
            Some(&forged),
            Some(json!({ "title": "Ship it", "assigned_to": [bob.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_notifications_inbox_flow() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin_token();
    let (alice, alice_token) = ctx.register("Alice").await;
    let (bob, bob_token) = ctx.register("Bob").await;
    let (_, team) = ctx
        .send(
            "POST",
            "/v1/teams",
            Some(&admin),
            Some(json!({ "name": "platform", "members": [alice.id, bob.id] })),
        )
        .await;

    let (status, task) = ctx
        .send(
            "POST",
            "/v1/tasks",
            Some(&alice_token),
            Some(json!({ "title": "Plan sprint", "teams": [team["id"]] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, inbox) = ctx.send("GET", "/v1/notifications", Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let newest = &inbox[0];
    assert_eq!(newest["type"], "task_assigned");
    assert_eq!(newest["relatedTaskId"], task["id"]);
    assert_eq!(newest["read"], false);

    let id = newest["id"].as_str().unwrap().to_string();
    let (status, _) = ctx
        .send("PUT", &format!("/v1/notifications/{}/read", id), Some(&alice_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, marked) = ctx
        .send("PUT", &format!("/v1/notifications/{}/read", id), Some(&bob_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["read"], true);

    let (status, _) = ctx
        .send("DELETE", &format!("/v1/notifications/{}", id), Some(&bob_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, alice_inbox) = ctx.send("GET", "/v1/notifications", Some(&alice_token), None).await;
    assert!(alice_inbox
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["type"] != "task_assigned"));
}

#[tokio::test]
async fn test_task_crud_permissions() {
    let ctx = TestContext::new().await;
    let (_, alice_token) = ctx.register("Alice").await;
    let (_, bob_token) = ctx.register("Bob").await;

    let (status, task) = ctx
        .send(
            "POST",
            "/v1/tasks",
            Some(&alice_token),
            Some(json!({ "title": "Note to self" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/tasks/{}", task["id"].as_str().unwrap());

    let (status, _) = ctx.send("GET", &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = ctx
        .send(
            "PUT",
            &uri,
            Some(&alice_token),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "in-progress");

    let (status, _) = ctx.send("DELETE", &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = ctx.send("DELETE", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = ctx.send("GET", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_flag_endpoint() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin_token();
    let (alice, alice_token) = ctx.register("Alice").await;

    let uri = format!("/v1/admin/users/{}/admin", alice.id);
    let (status, _) = ctx
        .send("PUT", &uri, Some(&alice_token), Some(json!({ "admin": true })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = ctx
        .send("PUT", &uri, Some(&admin), Some(json!({ "admin": true })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "admin");
}

#[tokio::test]
async fn test_realtime_requires_upgrade_and_token() {
    let ctx = TestContext::new().await;
    let (status, _) = ctx
        .send("GET", "/v1/realtime?token=garbage", None, None)
        .await;
    assert!(status.is_client_error());
    assert_eq!(ctx.state.rooms.connection_count(), 0);
}

#[tokio::test]
async fn test_member_can_leave_team() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin_token();
    let (alice, _) = ctx.register("Alice").await;
    let (bob, bob_token) = ctx.register("Bob").await;
    let (_, team) = ctx
        .send(
            "POST",
            "/v1/teams",
            Some(&admin),
            Some(json!({ "name": "platform", "members": [alice.id, bob.id] })),
        )
        .await;
    let uri = format!("/v1/teams/{}/leave", team["id"].as_str().unwrap());

    let (status, team) = ctx.send("POST", &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["members"], json!([alice.id]));

    let (status, body) = ctx.send("POST", &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You are not a member of this team");
}
