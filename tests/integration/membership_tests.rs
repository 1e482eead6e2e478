//! Membership lifecycle: join requests, first-admin promotion, role changes
//! and organization cascades

use serde_json::{json, Value};

use crate::common::*;

fn roles_by_user(members: &[Value]) -> Vec<(String, String)> {
    let mut roles: Vec<_> = members
        .iter()
        .map(|m| {
            (
                m["userId"].as_str().unwrap().to_string(),
                m["role"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    roles.sort();
    roles
}

#[tokio::test]
async fn test_duplicate_pending_request_conflicts() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, token) = app.register("Ana Lima").await;

    app.request_join(&token, &org_id).await;

    let response = app
        .post_json_auth("/api/v1/requests", json!({ "orgId": org_id }), &token)
        .await;
    response.assert_conflict();
    assert_eq!(response.message(), "Request already pending");

    let requests: Vec<Value> = app
        .get_auth(&format!("/api/v1/requests?userId={}", user_id), &admin)
        .await
        .json();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["status"], "pending");
    assert_eq!(requests[0]["org"]["name"], "Chess Club");
}

#[tokio::test]
async fn test_request_for_unknown_org_is_not_found() {
    let app = TestApp::new().await;
    let (_, token) = app.register("Ana Lima").await;

    app.post_json_auth("/api/v1/requests", json!({ "orgId": "missing" }), &token)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_student_cannot_request_for_someone_else() {
    let app = TestApp::new().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (_, ana) = app.register("Ana Lima").await;
    let (bruno_id, _) = app.register("Bruno Costa").await;

    app.post_json_auth(
        "/api/v1/requests",
        json!({ "orgId": org_id, "userId": bruno_id }),
        &ana,
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_chess_club_first_and_second_member() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let chess = app.create_empty_org("Chess Club").await;
    let (u1, u1_token) = app.register("Ana Lima").await;
    let (u2, u2_token) = app.register("Bruno Costa").await;

    // First approved member of an org without admins becomes its admin
    let req1 = app.request_join(&u1_token, &chess).await;
    let resolved: Value = app
        .resolve_request(&admin, &req1, "approved")
        .await
        .json();
    assert_eq!(resolved["status"], "approved");

    let user1 = app.user(&admin, &u1).await;
    assert_eq!(user1["role"], "OrgAdmin");
    assert_eq!(user1["managedOrgs"], json!([chess]));

    // The new org admin resolves the next request with the token issued
    // before the promotion
    let req2 = app.request_join(&u2_token, &chess).await;
    app.resolve_request(&u1_token, &req2, "approved")
        .await
        .assert_ok();

    let user2 = app.user(&admin, &u2).await;
    assert_eq!(user2["role"], "Student");
    assert_eq!(user2["managedOrgs"], json!([]));

    let members = app.members(&admin, &chess).await;
    assert_eq!(
        roles_by_user(&members),
        {
            let mut expected = vec![
                (u1.clone(), "Admin".to_string()),
                (u2.clone(), "Member".to_string()),
            ];
            expected.sort();
            expected
        }
    );
}

#[tokio::test]
async fn test_approval_is_idempotent() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (_, token) = app.register("Ana Lima").await;

    let request_id = app.request_join(&token, &org_id).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();

    assert_eq!(app.members(&admin, &org_id).await.len(), 1);
}

#[tokio::test]
async fn test_rejection_admits_nobody() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, token) = app.register("Ana Lima").await;

    let request_id = app.request_join(&token, &org_id).await;
    let resolved: Value = app
        .resolve_request(&admin, &request_id, "rejected")
        .await
        .json();
    assert_eq!(resolved["status"], "rejected");

    assert!(app.members(&admin, &org_id).await.is_empty());
    assert_eq!(app.user(&admin, &user_id).await["role"], "Student");

    // A rejected user may ask again
    app.request_join(&token, &org_id).await;
}

#[tokio::test]
async fn test_resolve_rejects_unknown_decision() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (_, token) = app.register("Ana Lima").await;
    let request_id = app.request_join(&token, &org_id).await;

    app.resolve_request(&admin, &request_id, "accepted")
        .await
        .assert_bad_request();
    app.resolve_request(&admin, &request_id, "pending")
        .await
        .assert_bad_request();
}

#[tokio::test]
async fn test_students_cannot_resolve_requests() {
    let app = TestApp::new().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (_, ana) = app.register("Ana Lima").await;
    let (_, bruno) = app.register("Bruno Costa").await;
    let request_id = app.request_join(&ana, &org_id).await;

    app.resolve_request(&bruno, &request_id, "approved")
        .await
        .assert_forbidden();
    app.get_auth(&format!("/api/v1/requests/{}", request_id), &bruno)
        .await
        .assert_forbidden();

    // The requester can see and withdraw their own request
    app.get_auth(&format!("/api/v1/requests/{}", request_id), &ana)
        .await
        .assert_ok();
    app.delete_auth(&format!("/api/v1/requests/{}", request_id), &ana)
        .await
        .assert_no_content();
}

#[tokio::test]
async fn test_creator_bootstrap() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (creator, _) = app.register("Ana Lima").await;

    let org_id = app
        .create_org(&admin, "Robotics Society", Some(&creator))
        .await;

    let members = app.members(&admin, &org_id).await;
    assert_eq!(roles_by_user(&members), vec![(creator.clone(), "Admin".to_string())]);

    let user = app.user(&admin, &creator).await;
    assert_eq!(user["role"], "OrgAdmin");
    assert_eq!(user["managedOrgs"], json!([org_id]));
}

#[tokio::test]
async fn test_creator_defaults_to_calling_admin_who_stays_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let me: Value = app.get_auth("/api/v1/auth/me", &admin).await.json();

    let org_id = app.create_org(&admin, "Debate Team", None).await;

    let members = app.members(&admin, &org_id).await;
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["userId"], me["id"]);
    assert_eq!(members[0]["role"], "Admin");

    let me: Value = app.get_auth("/api/v1/auth/me", &admin).await.json();
    assert_eq!(me["role"], "Admin");
}

#[tokio::test]
async fn test_create_organization_requires_fields_and_admin() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student) = app.register("Ana Lima").await;

    app.post_json_auth(
        "/api/v1/organizations",
        organization_payload("Film Club"),
        &student,
    )
    .await
    .assert_forbidden();

    app.post_json_auth(
        "/api/v1/organizations",
        json!({ "name": "Film Club", "description": "Movies" }),
        &admin,
    )
    .await
    .assert_bad_request();
}

#[tokio::test]
async fn test_demotion_clears_management() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, token) = app.register("Ana Lima").await;

    let request_id = app.request_join(&token, &org_id).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();
    assert_eq!(app.user(&admin, &user_id).await["role"], "OrgAdmin");

    let demoted: Value = app
        .put_json_auth(
            &format!("/api/v1/users/{}/role", user_id),
            json!({ "role": "Student" }),
            &admin,
        )
        .await
        .json();
    assert_eq!(demoted["role"], "Student");
    assert_eq!(demoted["managedOrgs"], json!([]));

    assert!(app.members(&admin, &org_id).await.is_empty());

    // Authorization follows the stored role, not the one in the token
    app.get_auth(&format!("/api/v1/requests?orgId={}", org_id), &token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_promotion_creates_admin_membership() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, token) = app.register("Ana Lima").await;

    app.request_join(&token, &org_id).await;

    let promoted: Value = app
        .put_json_auth(
            &format!("/api/v1/users/{}/role", user_id),
            json!({ "role": "OrgAdmin", "orgId": org_id }),
            &admin,
        )
        .await
        .json();
    assert_eq!(promoted["role"], "OrgAdmin");
    assert_eq!(promoted["managedOrgs"], json!([org_id]));

    let members = app.members(&admin, &org_id).await;
    assert_eq!(roles_by_user(&members), vec![(user_id.clone(), "Admin".to_string())]);

    // The pending self-request became moot
    let requests: Vec<Value> = app
        .get_auth(&format!("/api/v1/requests?userId={}", user_id), &admin)
        .await
        .json();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_org_request_listing_excludes_members() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (ana_id, ana) = app.register("Ana Lima").await;
    let (bruno_id, bruno) = app.register("Bruno Costa").await;

    let ana_request = app.request_join(&ana, &org_id).await;
    app.request_join(&bruno, &org_id).await;
    app.resolve_request(&admin, &ana_request, "approved")
        .await
        .assert_ok();

    let requests: Vec<Value> = app
        .get_auth(&format!("/api/v1/requests?orgId={}", org_id), &admin)
        .await
        .json();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["userId"], bruno_id.as_str());
    assert_eq!(requests[0]["user"]["name"], "Bruno Costa");

    let pending: Vec<Value> = app
        .get_auth(
            &format!("/api/v1/requests?orgId={}&status=pending", org_id),
            &admin,
        )
        .await
        .json();
    assert!(pending.iter().all(|r| r["userId"] != ana_id.as_str()));
}

#[tokio::test]
async fn test_member_cannot_request_again() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, token) = app.register("Ana Lima").await;

    app.post_json_auth(
        &format!("/api/v1/organizations/{}/members", org_id),
        json!({ "userId": user_id }),
        &admin,
    )
    .await
    .assert_created();

    let response = app
        .post_json_auth("/api/v1/requests", json!({ "orgId": org_id }), &token)
        .await;
    response.assert_conflict();
    assert_eq!(response.message(), "Already a member");
}

#[tokio::test]
async fn test_member_editing_keeps_global_role() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, _) = app.register("Ana Lima").await;
    let member_uri = format!("/api/v1/organizations/{}/members/{}", org_id, user_id);

    let added: Value = app
        .post_json_auth(
            &format!("/api/v1/organizations/{}/members", org_id),
            json!({ "userId": user_id, "role": "Treasurer" }),
            &admin,
        )
        .await
        .json();
    assert_eq!(added["role"], "Treasurer");

    let edited: Value = app
        .put_json_auth(
            &member_uri,
            json!({ "role": "President", "showInLeaders": true, "quote": "Checkmate" }),
            &admin,
        )
        .await
        .json();
    assert_eq!(edited["role"], "President");
    assert_eq!(edited["showInLeaders"], true);
    assert_eq!(edited["quote"], "Checkmate");

    app.put_json_auth(&member_uri, json!({ "role": "  " }), &admin)
        .await
        .assert_bad_request();

    app.delete_auth(&member_uri, &admin)
        .await
        .assert_no_content();
    app.delete_auth(&member_uri, &admin)
        .await
        .assert_not_found();

    assert_eq!(app.user(&admin, &user_id).await["role"], "Student");
}

#[tokio::test]
async fn test_org_admin_scope_is_limited_to_managed_orgs() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let chess = app.create_empty_org("Chess Club").await;
    let debate = app.create_empty_org("Debate Team").await;
    let (_, token) = app.register("Ana Lima").await;

    let request_id = app.request_join(&token, &chess).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();

    app.get_auth(&format!("/api/v1/organizations/{}/members", chess), &token)
        .await
        .assert_ok();
    app.get_auth(&format!("/api/v1/organizations/{}/members", debate), &token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_organization_listing_and_user_view() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let chess = app.create_empty_org("Chess Club").await;
    app.create_empty_org("Art Society").await;
    let (user_id, token) = app.register("Ana Lima").await;

    let request_id = app.request_join(&token, &chess).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();

    let all: Vec<Value> = app.get_auth("/api/v1/organizations", &token).await.json();
    let names: Vec<_> = all.iter().map(|o| o["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Art Society", "Chess Club"]);
    assert_eq!(all[1]["_count"]["members"], 1);

    let mine: Vec<Value> = app
        .get_auth(&format!("/api/v1/organizations?userId={}", user_id), &token)
        .await
        .json();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["id"], chess.as_str());
}

#[tokio::test]
async fn test_delete_organization_cascades() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (user_id, ana) = app.register("Ana Lima").await;
    let (bruno_id, bruno) = app.register("Bruno Costa").await;

    let request_id = app.request_join(&ana, &org_id).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();
    app.request_join(&bruno, &org_id).await;

    app.delete_auth(&format!("/api/v1/organizations/{}", org_id), &ana)
        .await
        .assert_forbidden();
    app.delete_auth(&format!("/api/v1/organizations/{}", org_id), &admin)
        .await
        .assert_no_content();

    app.get_auth(&format!("/api/v1/organizations/{}", org_id), &admin)
        .await
        .assert_not_found();

    for id in [&user_id, &bruno_id] {
        let requests: Vec<Value> = app
            .get_auth(&format!("/api/v1/requests?userId={}", id), &admin)
            .await
            .json();
        assert!(requests.is_empty());
    }

    let mine: Vec<Value> = app
        .get_auth(&format!("/api/v1/organizations?userId={}", user_id), &admin)
        .await
        .json();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn test_approval_for_deleted_account_admits_nobody() {
    use orghub::db::{Collection, DocumentStore};

    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let org_id = app.create_empty_org("Chess Club").await;
    let (ana_id, ana) = app.register("Ana Lima").await;
    let (bruno_id, bruno) = app.register("Bruno Costa").await;

    let stale_request = app.request_join(&ana, &org_id).await;

    // Only the account goes; its request is left behind
    assert!(DocumentStore::new(&app.state.db)
        .delete(Collection::Users, &ana_id)
        .await
        .unwrap());

    app.resolve_request(&admin, &stale_request, "approved")
        .await
        .assert_not_found();
    assert!(app.members(&admin, &org_id).await.is_empty());

    let request: Value = app
        .get_auth(&format!("/api/v1/requests/{}", stale_request), &admin)
        .await
        .json();
    assert_eq!(request["status"], "pending");

    // The first-admin slot is still free for the next approved member
    let request_id = app.request_join(&bruno, &org_id).await;
    app.resolve_request(&admin, &request_id, "approved")
        .await
        .assert_ok();
    assert_eq!(
        roles_by_user(&app.members(&admin, &org_id).await),
        vec![(bruno_id.clone(), "Admin".to_string())]
    );
    assert_eq!(app.user(&admin, &bruno_id).await["role"], "OrgAdmin");
}
