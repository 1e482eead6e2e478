//! Organization content: activities, budgets, feedback and the feed

use serde_json::{json, Value};

use crate::common::*;

/// An org with `Ana Lima` as a plain member; returns `(org_id, admin, ana)`
async fn org_with_member(app: &TestApp) -> (String, String, String) {
    let admin = app.admin_token().await;
    let org_id = app.create_org(&admin, "Chess Club", None).await;
    let (ana_id, ana) = app.register("Ana Lima").await;
    app.post_json_auth(
        &format!("/api/v1/organizations/{}/members", org_id),
        json!({ "userId": ana_id }),
        &admin,
    )
    .await
    .assert_created();
    (org_id, admin, ana)
}

// ==================== Activities ====================

#[tokio::test]
async fn test_activities_lifecycle() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    app.post_json_auth(
        "/api/v1/activities",
        activity_payload(&org_id, "Simul", "2026-03-01"),
        &ana,
    )
    .await
    .assert_forbidden();

    for (title, date) in [("Simul", "2026-03-01"), ("Blitz Night", "2026-05-10")] {
        app.post_json_auth("/api/v1/activities", activity_payload(&org_id, title, date), &admin)
            .await
            .assert_created();
    }

    let activities: Vec<Value> = app
        .get_auth(&format!("/api/v1/activities?orgId={}", org_id), &ana)
        .await
        .json();
    let titles: Vec<_> = activities.iter().map(|a| a["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Blitz Night", "Simul"]);

    let id = activities[0]["id"].as_str().unwrap();
    let detail: Value = app
        .get_auth(&format!("/api/v1/activities/{}", id), &ana)
        .await
        .json();
    assert_eq!(detail["org"]["name"], "Chess Club");

    let updated: Value = app
        .put_json_auth(
            &format!("/api/v1/activities/{}", id),
            json!({ "title": "Blitz Marathon" }),
            &admin,
        )
        .await
        .json();
    assert_eq!(updated["title"], "Blitz Marathon");
    assert_eq!(updated["date"], "2026-05-10");

    app.delete_auth(&format!("/api/v1/activities/{}", id), &admin)
        .await
        .assert_no_content();
    app.get_auth(&format!("/api/v1/activities/{}", id), &admin)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_activity_requires_fields() {
    let app = TestApp::new().await;
    let (org_id, admin, _) = org_with_member(&app).await;

    app.post_json_auth(
        "/api/v1/activities",
        json!({ "orgId": org_id, "title": "No date" }),
        &admin,
    )
    .await
    .assert_bad_request();

    app.get_auth("/api/v1/activities", &admin)
        .await
        .assert_bad_request();
}

// ==================== Budgets ====================

#[tokio::test]
async fn test_budgets_are_admin_only() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    app.get_auth(&format!("/api/v1/budgets?orgId={}", org_id), &ana)
        .await
        .assert_forbidden();

    let budget: Value = app
        .post_json_auth("/api/v1/budgets", budget_payload(&org_id, "Travel", 500.0), &admin)
        .await
        .json();
    assert_eq!(budget["allocated"], 0.0);
    assert_eq!(budget["limit"], 500.0);

    app.post_json_auth("/api/v1/budgets", budget_payload(&org_id, "Equipment", -1.0), &admin)
        .await
        .assert_bad_request();

    let response = app
        .post_json_auth(
            "/api/v1/budgets",
            json!({ "orgId": org_id, "category": "Food" }),
            &admin,
        )
        .await;
    response.assert_bad_request();
    assert_eq!(response.message(), "Missing required fields: limit");

    app.post_json_auth("/api/v1/budgets", budget_payload(&org_id, "Equipment", 200.0), &admin)
        .await
        .assert_created();

    let budgets: Vec<Value> = app
        .get_auth(&format!("/api/v1/budgets?orgId={}", org_id), &admin)
        .await
        .json();
    let categories: Vec<_> = budgets.iter().map(|b| b["category"].as_str().unwrap()).collect();
    assert_eq!(categories, vec!["Equipment", "Travel"]);
}

// ==================== Feedback ====================

#[tokio::test]
async fn test_anonymous_feedback_hides_author() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    let created: Value = app
        .post_json_auth(
            "/api/v1/feedback",
            feedback_payload(&org_id, "More beginner sessions please", true),
            &ana,
        )
        .await
        .json();
    assert_eq!(created["status"], "pending");

    app.post_json_auth(
        "/api/v1/feedback",
        feedback_payload(&org_id, "Great tournament", false),
        &ana,
    )
    .await
    .assert_created();

    let feedback: Vec<Value> = app
        .get_auth(&format!("/api/v1/feedback?orgId={}", org_id), &admin)
        .await
        .json();
    assert_eq!(feedback.len(), 2);

    let anonymous = feedback.iter().find(|f| f["isAnonymous"] == true).unwrap();
    assert!(anonymous["user"].is_null());
    assert!(anonymous.get("userId").is_none());

    let signed = feedback.iter().find(|f| f["isAnonymous"] == false).unwrap();
    assert_eq!(signed["user"]["name"], "Ana Lima");

    // Members cannot read the org's feedback inbox
    app.get_auth(&format!("/api/v1/feedback?orgId={}", org_id), &ana)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_feedback_reply_marks_reviewed() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    let created: Value = app
        .post_json_auth(
            "/api/v1/feedback",
            feedback_payload(&org_id, "Need more boards", false),
            &ana,
        )
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let replied: Value = {
        let response = app
            .post_json_auth(
                &format!("/api/v1/feedback/{}/replies", id),
                json!({ "message": "Ordered five more" }),
                &admin,
            )
            .await;
        response.assert_created();
        response.json()
    };
    assert_eq!(replied["status"], "reviewed");
    assert_eq!(replied["replies"].as_array().unwrap().len(), 1);

    // The author can follow up on their own feedback
    let detail: Value = app
        .get_auth(&format!("/api/v1/feedback/{}", id), &ana)
        .await
        .json();
    assert_eq!(detail["replies"][0]["message"], "Ordered five more");

    app.put_json_auth(
        &format!("/api/v1/feedback/{}", id),
        json!({ "status": "archived" }),
        &admin,
    )
    .await
    .assert_bad_request();

    let resolved: Value = app
        .put_json_auth(
            &format!("/api/v1/feedback/{}", id),
            json!({ "status": "resolved" }),
            &admin,
        )
        .await
        .json();
    assert_eq!(resolved["status"], "resolved");
}

// ==================== Feed ====================

#[tokio::test]
async fn test_feed_is_members_only() {
    let app = TestApp::new().await;
    let (org_id, _, _) = org_with_member(&app).await;
    let (_, outsider) = app.register("Bruno Costa").await;

    app.get_auth(&format!("/api/v1/posts?orgId={}", org_id), &outsider)
        .await
        .assert_forbidden();
    app.post_json_auth("/api/v1/posts", post_payload(&org_id, "Hello"), &outsider)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_likes_and_comments() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    let post: Value = app
        .post_json_auth("/api/v1/posts", post_payload(&org_id, "Tournament on Friday"), &ana)
        .await
        .json();
    let post_id = post["id"].as_str().unwrap();

    app.post_json_auth(&format!("/api/v1/posts/{}/like", post_id), json!({}), &ana)
        .await
        .assert_created();
    let response = app
        .post_json_auth(&format!("/api/v1/posts/{}/like", post_id), json!({}), &ana)
        .await;
    response.assert_conflict();
    assert_eq!(response.message(), "Already liked");

    for n in 1..=4 {
        app.post_json_auth(
            &format!("/api/v1/posts/{}/comments", post_id),
            json!({ "content": format!("comment {}", n) }),
            &admin,
        )
        .await
        .assert_created();
    }

    let feed: Value = app
        .get_auth(&format!("/api/v1/posts?orgId={}", org_id), &ana)
        .await
        .json();
    assert_eq!(feed["pagination"]["total"], 1);
    let item = &feed["items"][0];
    assert_eq!(item["likes"], 1);
    assert_eq!(item["likedByMe"], true);
    assert_eq!(item["commentCount"], 4);
    assert_eq!(item["comments"].as_array().unwrap().len(), 3);
    assert_eq!(item["author"]["name"], "Ana Lima");

    let comments: Value = app
        .get_auth(
            &format!("/api/v1/posts/{}/comments?page=2&limit=3", post_id),
            &ana,
        )
        .await
        .json();
    assert_eq!(comments["items"].as_array().unwrap().len(), 1);
    assert_eq!(comments["pagination"]["totalPages"], 2);

    app.delete_auth(&format!("/api/v1/posts/{}/like", post_id), &ana)
        .await
        .assert_no_content();
    // Unliking twice is harmless
    app.delete_auth(&format!("/api/v1/posts/{}/like", post_id), &ana)
        .await
        .assert_no_content();

    let detail: Value = app
        .get_auth(&format!("/api/v1/posts/{}", post_id), &ana)
        .await
        .json();
    assert_eq!(detail["likes"], 0);
}

#[tokio::test]
async fn test_post_moderation_and_cascade() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;
    let (bruno_id, bruno) = app.register("Bruno Costa").await;
    app.post_json_auth(
        &format!("/api/v1/organizations/{}/members", org_id),
        json!({ "userId": bruno_id }),
        &admin,
    )
    .await
    .assert_created();

    let post: Value = app
        .post_json_auth("/api/v1/posts", post_payload(&org_id, "Board swap"), &ana)
        .await
        .json();
    let post_id = post["id"].as_str().unwrap();

    let comment: Value = app
        .post_json_auth(
            &format!("/api/v1/posts/{}/comments", post_id),
            json!({ "content": "I'm in" }),
            &bruno,
        )
        .await
        .json();
    let comment_id = comment["id"].as_str().unwrap();

    // Another member can neither edit the post nor delete someone else's comment
    app.put_json_auth(
        &format!("/api/v1/posts/{}", post_id),
        json!({ "content": "hijacked" }),
        &bruno,
    )
    .await
    .assert_forbidden();
    app.delete_auth(&format!("/api/v1/comments/{}", comment_id), &ana)
        .await
        .assert_forbidden();

    let edited: Value = app
        .put_json_auth(
            &format!("/api/v1/posts/{}", post_id),
            json!({ "content": "Board swap on Saturday" }),
            &ana,
        )
        .await
        .json();
    assert_eq!(edited["content"], "Board swap on Saturday");

    // The org admin removes the post along with its comments
    app.delete_auth(&format!("/api/v1/posts/{}", post_id), &admin)
        .await
        .assert_no_content();
    app.get_auth(&format!("/api/v1/posts/{}", post_id), &ana)
        .await
        .assert_not_found();
    app.delete_auth(&format!("/api/v1/comments/{}", comment_id), &bruno)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_organization_detail_collects_content() {
    let app = TestApp::new().await;
    let (org_id, admin, ana) = org_with_member(&app).await;

    app.post_json_auth(
        "/api/v1/activities",
        activity_payload(&org_id, "Simul", "2026-03-01"),
        &admin,
    )
    .await
    .assert_created();
    app.post_json_auth("/api/v1/budgets", budget_payload(&org_id, "Travel", 300.0), &admin)
        .await
        .assert_created();

    let detail: Value = app
        .get_auth(&format!("/api/v1/organizations/{}", org_id), &ana)
        .await
        .json();
    assert_eq!(detail["name"], "Chess Club");
    assert_eq!(detail["members"].as_array().unwrap().len(), 2);
    assert_eq!(detail["activities"].as_array().unwrap().len(), 1);
    assert_eq!(detail["budgets"].as_array().unwrap().len(), 1);
}
