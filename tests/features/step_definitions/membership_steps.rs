//! Join request and organization role step definitions

use cucumber::{given, then, when};

use orghub::models::{RequestStatus, Role};

use crate::features::support::TestWorld;

// ==================== Given ====================

#[given(expr = "an organization {string} with no members")]
async fn organization_without_members(world: &mut TestWorld, name: String) {
    world.add_organization(&name, None).await;
}

#[given(expr = "{string} has requested to join {string}")]
async fn has_requested(world: &mut TestWorld, user: String, org: String) {
    world
        .request_join(&user, &org)
        .await
        .expect("Join request should be accepted");
}

#[given(expr = "{string} is an approved member of {string}")]
async fn approved_member(world: &mut TestWorld, user: String, org: String) {
    world
        .request_join(&user, &org)
        .await
        .expect("Join request should be accepted");
    resolve(world, &user, &org, "approved").await;
}

// ==================== When ====================

#[when(expr = "{string} requests to join {string}")]
async fn requests_to_join(world: &mut TestWorld, user: String, org: String) {
    world.request_join(&user, &org).await;
}

#[when(expr = "the request from {string} to {string} is {string}")]
async fn request_is_resolved(world: &mut TestWorld, user: String, org: String, decision: String) {
    resolve(world, &user, &org, &decision).await;
}

#[when(expr = "an administrator creates {string} with creator {string}")]
async fn admin_creates_with_creator(world: &mut TestWorld, org: String, creator: String) {
    world.add_organization(&org, Some(&creator)).await;
}

#[when(expr = "the global role of {string} is set to {string}")]
async fn global_role_set(world: &mut TestWorld, user: String, role: String) {
    let user_id = world.user_id(&user);
    world
        .membership()
        .set_user_role(&user_id, &role, None)
        .await
        .expect("Role change should succeed");
}

async fn resolve(world: &mut TestWorld, user: &str, org: &str, decision: &str) {
    let request_id = world.request_id(user, org);
    match world
        .membership()
        .resolve_join_request(&request_id, decision)
        .await
    {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e),
    }
}

// ==================== Then ====================

#[then(expr = "the request from {string} to {string} is {string}")]
async fn request_status(world: &mut TestWorld, user: String, org: String, status: String) {
    let request = world
        .membership()
        .get_request(&world.request_id(&user, &org))
        .await
        .expect("Request should exist");
    let expected: RequestStatus = status.parse().expect("Unknown request status");
    assert_eq!(request.status, expected);
}

#[then(expr = "{string} has {int} join request(s) for {string}")]
async fn request_count(world: &mut TestWorld, user: String, count: usize, org: String) {
    let org_id = world.org_id(&org);
    let requests = world
        .membership()
        .list_user_requests(&world.user_id(&user))
        .await
        .expect("Listing requests should succeed");
    let matching = requests
        .iter()
        .filter(|r| r.request.org_id == org_id)
        .count();
    assert_eq!(matching, count);
}

#[then(expr = "{string} is a(n) {string} member of {string}")]
async fn member_with_role(world: &mut TestWorld, user: String, role: String, org: String) {
    let member = world
        .membership()
        .find_member(&world.org_id(&org), &world.user_id(&user))
        .await
        .expect("Member lookup should succeed")
        .unwrap_or_else(|| panic!("{} is not a member of {}", user, org));
    assert_eq!(member.role, role);
}

#[then(expr = "{string} is not a member of {string}")]
async fn not_a_member(world: &mut TestWorld, user: String, org: String) {
    let member = world
        .membership()
        .find_member(&world.org_id(&org), &world.user_id(&user))
        .await
        .expect("Member lookup should succeed");
    assert!(member.is_none(), "{} should not be a member of {}", user, org);
}

#[then(expr = "{string} has {int} member(s)")]
async fn member_count(world: &mut TestWorld, org: String, count: usize) {
    let org_id = world.org_id(&org);
    let members = orghub::services::authorization::org_members(world.pool(), &org_id)
        .await
        .expect("Member listing should succeed");
    assert_eq!(members.len(), count);
}

#[then(expr = "{string} has the global role {string}")]
async fn global_role(world: &mut TestWorld, user: String, role: String) {
    let expected: Role = role.parse().expect("Unknown role");
    assert_eq!(world.user(&user).await.role, expected);
}

#[then(expr = "{string} manages {string}")]
async fn manages(world: &mut TestWorld, user: String, org: String) {
    let org_id = world.org_id(&org);
    assert!(world.user(&user).await.managed_orgs.contains(&org_id));
}

#[then(expr = "{string} manages no organizations")]
async fn manages_nothing(world: &mut TestWorld, user: String) {
    assert!(world.user(&user).await.managed_orgs.is_empty());
}
