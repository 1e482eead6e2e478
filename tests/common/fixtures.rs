//! Request payload fixtures

use serde_json::{json, Value};

/// A complete organization creation body
pub fn organization_payload(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{} brings students together", name),
        "mission": format!("Grow the {} community on campus", name),
    })
}

pub fn activity_payload(org_id: &str, title: &str, date: &str) -> Value {
    json!({
        "orgId": org_id,
        "title": title,
        "date": date,
        "description": format!("{} for all members", title),
    })
}

pub fn budget_payload(org_id: &str, category: &str, limit: f64) -> Value {
    json!({
        "orgId": org_id,
        "category": category,
        "limit": limit,
    })
}

pub fn feedback_payload(org_id: &str, message: &str, anonymous: bool) -> Value {
    json!({
        "orgId": org_id,
        "message": message,
        "isAnonymous": anonymous,
    })
}

pub fn post_payload(org_id: &str, content: &str) -> Value {
    json!({
        "orgId": org_id,
        "content": content,
    })
}
