//! Organization read models and profile edits

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use super::membership::user_summaries;
use crate::db::{
    document_store::CREATED_AT, Collection, DbPool, DocumentStore, Fields, Query, SortOrder,
};
use crate::models::{
    Activity, Budget, Feedback, FeedbackReplyWithUser, FeedbackWithUsers, JoinRequest,
    JoinRequestWithUser, Member, MemberWithUser, Organization, OrganizationCounts, OrganizationDetail,
    OrganizationListItem, UpdateOrganizationRequest, User, UserOrganization, CBL_FILE_NAME,
};
use crate::utils::validation::{accept_image, is_pdf_data_url};
use crate::utils::{AppError, AppResult};

pub struct OrganizationService {
    pool: DbPool,
}

impl OrganizationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn store(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.pool)
    }

    pub async fn get(&self, org_id: &str) -> AppResult<Organization> {
        self.store()
            .find::<Organization>(Collection::Organizations, org_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))
    }

    /// Every organization by name, with member and activity counts
    pub async fn list_with_counts(&self) -> AppResult<Vec<OrganizationListItem>> {
        let store = self.store();
        let orgs = store
            .query_as::<Organization>(
                Collection::Organizations,
                &Query::new().order_by("name", SortOrder::Asc),
            )
            .await?;

        let members = count_by_org(&store, Collection::Members).await?;
        let activities = count_by_org(&store, Collection::Activities).await?;

        Ok(orgs
            .into_iter()
            .map(|organization| {
                let count = OrganizationCounts {
                    members: members.get(&organization.id).copied().unwrap_or(0),
                    activities: activities.get(&organization.id).copied().unwrap_or(0),
                };
                OrganizationListItem {
                    organization,
                    count,
                }
            })
            .collect())
    }

    /// Organizations the user is a member of or manages, with the number of
    /// pending join requests where there are any
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<UserOrganization>> {
        let store = self.store();
        let Some(user) = store.find::<User>(Collection::Users, user_id).await? else {
            return Ok(Vec::new());
        };

        let mut org_ids: Vec<String> = store
            .query_as::<Member>(Collection::Members, &Query::new().eq("userId", user_id))
            .await?
            .into_iter()
            .map(|m| m.org_id)
            .collect();
        org_ids.extend(user.managed_orgs.iter().cloned());
        let mut seen = HashSet::new();
        org_ids.retain(|id| seen.insert(id.clone()));

        let mut orgs = Vec::with_capacity(org_ids.len());
        for doc in store.get_many(Collection::Organizations, &org_ids).await? {
            let organization: Organization = doc.decode()?;
            let pending = store
                .count(
                    Collection::JoinRequests,
                    &Query::new()
                        .eq("orgId", organization.id.as_str())
                        .eq("status", "pending"),
                )
                .await?;
            orgs.push(UserOrganization {
                organization,
                pending_requests: (pending > 0).then_some(pending),
            });
        }

        orgs.sort_by(|a, b| a.organization.name.cmp(&b.organization.name));
        Ok(orgs)
    }

    /// The organization with members, activities, budgets, feedback and the
    /// join requests of users who are not yet members
    pub async fn detail(&self, org_id: &str) -> AppResult<OrganizationDetail> {
        let organization = self.get(org_id).await?;
        let store = self.store();
        let by_org = || Query::new().eq("orgId", org_id);

        let members = store
            .query_as::<Member>(
                Collection::Members,
                &by_org().order_by("joinedDate", SortOrder::Desc),
            )
            .await?;
        let activities = store
            .query_as::<Activity>(
                Collection::Activities,
                &by_org().order_by("date", SortOrder::Desc),
            )
            .await?;
        let budgets = store
            .query_as::<Budget>(
                Collection::Budgets,
                &by_org().order_by("category", SortOrder::Asc),
            )
            .await?;
        let feedback = store
            .query_as::<Feedback>(
                Collection::Feedback,
                &by_org().order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;
        let requests = store
            .query_as::<JoinRequest>(
                Collection::JoinRequests,
                &by_org().order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;

        let member_ids: HashSet<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
        let requests: Vec<JoinRequest> = requests
            .into_iter()
            .filter(|r| !member_ids.contains(r.user_id.as_str()))
            .collect();

        let mut user_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
        user_ids.extend(requests.iter().map(|r| r.user_id.clone()));
        let users = user_summaries(&store, user_ids).await?;

        let members = members
            .into_iter()
            .map(|member| MemberWithUser {
                user: users.get(&member.user_id).cloned(),
                member,
            })
            .collect();
        let requests = requests
            .into_iter()
            .map(|request| JoinRequestWithUser {
                user: users.get(&request.user_id).cloned(),
                request,
            })
            .collect();
        let feedback = feedback_with_users(&store, feedback).await?;

        Ok(OrganizationDetail {
            organization,
            members,
            activities,
            budgets,
            feedback,
            requests,
        })
    }

    /// Partial update of the organization profile
    pub async fn update(
        &self,
        org_id: &str,
        req: &UpdateOrganizationRequest,
    ) -> AppResult<Organization> {
        self.get(org_id).await?;

        let mut fields = Fields::new();
        for (key, value) in [
            ("name", &req.name),
            ("description", &req.description),
            ("mission", &req.mission),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(AppError::validation(format!("{} cannot be empty", key)));
                }
                fields.insert(key.to_string(), Value::from(value.as_str()));
            }
        }

        for (key, value) in [("logo", &req.logo), ("cover", &req.cover)] {
            if let Some(value) = value {
                let value = if value.trim().is_empty() {
                    Value::Null
                } else {
                    accept_image(Some(value.as_str()))
                        .map(Value::from)
                        .ok_or_else(|| {
                            AppError::validation(format!("{} must be a data URL or http(s) URL", key))
                        })?
                };
                fields.insert(key.to_string(), value);
            }
        }

        if let Some(ref data) = req.collection_data {
            fields.insert(
                "collectionData".to_string(),
                serde_json::to_value(data).map_err(|e| AppError::internal(e.to_string()))?,
            );
        }

        if let Some(ref cbl) = req.cbl_data {
            let value = if cbl.is_empty() {
                Value::Null
            } else if is_pdf_data_url(cbl) {
                json!({
                    "data": cbl,
                    "fileName": CBL_FILE_NAME,
                    "uploadedAt": Utc::now(),
                })
            } else {
                return Err(AppError::validation("CBL file must be in PDF format only"));
            };
            fields.insert("cbl".to_string(), value);
        }

        let org: Organization = self
            .store()
            .update(Collection::Organizations, org_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))?
            .decode()?;

        info!(org_id = %org_id, "Organization updated");
        Ok(org)
    }
}

async fn count_by_org(
    store: &DocumentStore<'_>,
    collection: Collection,
) -> AppResult<HashMap<String, usize>> {
    let mut counts = HashMap::new();
    for doc in store.get_all(collection).await? {
        if let Some(org_id) = doc.get_str("orgId") {
            *counts.entry(org_id.to_string()).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Resolve feedback authors and reply authors. Anonymous feedback is
/// returned without its author.
pub async fn feedback_with_users(
    store: &DocumentStore<'_>,
    feedback: Vec<Feedback>,
) -> AppResult<Vec<FeedbackWithUsers>> {
    let mut ids: Vec<String> = Vec::new();
    for item in &feedback {
        if !item.is_anonymous {
            ids.push(item.user_id.clone());
        }
        ids.extend(item.replies.iter().map(|r| r.user_id.clone()));
    }
    let users = user_summaries(store, ids).await?;

    Ok(feedback
        .into_iter()
        .map(|item| {
            let (user_id, user) = if item.is_anonymous {
                (None, None)
            } else {
                let user = users.get(&item.user_id).cloned();
                (Some(item.user_id), user)
            };
            FeedbackWithUsers {
                id: item.id,
                org_id: item.org_id,
                user_id,
                message: item.message,
                status: item.status,
                is_anonymous: item.is_anonymous,
                user,
                replies: item
                    .replies
                    .into_iter()
                    .map(|reply| FeedbackReplyWithUser {
                        user: users.get(&reply.user_id).cloned(),
                        reply,
                    })
                    .collect(),
                created_at: item.created_at,
            }
        })
        .collect())
}
