//! Membership and role state machine
//!
//! Owns every write that links users to organizations: join requests,
//! member records, the global `OrgAdmin` role and the `managedOrgs` set.
//!
//! Multi-document sequences are applied one write at a time and are not
//! rolled back when a later step fails. The "does this org already have an
//! admin" decision is serialized per organization through [`OrgLocks`].

use std::collections::{HashMap, HashSet};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::org_locks::OrgLocks;
use crate::db::{
    document_store::CREATED_AT, to_fields, Collection, DbPool, DocumentStore, Fields, Query,
    SortOrder,
};
use crate::models::{
    CreateOrganizationRequest, JoinRequest, JoinRequestDetail, JoinRequestWithOrg,
    JoinRequestWithUser, ManagedOrgs, Member, Organization, OrganizationSummary,
    RequestStatus, Role, UpdateMemberRequest, User, UserSummary, ADMIN_ROLE, MEMBER_ROLE,
};
use crate::utils::validation::{accept_image, require_all};
use crate::utils::{AppError, AppResult};

pub struct MembershipService {
    pool: DbPool,
    locks: OrgLocks,
}

impl MembershipService {
    pub fn new(pool: DbPool, locks: OrgLocks) -> Self {
        Self { pool, locks }
    }

    fn store(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.pool)
    }

    async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.store()
            .find::<User>(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    async fn get_org(&self, org_id: &str) -> AppResult<Organization> {
        self.store()
            .find::<Organization>(Collection::Organizations, org_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))
    }

    /// The member record for `(user_id, org_id)`, if any
    pub async fn find_member(&self, org_id: &str, user_id: &str) -> AppResult<Option<Member>> {
        let members = self
            .store()
            .query_as::<Member>(
                Collection::Members,
                &Query::new().eq("orgId", org_id).eq("userId", user_id),
            )
            .await?;
        Ok(members.into_iter().next())
    }

    async fn requests_for(&self, user_id: &str, org_id: &str) -> AppResult<Vec<JoinRequest>> {
        Ok(self
            .store()
            .query_as::<JoinRequest>(
                Collection::JoinRequests,
                &Query::new().eq("userId", user_id).eq("orgId", org_id),
            )
            .await?)
    }

    async fn delete_requests_for(&self, user_id: &str, org_id: &str) -> AppResult<usize> {
        Ok(self
            .store()
            .delete_where(
                Collection::JoinRequests,
                &Query::new().eq("userId", user_id).eq("orgId", org_id),
            )
            .await?)
    }

    async fn insert_member(&self, user_id: &str, org_id: &str, role: &str) -> AppResult<Member> {
        let member = Member::new(user_id, org_id, role);
        let doc = self
            .store()
            .insert(Collection::Members, &member, None)
            .await?;
        Ok(doc.decode()?)
    }

    /// Give `user_id` management of `org_id`: add it to managedOrgs and raise
    /// a Student to OrgAdmin. A system Admin keeps the Admin role.
    async fn grant_management(&self, user_id: &str, org_id: &str) -> AppResult<()> {
        let mut user = self.get_user(user_id).await?;

        let added = user.managed_orgs.insert(org_id);
        // Never a demotion: Admin outranks OrgAdmin, so only lower roles move
        let role = match user.role {
            Role::Admin => Role::Admin,
            _ => Role::OrgAdmin,
        };

        if added || role != user.role {
            let fields = to_fields(&json!({
                "role": role,
                "managedOrgs": user.managed_orgs,
            }))?;
            self.store()
                .update(Collection::Users, user_id, fields)
                .await?;
            info!(user_id = %user_id, org_id = %org_id, role = %role, "Granted organization management");
        }

        Ok(())
    }

    /// Ensure the user holds an Admin member record in the org
    async fn ensure_admin_membership(&self, user_id: &str, org_id: &str) -> AppResult<()> {
        let _guard = self.locks.lock(org_id).await;

        match self.find_member(org_id, user_id).await? {
            None => {
                self.insert_member(user_id, org_id, ADMIN_ROLE).await?;
                debug!(user_id = %user_id, org_id = %org_id, "Created admin membership");
            }
            Some(member) if !member.is_admin() => {
                let fields = to_fields(&json!({ "role": ADMIN_ROLE }))?;
                self.store()
                    .update(Collection::Members, &member.id, fields)
                    .await?;
                debug!(user_id = %user_id, org_id = %org_id, "Upgraded membership to admin");
            }
            Some(_) => {}
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Join requests
    // ------------------------------------------------------------------

    /// File a pending request for `user_id` to join `org_id`
    pub async fn request_join(&self, user_id: &str, org_id: &str) -> AppResult<JoinRequest> {
        require_all(&[("userId", user_id), ("orgId", org_id)])?;
        self.get_user(user_id).await?;
        self.get_org(org_id).await?;

        let _guard = self.locks.lock(org_id).await;

        let existing = self.requests_for(user_id, org_id).await?;
        if existing.iter().any(|r| r.status == RequestStatus::Pending) {
            return Err(AppError::conflict("Request already pending"));
        }
        if existing.iter().any(|r| r.status == RequestStatus::Approved)
            || self.find_member(org_id, user_id).await?.is_some()
        {
            return Err(AppError::conflict("Already a member"));
        }

        let doc = self
            .store()
            .insert(
                Collection::JoinRequests,
                &JoinRequest::pending(user_id, org_id),
                None,
            )
            .await?;

        info!(user_id = %user_id, org_id = %org_id, request_id = %doc.id, "Join request created");
        Ok(doc.decode()?)
    }

    /// Approve or reject a join request
    ///
    /// Approval admits the user: the first member admitted into an org with
    /// no Admin member becomes its Admin and gains management of it.
    pub async fn resolve_join_request(
        &self,
        request_id: &str,
        decision: &str,
    ) -> AppResult<JoinRequest> {
        let status = decision
            .parse::<RequestStatus>()
            .map_err(AppError::Validation)?;
        if status == RequestStatus::Pending {
            return Err(AppError::validation(
                "Decision must be either approved or rejected",
            ));
        }

        let request = self.get_request(request_id).await?;
        if status == RequestStatus::Approved {
            self.get_user(&request.user_id).await?;
        }

        let fields = to_fields(&json!({ "status": status }))?;
        let updated = self
            .store()
            .update(Collection::JoinRequests, request_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Request not found"))?
            .decode::<JoinRequest>()?;

        info!(request_id = %request_id, status = %status.as_str(), "Join request resolved");

        if status == RequestStatus::Rejected {
            return Ok(updated);
        }

        let role = {
            let _guard = self.locks.lock(&request.org_id).await;

            if self
                .find_member(&request.org_id, &request.user_id)
                .await?
                .is_some()
            {
                debug!(request_id = %request_id, "User already a member, nothing to admit");
                return Ok(updated);
            }

            // The account may have been deleted since the status was written
            if self
                .store()
                .get_by_id(Collection::Users, &request.user_id)
                .await?
                .is_none()
            {
                warn!(request_id = %request_id, user_id = %request.user_id, "Requester no longer exists, not admitted");
                return Err(AppError::not_found("User not found"));
            }

            let has_admin = self
                .store()
                .query_as::<Member>(
                    Collection::Members,
                    &Query::new().eq("orgId", request.org_id.as_str()),
                )
                .await?
                .iter()
                .any(Member::is_admin);

            let role = if has_admin { MEMBER_ROLE } else { ADMIN_ROLE };
            self.insert_member(&request.user_id, &request.org_id, role)
                .await?;
            role
        };

        info!(
            user_id = %request.user_id,
            org_id = %request.org_id,
            role = %role,
            "Member admitted"
        );

        if role == ADMIN_ROLE {
            self.grant_management(&request.user_id, &request.org_id)
                .await?;
        }

        Ok(updated)
    }

    pub async fn get_request(&self, request_id: &str) -> AppResult<JoinRequest> {
        self.store()
            .find::<JoinRequest>(Collection::JoinRequests, request_id)
            .await?
            .ok_or_else(|| AppError::not_found("Request not found"))
    }

    /// A request with its user and organization resolved
    pub async fn request_detail(&self, request_id: &str) -> AppResult<JoinRequestDetail> {
        let request = self.get_request(request_id).await?;
        let user = self
            .store()
            .find::<User>(Collection::Users, &request.user_id)
            .await?
            .map(|u| UserSummary::from(&u));
        let org = self
            .store()
            .find::<Organization>(Collection::Organizations, &request.org_id)
            .await?
            .map(|o| OrganizationSummary::from(&o));

        Ok(JoinRequestDetail { request, user, org })
    }

    pub async fn delete_request(&self, request_id: &str) -> AppResult<()> {
        if !self
            .store()
            .delete(Collection::JoinRequests, request_id)
            .await?
        {
            return Err(AppError::not_found("Request not found"));
        }
        Ok(())
    }

    /// Requests for an organization, newest first, excluding users who
    /// already hold a member record there.
    pub async fn list_org_requests(
        &self,
        org_id: &str,
        status: Option<&str>,
    ) -> AppResult<Vec<JoinRequestWithUser>> {
        let mut query = Query::new().eq("orgId", org_id);
        if let Some(status) = status {
            let status = status
                .parse::<RequestStatus>()
                .map_err(AppError::Validation)?;
            query = query.eq("status", status.as_str());
        }
        query = query.order_by(CREATED_AT, SortOrder::Desc);

        let members: HashSet<String> = self
            .store()
            .query_as::<Member>(Collection::Members, &Query::new().eq("orgId", org_id))
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        let requests: Vec<JoinRequest> = self
            .store()
            .query_as::<JoinRequest>(Collection::JoinRequests, &query)
            .await?
            .into_iter()
            .filter(|r| !members.contains(&r.user_id))
            .collect();

        let users = user_summaries(
            &self.store(),
            requests.iter().map(|r| r.user_id.clone()).collect(),
        )
        .await?;

        Ok(requests
            .into_iter()
            .map(|request| JoinRequestWithUser {
                user: users.get(&request.user_id).cloned(),
                request,
            })
            .collect())
    }

    /// All of a user's requests, newest first, with their organizations
    pub async fn list_user_requests(&self, user_id: &str) -> AppResult<Vec<JoinRequestWithOrg>> {
        let requests = self
            .store()
            .query_as::<JoinRequest>(
                Collection::JoinRequests,
                &Query::new()
                    .eq("userId", user_id)
                    .order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;

        let org_ids: Vec<String> = requests.iter().map(|r| r.org_id.clone()).collect();
        let orgs: HashMap<String, OrganizationSummary> = self
            .store()
            .get_many(Collection::Organizations, &dedup(org_ids))
            .await?
            .iter()
            .map(|doc| doc.decode::<Organization>())
            .collect::<anyhow::Result<Vec<_>>>()?
            .iter()
            .map(|org| (org.id.clone(), OrganizationSummary::from(org)))
            .collect();

        Ok(requests
            .into_iter()
            .map(|request| JoinRequestWithOrg {
                org: orgs.get(&request.org_id).cloned(),
                request,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Organizations
    // ------------------------------------------------------------------

    /// Create an organization. With a creator, the creator becomes its Admin
    /// member and manager, and any of their requests for it are dropped.
    pub async fn create_organization(
        &self,
        req: &CreateOrganizationRequest,
        creator_id: Option<&str>,
    ) -> AppResult<Organization> {
        require_all(&[
            ("name", &req.name),
            ("description", &req.description),
            ("mission", &req.mission),
        ])?;

        if let Some(creator_id) = creator_id {
            self.get_user(creator_id).await?;
        }

        let org = Organization {
            id: String::new(),
            name: req.name.trim().to_string(),
            description: req.description.clone(),
            mission: req.mission.clone(),
            logo: accept_image(req.logo.as_deref()),
            cover: accept_image(req.cover.as_deref()),
            collection_data: None,
            cbl: None,
            created_at: None,
            updated_at: None,
        };

        let org: Organization = self
            .store()
            .insert(Collection::Organizations, &org, None)
            .await?
            .decode()?;

        info!(org_id = %org.id, name = %org.name, "Organization created");

        if let Some(creator_id) = creator_id {
            self.insert_member(creator_id, &org.id, ADMIN_ROLE).await?;
            self.grant_management(creator_id, &org.id).await?;
            let dropped = self.delete_requests_for(creator_id, &org.id).await?;
            debug!(org_id = %org.id, creator_id = %creator_id, dropped, "Creator bootstrapped");
        }

        Ok(org)
    }

    /// Delete an organization together with its members and join requests
    pub async fn delete_organization(&self, org_id: &str) -> AppResult<()> {
        self.get_org(org_id).await?;

        let store = self.store();
        let members = store
            .delete_where(Collection::Members, &Query::new().eq("orgId", org_id))
            .await?;
        let requests = store
            .delete_where(Collection::JoinRequests, &Query::new().eq("orgId", org_id))
            .await?;
        store.delete(Collection::Organizations, org_id).await?;

        info!(org_id = %org_id, members, requests, "Organization deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Change a user's global role
    ///
    /// Promotion to OrgAdmin (optionally for one org) makes the user an
    /// Admin member of every org they manage. Any other role clears
    /// managedOrgs and removes all of the user's Admin member records.
    pub async fn set_user_role(
        &self,
        user_id: &str,
        new_role: &str,
        org_id: Option<&str>,
    ) -> AppResult<User> {
        let role = new_role
            .parse::<Role>()
            .map_err(|_| AppError::validation("Invalid role"))?;
        let mut user = self.get_user(user_id).await?;
        let org_id = org_id.map(str::trim).filter(|id| !id.is_empty());

        match (role, org_id) {
            (Role::OrgAdmin, Some(org_id)) => {
                self.get_org(org_id).await?;
                user.managed_orgs.insert(org_id);
            }
            (Role::OrgAdmin, None) => {}
            _ => user.managed_orgs.clear(),
        }
        user.role = role;

        let fields = to_fields(&json!({
            "role": role,
            "managedOrgs": user.managed_orgs,
        }))?;
        let user: User = self
            .store()
            .update(Collection::Users, user_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?
            .decode()?;

        info!(user_id = %user_id, role = %role, managed = user.managed_orgs.len(), "User role changed");

        if role == Role::OrgAdmin {
            for org_id in user.managed_orgs.iter() {
                if self
                    .store()
                    .get_by_id(Collection::Organizations, org_id)
                    .await?
                    .is_none()
                {
                    warn!(user_id = %user_id, org_id = %org_id, "Skipping managed org that no longer exists");
                    continue;
                }
                self.ensure_admin_membership(user_id, org_id).await?;
                self.delete_requests_for(user_id, org_id).await?;
            }
        } else {
            self.drop_admin_memberships(user_id, &user.managed_orgs)
                .await?;
        }

        Ok(user)
    }

    async fn drop_admin_memberships(&self, user_id: &str, retained: &ManagedOrgs) -> AppResult<()> {
        let members = self
            .store()
            .query_as::<Member>(Collection::Members, &Query::new().eq("userId", user_id))
            .await?;

        for member in members
            .iter()
            .filter(|m| m.is_admin() && !retained.contains(&m.org_id))
        {
            self.store()
                .delete(Collection::Members, &member.id)
                .await?;
            debug!(user_id = %user_id, org_id = %member.org_id, "Removed admin membership");
        }

        Ok(())
    }

    /// Delete a user together with their memberships and join requests
    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        self.get_user(user_id).await?;

        let store = self.store();
        let members = store
            .delete_where(Collection::Members, &Query::new().eq("userId", user_id))
            .await?;
        store
            .delete_where(Collection::JoinRequests, &Query::new().eq("userId", user_id))
            .await?;
        store.delete(Collection::Users, user_id).await?;

        info!(user_id = %user_id, members, "User deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Add a member, or overwrite the role of an existing one. Global roles
    /// are left alone.
    pub async fn add_or_update_member(
        &self,
        org_id: &str,
        user_id: &str,
        role: Option<&str>,
    ) -> AppResult<Member> {
        let role = role.map(str::trim).unwrap_or(MEMBER_ROLE);
        require_all(&[("userId", user_id), ("role", role)])?;
        self.get_org(org_id).await?;
        self.get_user(user_id).await?;

        let _guard = self.locks.lock(org_id).await;

        match self.find_member(org_id, user_id).await? {
            Some(member) => {
                let fields = to_fields(&json!({ "role": role }))?;
                Ok(self
                    .store()
                    .update(Collection::Members, &member.id, fields)
                    .await?
                    .ok_or_else(|| AppError::not_found("Member not found"))?
                    .decode()?)
            }
            None => {
                let member = self.insert_member(user_id, org_id, role).await?;
                info!(user_id = %user_id, org_id = %org_id, role = %role, "Member added");
                Ok(member)
            }
        }
    }

    /// Edit a member's role title, leader flag or quote
    pub async fn change_member_role(
        &self,
        org_id: &str,
        user_id: &str,
        update: &UpdateMemberRequest,
    ) -> AppResult<Member> {
        let member = self
            .find_member(org_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Member not found"))?;

        let mut fields = Fields::new();
        if let Some(ref role) = update.role {
            let role = role.trim();
            if role.is_empty() {
                return Err(AppError::validation("Role cannot be empty"));
            }
            fields.insert("role".to_string(), Value::from(role));
        }
        if let Some(show) = update.show_in_leaders {
            fields.insert("showInLeaders".to_string(), Value::from(show));
        }
        if let Some(ref quote) = update.quote {
            let value = if quote.trim().is_empty() {
                Value::Null
            } else {
                Value::from(quote.as_str())
            };
            fields.insert("quote".to_string(), value);
        }

        Ok(self
            .store()
            .update(Collection::Members, &member.id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Member not found"))?
            .decode()?)
    }

    /// Remove a member record. The user's global role and managedOrgs are
    /// not touched.
    pub async fn remove_member(&self, org_id: &str, user_id: &str) -> AppResult<()> {
        let member = self
            .find_member(org_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("Member not found"))?;

        self.store()
            .delete(Collection::Members, &member.id)
            .await?;

        info!(user_id = %user_id, org_id = %org_id, "Member removed");
        Ok(())
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Resolve user summaries for a batch of ids
pub async fn user_summaries(
    store: &DocumentStore<'_>,
    ids: Vec<String>,
) -> AppResult<HashMap<String, UserSummary>> {
    let docs = store.get_many(Collection::Users, &dedup(ids)).await?;
    let mut users = HashMap::with_capacity(docs.len());
    for doc in docs {
        let user: User = doc.decode()?;
        users.insert(user.id.clone(), UserSummary::from(&user));
    }
    Ok(users)
}
