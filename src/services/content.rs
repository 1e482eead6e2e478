//! Organization content: activities, budget lines and member feedback

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::organizations::feedback_with_users;
use crate::db::{
    document_store::CREATED_AT, to_fields, Collection, DbPool, DocumentStore, Query, SortOrder,
};
use crate::models::{
    Activity, ActivityWithOrg, Budget, CreateActivityRequest, CreateBudgetRequest,
    CreateFeedbackRequest, Feedback, FeedbackReply, FeedbackStatus, FeedbackWithUsers,
    Organization, OrganizationSummary, UpdateActivityRequest, UpdateBudgetRequest,
};
use crate::utils::validation::{accept_image, require, require_all};
use crate::utils::{AppError, AppResult};

pub struct ContentService {
    pool: DbPool,
}

impl ContentService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn store(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.pool)
    }

    async fn ensure_org(&self, org_id: &str) -> AppResult<Organization> {
        self.store()
            .find::<Organization>(Collection::Organizations, org_id)
            .await?
            .ok_or_else(|| AppError::not_found("Organization not found"))
    }

    // ==================== Activities ====================

    pub async fn list_activities(&self, org_id: &str) -> AppResult<Vec<Activity>> {
        Ok(self
            .store()
            .query_as::<Activity>(
                Collection::Activities,
                &Query::new()
                    .eq("orgId", org_id)
                    .order_by("date", SortOrder::Desc),
            )
            .await?)
    }

    pub async fn get_activity(&self, id: &str) -> AppResult<Activity> {
        self.store()
            .find::<Activity>(Collection::Activities, id)
            .await?
            .ok_or_else(|| AppError::not_found("Activity not found"))
    }

    pub async fn activity_with_org(&self, id: &str) -> AppResult<ActivityWithOrg> {
        let activity = self.get_activity(id).await?;
        let org = self
            .store()
            .find::<Organization>(Collection::Organizations, &activity.org_id)
            .await?
            .map(|org| OrganizationSummary::from(&org));
        Ok(ActivityWithOrg { activity, org })
    }

    pub async fn create_activity(&self, req: &CreateActivityRequest) -> AppResult<Activity> {
        require_all(&[
            ("orgId", &req.org_id),
            ("title", &req.title),
            ("date", &req.date),
            ("description", &req.description),
        ])?;
        self.ensure_org(&req.org_id).await?;

        let activity = Activity {
            id: String::new(),
            org_id: req.org_id.clone(),
            title: req.title.trim().to_string(),
            date: req.date.clone(),
            description: req.description.clone(),
            image: accept_image(req.image.as_deref()),
            created_at: None,
            updated_at: None,
        };
        let activity: Activity = self
            .store()
            .insert(Collection::Activities, &activity, None)
            .await?
            .decode()?;

        info!(activity_id = %activity.id, org_id = %activity.org_id, "Activity created");
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        id: &str,
        req: &UpdateActivityRequest,
    ) -> AppResult<Activity> {
        if let Some(ref title) = req.title {
            require("title", title)?;
        }
        if let Some(ref date) = req.date {
            require("date", date)?;
        }

        let mut fields = to_fields(req)?;
        if let Some(ref image) = req.image {
            fields.insert(
                "image".to_string(),
                accept_image(Some(image)).map(Value::from).unwrap_or(Value::Null),
            );
        }

        Ok(self
            .store()
            .update(Collection::Activities, id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Activity not found"))?
            .decode()?)
    }

    pub async fn delete_activity(&self, id: &str) -> AppResult<()> {
        if !self.store().delete(Collection::Activities, id).await? {
            return Err(AppError::not_found("Activity not found"));
        }
        info!(activity_id = %id, "Activity deleted");
        Ok(())
    }

    // ==================== Budgets ====================

    pub async fn list_budgets(&self, org_id: &str) -> AppResult<Vec<Budget>> {
        Ok(self
            .store()
            .query_as::<Budget>(
                Collection::Budgets,
                &Query::new()
                    .eq("orgId", org_id)
                    .order_by("category", SortOrder::Asc),
            )
            .await?)
    }

    pub async fn get_budget(&self, id: &str) -> AppResult<Budget> {
        self.store()
            .find::<Budget>(Collection::Budgets, id)
            .await?
            .ok_or_else(|| AppError::not_found("Budget not found"))
    }

    pub async fn create_budget(&self, req: &CreateBudgetRequest) -> AppResult<Budget> {
        require_all(&[("orgId", &req.org_id), ("category", &req.category)])?;
        let limit = req
            .limit
            .ok_or_else(|| AppError::validation("Missing required fields: limit"))?;
        let allocated = req.allocated.unwrap_or(0.0);
        if limit < 0.0 || allocated < 0.0 {
            return Err(AppError::validation("Budget amounts cannot be negative"));
        }
        self.ensure_org(&req.org_id).await?;

        let budget = Budget {
            id: String::new(),
            org_id: req.org_id.clone(),
            category: req.category.trim().to_string(),
            allocated,
            limit,
            created_at: None,
            updated_at: None,
        };
        let budget: Budget = self
            .store()
            .insert(Collection::Budgets, &budget, None)
            .await?
            .decode()?;

        info!(budget_id = %budget.id, org_id = %budget.org_id, "Budget created");
        Ok(budget)
    }

    pub async fn update_budget(&self, id: &str, req: &UpdateBudgetRequest) -> AppResult<Budget> {
        if let Some(ref category) = req.category {
            require("category", category)?;
        }
        if req.limit.is_some_and(|v| v < 0.0) || req.allocated.is_some_and(|v| v < 0.0) {
            return Err(AppError::validation("Budget amounts cannot be negative"));
        }

        Ok(self
            .store()
            .update(Collection::Budgets, id, to_fields(req)?)
            .await?
            .ok_or_else(|| AppError::not_found("Budget not found"))?
            .decode()?)
    }

    pub async fn delete_budget(&self, id: &str) -> AppResult<()> {
        if !self.store().delete(Collection::Budgets, id).await? {
            return Err(AppError::not_found("Budget not found"));
        }
        info!(budget_id = %id, "Budget deleted");
        Ok(())
    }

    // ==================== Feedback ====================

    pub async fn list_feedback(&self, org_id: &str) -> AppResult<Vec<FeedbackWithUsers>> {
        let store = self.store();
        let feedback = store
            .query_as::<Feedback>(
                Collection::Feedback,
                &Query::new()
                    .eq("orgId", org_id)
                    .order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;
        feedback_with_users(&store, feedback).await
    }

    pub async fn get_feedback(&self, id: &str) -> AppResult<Feedback> {
        self.store()
            .find::<Feedback>(Collection::Feedback, id)
            .await?
            .ok_or_else(|| AppError::not_found("Feedback not found"))
    }

    pub async fn feedback_detail(&self, id: &str) -> AppResult<FeedbackWithUsers> {
        let feedback = self.get_feedback(id).await?;
        let store = self.store();
        feedback_with_users(&store, vec![feedback])
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Feedback not found"))
    }

    /// Submit feedback as `user_id`
    pub async fn create_feedback(
        &self,
        user_id: &str,
        req: &CreateFeedbackRequest,
    ) -> AppResult<Feedback> {
        require_all(&[("orgId", &req.org_id), ("message", &req.message)])?;
        self.ensure_org(&req.org_id).await?;

        let feedback = Feedback {
            id: String::new(),
            org_id: req.org_id.clone(),
            user_id: user_id.to_string(),
            message: req.message.trim().to_string(),
            status: FeedbackStatus::Pending,
            is_anonymous: req.is_anonymous,
            replies: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        let feedback: Feedback = self
            .store()
            .insert(Collection::Feedback, &feedback, None)
            .await?
            .decode()?;

        info!(feedback_id = %feedback.id, org_id = %feedback.org_id, "Feedback submitted");
        Ok(feedback)
    }

    pub async fn set_feedback_status(&self, id: &str, status: &str) -> AppResult<Feedback> {
        let status: FeedbackStatus = status.parse().map_err(AppError::Validation)?;
        let fields = to_fields(&serde_json::json!({ "status": status }))?;

        Ok(self
            .store()
            .update(Collection::Feedback, id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Feedback not found"))?
            .decode()?)
    }

    /// Append a reply and mark the feedback reviewed
    pub async fn reply_to_feedback(
        &self,
        id: &str,
        user_id: &str,
        message: &str,
    ) -> AppResult<Feedback> {
        require("message", message)?;
        let mut feedback = self.get_feedback(id).await?;

        feedback.replies.push(FeedbackReply {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.trim().to_string(),
            created_at: Utc::now(),
        });
        let fields = to_fields(&serde_json::json!({
            "replies": feedback.replies,
            "status": FeedbackStatus::Reviewed,
        }))?;

        Ok(self
            .store()
            .update(Collection::Feedback, id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Feedback not found"))?
            .decode()?)
    }

    pub async fn delete_feedback(&self, id: &str) -> AppResult<()> {
        if !self.store().delete(Collection::Feedback, id).await? {
            return Err(AppError::not_found("Feedback not found"));
        }
        info!(feedback_id = %id, "Feedback deleted");
        Ok(())
    }
}
