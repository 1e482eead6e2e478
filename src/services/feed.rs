//! Organization feed: posts, comments and likes

use std::collections::HashMap;

use tracing::{debug, info};

use super::membership::user_summaries;
use crate::db::{
    document_store::CREATED_AT, to_fields, Collection, DbPool, DocumentStore, Query, SortOrder,
};
use crate::models::{
    Comment, CommentWithAuthor, CreatePostRequest, Paginated, Pagination, Post,
    PostWithDetails, Reaction, UpdatePostRequest, LIKE_REACTION, PREVIEW_COMMENTS,
};
use crate::utils::validation::{accept_image, require, require_all};
use crate::utils::{AppError, AppResult};

pub struct FeedService {
    pool: DbPool,
}

impl FeedService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn store(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.pool)
    }

    pub async fn get_post(&self, post_id: &str) -> AppResult<Post> {
        self.store()
            .find::<Post>(Collection::Posts, post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post not found"))
    }

    pub async fn get_comment(&self, comment_id: &str) -> AppResult<Comment> {
        self.store()
            .find::<Comment>(Collection::Comments, comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment not found"))
    }

    /// One page of an organization's posts, newest first, seen by `viewer_id`
    pub async fn list_posts(
        &self,
        org_id: &str,
        viewer_id: &str,
        page: usize,
        limit: usize,
    ) -> AppResult<Paginated<PostWithDetails>> {
        let posts = self
            .store()
            .query_as::<Post>(
                Collection::Posts,
                &Query::new()
                    .eq("orgId", org_id)
                    .order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;

        let pagination = Pagination::new(page, limit, posts.len());
        let page_posts: Vec<Post> = posts
            .into_iter()
            .skip(pagination.range().start)
            .take(pagination.range().len())
            .collect();

        let items = self.with_details(page_posts, viewer_id).await?;
        Ok(Paginated { items, pagination })
    }

    pub async fn post_detail(&self, post_id: &str, viewer_id: &str) -> AppResult<PostWithDetails> {
        let post = self.get_post(post_id).await?;
        self.with_details(vec![post], viewer_id)
            .await?
            .pop()
            .ok_or_else(|| AppError::not_found("Post not found"))
    }

    async fn with_details(
        &self,
        posts: Vec<Post>,
        viewer_id: &str,
    ) -> AppResult<Vec<PostWithDetails>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let store = self.store();
        let post_ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();

        let reactions = store
            .query_as::<Reaction>(
                Collection::Reactions,
                &Query::new()
                    .is_in("postId", post_ids.iter().copied())
                    .eq("type", LIKE_REACTION),
            )
            .await?;
        let comments = store
            .query_as::<Comment>(
                Collection::Comments,
                &Query::new()
                    .is_in("postId", post_ids.iter().copied())
                    .order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;

        let mut likes: HashMap<&str, (usize, bool)> = HashMap::new();
        for reaction in &reactions {
            let entry = likes.entry(reaction.post_id.as_str()).or_default();
            entry.0 += 1;
            entry.1 |= reaction.author_id == viewer_id;
        }

        let mut by_post: HashMap<String, Vec<Comment>> = HashMap::new();
        for comment in comments {
            by_post.entry(comment.post_id.clone()).or_default().push(comment);
        }

        let mut user_ids: Vec<String> = posts.iter().map(|p| p.author_id.clone()).collect();
        for comments in by_post.values() {
            user_ids.extend(
                comments
                    .iter()
                    .take(PREVIEW_COMMENTS)
                    .map(|c| c.author_id.clone()),
            );
        }
        let users = user_summaries(&store, user_ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let (like_count, liked_by_me) =
                    likes.get(post.id.as_str()).copied().unwrap_or_default();
                let comments = by_post.remove(&post.id).unwrap_or_default();
                let comment_count = comments.len();
                let comments = comments
                    .into_iter()
                    .take(PREVIEW_COMMENTS)
                    .map(|comment| CommentWithAuthor {
                        author: users.get(&comment.author_id).cloned(),
                        comment,
                    })
                    .collect();
                PostWithDetails {
                    author: users.get(&post.author_id).cloned(),
                    likes: like_count,
                    liked_by_me,
                    comment_count,
                    comments,
                    post,
                }
            })
            .collect())
    }

    pub async fn create_post(&self, author_id: &str, req: &CreatePostRequest) -> AppResult<Post> {
        require_all(&[("orgId", &req.org_id), ("content", &req.content)])?;
        if self
            .store()
            .get_by_id(Collection::Organizations, &req.org_id)
            .await?
            .is_none()
        {
            return Err(AppError::not_found("Organization not found"));
        }

        let post = Post {
            id: String::new(),
            org_id: req.org_id.clone(),
            author_id: author_id.to_string(),
            content: req.content.trim().to_string(),
            image_url: accept_image(req.image_url.as_deref()),
            created_at: None,
            updated_at: None,
        };
        let post: Post = self
            .store()
            .insert(Collection::Posts, &post, None)
            .await?
            .decode()?;

        info!(post_id = %post.id, org_id = %post.org_id, "Post created");
        Ok(post)
    }

    pub async fn update_post(&self, post_id: &str, req: &UpdatePostRequest) -> AppResult<Post> {
        if let Some(ref content) = req.content {
            require("content", content)?;
        }

        let mut fields = to_fields(req)?;
        if let Some(ref image_url) = req.image_url {
            fields.insert(
                "imageUrl".to_string(),
                accept_image(Some(image_url))
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
            );
        }

        Ok(self
            .store()
            .update(Collection::Posts, post_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Post not found"))?
            .decode()?)
    }

    /// Delete a post along with its comments and reactions
    pub async fn delete_post(&self, post_id: &str) -> AppResult<()> {
        let store = self.store();
        if !store.delete(Collection::Posts, post_id).await? {
            return Err(AppError::not_found("Post not found"));
        }

        let by_post = Query::new().eq("postId", post_id);
        let comments = store.delete_where(Collection::Comments, &by_post).await?;
        let reactions = store.delete_where(Collection::Reactions, &by_post).await?;

        info!(post_id = %post_id, comments, reactions, "Post deleted");
        Ok(())
    }

    /// One page of a post's comments, newest first
    pub async fn list_comments(
        &self,
        post_id: &str,
        page: usize,
        limit: usize,
    ) -> AppResult<Paginated<CommentWithAuthor>> {
        self.get_post(post_id).await?;
        let store = self.store();
        let comments = store
            .query_as::<Comment>(
                Collection::Comments,
                &Query::new()
                    .eq("postId", post_id)
                    .order_by(CREATED_AT, SortOrder::Desc),
            )
            .await?;

        let pagination = Pagination::new(page, limit, comments.len());
        let comments: Vec<Comment> = comments
            .into_iter()
            .skip(pagination.range().start)
            .take(pagination.range().len())
            .collect();

        let users = user_summaries(&store, comments.iter().map(|c| c.author_id.clone()).collect())
            .await?;
        let items = comments
            .into_iter()
            .map(|comment| CommentWithAuthor {
                author: users.get(&comment.author_id).cloned(),
                comment,
            })
            .collect();

        Ok(Paginated { items, pagination })
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        author_id: &str,
        content: &str,
    ) -> AppResult<CommentWithAuthor> {
        require("content", content)?;
        self.get_post(post_id).await?;

        let comment = Comment {
            id: String::new(),
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            content: content.trim().to_string(),
            created_at: None,
            updated_at: None,
        };
        let store = self.store();
        let comment: Comment = store
            .insert(Collection::Comments, &comment, None)
            .await?
            .decode()?;
        let author = user_summaries(&store, vec![author_id.to_string()])
            .await?
            .remove(author_id);

        debug!(comment_id = %comment.id, post_id = %post_id, "Comment added");
        Ok(CommentWithAuthor { comment, author })
    }

    pub async fn delete_comment(&self, comment_id: &str) -> AppResult<()> {
        if !self.store().delete(Collection::Comments, comment_id).await? {
            return Err(AppError::not_found("Comment not found"));
        }
        Ok(())
    }

    async fn find_like(&self, post_id: &str, author_id: &str) -> AppResult<Option<Reaction>> {
        let reactions = self
            .store()
            .query_as::<Reaction>(
                Collection::Reactions,
                &Query::new()
                    .eq("postId", post_id)
                    .eq("authorId", author_id)
                    .eq("type", LIKE_REACTION),
            )
            .await?;
        Ok(reactions.into_iter().next())
    }

    /// Like a post; a second like by the same user is a conflict
    pub async fn like(&self, post_id: &str, author_id: &str) -> AppResult<Reaction> {
        self.get_post(post_id).await?;
        if self.find_like(post_id, author_id).await?.is_some() {
            return Err(AppError::conflict("Already liked"));
        }

        let reaction = Reaction {
            id: String::new(),
            post_id: post_id.to_string(),
            author_id: author_id.to_string(),
            kind: LIKE_REACTION.to_string(),
            created_at: None,
        };
        Ok(self
            .store()
            .insert(Collection::Reactions, &reaction, None)
            .await?
            .decode()?)
    }

    /// Remove the caller's like; nothing happens when there is none
    pub async fn unlike(&self, post_id: &str, author_id: &str) -> AppResult<()> {
        if let Some(reaction) = self.find_like(post_id, author_id).await? {
            self.store()
                .delete(Collection::Reactions, &reaction.id)
                .await?;
        }
        Ok(())
    }
}
