//! Account service
//!
//! Registration, password authentication and profile edits. Passwords are
//! hashed with Argon2id.

use std::collections::HashMap;

use anyhow::Result;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde_json::Value;
use tracing::info;

use crate::config::BootstrapAdminConfig;
use crate::db::{Collection, DbPool, DocumentStore, Fields, Query, SortOrder};
use crate::models::{
    Member, MembershipSummary, RegisterRequest, Role, UpdateProfileRequest, User, UserPublic,
    UserWithMemberships,
};
use crate::utils::validation::is_data_url;
use crate::utils::{AppError, AppResult};

pub struct AuthService {
    pool: DbPool,
}

impl AuthService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn store(&self) -> DocumentStore<'_> {
        DocumentStore::new(&self.pool)
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self
            .store()
            .query_as::<User>(
                Collection::Users,
                &Query::new().eq("email", normalize_email(email)),
            )
            .await?;
        Ok(users.into_iter().next())
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.store()
            .find::<User>(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Every account by name, with the organizations it belongs to
    pub async fn list_users(&self) -> AppResult<Vec<UserWithMemberships>> {
        let store = self.store();
        let users = store
            .query_as::<User>(
                Collection::Users,
                &Query::new().order_by("name", SortOrder::Asc),
            )
            .await?;
        let members = store
            .query_as::<Member>(Collection::Members, &Query::new())
            .await?;

        let org_names: HashMap<String, String> = store
            .get_all(Collection::Organizations)
            .await?
            .into_iter()
            .filter_map(|doc| {
                let name = doc.get_str("name")?.to_string();
                Some((doc.id, name))
            })
            .collect();

        let mut memberships: HashMap<String, Vec<MembershipSummary>> = HashMap::new();
        for member in members {
            if let Some(name) = org_names.get(&member.org_id) {
                memberships
                    .entry(member.user_id)
                    .or_default()
                    .push(MembershipSummary {
                        id: member.org_id,
                        name: name.clone(),
                        role: member.role,
                    });
            }
        }

        Ok(users
            .into_iter()
            .map(|user| UserWithMemberships {
                memberships: memberships.remove(&user.id).unwrap_or_default(),
                user: UserPublic::from(user),
            })
            .collect())
    }

    /// Create a Student account
    pub async fn register(&self, req: &RegisterRequest, min_password_len: usize) -> AppResult<User> {
        if req.password.chars().count() < min_password_len {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                min_password_len
            )));
        }

        if self.get_user_by_email(&req.email).await?.is_some() {
            return Err(AppError::conflict("Email already exists"));
        }

        let mut user = User::new(
            req.name.trim().to_string(),
            normalize_email(&req.email),
            Self::hash_password(&req.password)?,
            Role::Student,
        );
        user.avatar = req.avatar.as_deref().filter(|a| is_data_url(a)).map(str::to_string);

        let user: User = self
            .store()
            .insert(Collection::Users, &user, None)
            .await?
            .decode()?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials; `None` when the email is unknown or the password
    /// does not match
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_email(email).await? else {
            return Ok(None);
        };

        if user.password_hash.is_empty() {
            return Ok(None);
        }

        if Self::verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Update profile fields and optionally the password
    pub async fn update_profile(
        &self,
        user_id: &str,
        req: &UpdateProfileRequest,
        min_password_len: usize,
    ) -> AppResult<User> {
        let user = self.get_user(user_id).await?;
        let mut fields = Fields::new();

        if let Some(ref name) = req.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            fields.insert("name".to_string(), Value::from(name.trim()));
        }

        for (key, value) in [
            ("bio", &req.bio),
            ("phone", &req.phone),
            ("major", &req.major),
        ] {
            if let Some(value) = value {
                fields.insert(key.to_string(), optional_text(value));
            }
        }

        if let Some(ref avatar) = req.avatar {
            if !avatar.is_empty() && !is_data_url(avatar) {
                return Err(AppError::validation("Avatar must be an image data URL"));
            }
            fields.insert("avatar".to_string(), optional_text(avatar));
        }

        if let Some(ref new_password) = req.new_password {
            let current = req.current_password.as_deref().unwrap_or_default();
            if !Self::verify_password(current, &user.password_hash).unwrap_or(false) {
                return Err(AppError::Unauthorized("Incorrect password".to_string()));
            }
            if new_password.chars().count() < min_password_len {
                return Err(AppError::validation(format!(
                    "Password must be at least {} characters",
                    min_password_len
                )));
            }
            fields.insert(
                "passwordHash".to_string(),
                Value::from(Self::hash_password(new_password)?),
            );
            info!(user_id = %user_id, "Password changed");
        }

        Ok(self
            .store()
            .update(Collection::Users, user_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?
            .decode()?)
    }

    /// Create the configured system administrator unless that email exists.
    /// Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdminConfig) -> Result<bool> {
        if self.get_user_by_email(&admin.email).await?.is_some() {
            return Ok(false);
        }

        let user = User::new(
            admin.name.clone(),
            normalize_email(&admin.email),
            Self::hash_password(&admin.password)?,
            Role::Admin,
        );
        let doc = self.store().insert(Collection::Users, &user, None).await?;

        info!(user_id = %doc.id, email = %user.email, "Bootstrap administrator created");
        Ok(true)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank text clears the field
fn optional_text(value: &str) -> Value {
    let value = value.trim();
    if value.is_empty() {
        Value::Null
    } else {
        Value::from(value)
    }
}
