use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;

use crate::domain::{AuthContext, ServiceError};
use crate::models::user::{self, Entity as User, UserDto};

pub const ROLES: [&str; 3] = ["admin", "staff", "customer"];

fn hash_password(password: &str) -> Result<String, ServiceError> {
    if password.len() < 8 {
        return Err(ServiceError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Storage(format!("password hashing failed: {}", e)))
}

fn validate_role(role: &str) -> Result<(), ServiceError> {
    if ROLES.contains(&role) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!("invalid role '{}'", role)))
    }
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<UserDto>, ServiceError> {
    let users = User::find()
        .order_by_asc(user::Column::Username)
        .all(db)
        .await?;
    Ok(users.into_iter().map(UserDto::from).collect())
}

pub async fn get_user(db: &DatabaseConnection, id: i32) -> Result<UserDto, ServiceError> {
    let model = User::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;
    Ok(UserDto::from(model))
}

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: String,
}

pub async fn create_user(db: &DatabaseConnection, input: NewUser) -> Result<UserDto, ServiceError> {
    if input.username.trim().is_empty() {
        return Err(ServiceError::Validation("username is required".to_string()));
    }
    validate_role(&input.role)?;

    let exists = User::find()
        .filter(user::Column::Username.eq(input.username.as_str()))
        .one(db)
        .await?;
    if exists.is_some() {
        return Err(ServiceError::Conflict(format!(
            "username '{}' is already taken",
            input.username
        )));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let model = user::ActiveModel {
        username: Set(input.username),
        email: Set(input.email),
        password_hash: Set(hash_password(&input.password)?),
        role: Set(input.role),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(UserDto::from(model.insert(db).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

pub async fn update_user(
    db: &DatabaseConnection,
    id: i32,
    input: UpdateUser,
) -> Result<UserDto, ServiceError> {
    let existing = User::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let mut active: user::ActiveModel = existing.into();
    if let Some(email) = input.email {
        active.email = Set(Some(email));
    }
    if let Some(password) = input.password {
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(role) = input.role {
        validate_role(&role)?;
        active.role = Set(role);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(UserDto::from(active.update(db).await?))
}

/// Admin-only; refuses to remove the last remaining admin account.
pub async fn delete_user(
    db: &DatabaseConnection,
    auth: &AuthContext,
    id: i32,
) -> Result<(), ServiceError> {
    auth.require_admin()?;

    let existing = User::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if existing.role == "admin" {
        let admins = User::find()
            .filter(user::Column::Role.eq("admin"))
            .count(db)
            .await?;
        if admins <= 1 {
            return Err(ServiceError::Validation(
                "cannot delete the last admin account".to_string(),
            ));
        }
    }

    User::delete_by_id(id).exec(db).await?;
    Ok(())
}
