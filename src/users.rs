// src/users.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db;
use crate::error::ApiError;
use crate::models::User;

const PLANS: &[&str] = &["free", "premium"];

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub plan: String,
}

async fn user_by_id(data: &AppState, id: &str) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(data.db())
        .await?;
    user.ok_or(ApiError::NotFound)
}

// GET /users/{id}
// Profiles are only visible to their owner.
pub async fn get_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    if current_user != *path {
        return Err(ApiError::Forbidden);
    }
    let user = user_by_id(&data, &path).await?;
    Ok(HttpResponse::Ok().json(user))
}

// PUT /users/{id}
pub async fn update_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    if current_user != *path {
        return Err(ApiError::Forbidden);
    }
    let user = user_by_id(&data, &path).await?;

    let username = payload.username.clone().or(user.username);
    sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE id = ?")
        .bind(&username)
        .bind(db::next_version(user.updated_at))
        .bind(&user.id)
        .execute(data.db())
        .await?;

    let user = user_by_id(&data, &path).await?;
    Ok(HttpResponse::Ok().json(user))
}

// GET /users/plan
pub async fn get_plan(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let user = user_by_id(&data, &current_user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "plan": user.plan })))
}

// PATCH /users/plan
pub async fn update_plan(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdatePlanRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    if !PLANS.contains(&payload.plan.as_str()) {
        return Err(ApiError::Validation(format!("unknown plan: {}", payload.plan)));
    }
    let user = user_by_id(&data, &current_user).await?;

    sqlx::query("UPDATE users SET plan = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.plan)
        .bind(db::next_version(user.updated_at))
        .bind(&user.id)
        .execute(data.db())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "plan": payload.plan })))
}
