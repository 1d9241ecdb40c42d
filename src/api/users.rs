//! User and session API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateUserRequest, SessionRequest, UpdateUserRequest, User};
use crate::AppState;

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AppError::Validation(format!("Invalid email {:?}", email))),
    }
}

fn validate_credits(credits: f64) -> Result<(), AppError> {
    if !credits.is_finite() || credits < 0.0 {
        return Err(AppError::Validation(
            "initialCredits must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/users - List all users.
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_users().await {
        Ok(users) => success(users, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/users/{id} - Get a single user with derived credits.
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_user(&id).await {
        Ok(Some(user)) => success(user, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("User {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/users - Register a user.
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.trim().is_empty() {
        return error(
            AppError::Validation("Name is required".to_string()),
            revision_id,
        );
    }
    if let Err(e) = validate_email(&request.email).and(validate_credits(request.initial_credits)) {
        return error(e, revision_id);
    }

    match state.repo.create_user(&request).await {
        Ok(user) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(user, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/users/{id} - Update a user.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if request.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return error(
            AppError::Validation("Name cannot be empty".to_string()),
            revision_id,
        );
    }
    if let Some(email) = &request.email {
        if let Err(e) = validate_email(email) {
            return error(e, revision_id);
        }
    }
    if let Some(credits) = request.initial_credits {
        if let Err(e) = validate_credits(credits) {
            return error(e, revision_id);
        }
    }

    match state.repo.update_user(&id, &request).await {
        Ok(user) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(user, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/session - The signed-in user.
pub async fn get_session(State(state): State<AppState>) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_session().await {
        Ok(Some(user)) => success(user, revision_id),
        Ok(None) => error(
            AppError::NotFound("No user is signed in".to_string()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/session - Switch the signed-in user.
pub async fn set_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> ApiResult<User> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.set_session(&request.user_id).await {
        Ok(user) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(user, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("rider@example.com").is_ok());
        assert!(validate_email("rider").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("rider@").is_err());
    }

    #[test]
    fn test_validate_credits() {
        assert!(validate_credits(0.0).is_ok());
        assert!(validate_credits(-1.0).is_err());
        assert!(validate_credits(f64::NAN).is_err());
    }
}
