//! Route-group authorization.
//!
//! An upstream gateway authenticates callers and forwards identity as
//! `x-user-id` / `x-user-role` headers; this service trusts them and
//! never re-validates credentials. Each guard turns the headers into an
//! [`Actor`] request extension for handlers to consume.

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::{
    app_error::AppError,
    domain::{Actor, Role},
};

fn extract_actor(headers: &HeaderMap) -> Result<Actor, AppError> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed x-user-id header".into()))?;

    let role = headers
        .get("x-user-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse)
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed x-user-role header".into()))?;

    Ok(Actor { user_id, role })
}

async fn require_role(required: Role, mut req: Request, next: Next) -> Result<Response, AppError> {
    let actor = extract_actor(req.headers())?;
    if actor.role != required {
        return Err(AppError::ForbiddenResource(format!(
            "This route requires the {} role",
            required.as_str()
        )));
    }
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

pub async fn buyers_authorization(req: Request, next: Next) -> Result<Response, AppError> {
    require_role(Role::Buyer, req, next).await
}

pub async fn sellers_authorization(req: Request, next: Next) -> Result<Response, AppError> {
    require_role(Role::Seller, req, next).await
}

pub async fn admins_authorization(req: Request, next: Next) -> Result<Response, AppError> {
    require_role(Role::Admin, req, next).await
}
