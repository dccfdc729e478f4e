//! Tenant/actor extraction middleware.
//!
//! Identity verification is delegated to the upstream gateway; by the time a
//! request reaches this service, `x-tenant-id` and `x-user-id` carry the
//! verified tenant and user. This middleware only parses them into typed
//! request extensions — domain routes never see raw headers.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use stockflow_core::{TenantId, UserId};

use crate::app::errors;
use crate::context::{ActorContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

pub async fn tenant_middleware(mut request: Request, next: Next) -> Response {
    let tenant_id = match header_id::<TenantId>(&request, TENANT_HEADER) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let user_id = match header_id::<UserId>(&request, USER_HEADER) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    request.extensions_mut().insert(TenantContext::new(tenant_id));
    request.extensions_mut().insert(ActorContext::new(user_id));

    next.run(request).await
}

fn header_id<T: std::str::FromStr>(request: &Request, header: &'static str) -> Result<T, Response> {
    let value = request
        .headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            errors::json_error(
                StatusCode::UNAUTHORIZED,
                "missing_header",
                format!("{header} header is required"),
            )
            .into_response()
        })?;

    value.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_header",
            format!("{header} must be a uuid"),
        )
        .into_response()
    })
}
