use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;
use serde_json::json;

use stockflow_infra::command_dispatcher::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::InvalidTransition { from, to } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_transition",
            format!("cannot transition from '{from}' to '{to}'"),
        ),
        DispatchError::QuantityConservation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "quantity_conservation", msg)
        }
        DispatchError::InsufficientBalance(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance", msg)
        }
        DispatchError::InvalidCreditNoteSource(msg) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_credit_note_source",
            msg,
        ),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::TenantIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a lowercase wire value (status, payment method, pipeline stage) into
/// its closed enum via the same serde names used in payloads.
pub fn parse_enum<T: DeserializeOwned>(
    value: &str,
    what: &'static str,
) -> Result<T, axum::response::Response> {
    serde_json::from_value::<T>(serde_json::Value::String(value.to_string())).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_value",
            format!("'{value}' is not a valid {what}"),
        )
    })
}
