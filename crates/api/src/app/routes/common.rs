use axum::http::StatusCode;
use core::str::FromStr;

use crate::app::errors;

/// Parse a path/body id into a typed identifier, or a 400 response.
pub fn parse_id<T: FromStr>(value: &str, what: &'static str) -> Result<T, axum::response::Response> {
    value.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what}"),
        )
    })
}

/// Same, for optional ids.
pub fn parse_opt_id<T: FromStr>(
    value: Option<&str>,
    what: &'static str,
) -> Result<Option<T>, axum::response::Response> {
    value.map(|v| parse_id(v, what)).transpose()
}
