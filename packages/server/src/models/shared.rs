use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;

/// Pagination metadata included in list responses.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 10)]
    pub page_size: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 5)]
    pub total_pages: u64,
}

/// Parse an optional numeric query parameter.
///
/// Browser clients send `""`, `"null"` or `"undefined"` for unset fields;
/// those count as absent. Anything else must parse.
pub fn parse_optional_number<T: FromStr>(
    raw: Option<&str>,
    name: &str,
) -> Result<Option<T>, AppError> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") | Some("undefined") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("{name} must be a number"))),
    }
}
