use serde::Serialize;

use super::errors::OrderError;

/// Uniform envelope handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, details: None }
    }

    pub fn failure(err: &OrderError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            details: Some(err.details()),
        }
    }
}

impl<T> From<Result<T, OrderError>> for OperationResult<T> {
    fn from(result: Result<T, OrderError>) -> Self {
        match result {
            Ok(data) => OperationResult::ok(data),
            Err(err) => OperationResult::failure(&err),
        }
    }
}
