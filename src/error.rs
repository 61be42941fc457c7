//! Error handling.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    extract::rejection::TypedHeaderRejection,
    http::header,
    http::HeaderValue,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tokio::sync::AcquireError;
use tracing::{event, Level};
use uuid::Uuid;

use crate::models::{Column, FilterField};

/// Equistat server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum EquistatError {
    /// Error parsing uploaded CSV data
    #[error("failed to parse CSV data")]
    CsvParse(#[from] csv::Error),

    /// Dataset metadata exists but the blob file is gone
    #[error("file for dataset {dataset_id} not found")]
    DatasetFileMissing { dataset_id: Uuid },

    /// Dataset does not exist or is not visible to the caller
    #[error("dataset {dataset_id} not found")]
    DatasetNotFound { dataset_id: Uuid },

    /// Attempt to delete the authenticated account
    #[error("cannot delete the currently authenticated user")]
    DeleteCurrentUser,

    /// Attempt to perform an invalid operation on a dataset with no rows
    #[error("cannot {operation} an empty dataset")]
    EmptyDataset { operation: &'static str },

    /// Authenticated user lacks the admin flag
    #[error("administrator privileges required")]
    Forbidden,

    /// Insufficient memory to process request
    #[error("Insufficient memory to process request ({requested} > {total})")]
    InsufficientMemory { requested: usize, total: usize },

    /// Unknown username or wrong password
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Filter bound that does not parse as a finite number
    #[error("invalid numeric value {value:?} for {field}")]
    InvalidFilterValue { field: FilterField, value: String },

    /// Error (de)serialising a stored metadata record
    #[error("failed to process a stored metadata record")]
    MetadataInvalid(#[from] serde_json::Error),

    /// Uploaded CSV lacks a required column
    #[error("missing required column: {column}")]
    MissingColumn { column: Column },

    /// Missing or malformed Authorization header
    #[error("basic authorization required")]
    MissingCredentials(#[from] TypedHeaderRejection),

    /// Multipart upload without a file part
    #[error("upload does not contain a file part")]
    MissingUploadFile,

    /// Error reading a multipart upload
    #[error("failed to read multipart upload")]
    Multipart(#[from] MultipartError),

    /// Required column contains a value that is not a finite number
    #[error("non-numeric value in column {column} at row {row}")]
    NonNumericValue { column: Column, row: usize },

    /// Error hashing a password
    #[error("failed to hash password: {detail}")]
    PasswordHash { detail: String },

    /// Error deserialising a JSON request body
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),

    /// Error acquiring a semaphore
    #[error("error acquiring resources")]
    SemaphoreAcquireError(#[from] AcquireError),

    /// Error accessing the embedded metadata database
    #[error("embedded database error")]
    StoreDatabase(#[from] sled::Error),

    /// Error reading or writing a dataset blob
    #[error("storage I/O error")]
    StoreIo(#[from] std::io::Error),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Name filter against a dataset without a name column
    #[error("name filtering requires a name column")]
    UnsupportedFilter,

    /// Registration with a username that exists
    #[error("username {username} is already taken")]
    UsernameTaken { username: String },

    /// User does not exist
    #[error("user {user_id} not found")]
    UserNotFound { user_id: Uuid },
}

impl IntoResponse for EquistatError {
    /// Convert from an `EquistatError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 401 unauthorised ErrorResponse
    fn unauthorised<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::UNAUTHORIZED, error)
    }

    /// Return a 403 forbidden ErrorResponse
    fn forbidden<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::FORBIDDEN, error)
    }

    /// Return a 404 not found ErrorResponse
    fn not_found<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<EquistatError> for ErrorResponse {
    /// Convert from an `EquistatError` into an `ErrorResponse`.
    fn from(error: EquistatError) -> Self {
        let response = match &error {
            // Bad request
            EquistatError::CsvParse(_)
            | EquistatError::DeleteCurrentUser
            | EquistatError::EmptyDataset { operation: _ }
            | EquistatError::InsufficientMemory {
                requested: _,
                total: _,
            }
            | EquistatError::InvalidFilterValue { field: _, value: _ }
            | EquistatError::MissingColumn { column: _ }
            | EquistatError::MissingUploadFile
            | EquistatError::Multipart(_)
            | EquistatError::NonNumericValue { column: _, row: _ }
            | EquistatError::RequestDataJsonRejection(_)
            | EquistatError::RequestDataValidationSingle(_)
            | EquistatError::RequestDataValidation(_)
            | EquistatError::UnsupportedFilter
            | EquistatError::UsernameTaken { username: _ } => Self::bad_request(&error),

            // Unauthorised
            EquistatError::InvalidCredentials | EquistatError::MissingCredentials(_) => {
                Self::unauthorised(&error)
            }

            // Forbidden
            EquistatError::Forbidden => Self::forbidden(&error),

            // Not found
            EquistatError::DatasetFileMissing { dataset_id: _ }
            | EquistatError::DatasetNotFound { dataset_id: _ }
            | EquistatError::UserNotFound { user_id: _ } => Self::not_found(&error),

            // Internal server error
            EquistatError::MetadataInvalid(_)
            | EquistatError::PasswordHash { detail: _ }
            | EquistatError::SemaphoreAcquireError(_)
            | EquistatError::StoreDatabase(_)
            | EquistatError::StoreIo(_)
            | EquistatError::TryFromInt(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON. Unauthorised responses carry a
    /// `WWW-Authenticate` challenge so that Basic-auth clients prompt for
    /// credentials.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => {
                let mut response = (
                    self.status,
                    [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                    json_body,
                )
                    .into_response();
                if self.status == StatusCode::UNAUTHORIZED {
                    response.headers_mut().insert(
                        header::WWW_AUTHENTICATE,
                        HeaderValue::from_static("Basic realm=\"equistat\""),
                    );
                }
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::HeaderMap;

    // Jump through the hoops to get the body as a string.
    async fn body_string(response: Response) -> String {
        String::from_utf8(
            hyper::body::to_bytes(response.into_body())
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap()
    }

    async fn test_equistat_error(
        error: EquistatError,
        status: StatusCode,
        message: &str,
        caused_by: Option<Vec<&'static str>>,
    ) {
        let response = error.into_response();
        assert_eq!(status, response.status());
        let mut headers = HeaderMap::new();
        headers.insert(&header::CONTENT_TYPE, "application/json".parse().unwrap());
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                &header::WWW_AUTHENTICATE,
                "Basic realm=\"equistat\"".parse().unwrap(),
            );
        }
        assert_eq!(headers, *response.headers());
        let error_response: ErrorResponse =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(message.to_string(), error_response.error.message);
        // Map Vec items from str to String
        let caused_by = caused_by.map(|cb| cb.iter().map(|s| s.to_string()).collect());
        assert_eq!(caused_by, error_response.error.caused_by);
    }

    #[tokio::test]
    async fn csv_parse_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad byte");
        let error = EquistatError::CsvParse(csv::Error::from(io_error));
        let message = "failed to parse CSV data";
        let caused_by = Some(vec!["bad byte"]);
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn dataset_file_missing_error() {
        let error = EquistatError::DatasetFileMissing {
            dataset_id: Uuid::nil(),
        };
        let message = "file for dataset 00000000-0000-0000-0000-000000000000 not found";
        test_equistat_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn dataset_not_found_error() {
        let error = EquistatError::DatasetNotFound {
            dataset_id: Uuid::nil(),
        };
        let message = "dataset 00000000-0000-0000-0000-000000000000 not found";
        test_equistat_error(error, StatusCode::NOT_FOUND, message, None).await;
    }

    #[tokio::test]
    async fn delete_current_user_error() {
        let error = EquistatError::DeleteCurrentUser;
        let message = "cannot delete the currently authenticated user";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn empty_dataset_error() {
        let error = EquistatError::EmptyDataset {
            operation: "summarize",
        };
        let message = "cannot summarize an empty dataset";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn forbidden_error() {
        let error = EquistatError::Forbidden;
        let message = "administrator privileges required";
        test_equistat_error(error, StatusCode::FORBIDDEN, message, None).await;
    }

    #[tokio::test]
    async fn insufficient_memory_error() {
        let error = EquistatError::InsufficientMemory {
            requested: 2,
            total: 1,
        };
        let message = "Insufficient memory to process request (2 > 1)";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn invalid_credentials_error() {
        let error = EquistatError::InvalidCredentials;
        let message = "invalid username or password";
        test_equistat_error(error, StatusCode::UNAUTHORIZED, message, None).await;
    }

    #[tokio::test]
    async fn invalid_filter_value_error() {
        let error = EquistatError::InvalidFilterValue {
            field: FilterField::PressureMin,
            value: "ten".to_string(),
        };
        let message = "invalid numeric value \"ten\" for pressure_min";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn metadata_invalid_error() {
        let serde_error = serde_json::from_str::<String>("123").unwrap_err();
        let error = EquistatError::MetadataInvalid(serde_error);
        let message = "failed to process a stored metadata record";
        let caused_by = Some(vec![
            "invalid type: integer `123`, expected a string at line 1 column 3",
        ]);
        test_equistat_error(
            error,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            caused_by,
        )
        .await;
    }

    #[tokio::test]
    async fn missing_column_error() {
        let error = EquistatError::MissingColumn {
            column: Column::Temperature,
        };
        let message = "missing required column: Temperature";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn missing_upload_file_error() {
        let error = EquistatError::MissingUploadFile;
        let message = "upload does not contain a file part";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn non_numeric_value_error() {
        let error = EquistatError::NonNumericValue {
            column: Column::Pressure,
            row: 3,
        };
        let message = "non-numeric value in column Pressure at row 3";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn password_hash_error() {
        let error = EquistatError::PasswordHash {
            detail: "invalid params".to_string(),
        };
        let message = "failed to hash password: invalid params";
        test_equistat_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn request_data_validation_single() {
        let validation_error = validator::ValidationError::new("foo");
        let error = EquistatError::RequestDataValidationSingle(validation_error);
        let message = "request data is not valid";
        let caused_by = Some(vec!["Validation error: foo [{}]"]);
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn request_data_validation() {
        let mut validation_errors = validator::ValidationErrors::new();
        let validation_error = validator::ValidationError::new("foo");
        validation_errors.add("bar", validation_error);
        let error = EquistatError::RequestDataValidation(validation_errors);
        let message = "request data is not valid";
        let caused_by = Some(vec!["bar: Validation error: foo [{}]"]);
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, caused_by).await;
    }

    #[tokio::test]
    async fn semaphore_acquire_error() {
        let sem = tokio::sync::Semaphore::new(1);
        sem.close();
        let error = EquistatError::SemaphoreAcquireError(sem.acquire().await.unwrap_err());
        let message = "error acquiring resources";
        let caused_by = Some(vec!["semaphore closed"]);
        test_equistat_error(
            error,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            caused_by,
        )
        .await;
    }

    #[tokio::test]
    async fn store_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = EquistatError::StoreIo(io_error);
        let message = "storage I/O error";
        let caused_by = Some(vec!["denied"]);
        test_equistat_error(
            error,
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            caused_by,
        )
        .await;
    }

    #[tokio::test]
    async fn try_from_int_error() {
        let error = EquistatError::TryFromInt(u8::try_from(-1_i8).unwrap_err());
        let message = "out of range integral type conversion attempted";
        test_equistat_error(error, StatusCode::INTERNAL_SERVER_ERROR, message, None).await;
    }

    #[tokio::test]
    async fn unsupported_filter_error() {
        let error = EquistatError::UnsupportedFilter;
        let message = "name filtering requires a name column";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn username_taken_error() {
        let error = EquistatError::UsernameTaken {
            username: "alice".to_string(),
        };
        let message = "username alice is already taken";
        test_equistat_error(error, StatusCode::BAD_REQUEST, message, None).await;
    }

    #[tokio::test]
    async fn user_not_found_error() {
        let error = EquistatError::UserNotFound {
            user_id: Uuid::nil(),
        };
        let message = "user 00000000-0000-0000-0000-000000000000 not found";
        test_equistat_error(error, StatusCode::NOT_FOUND, message, None).await;
    }
}
