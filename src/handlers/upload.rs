use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::http::StatusCode;
use tracing::debug;

use crate::handlers::responses::{
    ApiError, NOT_IMAGE_MESSAGE, NO_IMAGE_MESSAGE, TOO_LARGE_MESSAGE,
};
use crate::llm::media::is_image_mime;

pub const IMAGE_FIELD: &str = "image";
const DEFAULT_FILENAME: &str = "upload";

#[derive(Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    debug!("Rejected multipart upload: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::validation(TOO_LARGE_MESSAGE)
    } else {
        ApiError::validation(NO_IMAGE_MESSAGE)
    }
}

/// Pulls the `image` field out of a multipart body, enforcing the declared
/// content type and the byte limit while streaming.
pub async fn read_image_upload(
    multipart: Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Result<ImageUpload, ApiError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("Upload is not multipart: {}", rejection.body_text());
            return Err(ApiError::validation(NO_IMAGE_MESSAGE));
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        // A plain form value under `image` is not a file upload.
        let Some(file_name) = field.file_name() else {
            return Err(ApiError::validation(NO_IMAGE_MESSAGE));
        };
        let filename = Some(file_name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_FILENAME)
            .to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_image_mime(&content_type) {
            return Err(ApiError::validation(NOT_IMAGE_MESSAGE));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(ApiError::validation(TOO_LARGE_MESSAGE));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ApiError::validation(NO_IMAGE_MESSAGE));
        }

        return Ok(ImageUpload {
            filename,
            content_type,
            bytes,
        });
    }

    Err(ApiError::validation(NO_IMAGE_MESSAGE))
}
