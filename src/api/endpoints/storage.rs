//! `GET /storage/:bucket/*key`: serves stored objects at the URLs handed
//! out as `file_url` on policy versions.

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub async fn fetch(
    State(ctx): State<ApiContext>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let bytes = ctx.core.objects.get(&bucket, &key)?;
    let mime = mime_guess::from_path(&key).first_or_octet_stream();

    let mut response = bytes.into_response();
    if let Ok(value) = HeaderValue::from_str(mime.essence_str()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
