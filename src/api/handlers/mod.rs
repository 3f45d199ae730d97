pub mod admin;
pub mod files;
pub mod health;
pub mod secure_links;
pub mod shares;

use crate::services::secure_link_service::FileStream;
use axum::{
    body::Body,
    http::{HeaderName, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use tokio_util::io::ReaderStream;

pub const X_FILE_NAME: HeaderName = HeaderName::from_static("x-file-name");
pub const X_FILE_TYPE: HeaderName = HeaderName::from_static("x-file-type");

/// `Content-Disposition` value with an ASCII fallback name and the RFC 5987
/// encoded original.
pub(crate) fn content_disposition(filename: &str, content_type: &str) -> String {
    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let disposition_type = if content_type.starts_with("image/")
        || content_type.starts_with("text/")
        || content_type == "application/pdf"
    {
        "inline"
    } else {
        "attachment"
    };

    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    )
}

/// Streams an opened file back to the client.
pub(crate) fn file_response(file: FileStream) -> Response {
    let disposition = content_disposition(&file.filename, &file.content_type);
    let encoded_name = utf8_percent_encode(&file.filename, NON_ALPHANUMERIC).to_string();
    let body = Body::from_stream(ReaderStream::new(file.reader));

    (
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_LENGTH, file.size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
            (X_FILE_NAME, encoded_name),
            (X_FILE_TYPE, file.content_type),
        ],
        body,
    )
        .into_response()
}
