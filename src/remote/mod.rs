//! Client side of the upload server and the wire types both sides share

mod client;
mod messages;

pub use client::{UploadClient, UPLOAD_FIELD};
pub use messages::{ApiMessage, StoredFile, UploadResponse, UploadedFile};
