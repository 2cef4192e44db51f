//! HTTP client adapter shared by every lifecycle operation and resource store.

mod classify;
mod client;
mod upload;

pub use classify::{classify, error_message, Navigator, NoopNavigator, Route};
pub use client::{ApiClient, RequestOptions};
pub use upload::{ProgressCallback, UploadProgress};
