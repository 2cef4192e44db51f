use super::client::{decode, ApiClient, Payload, RequestOptions};
use crate::error::{Error, Result};
use futures_util::{stream, StreamExt};
use reqwest::{
    multipart::{Form, Part},
    Body, Method,
};
use serde::de::DeserializeOwned;
use std::{path::Path, sync::Arc};
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// Bytes handed to the transport so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    pub sent: u64,
    pub total: u64,
}

impl UploadProgress {
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = self.sent.saturating_mul(100) / self.total;
        u8::try_from(percent.min(100)).unwrap_or(100)
    }
}

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

impl ApiClient {
    /// Sends `contents` as the `file` field of a multipart form.
    ///
    /// # Errors
    /// Returns the classified error for a failed request or an undecodable body.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        file_name: &str,
        contents: Vec<u8>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<T> {
        let total = contents.len() as u64;
        debug!("uploading {} ({} bytes) to {}", file_name, total, path);

        let part = Part::stream_with_length(progress_body(contents, on_progress), total)
            .file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .send(
                Method::POST,
                path,
                Payload::Multipart(form),
                &RequestOptions::default(),
            )
            .await?;

        decode(response).await
    }

    /// Reads `file` and uploads it under its own file name.
    ///
    /// # Errors
    /// Returns `Validation` if the file cannot be read, otherwise as [`Self::upload`].
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        file: &Path,
        on_progress: Option<ProgressCallback>,
    ) -> Result<T> {
        let contents = tokio::fs::read(file)
            .await
            .map_err(|err| Error::Validation(format!("Cannot read {}: {err}", file.display())))?;
        let file_name = file
            .file_name()
            .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());

        self.upload(path, &file_name, contents, on_progress).await
    }
}

fn progress_body(contents: Vec<u8>, on_progress: Option<ProgressCallback>) -> Body {
    let total = contents.len() as u64;
    let chunks: Vec<Vec<u8>> = contents.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;

    let stream = stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(callback) = &on_progress {
            callback(UploadProgress { sent, total });
        }
        Ok::<_, std::io::Error>(chunk)
    });

    Body::wrap_stream(stream)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        api::NoopNavigator,
        config::{ApiConfig, DEFAULT_API_BASE_URL},
        session::SessionStore,
    };
    use serde_json::{json, Value};
    use std::{net::TcpListener, sync::Mutex};
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[test]
    fn percent_is_bounded() {
        assert_eq!(UploadProgress { sent: 0, total: 0 }.percent(), 100);
        assert_eq!(UploadProgress { sent: 50, total: 200 }.percent(), 25);
        assert_eq!(UploadProgress { sent: 300, total: 200 }.percent(), 100);
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_reports_progress() {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/files"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"stored": true})))
            .mount(&server)
            .await;

        let config = ApiConfig::new(&server.uri()).unwrap();
        let client =
            ApiClient::new(&config, SessionStore::in_memory(), Arc::new(NoopNavigator)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let callback: ProgressCallback = Arc::new(move |progress| {
            recorder.lock().unwrap().push(progress);
        });

        let contents = vec![7u8; CHUNK_SIZE + 10];
        let body: Value = client
            .upload("files", "blob.bin", contents, Some(callback))
            .await
            .unwrap();
        assert_eq!(body, json!({"stored": true}));

        let seen = seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.sent, last.total);
        assert_eq!(last.total, (CHUNK_SIZE + 10) as u64);

        let requests = server.received_requests().await.unwrap();
        let raw = String::from_utf8_lossy(&requests[0].body);
        assert!(raw.contains("name=\"file\""));
        assert!(raw.contains("filename=\"blob.bin\""));
    }

    #[tokio::test]
    async fn upload_missing_file_is_validation_error() {
        let client = ApiClient::new(
            &ApiConfig::new(DEFAULT_API_BASE_URL).unwrap(),
            SessionStore::in_memory(),
            Arc::new(NoopNavigator),
        )
        .unwrap();
        let result: Result<Value> = client
            .upload_file("files", Path::new("/nonexistent/sesame.bin"), None)
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
