use bytes::Bytes;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, info};

use super::{ContentMeta, EngineClient, EngineError, Lookup, first_found, segment};

const CONTENT_PREFIXES: [&str; 3] = ["/content-api", "/process-api", "/app-api"];

/// An open content download from the engine.
pub struct ContentDownload {
    pub content_type: Option<String>,
    /// File name from the engine's `Content-Disposition`, as sent.
    pub filename: Option<String>,
    pub response: Response,
}

impl ContentDownload {
    /// `Content-Disposition` for the proxied response.
    pub fn disposition(&self, inline: bool) -> String {
        let kind = if inline { "inline" } else { "attachment" };
        match &self.filename {
            Some(name) => format!("{}; filename={}", kind, name),
            None => kind.to_string(),
        }
    }
}

/// An uploaded file destined for the content service.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field_id: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

fn content_paths(content_id: &str, suffix: &str) -> Vec<String> {
    CONTENT_PREFIXES
        .iter()
        .map(|prefix| {
            format!(
                "{}/content-service/content-items/{}{}",
                prefix,
                segment(content_id),
                suffix
            )
        })
        .collect()
}

/// The part after `filename=` in a disposition header.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split_once("filename=")
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn header_text(res: &Response, name: HeaderName) -> Option<String> {
    res.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

impl EngineClient {
    pub async fn content_metadata(&self, content_id: &str) -> Lookup<ContentMeta> {
        let timeout = self.config.light_timeout();
        first_found(content_paths(content_id, ""), |path| async move {
            Lookup::from(self.get_json::<ContentMeta>(&path, timeout).await)
        })
        .await
    }

    /// Opens the content bytes, trying each API prefix in turn.
    pub async fn content_data(&self, content_id: &str) -> Lookup<ContentDownload> {
        let timeout = self.config.heavy_timeout();
        first_found(content_paths(content_id, "/data"), |path| async move {
            let request = match self.request(Method::GET, &path, timeout) {
                Ok(r) => r,
                Err(e) => return Lookup::Failed(e.to_string()),
            };
            match request.send().await {
                Ok(res) if res.status() == StatusCode::OK => {
                    let content_type = header_text(&res, CONTENT_TYPE);
                    let filename = header_text(&res, CONTENT_DISPOSITION)
                        .as_deref()
                        .and_then(filename_from_disposition);
                    Lookup::Found(ContentDownload {
                        content_type,
                        filename,
                        response: res,
                    })
                }
                Ok(res) if res.status() == StatusCode::NOT_FOUND => Lookup::NotFound,
                Ok(res) => Lookup::Failed(format!("HTTP {}", res.status().as_u16())),
                Err(e) => Lookup::Failed(e.to_string()),
            }
        })
        .await
    }

    /// Stores an uploaded file against a task field.
    pub async fn upload_content(&self, task_id: &str, upload: Upload) -> Result<(), EngineError> {
        let mut part = Part::bytes(upload.data.to_vec()).file_name(upload.file_name.clone());
        if let Some(mime) = &upload.content_type {
            part = part.mime_str(mime)?;
        }
        let form = Form::new()
            .text("taskId", task_id.to_string())
            .text("field", upload.field_id.clone())
            .part("file", part);

        let request = self
            .request(
                Method::POST,
                "/content-api/content-service/content-items",
                self.config.heavy_timeout(),
            )?
            .multipart(form);
        Self::send(request).await?;
        info!(
            "Uploaded {} for field {} of task {}",
            upload.file_name, upload.field_id, task_id
        );
        debug!("Upload size {} bytes", upload.data.len());
        Ok(())
    }
}
