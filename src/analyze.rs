use crate::config::Config;
use crate::types::Upload;
use failure::Error;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

/// Sends a media file off for violation detection and returns the raw items
/// of the response array.
pub trait Analyzer: Send + Sync {
    fn analyze<'a>(&'a self, upload: &'a Upload) -> BoxFuture<'a, Result<Vec<Value>, Error>>;
}

pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalyzer {
    pub fn new(config: &Config) -> Result<HttpAnalyzer, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.analyze_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(HttpAnalyzer {
            client: builder.build()?,
            endpoint: config.analyze_url.clone(),
        })
    }

    async fn post(&self, upload: &Upload) -> Result<Vec<Value>, Error> {
        let mut part = Part::bytes(upload.data.clone()).file_name(upload.file_name.clone());
        if let Some(content_type) = &upload.content_type {
            part = part.mime_str(content_type)?;
        }
        info!(
            "Posting {} ({} bytes) to {}",
            upload.file_name,
            upload.data.len(),
            self.endpoint
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .await?;
        if !response.status().is_success() {
            debug!("Analysis endpoint returned {}", response.status());
            return Err(format_err!("Lỗi khi gửi dữ liệu đến backend"));
        }
        match response.json::<Value>().await? {
            Value::Array(items) => Ok(items),
            other => Err(format_err!("Unexpected response JSON type: {}", other)),
        }
    }
}

impl Analyzer for HttpAnalyzer {
    fn analyze<'a>(&'a self, upload: &'a Upload) -> BoxFuture<'a, Result<Vec<Value>, Error>> {
        self.post(upload).boxed()
    }
}
