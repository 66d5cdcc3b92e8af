use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::error::{ApiError, Result};
use super::types::{
    LogRequest, LogRequestEnvelope, LogRequestList, LogRequestParams, LogRequestState,
};
use super::LogsApi;

pub const DEFAULT_BASE_URL: &str = "https://api-metrika.yandex.net";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies are cut to this many bytes before landing in errors and logs.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

pub struct MetrikaClient {
    client: Client,
    counter_url: String,
    token: SecretString,
}

impl MetrikaClient {
    pub fn new(
        base_url: &str,
        counter: u64,
        token: SecretString,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            counter_url: counter_url(base_url, counter),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.counter_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let resp = request
            .header(AUTHORIZATION, format!("OAuth {}", self.token.expose_secret()))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T> {
        let body = self.send(request).await?.text().await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }
}

fn counter_url(base_url: &str, counter: u64) -> String {
    format!(
        "{}/management/v1/counter/{}",
        base_url.trim_end_matches('/'),
        counter
    )
}

#[async_trait]
impl LogsApi for MetrikaClient {
    async fn create_log_request(&self, params: &LogRequestParams) -> Result<LogRequest> {
        let path = "/logrequests";
        let request = self.client.post(self.url(path)).query(&params.query());
        let envelope: LogRequestEnvelope<LogRequest> = self.send_json(request, path).await?;
        tracing::debug!(request_id = envelope.log_request.request_id, "Log request created");
        Ok(envelope.log_request)
    }

    async fn list_log_requests(&self) -> Result<Vec<LogRequest>> {
        let path = "/logrequests";
        let list: LogRequestList = self.send_json(self.client.get(self.url(path)), path).await?;
        Ok(list.requests)
    }

    async fn log_request_status(&self, request_id: i64) -> Result<LogRequestState> {
        let path = format!("/logrequest/{}", request_id);
        let envelope: LogRequestEnvelope<LogRequestState> =
            self.send_json(self.client.get(self.url(&path)), &path).await?;
        Ok(envelope.log_request)
    }

    async fn download_part(&self, request_id: i64, part: i32) -> Result<String> {
        let path = format!("/logrequest/{}/part/{}/download", request_id, part);
        let resp = self.send(self.client.get(self.url(&path))).await?;
        Ok(resp.text().await?)
    }

    async fn clean_log_request(&self, request_id: i64) -> Result<LogRequestState> {
        let path = format!("/logrequest/{}/clean", request_id);
        let envelope: LogRequestEnvelope<LogRequestState> =
            self.send_json(self.client.post(self.url(&path)), &path).await?;
        Ok(envelope.log_request)
    }
}
