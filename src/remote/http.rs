use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::config::ApiConfig;
use crate::models::{
    NewNewsPost, NewScheduleEvent, NewsEnvelope, NewsPost, ResourceKind, ScheduleEnvelope,
    ScheduleEvent, StreamEnvelope, StreamRecord, StreamUpdate,
};
use crate::session::Credential;

const ADMIN_PASSWORD_HEADER: &str = "X-Admin-Password";

/// Client for the hub's `?resource=` HTTP endpoint
pub struct HttpRemote {
    http_client: HttpClient,
    base_url: String,
}

impl HttpRemote {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, kind: ResourceKind) -> RequestBuilder {
        self.http_client
            .request(method, &self.base_url)
            .query(&[("resource", kind.as_str())])
    }

    fn admin_request(&self, method: Method, kind: ResourceKind, credential: &Credential) -> RequestBuilder {
        self.request(method, kind)
            .header(header::CONTENT_TYPE, "application/json")
            .header(ADMIN_PASSWORD_HEADER, credential.expose())
    }

    async fn send(request: RequestBuilder) -> RemoteResult<Response> {
        let response = request.send().await?;
        check_status(response.status())?;
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, kind: ResourceKind) -> RemoteResult<T> {
        let response = Self::send(self.request(Method::GET, kind)).await?;
        let body = response.text().await?;
        decode_body(&body)
    }
}

/// 401 means the credential was rejected; any other non-2xx is a transport failure.
fn check_status(status: StatusCode) -> RemoteResult<()> {
    if status == StatusCode::UNAUTHORIZED {
        Err(RemoteError::Unauthorized)
    } else if !status.is_success() {
        Err(RemoteError::Status(status.as_u16()))
    } else {
        Ok(())
    }
}

fn decode_body<T: DeserializeOwned>(body: &str) -> RemoteResult<T> {
    serde_json::from_str(body).map_err(|e| RemoteError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteApi for HttpRemote {
    fn backend_name(&self) -> &str {
        "http"
    }

    async fn fetch_stream(&self) -> RemoteResult<Option<StreamRecord>> {
        let envelope: StreamEnvelope = self.get(ResourceKind::Stream).await?;
        Ok(envelope.stream)
    }

    async fn fetch_schedule(&self) -> RemoteResult<Vec<ScheduleEvent>> {
        let envelope: ScheduleEnvelope = self.get(ResourceKind::Schedule).await?;
        Ok(envelope.events.unwrap_or_default())
    }

    async fn fetch_news(&self) -> RemoteResult<Vec<NewsPost>> {
        let envelope: NewsEnvelope = self.get(ResourceKind::News).await?;
        Ok(envelope.news.unwrap_or_default())
    }

    async fn update_stream(
        &self,
        credential: &Credential,
        update: &StreamUpdate,
    ) -> RemoteResult<StreamRecord> {
        let request = self
            .admin_request(Method::PUT, ResourceKind::Stream, credential)
            .json(update);
        let body = Self::send(request).await?.text().await?;
        let envelope: StreamEnvelope = decode_body(&body)?;
        envelope.stream.ok_or(RemoteError::MissingPayload("stream"))
    }

    async fn create_schedule_event(
        &self,
        credential: &Credential,
        event: &NewScheduleEvent,
    ) -> RemoteResult<()> {
        let request = self
            .admin_request(Method::POST, ResourceKind::Schedule, credential)
            .json(event);
        Self::send(request).await?;
        Ok(())
    }

    async fn delete_schedule_event(&self, credential: &Credential, id: i64) -> RemoteResult<()> {
        let request = self
            .admin_request(Method::DELETE, ResourceKind::Schedule, credential)
            .query(&[("id", id)]);
        Self::send(request).await?;
        Ok(())
    }

    async fn create_news_post(&self, credential: &Credential, post: &NewNewsPost) -> RemoteResult<()> {
        let request = self
            .admin_request(Method::POST, ResourceKind::News, credential)
            .json(post);
        Self::send(request).await?;
        Ok(())
    }

    async fn delete_news_post(&self, credential: &Credential, id: i64) -> RemoteResult<()> {
        let request = self
            .admin_request(Method::DELETE, ResourceKind::News, credential)
            .query(&[("id", id)]);
        Self::send(request).await?;
        Ok(())
    }
}
