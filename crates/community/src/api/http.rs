//! `reqwest` implementation of [`CommunityApi`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use wellspring_config::ApiConfig;

use super::CommunityApi;
use crate::entities::{Channel, Community, Membership, Message, Page};
use crate::types::{
    CommunityError, CommunityResult, ErrorBody, JoinCommunityBody, MessageBody, MessagePageQuery,
};

/// Community backend client with an explicit per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpCommunityApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpCommunityApi {
    pub fn new(config: &ApiConfig) -> CommunityResult<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/')).map_err(|error| {
            CommunityError::validation(format!("invalid api base url {}: {error}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(CommunityError::validation(format!(
                "api base url cannot carry paths: {}",
                config.base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorise(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> CommunityResult<T> {
        let response = self.authorise(request).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn execute(&self, request: RequestBuilder) -> CommunityResult<()> {
        let response = self.authorise(request).send().await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> CommunityResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("request failed");

    warn!(status = status.as_u16(), path = %url, "community api request rejected");

    Err(match status {
        StatusCode::FORBIDDEN => CommunityError::MembershipRequired,
        StatusCode::NOT_FOUND => CommunityError::not_found(body.describe(&url)),
        _ => CommunityError::rejected(status.as_u16(), body.describe(reason)),
    })
}

#[async_trait]
impl CommunityApi for HttpCommunityApi {
    async fn list_communities(&self, page: u32) -> CommunityResult<Page<Community>> {
        debug!(page, "listing communities");
        let request = self
            .client
            .get(self.endpoint(&["communities"]))
            .query(&[("page", page)]);
        self.fetch(request).await
    }

    async fn get_community(&self, community_id: &str) -> CommunityResult<Community> {
        let request = self.client.get(self.endpoint(&["communities", community_id]));
        self.fetch(request).await
    }

    async fn join_community(&self, community_id: &str, handle: &str) -> CommunityResult<Membership> {
        debug!(community_id, "joining community");
        let request = self
            .client
            .post(self.endpoint(&["communities", community_id, "join"]))
            .json(&JoinCommunityBody {
                handle: handle.to_string(),
            });
        self.fetch(request).await
    }

    async fn leave_community(&self, community_id: &str) -> CommunityResult<()> {
        debug!(community_id, "leaving community");
        let request = self
            .client
            .post(self.endpoint(&["communities", community_id, "leave"]));
        self.execute(request).await
    }

    async fn list_channels(&self, community_id: &str) -> CommunityResult<Vec<Channel>> {
        let request = self
            .client
            .get(self.endpoint(&["communities", community_id, "channels"]));
        self.fetch(request).await
    }

    async fn list_messages(
        &self,
        channel_id: &str,
        query: MessagePageQuery,
    ) -> CommunityResult<Page<Message>> {
        let request = self
            .client
            .get(self.endpoint(&["channels", channel_id, "messages"]))
            .query(&query.as_params());
        self.fetch(request).await
    }

    async fn send_message(&self, channel_id: &str, body: &str) -> CommunityResult<Message> {
        let request = self
            .client
            .post(self.endpoint(&["channels", channel_id, "messages"]))
            .json(&MessageBody::new(body));
        self.fetch(request).await
    }

    async fn edit_message(&self, message_id: &str, body: &str) -> CommunityResult<Message> {
        let request = self
            .client
            .patch(self.endpoint(&["messages", message_id]))
            .json(&MessageBody::new(body));
        self.fetch(request).await
    }

    async fn delete_message(&self, message_id: &str) -> CommunityResult<()> {
        let request = self.client.delete(self.endpoint(&["messages", message_id]));
        self.execute(request).await
    }

    async fn reply_to_message(&self, message_id: &str, body: &str) -> CommunityResult<Message> {
        let request = self
            .client
            .post(self.endpoint(&["messages", message_id, "replies"]))
            .json(&MessageBody::new(body));
        self.fetch(request).await
    }
}
