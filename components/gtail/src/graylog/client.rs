//! Graylog REST client
//!
//! A thin wrapper around one reused `reqwest::Client`. Every request sends
//! `Accept: application/json` and the configured credential; any non-2xx
//! status becomes `FetchError::Status` so callers can decide whether to retry.

// Local crates
use crate::{
    graylog::models::{
        FetchError, Message, SearchResponse, StreamsResponse, TokenList, TokenRecord,
    },
    helpers::load_config::{Credential, ServerConfig},
    poller::window::FetchWindow,
    streams::directory::{Stream, StreamDirectory},
};

// External crates
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::de::DeserializeOwned;
use tracing::instrument;

/// Graylog rejects state-changing requests without this header (CSRF guard).
const REQUESTED_BY_HEADER: &str = "X-Requested-By";

/// Timestamp format for absolute search bounds.
const ABSOLUTE_BOUND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A single universal search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub window: FetchWindow,
    pub query: Option<String>,
    pub fields: Option<Vec<String>>,
    pub stream_ids: Vec<String>,
    pub limit: u64,
}

impl SearchRequest {
    /// Path of the search endpoint for this request's window.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self.window {
            FetchWindow::Relative { .. } => "/search/universal/relative",
            FetchWindow::Absolute { .. } => "/search/universal/absolute",
        }
    }

    /// Query string parameters, unencoded.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = match &self.window {
            FetchWindow::Relative { seconds } => vec![("range", seconds.to_string())],
            FetchWindow::Absolute { from, to } => vec![
                ("from", from.format(ABSOLUTE_BOUND_FORMAT).to_string()),
                ("to", to.format(ABSOLUTE_BOUND_FORMAT).to_string()),
            ],
        };

        let query = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or("*");
        params.push(("query", query.to_string()));

        if let Some(fields) = self.fields.as_ref().filter(|f| !f.is_empty()) {
            params.push(("fields", fields.join(",")));
        }

        if !self.stream_ids.is_empty() {
            let filter = self
                .stream_ids
                .iter()
                .map(|id| format!("streams:{id}"))
                .collect::<Vec<_>>()
                .join(" OR ");
            params.push(("filter", filter));
        }

        params.push(("limit", self.limit.to_string()));
        params
    }
}

#[derive(Debug, Clone)]
pub struct GraylogClient {
    http: Client,
    base_uri: String,
    credential: Option<Credential>,
}

impl GraylogClient {
    /// Build a client for the configured server.
    pub fn new(server: &ServerConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(server.timeout())
            .user_agent(concat!("gtail/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_uri: server.uri.trim_end_matches('/').to_string(),
            credential: server.credential(),
        })
    }

    /// Same connection settings, different credential.
    #[must_use]
    pub fn with_credential(&self, credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credential {
            Some(Credential::Token(token)) => request.basic_auth(token, Some("token")),
            Some(Credential::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FetchError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let url = response.url().path().to_string();
            tracing::debug!(status = status.as_u16(), url = %url, "Server returned non-success status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        self.send_json(self.http.get(self.url(path)).query(params)).await
    }

    /// Fetch the active streams and snapshot them.
    #[instrument(
        name = "gtail_client::fetch_streams",
        target = "graylog::client",
        level = "debug",
        skip_all
    )]
    pub async fn fetch_streams(&self) -> Result<StreamDirectory, FetchError> {
        let response: StreamsResponse = self.get_json("/streams", &[]).await?;
        tracing::debug!(streams = response.streams.len(), "Fetched stream list");

        Ok(StreamDirectory::from_streams(
            response.streams.into_iter().map(Stream::from),
        ))
    }

    /// Run a search and decode every returned message.
    ///
    /// Messages come back in server order; ordering is the fetcher's job.
    #[instrument(
        name = "gtail_client::search",
        target = "graylog::client",
        level = "debug",
        skip_all,
        fields(endpoint = request.path(), limit = request.limit)
    )]
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Message>, FetchError> {
        let response: SearchResponse = self.get_json(request.path(), &request.params()).await?;
        tracing::debug!(
            returned = response.messages.len(),
            total_results = response.total_results,
            "Search completed"
        );

        response
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect()
    }

    /// Count-only probe: the same search with `limit=1`, reading `total_results`.
    #[instrument(
        name = "gtail_client::count",
        target = "graylog::client",
        level = "debug",
        skip_all
    )]
    pub async fn count(&self, request: &SearchRequest) -> Result<u64, FetchError> {
        let probe = SearchRequest {
            limit: 1,
            ..request.clone()
        };
        let response: SearchResponse = self.get_json(probe.path(), &probe.params()).await?;
        tracing::debug!(total_results = response.total_results, "Count probe completed");
        Ok(response.total_results)
    }

    /// Tokens of `username`.
    pub async fn list_tokens(&self, username: &str) -> Result<Vec<TokenRecord>, FetchError> {
        let list: TokenList = self.get_json(&tokens_path(username), &[]).await?;
        Ok(list.tokens)
    }

    /// Create a new token called `name` for `username`.
    pub async fn create_token(&self, username: &str, name: &str) -> Result<TokenRecord, FetchError> {
        let url = self.url(&format!("{}/{}", tokens_path(username), name));
        let request = self.http.post(url).header(REQUESTED_BY_HEADER, "gtail");
        self.send_json(request).await
    }
}

fn tokens_path(username: &str) -> String {
    format!("/users/{username}/tokens")
}
