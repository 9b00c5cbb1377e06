use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.moltbook.com/api/v1";
pub const POST_WEB_URL: &str = "https://www.moltbook.com/post";
const MAX_RETRY_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("Rate limit exceeded: {hint} (Retry after {} seconds)", retry_after.as_secs())]
    RateLimited { hint: String, retry_after: Duration },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retries: u32,
    pub retry_wait: Duration,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: format!("moltbook-tui/{}", crate::VERSION),
            api_key: None,
            timeout: Duration::from_secs(60),
            retries: 3,
            retry_wait: Duration::from_secs(1),
            http_client: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl SortOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Hot => "hot",
            SortOption::New => "new",
            SortOption::Top => "top",
            SortOption::Rising => "rising",
        }
    }

    pub fn next(self) -> Self {
        match self {
            SortOption::Hot => SortOption::New,
            SortOption::New => SortOption::Top,
            SortOption::Top => SortOption::Rising,
            SortOption::Rising => SortOption::Hot,
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "hot" => Some(SortOption::Hot),
            "new" => Some(SortOption::New),
            "top" => Some(SortOption::Top),
            "rising" => Some(SortOption::Rising),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchKind {
    #[default]
    Posts,
    Comments,
    All,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Posts => "posts",
            SearchKind::Comments => "comments",
            SearchKind::All => "all",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Community {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "content", default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upvotes: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub downvotes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
    #[serde(rename = "submolt", default, deserialize_with = "null_as_default")]
    pub community: Community,
    #[serde(rename = "similarity", default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl Post {
    pub fn web_url(&self) -> String {
        format!("{}/{}", POST_WEB_URL, self.id)
    }

    /// External link when the post has one, otherwise its web page.
    pub fn open_target(&self) -> String {
        match self.link.as_deref().map(str::trim) {
            Some(link) if !link.is_empty() => link.to_string(),
            _ => self.web_url(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(rename = "content", default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upvotes: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub downvotes: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub karma: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub follower_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub following_count: i64,
    #[serde(rename = "is_claimed", default, deserialize_with = "null_as_default")]
    pub claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

#[derive(Deserialize)]
struct RateLimitBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    hint: String,
    #[serde(default)]
    retry_after_seconds: u64,
    #[serde(default)]
    retry_after_minutes: u64,
}

pub struct Client {
    http: HttpClient,
    base_url: Url,
    user_agent: String,
    api_key: Option<String>,
    retries: u32,
    retry_wait: Duration,
}

impl Client {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        if config.user_agent.trim().is_empty() {
            anyhow::bail!("moltbook client user agent required");
        }
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder().timeout(config.timeout).build()?,
        };
        let api_key = config
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(Client {
            http,
            base_url,
            user_agent: config.user_agent,
            api_key,
            retries: config.retries,
            retry_wait: config.retry_wait,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn register(&self, name: &str, description: &str) -> Result<Agent, ApiError> {
        let body = serde_json::json!({ "name": name, "description": description });
        let payload = self.request(Method::POST, "agents/register", &[], Some(body))?;
        pick::<Agent>(&payload, "agent")?
            .filter(|agent| !agent.name.is_empty())
            .ok_or_else(|| ApiError::Parse("failed to find agent in response".into()))
    }

    pub fn feed(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        let params = page_params(sort, limit, offset);
        let payload = self.request(Method::GET, "posts", &params, None)?;
        Ok(pick(&payload, "posts")?.unwrap_or_default())
    }

    pub fn personalized_feed(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        let params = page_params(sort, limit, offset);
        let payload = self.request(Method::GET, "feed", &params, None)?;
        Ok(pick(&payload, "posts")?.unwrap_or_default())
    }

    pub fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<Post>, ApiError> {
        let params = [
            ("q", query.to_string()),
            ("type", kind.as_str().to_string()),
        ];
        let payload = self.request(Method::GET, "search", &params, None)?;
        Ok(pick(&payload, "results")?.unwrap_or_default())
    }

    pub fn comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Comment>, ApiError> {
        let params = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let path = format!("posts/{post_id}/comments");
        let payload = self.request(Method::GET, &path, &params, None)?;
        pick(&payload, "comments")?
            .ok_or_else(|| ApiError::Parse("could not find comments in response".into()))
    }

    pub fn create_post(&self, community: &str, title: &str, body: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "submolt": community, "title": title, "content": body });
        self.request(Method::POST, "posts", &[], Some(body))?;
        Ok(())
    }

    pub fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("posts/{post_id}"), &[], None)?;
        Ok(())
    }

    pub fn upvote(&self, post_id: &str) -> Result<(), ApiError> {
        let path = format!("posts/{post_id}/upvote");
        self.request(Method::POST, &path, &[], Some(serde_json::json!({})))?;
        Ok(())
    }

    pub fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ApiError> {
        let path = format!("posts/{post_id}/comments");
        let body = serde_json::json!({ "content": body });
        self.request(Method::POST, &path, &[], Some(body))?;
        Ok(())
    }

    pub fn me(&self) -> Result<Agent, ApiError> {
        let payload = self.request(Method::GET, "agents/me", &[], None)?;
        pick::<Agent>(&payload, "agent")?
            .filter(|agent| !agent.name.is_empty())
            .ok_or_else(|| ApiError::Parse("could not find agent in response".into()))
    }

    pub fn profile(&self, name: &str) -> Result<(Agent, Vec<Post>), ApiError> {
        let params = [("name", name.to_string())];
        let payload = self.request(Method::GET, "agents/profile", &params, None)?;
        let agent = pick::<Agent>(&payload, "agent")?
            .ok_or_else(|| ApiError::Parse("could not find profile data".into()))?;
        let posts = pick(&payload, "recentPosts")?.unwrap_or_default();
        Ok((agent, posts))
    }

    pub fn follow(&self, name: &str) -> Result<(), ApiError> {
        self.request(Method::POST, &format!("agents/{name}/follow"), &[], None)?;
        Ok(())
    }

    pub fn unfollow(&self, name: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, &format!("agents/{name}/follow"), &[], None)?;
        Ok(())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Network(format!("invalid request url: {err}")))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), url.clone(), body.as_ref()) {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    let wait = backoff(self.retry_wait, attempt);
                    tracing::warn!(%url, attempt, ?wait, error = %err, "retrying request");
                    thread::sleep(wait);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn send_once(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Value, ApiError> {
        tracing::debug!(%method, %url, "request");
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, &self.user_agent);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key).header("X-API-Key", key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send()?;
        decode_response(resp)
    }
}

fn decode_response(resp: Response) -> Result<Value, ApiError> {
    let status = resp.status();
    let headers = resp.headers().clone();
    let text = resp.text()?;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(rate_limited(&headers, &text));
    }

    let payload: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            if !status.is_success() {
                return Err(status_error(status, text.trim().to_string()));
            }
            return Err(ApiError::Parse(format!("invalid JSON ({}): {err}", status.as_u16())));
        }
    };

    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(status.is_success());
    if success && status.is_success() {
        return Ok(payload);
    }

    let error = payload.get("error").and_then(Value::as_str).unwrap_or_default();
    let hint = payload.get("hint").and_then(Value::as_str).unwrap_or_default();
    let message = match (error.is_empty(), hint.is_empty()) {
        (false, false) => format!("{error} (Hint: {hint})"),
        (false, true) => error.to_string(),
        _ => format!("request failed: {}", status.as_u16()),
    };
    Err(status_error(status, message))
}

fn status_error(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        _ => ApiError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn rate_limited(headers: &HeaderMap, body: &str) -> ApiError {
    let parsed: Option<RateLimitBody> = serde_json::from_str(body).ok();
    let header_secs = headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let (hint, secs) = match parsed {
        Some(body) => {
            let hint = if !body.hint.is_empty() { body.hint } else { body.error };
            let secs = if body.retry_after_seconds > 0 {
                body.retry_after_seconds
            } else if body.retry_after_minutes > 0 {
                body.retry_after_minutes * 60
            } else {
                header_secs
            };
            (hint, secs)
        }
        None => (String::new(), header_secs),
    };
    let hint = if hint.is_empty() {
        "slow down and try again later".to_string()
    } else {
        hint
    };
    ApiError::RateLimited {
        hint,
        retry_after: Duration::from_secs(secs),
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_RETRY_WAIT)
}

fn page_params(sort: SortOption, limit: usize, offset: usize) -> [(&'static str, String); 3] {
    [
        ("sort", sort.as_str().to_string()),
        ("limit", limit.to_string()),
        ("offset", offset.to_string()),
    ]
}

/// Reads `key` from the response root, falling back to the `data` envelope.
///
/// An absent or null key is `Ok(None)`. A present value that does not decode
/// is a parse error rather than an empty result.
fn pick<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<Option<T>, ApiError> {
    let candidates = [payload.get(key), payload.get("data").and_then(|data| data.get(key))];
    let Some(value) = candidates.into_iter().flatten().find(|value| !value.is_null()) else {
        return Ok(None);
    };
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|err| ApiError::Parse(format!("invalid {key} in response: {err}")))
}

/// Decodes an explicit JSON null as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn pick_reads_root_and_data_envelope() {
        let root = serde_json::json!({ "success": true, "posts": [{ "id": "a", "title": "t" }] });
        let posts: Vec<Post> = pick(&root, "posts").unwrap().unwrap();
        assert_eq!(posts[0].id, "a");

        let wrapped = serde_json::json!({
            "success": true,
            "data": { "agent": { "name": "crab" } }
        });
        let agent: Agent = pick(&wrapped, "agent").unwrap().unwrap();
        assert_eq!(agent.name, "crab");

        assert!(pick::<Vec<Post>>(&wrapped, "posts").unwrap().is_none());
    }

    #[test]
    fn null_fields_decode_as_defaults() {
        let payload = serde_json::json!({
            "success": true,
            "posts": [
                { "id": "a", "title": "Text", "content": "hi", "author": { "name": "crab" } },
                {
                    "id": "b",
                    "title": "Link",
                    "content": null,
                    "url": "https://example.com",
                    "upvotes": null,
                    "author": null,
                    "submolt": null
                }
            ]
        });
        let posts: Vec<Post> = pick(&payload, "posts").unwrap().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].body, "");
        assert_eq!(posts[1].author, Author::default());
        assert_eq!(posts[1].upvotes, 0);
        assert_eq!(posts[1].open_target(), "https://example.com");

        let payload = serde_json::json!({
            "comments": [{ "id": "c", "content": null, "author": null }]
        });
        let comments: Vec<Comment> = pick(&payload, "comments").unwrap().unwrap();
        assert_eq!(comments[0].body, "");
    }

    #[test]
    fn undecodable_page_is_a_parse_error() {
        let payload = serde_json::json!({ "posts": [{ "id": "a" }, { "title": "no id" }] });
        assert!(matches!(
            pick::<Vec<Post>>(&payload, "posts"),
            Err(ApiError::Parse(_))
        ));
    }

    #[test]
    fn post_wire_names_map_to_domain_fields() {
        let json = r#"{
            "id": "p1",
            "type": "text",
            "title": "Hello",
            "content": "Body",
            "url": "https://example.com",
            "upvotes": 3,
            "downvotes": 1,
            "created_at": "2025-01-30T12:00:00Z",
            "author": { "name": "crab" },
            "submolt": { "name": "general", "display_name": "General" },
            "similarity": 0.5
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.kind, "text");
        assert_eq!(post.body, "Body");
        assert_eq!(post.link.as_deref(), Some("https://example.com"));
        assert_eq!(post.community.display_name, "General");
        assert_eq!(post.relevance, Some(0.5));
        assert_eq!(post.open_target(), "https://example.com");
    }

    #[test]
    fn post_without_link_opens_its_page() {
        let post = Post {
            id: "p9".into(),
            link: Some("  ".into()),
            ..Post::default()
        };
        assert_eq!(post.open_target(), format!("{POST_WEB_URL}/p9"));
    }

    #[test]
    fn rate_limit_prefers_hint_and_seconds() {
        let body = r#"{"error":"Too many","hint":"wait a bit","retry_after_minutes":2}"#;
        let err = rate_limited(&HeaderMap::new(), body);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded: wait a bit (Retry after 120 seconds)"
        );
    }

    #[test]
    fn rate_limit_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        let err = rate_limited(&headers, "not json");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn status_errors_classify() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "no".into()),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "gone".into()),
            ApiError::NotFound(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "x".into()).is_transient());
        assert!(!status_error(StatusCode::BAD_REQUEST, "x".into()).is_transient());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff(base, 0), Duration::from_secs(1));
        assert_eq!(backoff(base, 1), Duration::from_secs(2));
        assert_eq!(backoff(base, 5), MAX_RETRY_WAIT);
    }

    #[test]
    fn client_requires_user_agent() {
        let config = ClientConfig {
            user_agent: " ".into(),
            ..ClientConfig::default()
        };
        assert!(Client::new(config).is_err());
    }
}
