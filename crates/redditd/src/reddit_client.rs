//! Reddit API client.
//!
//! Without credentials requests go to the public JSON endpoints. With a
//! client id and secret the client performs an application-only OAuth
//! grant and calls the OAuth host; tokens are cached per client id until
//! shortly before they expire.

use reddit_shared::config::RedditConfig;
use reddit_shared::error::{RedditError, Result};
use reddit_shared::reddit::{parse_listing_posts, parse_post_with_comments, CommentNode, Post};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const WWW_BASE: &str = "https://www.reddit.com";
const OAUTH_BASE: &str = "https://oauth.reddit.com";

/// Refresh tokens this long before Reddit says they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Reddit OAuth application credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Both halves present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Replace each field with the override when the override is non-empty.
    pub fn overridden_by(mut self, client_id: Option<&str>, client_secret: Option<&str>) -> Self {
        if let Some(id) = client_id.filter(|v| !v.is_empty()) {
            self.client_id = id.to_string();
        }
        if let Some(secret) = client_secret.filter(|v| !v.is_empty()) {
            self.client_secret = secret.to_string();
        }
        self
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct RedditClient {
    http: reqwest::Client,
    www_base: String,
    oauth_base: String,
    tokens: Arc<Mutex<HashMap<String, CachedToken>>>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .build()
                .unwrap_or_default(),
            www_base: WWW_BASE.to_string(),
            oauth_base: OAUTH_BASE.to_string(),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Point the client at other hosts (a local stand-in for Reddit).
    pub fn with_base_urls(mut self, www_base: &str, oauth_base: &str) -> Self {
        self.www_base = www_base.trim_end_matches('/').to_string();
        self.oauth_base = oauth_base.trim_end_matches('/').to_string();
        self
    }

    /// Hot posts of a subreddit
    pub async fn hot_threads(&self, subreddit: &str, limit: u32, creds: &Credentials) -> Result<Vec<Post>> {
        let subreddit = validate_subreddit(subreddit)?;
        let path = format!("/r/{}/hot", subreddit);
        let listing = self
            .get_json(&path, &[("limit", limit.to_string())], creds)
            .await?;
        parse_listing_posts(&listing)
    }

    /// A post with its top comments
    pub async fn post_with_comments(
        &self,
        post_id: &str,
        comment_limit: u32,
        comment_depth: u32,
        creds: &Credentials,
    ) -> Result<(Post, Vec<CommentNode>)> {
        let post_id = validate_post_id(post_id)?;
        let path = format!("/comments/{}", post_id);
        let response = self
            .get_json(
                &path,
                &[
                    ("sort", "top".to_string()),
                    ("limit", comment_limit.to_string()),
                    ("depth", comment_depth.to_string()),
                ],
                creds,
            )
            .await?;
        parse_post_with_comments(&response, comment_limit as usize, comment_depth as usize)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)], creds: &Credentials) -> Result<Value> {
        let request = if creds.is_complete() {
            let token = self.bearer_token(creds).await?;
            self.http
                .get(format!("{}{}", self.oauth_base, path))
                .bearer_auth(token)
        } else {
            self.http.get(format!("{}{}.json", self.www_base, path))
        };

        debug!("Reddit GET {}", path);
        let response = request
            .query(query)
            .query(&[("raw_json", "1")])
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;

        response.json::<Value>().await.map_err(request_error)
    }

    async fn bearer_token(&self, creds: &Credentials) -> Result<String> {
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(&creds.client_id) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let response: TokenResponse = self
            .http
            .post(format!("{}/api/v1/access_token", self.www_base))
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?
            .json()
            .await
            .map_err(request_error)?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        tokens.insert(
            creds.client_id.clone(),
            CachedToken {
                token: response.access_token.clone(),
                expires_at: Instant::now() + lifetime,
            },
        );
        debug!("Obtained Reddit access token for client {}", mask(&creds.client_id));
        Ok(response.access_token)
    }
}

fn request_error(e: reqwest::Error) -> RedditError {
    RedditError::Reddit(e.to_string())
}

/// Show the first 4 characters of a client id in logs
fn mask(id: &str) -> String {
    let head: String = id.chars().take(4).collect();
    format!("{}...", head)
}

/// Accepts `rust`, `r/rust` and `/r/rust`.
pub fn validate_subreddit(raw: &str) -> Result<&str> {
    let name = raw.trim();
    let name = name
        .strip_prefix("/r/")
        .or_else(|| name.strip_prefix("r/"))
        .unwrap_or(name)
        .trim_end_matches('/');
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RedditError::Reddit(format!("invalid subreddit name: {:?}", raw)));
    }
    Ok(name)
}

/// Accepts bare ids and `t3_` fullnames.
pub fn validate_post_id(raw: &str) -> Result<&str> {
    let id = raw.trim();
    let id = id.strip_prefix("t3_").unwrap_or(id);
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RedditError::Reddit(format!("invalid post id: {:?}", raw)));
    }
    Ok(id)
}
