//! The two MCP tools: hot threads of a subreddit, and a post with its
//! comment tree.

use crate::reddit_client::{Credentials, RedditClient};
use reddit_shared::reddit::{format_hot_threads, format_post_detail};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

pub const HOT_THREADS_TOOL: &str = "fetch_reddit_hot_threads";
pub const POST_CONTENT_TOOL: &str = "fetch_reddit_post_content";

/// Reddit serves at most 100 posts per listing page
const MAX_POSTS: u32 = 100;
const MAX_COMMENTS: u32 = 500;
const MAX_DEPTH: u32 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HotThreadsArgs {
    pub subreddit: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostContentArgs {
    pub post_id: String,
    #[serde(default = "default_comment_limit")]
    pub comment_limit: u32,
    #[serde(default = "default_comment_depth")]
    pub comment_depth: u32,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

fn default_comment_limit() -> u32 {
    20
}

fn default_comment_depth() -> u32 {
    3
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    HotThreads(HotThreadsArgs),
    PostContent(PostContentArgs),
}

/// Text result of a tool run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn to_result(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.text}],
            "isError": self.is_error,
        })
    }
}

impl ToolCall {
    pub fn parse(name: &str, arguments: Option<Value>) -> Result<Self, ToolError> {
        let arguments = match arguments {
            Some(Value::Null) | None => json!({}),
            Some(v) => v,
        };
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        match name {
            HOT_THREADS_TOOL => serde_json::from_value(arguments)
                .map(ToolCall::HotThreads)
                .map_err(invalid),
            POST_CONTENT_TOOL => serde_json::from_value(arguments)
                .map(ToolCall::PostContent)
                .map_err(invalid),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::HotThreads(_) => HOT_THREADS_TOOL,
            ToolCall::PostContent(_) => POST_CONTENT_TOOL,
        }
    }

    /// Run against Reddit. Tool arguments carrying credentials override the
    /// request's credentials. Failures come back as error text, not `Err`.
    pub async fn execute(&self, client: &RedditClient, request_creds: &Credentials) -> ToolOutput {
        let result = match self {
            ToolCall::HotThreads(args) => {
                let creds = request_creds
                    .clone()
                    .overridden_by(Some(&args.client_id), Some(&args.client_secret));
                client
                    .hot_threads(&args.subreddit, args.limit.clamp(1, MAX_POSTS), &creds)
                    .await
                    .map(|posts| format_hot_threads(&posts))
            }
            ToolCall::PostContent(args) => {
                let creds = request_creds
                    .clone()
                    .overridden_by(Some(&args.client_id), Some(&args.client_secret));
                client
                    .post_with_comments(
                        &args.post_id,
                        args.comment_limit.clamp(1, MAX_COMMENTS),
                        args.comment_depth.clamp(1, MAX_DEPTH),
                        &creds,
                    )
                    .await
                    .map(|(post, comments)| format_post_detail(&post, &comments))
            }
        };

        match result {
            Ok(text) => ToolOutput { text, is_error: false },
            Err(e) => {
                error!("Tool {} failed: {}", self.name(), e);
                ToolOutput {
                    text: format!("An error occurred: {}", e),
                    is_error: true,
                }
            }
        }
    }
}

/// `tools/list` payload
pub fn tool_definitions() -> Value {
    let credential_props = json!({
        "client_id": {
            "type": "string",
            "description": "Reddit API client ID (optional, falls back to server configuration)",
            "default": ""
        },
        "client_secret": {
            "type": "string",
            "description": "Reddit API client secret (optional, falls back to server configuration)",
            "default": ""
        }
    });

    let mut hot_props = json!({
        "subreddit": {"type": "string", "description": "Name of the subreddit"},
        "limit": {"type": "integer", "description": "Number of posts to fetch", "default": 10}
    });
    let mut post_props = json!({
        "post_id": {"type": "string", "description": "Reddit post ID"},
        "comment_limit": {"type": "integer", "description": "Number of top level comments to fetch", "default": 20},
        "comment_depth": {"type": "integer", "description": "Maximum depth of comment tree to traverse", "default": 3}
    });
    for props in [&mut hot_props, &mut post_props] {
        if let (Some(target), Some(extra)) = (props.as_object_mut(), credential_props.as_object()) {
            target.extend(extra.clone());
        }
    }

    json!([
        {
            "name": HOT_THREADS_TOOL,
            "description": "Fetch hot threads from a subreddit",
            "inputSchema": {
                "type": "object",
                "properties": hot_props,
                "required": ["subreddit"]
            }
        },
        {
            "name": POST_CONTENT_TOOL,
            "description": "Fetch detailed content of a specific post, including its comment tree",
            "inputSchema": {
                "type": "object",
                "properties": post_props,
                "required": ["post_id"]
            }
        }
    ])
}
