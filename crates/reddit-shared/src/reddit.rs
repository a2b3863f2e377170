//! Reddit listing model and the plain-text rendering returned by the tools.
//!
//! Parses the JSON shapes served by Reddit's listing endpoints
//! (`/r/{sub}/hot`, `/comments/{id}`) into posts and comment trees, and
//! renders them as the human-readable text the MCP tools return.

use crate::error::{RedditError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Shown when a post or comment has no author
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A submission, reduced to the fields the tools render
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub score: i64,
    pub num_comments: u64,
    pub author: Option<String>,
    pub is_self: bool,
    pub is_gallery: Option<bool>,
    pub selftext: String,
    pub url: String,
    pub permalink: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostType {
    Link,
    Text,
    Gallery,
    Unknown,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Link => "link",
            PostType::Text => "text",
            PostType::Gallery => "gallery",
            PostType::Unknown => "unknown",
        }
    }
}

impl Post {
    pub fn post_type(&self) -> PostType {
        if self.is_gallery.unwrap_or(false) {
            PostType::Gallery
        } else if self.is_self {
            PostType::Text
        } else if !self.url.is_empty() {
            PostType::Link
        } else {
            PostType::Unknown
        }
    }

    /// Body shown under `Content:`. Link posts show their permalink, text
    /// posts their self text, galleries the gallery URL.
    pub fn content(&self) -> Option<&str> {
        match self.post_type() {
            PostType::Link => Some(&self.permalink),
            PostType::Text => Some(&self.selftext),
            PostType::Gallery => Some(&self.url),
            PostType::Unknown => None,
        }
    }

    pub fn author_display(&self) -> &str {
        display_author(self.author.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub score: i64,
    pub body: String,
}

/// A comment and its replies
#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub comment: Comment,
    pub children: Vec<CommentNode>,
}

fn display_author(author: Option<&str>) -> &str {
    match author {
        Some(a) if !a.is_empty() => a,
        _ => DELETED_AUTHOR,
    }
}

/// `data.children[*]` of a listing object, or an empty slice for anything
/// else (Reddit sends `""` for a comment without replies).
fn listing_children(listing: &Value) -> &[Value] {
    listing
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn things_of_kind<'a>(listing: &'a Value, kind: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    listing_children(listing)
        .iter()
        .filter(move |child| child.get("kind").and_then(Value::as_str) == Some(kind))
        .filter_map(|child| child.get("data"))
}

/// Posts of a subreddit listing
pub fn parse_listing_posts(listing: &Value) -> Result<Vec<Post>> {
    if listing.get("data").is_none() {
        return Err(RedditError::Reddit("response is not a listing".to_string()));
    }
    things_of_kind(listing, "t3")
        .map(|data| Post::deserialize(data).map_err(RedditError::from))
        .collect()
}

/// Parse the `[post listing, comment listing]` pair returned for a post.
///
/// Keeps at most `comment_limit` top-level comments and `comment_depth`
/// levels of nesting (depth 1 means top-level comments only). "more"
/// placeholders are dropped.
pub fn parse_post_with_comments(
    response: &Value,
    comment_limit: usize,
    comment_depth: usize,
) -> Result<(Post, Vec<CommentNode>)> {
    let parts = response
        .as_array()
        .filter(|parts| parts.len() >= 2)
        .ok_or_else(|| RedditError::Reddit("expected [post, comments] listing pair".to_string()))?;

    let post = parse_listing_posts(&parts[0])?
        .into_iter()
        .next()
        .ok_or_else(|| RedditError::Reddit("post not found".to_string()))?;

    let mut comments = parse_comment_level(&parts[1], comment_depth)?;
    comments.truncate(comment_limit);
    Ok((post, comments))
}

fn parse_comment_level(listing: &Value, depth_left: usize) -> Result<Vec<CommentNode>> {
    if depth_left == 0 {
        return Ok(Vec::new());
    }
    things_of_kind(listing, "t1")
        .map(|data| -> Result<CommentNode> {
            let comment = Comment::deserialize(data)?;
            let children = match data.get("replies") {
                Some(replies) => parse_comment_level(replies, depth_left - 1)?,
                None => Vec::new(),
            };
            Ok(CommentNode { comment, children })
        })
        .collect()
}

/// One post block of the hot-threads tool output
pub fn format_post_summary(post: &Post) -> String {
    format!(
        "Title: {}\nScore: {}\nComments: {}\nAuthor: {}\nType: {}\nContent: {}\nLink: https://reddit.com{}\n---",
        post.title,
        post.score,
        post.num_comments,
        post.author_display(),
        post.post_type().as_str(),
        post.content().unwrap_or("None"),
        post.permalink,
    )
}

/// Hot-threads tool output: post blocks separated by a blank line
pub fn format_hot_threads(posts: &[Post]) -> String {
    posts
        .iter()
        .map(format_post_summary)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a comment and its replies, indenting each level with `"-- "`.
pub fn format_comment_tree(node: &CommentNode, depth: usize) -> String {
    let indent = "-- ".repeat(depth);
    let mut out = format!(
        "{indent}* Author: {}\n{indent}  Score: {}\n{indent}  {}\n",
        display_author(node.comment.author.as_deref()),
        node.comment.score,
        node.comment.body,
        indent = indent,
    );
    for child in &node.children {
        out.push('\n');
        out.push_str(&format_comment_tree(child, depth + 1));
    }
    out
}

/// Post-content tool output: post header followed by the comment trees
pub fn format_post_detail(post: &Post, comments: &[CommentNode]) -> String {
    let mut out = format!(
        "Title: {}\nScore: {}\nAuthor: {}\nType: {}\nContent: {}\n",
        post.title,
        post.score,
        post.author_display(),
        post.post_type().as_str(),
        post.content().unwrap_or("None"),
    );

    if comments.is_empty() {
        out.push_str("\nNo comments found.");
    } else {
        out.push_str("\nComments:\n");
        for node in comments {
            out.push('\n');
            out.push_str(&format_comment_tree(node, 0));
        }
    }
    out
}
