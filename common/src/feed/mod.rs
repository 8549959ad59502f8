//! Social post feed persisted in local storage.
//!
//! The whole list lives under a single storage key and is rewritten after
//! every mutation. There is no server side authority: two machines never
//! share a feed and the last writer wins.
//!
//! Authoring actions (create, pin, delete) are restricted to the treasury
//! address inside the repository itself, not only by hiding controls.
//! Likes and votes are open to anyone, without any per viewer dedup.

mod storage;

pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::{
    auth::is_admin,
    config::{MAX_POST_LENGTH, OFFICIAL_AUTHOR, POSTS_STORAGE_KEY},
    security::sanitize_content,
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("action restricted to treasury address only")]
    Unauthorized,
    #[error("post content is empty")]
    EmptyContent,
    #[error("post content is longer than {max} characters")]
    ContentTooLong { max: usize },
    #[error("failed to encode posts: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|option| option.votes).sum()
    }

    /// Share of the votes for an option, in percent. No votes yet is 0%.
    pub fn percentage(&self, index: usize) -> f64 {
        let total = self.total_votes();
        match self.options.get(index) {
            Some(option) if total > 0 => option.votes as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }
}

/// Poll as typed by the author, before sanitizing
#[derive(Debug, Clone, Default)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub likes: u64,
    pub reposts: u64,
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

/// Feed repository bound to one storage backend and one treasury address
pub struct PostFeed<S: LocalStorage> {
    storage: S,
    treasury: String,
    posts: Vec<Post>,
}

impl<S: LocalStorage> PostFeed<S> {
    /// Load the feed from storage.
    ///
    /// Missing or malformed data starts an empty feed, it is never an error.
    pub async fn load(storage: S, treasury: impl Into<String>) -> Self {
        let posts = match storage.get_item(POSTS_STORAGE_KEY).await {
            Ok(Some(content)) => match serde_json::from_str::<Vec<Post>>(&content) {
                Ok(posts) => posts,
                Err(e) => {
                    if log::log_enabled!(log::Level::Warn) {
                        warn!("Stored posts are unreadable, starting with an empty feed: {}", e);
                    }
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                if log::log_enabled!(log::Level::Warn) {
                    warn!("Cannot read stored posts, starting with an empty feed: {}", e);
                }
                Vec::new()
            }
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!("Loaded {} posts", posts.len());
        }

        Self {
            storage,
            treasury: treasury.into(),
            posts,
        }
    }

    // Overwrite the stored list with the current one
    async fn persist(&self) -> Result<(), FeedError> {
        let content = serde_json::to_string(&self.posts)?;
        self.storage.set_item(POSTS_STORAGE_KEY, &content).await?;
        Ok(())
    }

    fn ensure_admin(&self, actor: Option<&str>) -> Result<(), FeedError> {
        if is_admin(actor, &self.treasury) {
            Ok(())
        } else {
            Err(FeedError::Unauthorized)
        }
    }

    /// Posts in storage order, newest created first
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: &str) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Display order: pinned posts first, then newest first inside each group
    pub fn sorted(&self) -> Vec<&Post> {
        let mut sorted: Vec<&Post> = self.posts.iter().collect();
        sorted.sort_by(|a, b| {
            b.pinned
                .cmp(&a.pinned)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        sorted
    }

    pub async fn create(
        &mut self,
        actor: Option<&str>,
        content: &str,
        poll: Option<PollDraft>,
    ) -> Result<&Post, FeedError> {
        self.create_at(actor, content, poll, crate::time::now()).await
    }

    /// Create a post with an explicit creation time
    pub async fn create_at(
        &mut self,
        actor: Option<&str>,
        content: &str,
        poll: Option<PollDraft>,
        timestamp: DateTime<Utc>,
    ) -> Result<&Post, FeedError> {
        self.ensure_admin(actor)?;

        if content.trim().is_empty() {
            return Err(FeedError::EmptyContent);
        }
        if content.chars().count() > MAX_POST_LENGTH {
            return Err(FeedError::ContentTooLong {
                max: MAX_POST_LENGTH,
            });
        }

        let poll = poll
            .filter(|draft| !draft.question.trim().is_empty())
            .map(|draft| Poll {
                question: sanitize_content(&draft.question),
                options: draft
                    .options
                    .iter()
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| PollOption {
                        text: sanitize_content(text),
                        votes: 0,
                    })
                    .collect(),
            });

        let post = Post {
            id: self.next_id(timestamp),
            content: sanitize_content(content),
            author: OFFICIAL_AUTHOR.to_owned(),
            timestamp,
            likes: 0,
            reposts: 0,
            pinned: false,
            media: None,
            poll,
        };

        if log::log_enabled!(log::Level::Info) {
            info!("Created post {}", post.id);
        }

        self.posts.insert(0, post);
        self.persist().await?;
        Ok(&self.posts[0])
    }

    // Millisecond timestamp, bumped past the newest id so two posts
    // created within the same millisecond still get distinct ids
    fn next_id(&self, timestamp: DateTime<Utc>) -> String {
        let mut id = timestamp.timestamp_millis();
        if let Some(newest) = self
            .posts
            .iter()
            .filter_map(|post| post.id.parse::<i64>().ok())
            .max()
        {
            if newest >= id {
                id = newest + 1;
            }
        }
        id.to_string()
    }

    pub async fn toggle_pin(&mut self, actor: Option<&str>, id: &str) -> Result<(), FeedError> {
        self.ensure_admin(actor)?;

        if let Some(post) = self.posts.iter_mut().find(|post| post.id == id) {
            post.pinned = !post.pinned;
        }
        self.persist().await
    }

    pub async fn delete(&mut self, actor: Option<&str>, id: &str) -> Result<(), FeedError> {
        self.ensure_admin(actor)?;

        self.posts.retain(|post| post.id != id);
        self.persist().await
    }

    /// Anyone may like, as many times as they want
    pub async fn like(&mut self, id: &str) -> Result<(), FeedError> {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == id) {
            post.likes += 1;
        }
        self.persist().await
    }

    /// Count a vote. An unknown post, a post without poll or an option
    /// index out of range changes nothing.
    pub async fn vote(&mut self, id: &str, option_index: usize) -> Result<(), FeedError> {
        let option = self
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .and_then(|post| post.poll.as_mut())
            .and_then(|poll| poll.options.get_mut(option_index));

        if let Some(option) = option {
            option.votes += 1;
        }
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TREASURY: &str = "0x1111111111111111111111111111111111111111";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sorted_pinned_first_then_newest() {
        let mut feed = PostFeed::load(MemoryStorage::new(), TREASURY).await;
        let old = feed.create_at(Some(TREASURY), "old", None, at(0)).await.unwrap().id.clone();
        let new = feed.create_at(Some(TREASURY), "new", None, at(10)).await.unwrap().id.clone();
        let newest = feed.create_at(Some(TREASURY), "newest", None, at(20)).await.unwrap().id.clone();

        let order: Vec<&str> = feed.sorted().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec![newest.as_str(), new.as_str(), old.as_str()]);

        feed.toggle_pin(Some(TREASURY), &old).await.unwrap();
        let order: Vec<&str> = feed.sorted().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec![old.as_str(), newest.as_str(), new.as_str()]);
    }

    #[tokio::test]
    async fn test_ids_unique_within_same_millisecond() {
        let mut feed = PostFeed::load(MemoryStorage::new(), TREASURY).await;
        let a = feed.create_at(Some(TREASURY), "a", None, at(0)).await.unwrap().id.clone();
        let b = feed.create_at(Some(TREASURY), "b", None, at(0)).await.unwrap().id.clone();
        assert_ne!(a, b);
        assert_eq!(a, at(0).timestamp_millis().to_string());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_content() {
        let mut feed = PostFeed::load(MemoryStorage::new(), TREASURY).await;
        assert!(matches!(
            feed.create(Some(TREASURY), "   ", None).await,
            Err(FeedError::EmptyContent)
        ));
        let long = "x".repeat(MAX_POST_LENGTH + 1);
        assert!(matches!(
            feed.create(Some(TREASURY), &long, None).await,
            Err(FeedError::ContentTooLong { .. })
        ));
        let exact = "x".repeat(MAX_POST_LENGTH);
        assert!(feed.create(Some(TREASURY), &exact, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_poll_draft_cleanup() {
        let mut feed = PostFeed::load(MemoryStorage::new(), TREASURY).await;
        let draft = PollDraft {
            question: "Moon?".into(),
            options: vec!["yes".into(), "  ".into(), "<no>".into()],
        };
        let post = feed.create(Some(TREASURY), "vote", Some(draft)).await.unwrap();
        let poll = post.poll.as_ref().unwrap();
        assert_eq!(poll.options.len(), 2);
        assert_eq!(poll.options[1].text, "&lt;no&gt;");

        // blank question means no poll at all
        let draft = PollDraft {
            question: " ".into(),
            options: vec!["a".into(), "b".into()],
        };
        let post = feed.create(Some(TREASURY), "no poll", Some(draft)).await.unwrap();
        assert!(post.poll.is_none());
    }

    #[test]
    fn test_poll_percentage() {
        let mut poll = Poll {
            question: "q".into(),
            options: vec![
                PollOption { text: "a".into(), votes: 0 },
                PollOption { text: "b".into(), votes: 0 },
            ],
        };
        assert_eq!(poll.percentage(0), 0.0);

        poll.options[0].votes = 3;
        poll.options[1].votes = 1;
        assert_eq!(poll.total_votes(), 4);
        assert_eq!(poll.percentage(0), 75.0);
        assert_eq!(poll.percentage(1), 25.0);
        assert_eq!(poll.percentage(7), 0.0);
    }

    #[test]
    fn test_post_json_layout() {
        let json = r#"[{"id":"1700000000000","content":"gm","author":"Chaos Coin Official",
            "timestamp":"2023-11-14T22:13:20.000Z","likes":2,"reposts":0,"pinned":true,
            "media":{"type":"image","url":"https://example.com/a.png"}}]"#;
        let posts: Vec<Post> = serde_json::from_str(json).unwrap();
        assert_eq!(posts[0].likes, 2);
        assert_eq!(posts[0].media.as_ref().unwrap().kind, MediaKind::Image);
        assert!(posts[0].poll.is_none());

        let encoded = serde_json::to_value(&posts[0]).unwrap();
        assert_eq!(encoded["media"]["type"], "image");
        assert!(encoded.get("poll").is_none());
    }
}
