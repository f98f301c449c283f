// Author: Lukas Bower
// Purpose: Remote timeline API client consumed by the filesystem core.

//! Upstream API client.
//!
//! The core only sees the [`Api`] trait; [`HttpApi`] implements it against
//! the REST v1.1 endpoints with OAuth 1.0a request signing. Tweet payloads
//! stay loosely typed: the formatter extracts optional fields with
//! best-effort casts and skips whatever is absent or mistyped.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::oauth::Signer;

const API_BASE: &str = "https://api.twitter.com";

/// Upstream timestamp layout, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Response codes the upstream uses for missing users and tweets.
const NOT_FOUND_CODES: [i64; 6] = [17, 34, 50, 144, 421, 422];

/// Upstream failure, classified for the error cache.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The user or tweet does not exist (HTTP 404 or a not-found code).
    #[error("{0}")]
    NotFound(String),
    /// Rate limited; `reset_after` is the wait the upstream reported.
    #[error("{message}")]
    RateLimited {
        /// Time until the limit window resets.
        reset_after: Duration,
        /// Diagnostic text.
        message: String,
    },
    /// Anything else: transport failures, 5xx, malformed payloads.
    #[error("{0}")]
    Other(String),
}

/// A followed or looked-up user, as much of it as the tree needs.
#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    /// Screen name, lowercased at the API edge.
    #[serde(default)]
    pub screen_name: String,
    /// Account creation time in the upstream's text layout.
    #[serde(default)]
    pub created_at: String,
}

impl UserProfile {
    /// Account creation time as seconds since epoch; 0 when unparsable.
    #[must_use]
    pub fn mtime(&self) -> u32 {
        DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
            .map(|t| t.timestamp().max(0) as u32)
            .unwrap_or(0)
    }
}

/// A tweet payload: the raw JSON object, accessed leniently.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Post(pub serde_json::Map<String, Value>);

impl Post {
    /// Fetch a top-level string field, if present and a string.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// The tweet id as a decimal string.
    #[must_use]
    pub fn id_str(&self) -> Option<&str> {
        self.str_field("id_str")
    }

    /// Tweet text, preferring the extended `full_text` field.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.str_field("full_text")
            .or_else(|| self.str_field("text"))
            .unwrap_or("")
    }

    /// Parsed creation time, if the field is present and well formed.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.str_field("created_at")?;
        DateTime::parse_from_str(raw, CREATED_AT_FORMAT).ok()
    }

    /// Creation time as seconds since epoch; 0 when absent or unparsable.
    #[must_use]
    pub fn created_unix(&self) -> u32 {
        self.created_at()
            .map(|t| t.timestamp().max(0) as u32)
            .unwrap_or(0)
    }

    /// Screen name of the tweet's author.
    #[must_use]
    pub fn user_screen_name(&self) -> Option<&str> {
        self.0
            .get("user")
            .and_then(Value::as_object)
            .and_then(|user| user.get("screen_name"))
            .and_then(Value::as_str)
    }

    /// The reposted tweet, when this payload is a retweet.
    #[must_use]
    pub fn retweeted_status(&self) -> Option<Post> {
        self.0
            .get("retweeted_status")
            .and_then(Value::as_object)
            .map(|map| Post(map.clone()))
    }

    /// A nested entity list such as `entities.urls`.
    #[must_use]
    pub fn entity_list(&self, group: &str, list: &str) -> Option<&Vec<Value>> {
        self.0
            .get(group)
            .and_then(Value::as_object)
            .and_then(|entities| entities.get(list))
            .and_then(Value::as_array)
    }
}

/// The remote operations the filesystem core consumes.
pub trait Api: Send + Sync {
    /// Look up one user by screen name.
    fn show_user(&self, screen_name: &str) -> Result<UserProfile, ApiError>;
    /// Look up one tweet by id.
    fn show_post(&self, id: &str) -> Result<Post, ApiError>;
    /// The full followed-user set; cursoring is hidden here.
    fn friends_list(&self, screen_name: &str) -> Result<Vec<UserProfile>, ApiError>;
    /// A user's timeline window.
    fn user_timeline(
        &self,
        screen_name: &str,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError>;
    /// The home timeline window.
    fn home_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError>;
    /// The mentions timeline window.
    fn mentions_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError>;
    /// Publish a tweet, optionally as a reply.
    fn post_update(&self, text: &str, in_reply_to: Option<&str>) -> Result<(), ApiError>;
}

impl<T: Api + ?Sized> Api for std::sync::Arc<T> {
    fn show_user(&self, screen_name: &str) -> Result<UserProfile, ApiError> {
        self.as_ref().show_user(screen_name)
    }
    fn show_post(&self, id: &str) -> Result<Post, ApiError> {
        self.as_ref().show_post(id)
    }
    fn friends_list(&self, screen_name: &str) -> Result<Vec<UserProfile>, ApiError> {
        self.as_ref().friends_list(screen_name)
    }
    fn user_timeline(
        &self,
        screen_name: &str,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.as_ref()
            .user_timeline(screen_name, batch, since_id, max_id)
    }
    fn home_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.as_ref().home_timeline(batch, since_id, max_id)
    }
    fn mentions_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.as_ref().mentions_timeline(batch, since_id, max_id)
    }
    fn post_update(&self, text: &str, in_reply_to: Option<&str>) -> Result<(), ApiError> {
        self.as_ref().post_update(text, in_reply_to)
    }
}

/// Blocking HTTP client implementing [`Api`] against the REST endpoints.
pub struct HttpApi {
    agent: ureq::Agent,
    signer: Signer,
}

impl HttpApi {
    /// Build a client from the loaded configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(30))
                .build(),
            signer: Signer::new(
                &config.api_key,
                &config.api_secret_key,
                &config.access_token,
                &config.access_token_secret,
            ),
        }
    }

    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let url = format!("{API_BASE}{path}");
        let auth = self.signer.authorization("GET", &url, params);
        let full = format!("{url}?{}", Signer::encode_pairs(params));
        debug!("GET {path}");
        let response = self
            .agent
            .get(&full)
            .set("Authorization", &auth)
            .call()
            .map_err(|err| classify(path, err))?;
        response
            .into_string()
            .map_err(|err| ApiError::Other(format!("{path}: read body: {err}")))
    }

    fn post_form(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let url = format!("{API_BASE}{path}");
        let auth = self.signer.authorization("POST", &url, params);
        let body = Signer::encode_pairs(params);
        debug!("POST {path}");
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &auth)
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(&body)
            .map_err(|err| classify(path, err))?;
        response
            .into_string()
            .map_err(|err| ApiError::Other(format!("{path}: read body: {err}")))
    }

    fn timeline(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        let mut params: Vec<(&str, &str)> = vec![("tweet_mode", "extended")];
        params.extend_from_slice(extra);
        if let Some(since) = since_id {
            params.push(("since_id", since));
        }
        // max_id is inclusive, so ask for one extra to compensate for the
        // boundary tweet coming back again.
        let count = if let Some(max) = max_id {
            params.push(("max_id", max));
            batch + 1
        } else {
            batch
        };
        let count = count.to_string();
        params.push(("count", count.as_str()));
        let body = self.get(path, &params)?;
        serde_json::from_str(&body)
            .map_err(|err| ApiError::Other(format!("{path}: parse timeline: {err}")))
    }
}

impl Api for HttpApi {
    fn show_user(&self, screen_name: &str) -> Result<UserProfile, ApiError> {
        const PATH: &str = "/1.1/users/show.json";
        let body = self.get(PATH, &[("screen_name", screen_name)])?;
        let mut user: UserProfile = serde_json::from_str(&body)
            .map_err(|err| ApiError::Other(format!("{PATH}: parse user: {err}")))?;
        user.screen_name = user.screen_name.to_lowercase();
        Ok(user)
    }

    fn show_post(&self, id: &str) -> Result<Post, ApiError> {
        const PATH: &str = "/1.1/statuses/show.json";
        let body = self.get(PATH, &[("id", id)])?;
        serde_json::from_str(&body)
            .map_err(|err| ApiError::Other(format!("{PATH}: parse tweet: {err}")))
    }

    fn friends_list(&self, screen_name: &str) -> Result<Vec<UserProfile>, ApiError> {
        const PATH: &str = "/1.1/friends/list.json";

        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            users: Vec<UserProfile>,
            #[serde(default)]
            next_cursor_str: String,
        }

        let mut users = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("count", "200"),
                ("skip_status", "true"),
                ("include_user_entities", "false"),
                ("screen_name", screen_name),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }
            let body = self.get(PATH, &params)?;
            let page: Page = serde_json::from_str(&body)
                .map_err(|err| ApiError::Other(format!("{PATH}: parse friends page: {err}")))?;
            for mut user in page.users {
                user.screen_name = user.screen_name.to_lowercase();
                users.push(user);
            }
            if page.next_cursor_str.is_empty() || page.next_cursor_str == "0" {
                return Ok(users);
            }
            cursor = page.next_cursor_str;
        }
    }

    fn user_timeline(
        &self,
        screen_name: &str,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.timeline(
            "/1.1/statuses/user_timeline.json",
            &[("screen_name", screen_name)],
            batch,
            since_id,
            max_id,
        )
    }

    fn home_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.timeline(
            "/1.1/statuses/home_timeline.json",
            &[],
            batch,
            since_id,
            max_id,
        )
    }

    fn mentions_timeline(
        &self,
        batch: usize,
        since_id: Option<&str>,
        max_id: Option<&str>,
    ) -> Result<Vec<Post>, ApiError> {
        self.timeline(
            "/1.1/statuses/mentions_timeline.json",
            &[],
            batch,
            since_id,
            max_id,
        )
    }

    fn post_update(&self, text: &str, in_reply_to: Option<&str>) -> Result<(), ApiError> {
        const PATH: &str = "/1.1/statuses/update.json";
        let mut params: Vec<(&str, &str)> = vec![("status", text)];
        if let Some(id) = in_reply_to {
            params.push(("in_reply_to_status_id", id));
        }
        self.post_form(PATH, &params)?;
        Ok(())
    }
}

/// Map a transport-level failure onto the cacheable error taxonomy.
fn classify(path: &str, err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let reset_after = response
                .header("x-rate-limit-reset")
                .and_then(|raw| raw.parse::<u64>().ok())
                .map(reset_duration);
            let body = response.into_string().unwrap_or_default();
            let codes = error_codes(&body);
            let message = format!("{path}: status {status}: {body}");
            if status == 404 || codes.iter().any(|code| NOT_FOUND_CODES.contains(code)) {
                ApiError::NotFound(message)
            } else if status == 429 || codes.contains(&88) {
                ApiError::RateLimited {
                    reset_after: reset_after.unwrap_or(Duration::ZERO),
                    message,
                }
            } else {
                ApiError::Other(message)
            }
        }
        ureq::Error::Transport(transport) => ApiError::Other(format!("{path}: {transport}")),
    }
}

/// Pull the numeric error codes out of an upstream error body.
fn error_codes(body: &str) -> Vec<i64> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    value
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|entry| entry.get("code").and_then(Value::as_i64))
                .collect()
        })
        .unwrap_or_default()
}

fn reset_duration(reset_epoch: u64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    Duration::from_secs(reset_epoch.saturating_sub(now))
}
