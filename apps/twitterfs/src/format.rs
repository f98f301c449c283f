// Author: Lukas Bower
// Purpose: Render one tweet payload into its canonical file body.

//! Tweet formatting.
//!
//! A tweet file reads as a header line followed by optional `Parent:`,
//! `Retweets:`, and `Link:` lines. Status URLs pointing back into the
//! mounted tree are rewritten as relative paths from the enclosing user
//! directory; anything that does not match the expected URL shape is
//! left alone.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use chrono::SecondsFormat;

use crate::api::Post;

/// RFC 3339 rendering of the zero time, used when `created_at` is
/// missing or malformed.
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// The entity lists URLs are collected from, and the field that holds
/// the usable URL in each.
const LINK_SOURCES: [(&str, &str, &str); 4] = [
    ("entities", "urls", "expanded_url"),
    ("extended_entities", "urls", "expanded_url"),
    ("entities", "media", "media_url_https"),
    ("extended_entities", "media", "media_url_https"),
];

/// Rewrite a tweet URL as a path relative to a user directory.
/// Identity on anything that is not exactly a status URL.
#[must_use]
pub fn localize_url(current_user: &str, url: &str) -> String {
    let Some(rest) = url.strip_prefix("https://twitter.com/") else {
        return url.to_owned();
    };
    let Some(slash) = rest.find('/') else {
        return url.to_owned();
    };
    let user = rest[..slash].to_lowercase();
    let Some(id_str) = rest[slash..].strip_prefix("/status/") else {
        return url.to_owned();
    };
    if id_str.is_empty() || !id_str.bytes().all(|b| b.is_ascii_digit()) {
        return url.to_owned();
    }
    if current_user == user {
        id_str.to_owned()
    } else {
        format!("../{user}/{id_str}")
    }
}

/// Relative path to the tweet this one replies to, when known.
fn parent_relative_path(current_user: &str, post: &Post) -> Option<String> {
    let screen_name = post.str_field("in_reply_to_screen_name")?.to_lowercase();
    let id_str = post.str_field("in_reply_to_status_id_str")?;
    if current_user == screen_name {
        Some(id_str.to_owned())
    } else {
        Some(format!("../{screen_name}/{id_str}"))
    }
}

/// Relative path to a tweet through its own author and id.
fn tweet_relative_path(current_user: &str, post: &Post) -> Option<String> {
    let screen_name = post.user_screen_name()?.to_lowercase();
    if screen_name.is_empty() {
        return None;
    }
    let id_str = post.id_str()?;
    if id_str.is_empty() {
        return None;
    }
    if current_user == screen_name {
        Some(id_str.to_owned())
    } else {
        Some(format!("../{screen_name}/{id_str}"))
    }
}

/// Relative path to the reposted tweet, when this payload is a retweet.
fn retweeted_relative_path(current_user: &str, post: &Post) -> Option<String> {
    tweet_relative_path(current_user, &post.retweeted_status()?)
}

/// Every distinct URL worth a `Link:` line, in sorted order.
fn collect_urls(post: &Post) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    for (group, list, field) in LINK_SOURCES {
        let Some(entries) = post.entity_list(group, list) else {
            continue;
        };
        for entry in entries {
            if let Some(url) = entry.get(field).and_then(serde_json::Value::as_str) {
                urls.insert(url.to_owned());
            }
        }
    }
    urls
}

/// Render the canonical UTF-8 body for one tweet.
///
/// `current_user` is the name of the enclosing directory, which is what
/// relative paths are computed against.
#[must_use]
pub fn format_tweet(current_user: &str, post: &Post) -> Vec<u8> {
    let mut text = String::new();
    let created = post
        .created_at()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| ZERO_TIME.to_owned());
    let _ = writeln!(
        text,
        "@{current_user} — {created} — {}",
        post.display_text()
    );
    if let Some(path) = parent_relative_path(current_user, post) {
        let _ = writeln!(text, "Parent: {path}");
    }
    if let Some(path) = retweeted_relative_path(current_user, post) {
        let _ = writeln!(text, "Retweets: {path}");
    }
    for url in collect_urls(post) {
        let _ = writeln!(text, "Link: {}", localize_url(current_user, &url));
    }
    text.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(value: serde_json::Value) -> Post {
        serde_json::from_value(value).expect("post payload")
    }

    #[test]
    fn localize_url_happy_paths() {
        let cases = [
            (
                "netbsdsrc",
                "https://twitter.com/netbsdsrc/status/1271800794002710540",
                "1271800794002710540",
            ),
            (
                "npr",
                "https://twitter.com/netbsdsrc/status/1271800794002710540",
                "../netbsdsrc/1271800794002710540",
            ),
            (
                "netbsdsrc",
                "https://twitter.com/NPR/status/1274574891338129409",
                "../npr/1274574891338129409",
            ),
            (
                "npr",
                "https://twitter.com/NPR/status/1274574891338129409",
                "1274574891338129409",
            ),
            (
                "npr",
                "https://twitter.com/DLangille/status/1267451982383656961",
                "../dlangille/1267451982383656961",
            ),
        ];
        for (user, url, want) in cases {
            assert_eq!(localize_url(user, url), want, "user {user} url {url}");
        }
    }

    #[test]
    fn localize_url_rejects_single_byte_mutations() {
        let url = "https://twitter.com/netbsdsrc/status/1271800794002710540";
        for i in 0..url.len() {
            if (20..=28).contains(&i) {
                // Mutating the screen name still yields a valid status URL.
                continue;
            }
            let mut mutated = url.as_bytes().to_vec();
            mutated[i] = b'_';
            let mutated = String::from_utf8(mutated).expect("ascii");
            assert_eq!(localize_url("npr", &mutated), mutated, "index {i}");
        }
    }

    #[test]
    fn localize_url_leaves_malformed_urls_alone() {
        let urls = [
            "https://twitter.com",
            "https://twitter.com/",
            "https://twitter.com/status/",
            "https://twitter.com/status/1234",
            "https://twitter.com/me/status",
            "https://twitter.com/me/status/",
        ];
        for url in urls {
            assert_eq!(localize_url("me", url), url);
        }
    }

    #[test]
    fn format_renders_header_line_only_for_plain_tweets() {
        let p = post(json!({
            "full_text": "just the text",
            "created_at": "Sat Jun 13 13:30:06 +0000 2020",
        }));
        let body = String::from_utf8(format_tweet("npr", &p)).expect("utf8");
        assert_eq!(body, "@npr — 2020-06-13T13:30:06Z — just the text\n");
    }

    #[test]
    fn format_falls_back_to_the_zero_time() {
        let p = post(json!({"text": "old"}));
        let body = String::from_utf8(format_tweet("npr", &p)).expect("utf8");
        assert_eq!(body, "@npr — 0001-01-01T00:00:00Z — old\n");
    }

    #[test]
    fn format_adds_parent_and_retweet_paths() {
        let p = post(json!({
            "text": "replying",
            "created_at": "Sat Jun 13 13:30:06 +0000 2020",
            "in_reply_to_screen_name": "NPR",
            "in_reply_to_status_id_str": "1274574891338129409",
            "retweeted_status": {
                "id_str": "1267451982383656961",
                "user": {"screen_name": "DLangille"},
            },
        }));
        let body = String::from_utf8(format_tweet("npr", &p)).expect("utf8");
        assert!(body.contains("Parent: 1274574891338129409\n"));
        assert!(body.contains("Retweets: ../dlangille/1267451982383656961\n"));

        let body = String::from_utf8(format_tweet("dlangille", &p)).expect("utf8");
        assert!(body.contains("Parent: ../npr/1274574891338129409\n"));
        assert!(body.contains("Retweets: 1267451982383656961\n"));
    }

    #[test]
    fn format_skips_paths_on_missing_or_mistyped_fields() {
        let p = post(json!({
            "text": "x",
            "in_reply_to_screen_name": "NPR",
            "retweeted_status": {"user": {"screen_name": "DLangille"}},
        }));
        let body = String::from_utf8(format_tweet("npr", &p)).expect("utf8");
        assert!(!body.contains("Parent:"));
        assert!(!body.contains("Retweets:"));
    }

    #[test]
    fn format_sorts_and_localizes_links() {
        let p = post(json!({
            "text": "links",
            "entities": {
                "urls": [
                    {"expanded_url": "https://twitter.com/NPR/status/1274574891338129409"},
                    {"expanded_url": "https://example.com/b"},
                ],
                "media": [
                    {"media_url_https": "https://pbs.twimg.com/media/x.jpg"},
                ],
            },
            "extended_entities": {
                "urls": [
                    {"expanded_url": "https://example.com/b"},
                ],
                "media": [
                    {"media_url_https": "https://pbs.twimg.com/media/x.jpg"},
                ],
            },
        }));
        let body = String::from_utf8(format_tweet("npr", &p)).expect("utf8");
        let links: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("Link: "))
            .collect();
        // Deduplicated across entity groups and sorted ascending by URL.
        assert_eq!(
            links,
            [
                "https://example.com/b",
                "https://pbs.twimg.com/media/x.jpg",
                "1274574891338129409",
            ]
        );
    }
}
