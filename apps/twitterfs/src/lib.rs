// Author: Lukas Bower
// Purpose: Read-only 9P interface to a Twitter-style timeline API.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! twitterfs serves a Twitter-style account as a 9P2000 file tree.
//!
//! The server listens on `localhost:7731` by default and identifies its
//! dialect as plain `9P2000`. Mount it and the tree looks like this:
//!
//! ```text
//! /ctl                   write-only control file
//! /home/<id>             home-timeline tweets, one file per tweet
//! /mentions/<id>         tweets mentioning the configured account
//! /users/<screen>/<id>   per-user timelines, lazily populated
//! ```
//!
//! At start-up `/users` holds only the followed accounts; walking to any
//! other screen name looks the user up remotely and adds the directory if
//! the account exists. Listing a timeline directory loads its latest
//! batch of tweets (10 by default), and walking to a tweet id fetches
//! that tweet on demand. Everything is read-only except `/ctl`, which is
//! write-only and accepts:
//!
//! ```text
//! reload                    re-fetch the followed-user set
//! batch N                   set the timeline batch size
//! older home|mentions|@x    page the timeline backwards
//! newer home|mentions|@x    page the timeline forwards
//! trim  home|mentions|@x N  keep only the N most recent tweets
//! post  <text>              publish a tweet
//! reply <id> <text>         publish a reply
//! ```
//!
//! Credentials come from `$HOME/lib/twitterfs/config`, a JSON file with
//! `api_key`, `api_secret_key`, `access_token`, `access_token_secret`,
//! `screen_name`, and an optional `listen_address`.

use std::time::Instant;

pub mod api;
pub mod config;
mod control;
pub mod format;
mod fs;
pub mod node;
mod oauth;
pub mod server;

pub use fs::{Session, TwitterFs};

/// Protocol-visible errors; `Display` is the exact `Rerror` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    /// Name absent, or upstream confirmed not-found (possibly cached).
    #[error("file not found")]
    NoEntry,
    /// Walk attempted through a non-directory node.
    #[error("not a directory")]
    NotADirectory,
    /// Write, create, remove, or wstat outside the control file, or read
    /// of an unreadable kind.
    #[error("permission denied")]
    PermissionDenied,
    /// The client offered an auth fid; this server has no auth.
    #[error("authentication not required")]
    NoAuth,
    /// Directory read offset not aligned to an entry boundary.
    #[error("invalid dir read offset")]
    InvalidOffset,
    /// Directory read count cannot hold the next whole entry.
    #[error("too small read size for dir entry")]
    TooSmallRead,
    /// Operation on a node detached by trim.
    #[error("node was orphaned")]
    Orphaned,
    /// Control write with an unrecognized verb or argument shape.
    #[error("unknown command")]
    UnknownCommand,
    /// Request referenced a fid this connection never bound.
    #[error("unknown fid")]
    UnknownFid,
    /// Attach or walk tried to bind a fid that is already in use.
    #[error("fid already in use")]
    FidInUse,
    /// Upstream API failure; carries the diagnostic text.
    #[error("{0}")]
    Io(String),
}

/// Time source used by the error cache; swapped out in tests.
pub trait Clock: Send + Sync {
    /// Return the current instant.
    fn now(&self) -> Instant;
}

/// System clock backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
