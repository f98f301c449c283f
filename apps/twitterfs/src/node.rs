// Author: Lukas Bower
// Purpose: The in-memory node tree behind the 9P namespace.

//! Node model: a typed tree of directories and tweet files.
//!
//! Nodes live in an arena owned by [`Tree`]; fids hold [`NodeId`] indices,
//! so a node trimmed out of the hierarchy stays dereferenceable until the
//! client clunks its fid. Each directory node carries its serialized entry
//! buffer plus the per-entry end offsets that directory reads must respect.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::warn;
use ninep_codec::{Qid, QidType, Stat, DMDIR};

use crate::api::{ApiError, Post, UserProfile};
use crate::format;
use crate::FsError;

static NEXT_QID_PATH: AtomicU64 = AtomicU64::new(0);

/// Issue a fresh qid path, unique for the process lifetime.
fn next_qid_path() -> u64 {
    NEXT_QID_PATH.fetch_add(1, Ordering::Relaxed) + 1
}

/// Cache lifetime for upstream not-found answers.
const NOT_FOUND_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache lifetime for unclassified upstream failures.
const OTHER_TTL: Duration = Duration::from_secs(5 * 60);

/// What a node is; behavior is dispatched on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `/ctl`, the write-only command file.
    Control,
    /// `/home`, the home timeline.
    Home,
    /// `/mentions`, tweets mentioning the configured account.
    Mentions,
    /// A tweet that trim detached from its parent.
    Orphaned,
    /// `/`.
    Root,
    /// A single tweet file.
    Tweet,
    /// `/users/<screen>`, one user's timeline.
    User,
    /// `/users`, the lazily loaded user listing.
    Users,
}

impl NodeKind {
    /// Timeline kinds hold tweets and a pagination window.
    #[must_use]
    pub fn is_timeline(self) -> bool {
        matches!(self, NodeKind::Home | NodeKind::Mentions | NodeKind::User)
    }

    /// Kinds whose first traversal triggers an upstream load.
    #[must_use]
    pub fn is_lazy(self) -> bool {
        self.is_timeline() || self == NodeKind::Users
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Control => "control",
            NodeKind::Home => "home-timeline",
            NodeKind::Mentions => "mentions-timeline",
            NodeKind::Orphaned => "orphaned",
            NodeKind::Root => "root",
            NodeKind::Tweet => "tweet",
            NodeKind::User => "user-timeline",
            NodeKind::Users => "users",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct CachedError {
    until: Instant,
    err: FsError,
}

/// Arena index of a node; stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One file or directory in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Kind tag driving per-node behavior.
    pub kind: NodeKind,
    /// 9P directory entry: name, qid, mode, times, length, ownership.
    pub stat: Stat,
    children: BTreeMap<String, NodeId>,
    errors: HashMap<String, CachedError>,
    /// Whether initial population has happened.
    pub loaded: bool,
    /// Serialized directory entries, or the formatted tweet body.
    pub buffer: Vec<u8>,
    /// End offset of each packed entry within `buffer`.
    pub boundaries: Vec<usize>,
    /// Smallest loaded tweet id (timeline kinds).
    pub min_id: String,
    /// Largest loaded tweet id (timeline kinds).
    pub max_id: String,
}

impl Node {
    /// Whether the mode marks this node as a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.stat.mode & DMDIR != 0
    }

    /// The name-to-child mapping; empty for files.
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, NodeId> {
        &self.children
    }
}

/// Decimal-id ordering: by length first, then lexicographically.
///
/// Equivalent to integer comparison for canonical decimal strings and
/// total for anything else the upstream might hand us.
#[must_use]
pub fn id_less(a: &str, b: &str) -> bool {
    (a.len(), a) < (b.len(), b)
}

/// The node arena plus the identity stamped into every stat entry.
pub struct Tree {
    nodes: Vec<Node>,
    owner: String,
    group: String,
}

impl Tree {
    /// Create an empty arena; nodes are added through the `add_*` calls.
    #[must_use]
    pub fn new(owner: &str, group: &str) -> Self {
        Self {
            nodes: Vec::new(),
            owner: owner.to_owned(),
            group: group.to_owned(),
        }
    }

    /// Borrow a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Borrow a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Look up a child id by name.
    #[must_use]
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.0].children.get(name).copied()
    }

    /// Allocate a node and link it under `parent` (when given).
    ///
    /// Directories get empty child and error maps and a directory qid.
    /// Returns `None` when `parent` is not a directory.
    pub fn add_child(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        mode: u32,
        kind: NodeKind,
    ) -> Option<NodeId> {
        if let Some(parent) = parent {
            if !self.nodes[parent.0].is_dir() {
                warn!(
                    "fixme: add_child() called for node of kind {} which is not a directory",
                    self.nodes[parent.0].kind
                );
                return None;
            }
        }
        let qid_type = if mode & DMDIR != 0 {
            QidType::DIR
        } else {
            QidType::FILE
        };
        let node = Node {
            kind,
            stat: Stat {
                typ: 0,
                dev: 0,
                qid: Qid::new(qid_type, 0, next_qid_path()),
                mode,
                atime: 0,
                mtime: 0,
                length: 0,
                name: name.to_owned(),
                uid: self.owner.clone(),
                gid: self.group.clone(),
                muid: String::new(),
            },
            children: BTreeMap::new(),
            errors: HashMap::new(),
            loaded: false,
            buffer: Vec::new(),
            boundaries: Vec::new(),
            min_id: String::new(),
            max_id: String::new(),
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.nodes[parent.0].children.insert(name.to_owned(), id);
        }
        Some(id)
    }

    /// Add a user directory under the `users` node.
    pub fn add_user(&mut self, parent: NodeId, user: &UserProfile) -> Option<NodeId> {
        if self.nodes[parent.0].kind != NodeKind::Users {
            warn!(
                "fixme: add_user() called for node of kind {}",
                self.nodes[parent.0].kind
            );
            return None;
        }
        let id = self.add_child(
            Some(parent),
            &user.screen_name,
            0o555 | DMDIR,
            NodeKind::User,
        )?;
        let mtime = user.mtime();
        let stat = &mut self.nodes[id.0].stat;
        stat.mtime = mtime;
        stat.atime = mtime;
        Some(id)
    }

    /// Add a tweet file under a timeline node, rendered at creation.
    pub fn add_tweet(&mut self, parent: NodeId, post: &Post) -> Option<NodeId> {
        if !self.nodes[parent.0].kind.is_timeline() {
            warn!(
                "fixme: add_tweet() called for node of kind {}",
                self.nodes[parent.0].kind
            );
            return None;
        }
        let Some(id_str) = post.id_str().map(str::to_owned) else {
            warn!("fixme: add_tweet() called with a payload missing id_str");
            return None;
        };
        let current_user = self.nodes[parent.0].stat.name.clone();
        let id = self.add_child(Some(parent), &id_str, 0o444, NodeKind::Tweet)?;
        let buffer = format::format_tweet(&current_user, post);
        let mtime = post.created_unix();
        let node = &mut self.nodes[id.0];
        node.stat.length = buffer.len() as u64;
        node.stat.mtime = mtime;
        node.stat.atime = mtime;
        node.buffer = buffer;
        Some(id)
    }

    /// Merge a timeline batch: track the id window, add unseen tweets,
    /// then rebuild the directory entries.
    pub fn add_timeline(&mut self, parent: NodeId, timeline: &[Post]) {
        if !self.nodes[parent.0].kind.is_timeline() {
            warn!(
                "fixme: add_timeline() called for node of kind {}",
                self.nodes[parent.0].kind
            );
            return;
        }
        for post in timeline {
            let Some(id_str) = post.id_str() else {
                continue;
            };
            {
                let node = &mut self.nodes[parent.0];
                if node.min_id.is_empty() || id_less(id_str, &node.min_id) {
                    node.min_id = id_str.to_owned();
                }
                if node.max_id.is_empty() || id_less(&node.max_id, id_str) {
                    node.max_id = id_str.to_owned();
                }
            }
            // The loaded flag can be reset through the control file, so a
            // batch may hand back tweets we already hold.
            if !self.nodes[parent.0].children.contains_key(id_str) {
                self.add_tweet(parent, post);
            }
        }
        self.prepare_dir_entries(parent);
    }

    /// Keep only the `size` most recently modified tweets; the rest are
    /// detached and marked orphaned.
    pub fn trim(&mut self, id: NodeId, size: usize) {
        if !self.nodes[id.0].kind.is_timeline() {
            warn!(
                "fixme: trim() called for node of kind {}",
                self.nodes[id.0].kind
            );
            return;
        }
        if self.nodes[id.0].children.len() <= size {
            return;
        }
        if size == 0 {
            let dropped: Vec<NodeId> = self.nodes[id.0].children.values().copied().collect();
            for child in dropped {
                self.nodes[child.0].kind = NodeKind::Orphaned;
            }
            let node = &mut self.nodes[id.0];
            node.children.clear();
            node.min_id.clear();
            node.max_id.clear();
            self.prepare_dir_entries(id);
            return;
        }
        let mut tweets: Vec<NodeId> = self.nodes[id.0].children.values().copied().collect();
        tweets.sort_by(|a, b| self.nodes[b.0].stat.mtime.cmp(&self.nodes[a.0].stat.mtime));
        let oldest_kept = self.nodes[tweets[size - 1].0].stat.name.clone();
        self.nodes[id.0].min_id = oldest_kept;
        for &dropped in &tweets[size..] {
            self.nodes[dropped.0].kind = NodeKind::Orphaned;
            let name = self.nodes[dropped.0].stat.name.clone();
            self.nodes[id.0].children.remove(&name);
        }
        self.prepare_dir_entries(id);
    }

    /// Rebuild a directory node's packed entry buffer and boundaries.
    pub fn prepare_dir_entries(&mut self, id: NodeId) {
        let child_ids: Vec<NodeId> = self.nodes[id.0].children.values().copied().collect();
        let mut buffer = Vec::new();
        let mut boundaries = Vec::with_capacity(child_ids.len());
        for child in child_ids {
            let packed = self.nodes[child.0].stat.pack();
            buffer.extend_from_slice(&packed);
            boundaries.push(buffer.len());
        }
        let node = &mut self.nodes[id.0];
        node.buffer = buffer;
        node.boundaries = boundaries;
    }

    /// Remember an upstream failure for `name` under `parent` and return
    /// the 9P error to surface now and on cached lookups.
    pub fn cache_error_response(
        &mut self,
        parent: NodeId,
        name: &str,
        err: &ApiError,
        now: Instant,
    ) -> FsError {
        let (until, stored) = match err {
            ApiError::NotFound(_) => (now + NOT_FOUND_TTL, FsError::NoEntry),
            ApiError::RateLimited { reset_after, .. } => {
                (now + *reset_after, FsError::Io(err.to_string()))
            }
            ApiError::Other(_) => (now + OTHER_TTL, FsError::Io(err.to_string())),
        };
        self.nodes[parent.0].errors.insert(
            name.to_owned(),
            CachedError {
                until,
                err: stored.clone(),
            },
        );
        stored
    }

    /// Consult the error cache; expired entries are evicted on lookup.
    pub fn cached_error(&mut self, parent: NodeId, name: &str, now: Instant) -> Option<FsError> {
        let node = &mut self.nodes[parent.0];
        match node.errors.get(name) {
            Some(cached) if now < cached.until => Some(cached.err.clone()),
            Some(_) => {
                node.errors.remove(name);
                None
            }
            None => None,
        }
    }
}
