// Author: Lukas Bower
// Purpose: 9P operation handlers over the node tree.

//! Request dispatch.
//!
//! Each connection owns a [`Session`] (its fid table) and funnels decoded
//! requests through [`TwitterFs::handle_request`]. The tree sits behind
//! one readers-writer lock taken at the top of every handler: writers are
//! the verbs that can grow or shrink the tree (walks that load children,
//! control writes), readers everything that only looks. Handlers block on
//! upstream calls while holding the lock; within a connection requests
//! are serialized anyway.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use ninep_codec::{
    Qid, Request, RequestBody, Response, ResponseBody, DMDIR, MAX_MSIZE, NOFID, VERSION,
};

use crate::api::{Api, ApiError};
use crate::control;
use crate::node::{NodeId, NodeKind, Tree};
use crate::{Clock, FsError, SystemClock};

/// Tweets fetched per timeline request until `batch` changes it.
const DEFAULT_BATCH_SIZE: usize = 10;

/// Everything the readers-writer lock protects.
pub(crate) struct FsState {
    pub(crate) tree: Tree,
    pub(crate) batch_size: usize,
    pub(crate) root: NodeId,
}

/// The file server: node tree, upstream client, and clock.
pub struct TwitterFs {
    state: RwLock<FsState>,
    api: Box<dyn Api>,
    clock: Arc<dyn Clock>,
    screen_name: String,
}

/// Per-connection state: the fid table.
#[derive(Debug, Default)]
pub struct Session {
    fids: HashMap<u32, NodeId>,
}

impl Session {
    /// Fresh session with no fids bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TwitterFs {
    /// Build the server with the fixed root layout and the system clock.
    #[must_use]
    pub fn new(api: Box<dyn Api>, screen_name: &str, owner: &str, group: &str) -> Self {
        Self::with_clock(api, screen_name, owner, group, Arc::new(SystemClock))
    }

    /// Build the server with an explicit clock (tests advance it by hand).
    #[must_use]
    pub fn with_clock(
        api: Box<dyn Api>,
        screen_name: &str,
        owner: &str,
        group: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut tree = Tree::new(owner, group);
        let now = unix_now();
        let root = tree
            .add_child(None, "root", 0o555 | DMDIR, NodeKind::Root)
            .expect("allocate root");
        stamp_times(&mut tree, root, now);
        let children = [
            ("ctl", 0o220, NodeKind::Control),
            ("home", 0o555 | DMDIR, NodeKind::Home),
            ("mentions", 0o555 | DMDIR, NodeKind::Mentions),
            ("users", 0o555 | DMDIR, NodeKind::Users),
        ];
        for (name, mode, kind) in children {
            let id = tree
                .add_child(Some(root), name, mode, kind)
                .expect("allocate root child");
            stamp_times(&mut tree, id, now);
        }
        tree.prepare_dir_entries(root);
        tree.node_mut(root).loaded = true;
        Self {
            state: RwLock::new(FsState {
                tree,
                batch_size: DEFAULT_BATCH_SIZE,
                root,
            }),
            api,
            clock,
            screen_name: screen_name.to_owned(),
        }
    }

    pub(crate) fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    /// Handle one decoded request, turning errors into `Rerror`.
    pub fn handle_request(&self, session: &mut Session, request: Request) -> Response {
        let tag = request.tag;
        match self.dispatch(session, &request.body) {
            Ok(body) => Response { tag, body },
            Err(err) => {
                debug!("{:?} -> Rerror: {err}", request.body);
                Response {
                    tag,
                    body: ResponseBody::Error {
                        ename: err.to_string(),
                    },
                }
            }
        }
    }

    fn dispatch(&self, session: &mut Session, body: &RequestBody) -> Result<ResponseBody, FsError> {
        match body {
            RequestBody::Version { msize, version } => Ok(version_reply(session, *msize, version)),
            RequestBody::Auth { .. } => Err(FsError::NoAuth),
            RequestBody::Attach { fid, afid, .. } => self.attach(session, *fid, *afid),
            RequestBody::Flush { .. } => Ok(ResponseBody::Flush),
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            } => self.walk(session, *fid, *newfid, wnames),
            RequestBody::Open { fid, .. } => self.open(session, *fid),
            RequestBody::Create { .. } => Err(FsError::PermissionDenied),
            RequestBody::Read { fid, offset, count } => self.read(session, *fid, *offset, *count),
            RequestBody::Write { fid, data, .. } => self.write(session, *fid, data),
            RequestBody::Clunk { fid } => self.clunk(session, *fid),
            RequestBody::Remove { fid } => self.remove(session, *fid),
            RequestBody::Stat { fid } => self.stat(session, *fid),
            RequestBody::Wstat { .. } => Err(FsError::PermissionDenied),
        }
    }

    fn attach(
        &self,
        session: &mut Session,
        fid: u32,
        afid: u32,
    ) -> Result<ResponseBody, FsError> {
        if afid != NOFID {
            return Err(FsError::NoAuth);
        }
        if session.fids.contains_key(&fid) {
            return Err(FsError::FidInUse);
        }
        let (root, qid) = {
            let state = self.read_state();
            (state.root, state.tree.node(state.root).stat.qid)
        };
        session.fids.insert(fid, root);
        Ok(ResponseBody::Attach { qid })
    }

    fn walk(
        &self,
        session: &mut Session,
        fid: u32,
        newfid: u32,
        wnames: &[String],
    ) -> Result<ResponseBody, FsError> {
        let &start = session.fids.get(&fid).ok_or(FsError::UnknownFid)?;
        if newfid != fid && session.fids.contains_key(&newfid) {
            return Err(FsError::FidInUse);
        }
        let mut state = self.write_state();
        if state.tree.node(start).kind == NodeKind::Orphaned {
            return Err(FsError::Orphaned);
        }
        let mut current = start;
        let mut walked: Vec<Qid> = Vec::new();
        for name in wnames {
            match self.walk1(&mut state, current, name) {
                Ok(Some(child)) => {
                    current = child;
                    walked.push(state.tree.node(child).stat.qid);
                }
                Ok(None) | Err(FsError::NoEntry) => break,
                Err(err) => return Err(err),
            }
        }
        // Per walk(9p) an error reply is only due when the very first
        // element fails; a shorter qid list covers the rest.
        if walked.is_empty() && !wnames.is_empty() {
            return Err(FsError::NoEntry);
        }
        if walked.len() == wnames.len() {
            session.fids.insert(newfid, current);
        }
        Ok(ResponseBody::Walk { qids: walked })
    }

    fn walk1(
        &self,
        state: &mut FsState,
        parent: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>, FsError> {
        if !state.tree.node(parent).is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.ensure_loaded(state, parent)
            .map_err(|err| FsError::Io(err.to_string()))?;
        if name == ".." {
            return self.walk_dotdot(state, parent);
        }
        if let Some(child) = state.tree.child(parent, name) {
            return Ok(Some(child));
        }
        if let Some(err) = state.tree.cached_error(parent, name, self.clock.now()) {
            return Err(err);
        }
        if state.tree.node(parent).kind == NodeKind::Users {
            return match self.api.show_user(name) {
                Ok(user) => Ok(state.tree.add_user(parent, &user)),
                Err(err) => Err(state
                    .tree
                    .cache_error_response(parent, name, &err, self.clock.now())),
            };
        }
        if !is_id_str(name) {
            return Ok(None);
        }
        match self.api.show_post(name) {
            Ok(post) => Ok(state.tree.add_tweet(parent, &post)),
            Err(err) => Err(state
                .tree
                .cache_error_response(parent, name, &err, self.clock.now())),
        }
    }

    fn walk_dotdot(
        &self,
        state: &FsState,
        parent: NodeId,
    ) -> Result<Option<NodeId>, FsError> {
        match state.tree.node(parent).kind {
            NodeKind::Home | NodeKind::Mentions | NodeKind::Users => Ok(Some(state.root)),
            NodeKind::User => Ok(state.tree.child(state.root, "users")),
            kind => {
                warn!("fixme: walk to .. from node of kind {kind}");
                Err(FsError::NoEntry)
            }
        }
    }

    /// Populate a lazily loaded directory on first traversal.
    ///
    /// Idempotent once `loaded` is set; on failure the flag stays clear
    /// so a later traversal retries.
    fn ensure_loaded(&self, state: &mut FsState, id: NodeId) -> Result<(), ApiError> {
        if state.tree.node(id).loaded {
            return Ok(());
        }
        let batch = state.batch_size;
        match state.tree.node(id).kind {
            NodeKind::Home => {
                let timeline = self.api.home_timeline(batch, None, None)?;
                state.tree.add_timeline(id, &timeline);
                state.tree.node_mut(id).loaded = true;
            }
            NodeKind::Mentions => {
                let timeline = self.api.mentions_timeline(batch, None, None)?;
                state.tree.add_timeline(id, &timeline);
                state.tree.node_mut(id).loaded = true;
            }
            NodeKind::User => {
                let screen_name = state.tree.node(id).stat.name.clone();
                let timeline = self.api.user_timeline(&screen_name, batch, None, None)?;
                state.tree.add_timeline(id, &timeline);
                state.tree.node_mut(id).loaded = true;
            }
            NodeKind::Users => {
                let followed = self.api.friends_list(&self.screen_name)?;
                for user in &followed {
                    // A reload may rediscover users we already hold.
                    if state.tree.child(id, &user.screen_name).is_none() {
                        state.tree.add_user(id, user);
                    }
                }
                state.tree.prepare_dir_entries(id);
                state.tree.node_mut(id).loaded = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn open(&self, session: &Session, fid: u32) -> Result<ResponseBody, FsError> {
        let &id = session.fids.get(&fid).ok_or(FsError::UnknownFid)?;
        let state = self.read_state();
        let node = state.tree.node(id);
        if node.kind == NodeKind::Orphaned {
            return Err(FsError::Orphaned);
        }
        Ok(ResponseBody::Open {
            qid: node.stat.qid,
            iounit: 0,
        })
    }

    fn read(
        &self,
        session: &Session,
        fid: u32,
        offset: u64,
        count: u32,
    ) -> Result<ResponseBody, FsError> {
        let &id = session.fids.get(&fid).ok_or(FsError::UnknownFid)?;
        {
            let state = self.read_state();
            let node = state.tree.node(id);
            if node.kind == NodeKind::Orphaned {
                return Err(FsError::Orphaned);
            }
            if node.loaded || !node.kind.is_lazy() {
                return read_node(&state, id, offset, count);
            }
        }
        let mut state = self.write_state();
        if state.tree.node(id).kind == NodeKind::Orphaned {
            return Err(FsError::Orphaned);
        }
        self.ensure_loaded(&mut state, id)
            .map_err(|err| FsError::Io(err.to_string()))?;
        read_node(&state, id, offset, count)
    }

    fn write(
        &self,
        session: &Session,
        fid: u32,
        data: &[u8],
    ) -> Result<ResponseBody, FsError> {
        let &id = session.fids.get(&fid).ok_or(FsError::UnknownFid)?;
        let mut state = self.write_state();
        if state.tree.node(id).kind != NodeKind::Control {
            return Err(FsError::PermissionDenied);
        }
        control::dispatch(self, &mut state, data)?;
        Ok(ResponseBody::Write {
            count: data.len() as u32,
        })
    }

    fn clunk(&self, session: &mut Session, fid: u32) -> Result<ResponseBody, FsError> {
        session.fids.remove(&fid).ok_or(FsError::UnknownFid)?;
        Ok(ResponseBody::Clunk)
    }

    fn remove(&self, session: &mut Session, fid: u32) -> Result<ResponseBody, FsError> {
        // remove(5): the fid is clunked even though the operation fails.
        session.fids.remove(&fid).ok_or(FsError::UnknownFid)?;
        Err(FsError::PermissionDenied)
    }

    fn stat(&self, session: &Session, fid: u32) -> Result<ResponseBody, FsError> {
        let &id = session.fids.get(&fid).ok_or(FsError::UnknownFid)?;
        let state = self.read_state();
        let node = state.tree.node(id);
        if node.kind == NodeKind::Orphaned {
            return Err(FsError::Orphaned);
        }
        Ok(ResponseBody::Stat {
            stat: node.stat.clone(),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, FsState> {
        self.state.read().expect("poisoned twitterfs lock")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, FsState> {
        self.state.write().expect("poisoned twitterfs lock")
    }
}

/// `Tversion` resets the session: forget every fid, clamp msize.
fn version_reply(session: &mut Session, msize: u32, version: &str) -> ResponseBody {
    session.fids.clear();
    let version = if version.starts_with("9P2000") {
        VERSION
    } else {
        "unknown"
    };
    ResponseBody::Version {
        msize: msize.min(MAX_MSIZE),
        version: version.to_owned(),
    }
}

/// Slice a node's buffer for `Tread`, enforcing entry boundaries on
/// directories.
fn read_node(state: &FsState, id: NodeId, offset: u64, count: u32) -> Result<ResponseBody, FsError> {
    let node = state.tree.node(id);
    // All the files here are small.
    let offset = offset as usize;
    let mut count = count as usize;
    match node.kind {
        NodeKind::Home | NodeKind::Mentions | NodeKind::User | NodeKind::Users | NodeKind::Root => {
            // The offset must be the end of one of the entries.
            if offset > 0 && node.boundaries.binary_search(&offset).is_err() {
                return Err(FsError::InvalidOffset);
            }
            // Entries cannot be returned truncated, so the count may have
            // to shrink to the last boundary that still fits.
            let target = offset + count;
            let next = node.boundaries.partition_point(|&end| end < target);
            if next == node.boundaries.len() || node.boundaries[next] != target {
                if next == 0 {
                    count = 0;
                } else {
                    let end = node.boundaries[next - 1];
                    if end < offset {
                        return Err(FsError::TooSmallRead);
                    }
                    count = end - offset;
                }
            }
            Ok(ResponseBody::Read {
                data: node.buffer[offset..offset + count].to_vec(),
            })
        }
        NodeKind::Tweet => {
            if offset >= node.buffer.len() {
                return Ok(ResponseBody::Read { data: Vec::new() });
            }
            let rest = &node.buffer[offset..];
            Ok(ResponseBody::Read {
                data: rest[..count.min(rest.len())].to_vec(),
            })
        }
        NodeKind::Orphaned => Err(FsError::Orphaned),
        NodeKind::Control => Err(FsError::PermissionDenied),
    }
}

/// Tweet ids are decimal strings of at least eight digits; anything else
/// is not worth an upstream lookup.
fn is_id_str(name: &str) -> bool {
    name.len() >= 8 && name.bytes().all(|b| b.is_ascii_digit())
}

fn stamp_times(tree: &mut Tree, id: NodeId, now: u32) {
    let stat = &mut tree.node_mut(id).stat;
    stat.mtime = now;
    stat.atime = now;
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

#[cfg(test)]
mod tests {
    use super::is_id_str;

    #[test]
    fn id_strings_need_eight_decimal_digits() {
        assert!(is_id_str("12345678"));
        assert!(is_id_str("1271800794002710540"));
        assert!(!is_id_str("1234567"));
        assert!(!is_id_str("12345678a"));
        assert!(!is_id_str("ctl"));
        assert!(!is_id_str(""));
    }
}
