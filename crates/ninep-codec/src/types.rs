// Author: Lukas Bower
// Purpose: Define 9P2000 wire types and constants shared across components.

//! 9P2000 data model definitions.

use core::fmt;

/// Maximum message size offered during version negotiation.
pub const MAX_MSIZE: u32 = 8192;

/// Protocol version string for the plain dialect.
pub const VERSION: &str = "9P2000";

/// Tag value used by `Tversion`/`Rversion`.
pub const NOTAG: u16 = 0xffff;

/// Fid value meaning "no fid", notably for `afid` on unauthenticated attach.
pub const NOFID: u32 = 0xffff_ffff;

/// Maximum number of path elements in a single walk.
pub const MAXWELEM: usize = 16;

/// Directory bit in the stat mode word.
pub const DMDIR: u32 = 0x8000_0000;

/// Open for reading.
pub const OREAD: u8 = 0;
/// Open for writing.
pub const OWRITE: u8 = 1;
/// Open for reading and writing.
pub const ORDWR: u8 = 2;
/// Open for execution.
pub const OEXEC: u8 = 3;
/// Truncate on open.
pub const OTRUNC: u8 = 0x10;

/// Errors produced while encoding or decoding 9P frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer was shorter than the declared frame length.
    #[error("truncated frame")]
    Truncated,
    /// Encountered an unknown message type byte.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// Encountered malformed UTF-8 in a string field.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// Declared frame size does not match the byte count on hand.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Frame length declared in the size field.
        declared: u32,
        /// Actual byte length observed.
        actual: usize,
    },
    /// Walk element list too long, or a component contained `/`.
    #[error("invalid walk element")]
    InvalidWalk,
    /// A counted field (string, data, stat) exceeded the protocol limit.
    #[error("counted field too large")]
    TooLarge,
}

/// Qid type bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QidType(u8);

impl QidType {
    /// Directory bit.
    pub const DIR: Self = Self(0x80);
    /// Append-only bit.
    pub const APPEND: Self = Self(0x40);
    /// Plain file.
    pub const FILE: Self = Self(0x00);

    /// Construct from the raw wire byte.
    #[must_use]
    pub fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// Raw wire byte.
    #[must_use]
    pub fn raw(self) -> u8 {
        self.0
    }

    /// Whether the directory bit is set.
    #[must_use]
    pub fn is_dir(self) -> bool {
        self.0 & Self::DIR.0 != 0
    }
}

/// 9P unique file identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Qid {
    /// Type bits; mirrors the high byte of the owning file's mode.
    pub ty: QidType,
    /// Version counter; this server never bumps it.
    pub version: u32,
    /// Server-unique path number.
    pub path: u64,
}

impl Qid {
    /// Construct a new qid.
    #[must_use]
    pub fn new(ty: QidType, version: u32, path: u64) -> Self {
        Self { ty, version, path }
    }
}

impl fmt::Display for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:#x} {} {:#x})", self.path, self.version, self.ty.raw())
    }
}

/// A 9P2000 stat record: the directory-entry structure.
///
/// [`Stat::pack`] emits the wire form used both for `Rstat` payloads and
/// for the per-entry records a directory read returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Kernel use; always 0 here.
    pub typ: u16,
    /// Kernel use; always 0 here.
    pub dev: u32,
    /// Unique id of the file.
    pub qid: Qid,
    /// Permission bits, plus [`DMDIR`] for directories.
    pub mode: u32,
    /// Last access time, seconds since epoch.
    pub atime: u32,
    /// Last modification time, seconds since epoch.
    pub mtime: u32,
    /// Content length in bytes; 0 for directories.
    pub length: u64,
    /// File name.
    pub name: String,
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
    /// Name of the last modifying user; unused.
    pub muid: String,
}

impl Stat {
    /// Pack into the wire form, leading `size[2]` included.
    #[must_use]
    pub fn pack(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(
            49 + self.name.len() + self.uid.len() + self.gid.len() + self.muid.len(),
        );
        body.extend_from_slice(&self.typ.to_le_bytes());
        body.extend_from_slice(&self.dev.to_le_bytes());
        body.push(self.qid.ty.raw());
        body.extend_from_slice(&self.qid.version.to_le_bytes());
        body.extend_from_slice(&self.qid.path.to_le_bytes());
        body.extend_from_slice(&self.mode.to_le_bytes());
        body.extend_from_slice(&self.atime.to_le_bytes());
        body.extend_from_slice(&self.mtime.to_le_bytes());
        body.extend_from_slice(&self.length.to_le_bytes());
        put_str(&mut body, &self.name);
        put_str(&mut body, &self.uid);
        put_str(&mut body, &self.gid);
        put_str(&mut body, &self.muid);
        let mut out = Vec::with_capacity(body.len() + 2);
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }
}

fn put_str(buffer: &mut Vec<u8>, value: &str) {
    buffer.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
}

/// Request envelope: tag plus message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request identifier, echoed back by the response.
    pub tag: u16,
    /// The concrete request payload.
    pub body: RequestBody,
}

/// Response envelope: tag plus message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Mirrors the request tag.
    pub tag: u16,
    /// The concrete response payload.
    pub body: ResponseBody,
}

/// The 9P2000 T-message set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `Tversion`: negotiate msize and dialect.
    Version {
        /// Requested maximum message size.
        msize: u32,
        /// Dialect string supplied by the client.
        version: String,
    },
    /// `Tauth`: request an authentication fid.
    Auth {
        /// Proposed auth fid.
        afid: u32,
        /// User name.
        uname: String,
        /// Attach name.
        aname: String,
    },
    /// `Tattach`: bind a fid to the tree root.
    Attach {
        /// Fid to bind.
        fid: u32,
        /// Auth fid, or [`NOFID`].
        afid: u32,
        /// User name.
        uname: String,
        /// Attach name.
        aname: String,
    },
    /// `Tflush`: abort an outstanding request.
    Flush {
        /// Tag of the request to abort.
        oldtag: u16,
    },
    /// `Twalk`: traverse path elements from fid to newfid.
    Walk {
        /// Source fid.
        fid: u32,
        /// Destination fid.
        newfid: u32,
        /// Path components, at most [`MAXWELEM`].
        wnames: Vec<String>,
    },
    /// `Topen`: prepare a fid for I/O.
    Open {
        /// Fid to open.
        fid: u32,
        /// Open mode byte.
        mode: u8,
    },
    /// `Tcreate`: create a file in the directory bound to fid.
    Create {
        /// Directory fid.
        fid: u32,
        /// New file name.
        name: String,
        /// Permission word.
        perm: u32,
        /// Open mode byte.
        mode: u8,
    },
    /// `Tread`: read a byte range.
    Read {
        /// Fid to read.
        fid: u32,
        /// Byte offset.
        offset: u64,
        /// Requested count.
        count: u32,
    },
    /// `Twrite`: write a byte range.
    Write {
        /// Fid to write.
        fid: u32,
        /// Byte offset.
        offset: u64,
        /// Payload.
        data: Vec<u8>,
    },
    /// `Tclunk`: release a fid.
    Clunk {
        /// Fid to release.
        fid: u32,
    },
    /// `Tremove`: remove the file and clunk the fid.
    Remove {
        /// Fid to remove.
        fid: u32,
    },
    /// `Tstat`: request the directory entry for a fid.
    Stat {
        /// Fid to stat.
        fid: u32,
    },
    /// `Twstat`: rewrite the directory entry for a fid.
    Wstat {
        /// Fid to modify.
        fid: u32,
        /// Requested new directory entry.
        stat: Stat,
    },
}

/// The 9P2000 R-message set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// `Rversion`.
    Version {
        /// Negotiated maximum message size.
        msize: u32,
        /// Negotiated dialect, or `"unknown"`.
        version: String,
    },
    /// `Rauth`.
    Auth {
        /// Qid of the auth file.
        aqid: Qid,
    },
    /// `Rerror`: the sole error reply; carries a bare string.
    Error {
        /// Error string shown to the client.
        ename: String,
    },
    /// `Rflush`.
    Flush,
    /// `Rattach`.
    Attach {
        /// Root qid.
        qid: Qid,
    },
    /// `Rwalk`: qids of the successfully walked prefix.
    Walk {
        /// One qid per walked element.
        qids: Vec<Qid>,
    },
    /// `Ropen`.
    Open {
        /// Qid of the opened file.
        qid: Qid,
        /// Preferred I/O unit; 0 leaves the choice to the client.
        iounit: u32,
    },
    /// `Rcreate`.
    Create {
        /// Qid of the created file.
        qid: Qid,
        /// Preferred I/O unit.
        iounit: u32,
    },
    /// `Rread`.
    Read {
        /// Bytes read.
        data: Vec<u8>,
    },
    /// `Rwrite`.
    Write {
        /// Bytes consumed.
        count: u32,
    },
    /// `Rclunk`.
    Clunk,
    /// `Rremove`.
    Remove,
    /// `Rstat`.
    Stat {
        /// Directory entry of the statted file.
        stat: Stat,
    },
    /// `Rwstat`.
    Wstat,
}
