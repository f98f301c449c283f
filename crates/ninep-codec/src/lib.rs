// Author: Lukas Bower
// Purpose: Plain 9P2000 wire model shared by the twitterfs server and its tests.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Plain 9P2000 message model and frame codec.
//!
//! This crate speaks the classic dialect: string `Rerror`, no Unix
//! extensions, `stat` entries packed exactly as directory reads expect
//! them. The server owns every byte of directory-entry layout, so the
//! [`Stat`] packing lives here rather than behind a filesystem trait.

mod codec;
mod types;

pub use codec::{decode_request, decode_response, decode_stat, encode_request, encode_response};
pub use types::{
    CodecError, Qid, QidType, Request, RequestBody, Response, ResponseBody, Stat, DMDIR, MAXWELEM,
    MAX_MSIZE, NOFID, NOTAG, OEXEC, OREAD, ORDWR, OTRUNC, OWRITE, VERSION,
};
