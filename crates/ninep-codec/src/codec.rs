// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode plain 9P2000 wire frames.
// Author: Lukas Bower

//! Frame encode/decode for the plain 9P2000 message set.
//!
//! A frame is `size[4] type[1] tag[2] payload…` with `size` counting the
//! whole frame, all integers little-endian, strings prefixed by `len[2]`.

use core::str;

use crate::types::*;

/// 9P2000 message opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    Tversion = 100,
    Rversion = 101,
    Tauth = 102,
    Rauth = 103,
    Tattach = 104,
    Rattach = 105,
    Rerror = 107,
    Tflush = 108,
    Rflush = 109,
    Twalk = 110,
    Rwalk = 111,
    Topen = 112,
    Ropen = 113,
    Tcreate = 114,
    Rcreate = 115,
    Tread = 116,
    Rread = 117,
    Twrite = 118,
    Rwrite = 119,
    Tclunk = 120,
    Rclunk = 121,
    Tremove = 122,
    Rremove = 123,
    Tstat = 124,
    Rstat = 125,
    Twstat = 126,
    Rwstat = 127,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value {
            100 => Tversion,
            101 => Rversion,
            102 => Tauth,
            103 => Rauth,
            104 => Tattach,
            105 => Rattach,
            107 => Rerror,
            108 => Tflush,
            109 => Rflush,
            110 => Twalk,
            111 => Rwalk,
            112 => Topen,
            113 => Ropen,
            114 => Tcreate,
            115 => Rcreate,
            116 => Tread,
            117 => Rread,
            118 => Twrite,
            119 => Rwrite,
            120 => Tclunk,
            121 => Rclunk,
            122 => Tremove,
            123 => Rremove,
            124 => Tstat,
            125 => Rstat,
            126 => Twstat,
            127 => Rwstat,
            other => return Err(CodecError::Unsupported(other)),
        })
    }
}

/// Encode a request into its wire frame.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&request.tag.to_le_bytes());
    match &request.body {
        RequestBody::Version { msize, version } => {
            payload.extend_from_slice(&msize.to_le_bytes());
            put_string(&mut payload, version)?;
            Ok(finish(MessageType::Tversion, &payload))
        }
        RequestBody::Auth { afid, uname, aname } => {
            payload.extend_from_slice(&afid.to_le_bytes());
            put_string(&mut payload, uname)?;
            put_string(&mut payload, aname)?;
            Ok(finish(MessageType::Tauth, &payload))
        }
        RequestBody::Attach {
            fid,
            afid,
            uname,
            aname,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&afid.to_le_bytes());
            put_string(&mut payload, uname)?;
            put_string(&mut payload, aname)?;
            Ok(finish(MessageType::Tattach, &payload))
        }
        RequestBody::Flush { oldtag } => {
            payload.extend_from_slice(&oldtag.to_le_bytes());
            Ok(finish(MessageType::Tflush, &payload))
        }
        RequestBody::Walk {
            fid,
            newfid,
            wnames,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&newfid.to_le_bytes());
            if wnames.len() > MAXWELEM {
                return Err(CodecError::InvalidWalk);
            }
            payload.extend_from_slice(&(wnames.len() as u16).to_le_bytes());
            for name in wnames {
                validate_component(name)?;
                put_string(&mut payload, name)?;
            }
            Ok(finish(MessageType::Twalk, &payload))
        }
        RequestBody::Open { fid, mode } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.push(*mode);
            Ok(finish(MessageType::Topen, &payload))
        }
        RequestBody::Create {
            fid,
            name,
            perm,
            mode,
        } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            put_string(&mut payload, name)?;
            payload.extend_from_slice(&perm.to_le_bytes());
            payload.push(*mode);
            Ok(finish(MessageType::Tcreate, &payload))
        }
        RequestBody::Read { fid, offset, count } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&count.to_le_bytes());
            Ok(finish(MessageType::Tread, &payload))
        }
        RequestBody::Write { fid, offset, data } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            payload.extend_from_slice(&offset.to_le_bytes());
            let count: u32 = data.len().try_into().map_err(|_| CodecError::TooLarge)?;
            payload.extend_from_slice(&count.to_le_bytes());
            payload.extend_from_slice(data);
            Ok(finish(MessageType::Twrite, &payload))
        }
        RequestBody::Clunk { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            Ok(finish(MessageType::Tclunk, &payload))
        }
        RequestBody::Remove { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            Ok(finish(MessageType::Tremove, &payload))
        }
        RequestBody::Stat { fid } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            Ok(finish(MessageType::Tstat, &payload))
        }
        RequestBody::Wstat { fid, stat } => {
            payload.extend_from_slice(&fid.to_le_bytes());
            let packed = stat.pack();
            let n: u16 = packed.len().try_into().map_err(|_| CodecError::TooLarge)?;
            payload.extend_from_slice(&n.to_le_bytes());
            payload.extend_from_slice(&packed);
            Ok(finish(MessageType::Twstat, &payload))
        }
    }
}

/// Encode a response into its wire frame.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, CodecError> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&response.tag.to_le_bytes());
    match &response.body {
        ResponseBody::Version { msize, version } => {
            payload.extend_from_slice(&msize.to_le_bytes());
            put_string(&mut payload, version)?;
            Ok(finish(MessageType::Rversion, &payload))
        }
        ResponseBody::Auth { aqid } => {
            put_qid(&mut payload, aqid);
            Ok(finish(MessageType::Rauth, &payload))
        }
        ResponseBody::Error { ename } => {
            put_string(&mut payload, ename)?;
            Ok(finish(MessageType::Rerror, &payload))
        }
        ResponseBody::Flush => Ok(finish(MessageType::Rflush, &payload)),
        ResponseBody::Attach { qid } => {
            put_qid(&mut payload, qid);
            Ok(finish(MessageType::Rattach, &payload))
        }
        ResponseBody::Walk { qids } => {
            if qids.len() > MAXWELEM {
                return Err(CodecError::InvalidWalk);
            }
            payload.extend_from_slice(&(qids.len() as u16).to_le_bytes());
            for qid in qids {
                put_qid(&mut payload, qid);
            }
            Ok(finish(MessageType::Rwalk, &payload))
        }
        ResponseBody::Open { qid, iounit } => {
            put_qid(&mut payload, qid);
            payload.extend_from_slice(&iounit.to_le_bytes());
            Ok(finish(MessageType::Ropen, &payload))
        }
        ResponseBody::Create { qid, iounit } => {
            put_qid(&mut payload, qid);
            payload.extend_from_slice(&iounit.to_le_bytes());
            Ok(finish(MessageType::Rcreate, &payload))
        }
        ResponseBody::Read { data } => {
            let count: u32 = data.len().try_into().map_err(|_| CodecError::TooLarge)?;
            payload.extend_from_slice(&count.to_le_bytes());
            payload.extend_from_slice(data);
            Ok(finish(MessageType::Rread, &payload))
        }
        ResponseBody::Write { count } => {
            payload.extend_from_slice(&count.to_le_bytes());
            Ok(finish(MessageType::Rwrite, &payload))
        }
        ResponseBody::Clunk => Ok(finish(MessageType::Rclunk, &payload)),
        ResponseBody::Remove => Ok(finish(MessageType::Rremove, &payload)),
        ResponseBody::Stat { stat } => {
            let packed = stat.pack();
            let n: u16 = packed.len().try_into().map_err(|_| CodecError::TooLarge)?;
            payload.extend_from_slice(&n.to_le_bytes());
            payload.extend_from_slice(&packed);
            Ok(finish(MessageType::Rstat, &payload))
        }
        ResponseBody::Wstat => Ok(finish(MessageType::Rwstat, &payload)),
    }
}

/// Decode a request from a full wire frame.
pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::Tversion => {
            let msize = read_u32(&mut cursor)?;
            let version = read_string(&mut cursor)?;
            RequestBody::Version { msize, version }
        }
        MessageType::Tauth => {
            let afid = read_u32(&mut cursor)?;
            let uname = read_string(&mut cursor)?;
            let aname = read_string(&mut cursor)?;
            RequestBody::Auth { afid, uname, aname }
        }
        MessageType::Tattach => {
            let fid = read_u32(&mut cursor)?;
            let afid = read_u32(&mut cursor)?;
            let uname = read_string(&mut cursor)?;
            let aname = read_string(&mut cursor)?;
            RequestBody::Attach {
                fid,
                afid,
                uname,
                aname,
            }
        }
        MessageType::Tflush => {
            let oldtag = read_u16(&mut cursor)?;
            RequestBody::Flush { oldtag }
        }
        MessageType::Twalk => {
            let fid = read_u32(&mut cursor)?;
            let newfid = read_u32(&mut cursor)?;
            let nwname = read_u16(&mut cursor)? as usize;
            if nwname > MAXWELEM {
                return Err(CodecError::InvalidWalk);
            }
            let mut wnames = Vec::with_capacity(nwname);
            for _ in 0..nwname {
                let name = read_string(&mut cursor)?;
                validate_component(&name)?;
                wnames.push(name);
            }
            RequestBody::Walk {
                fid,
                newfid,
                wnames,
            }
        }
        MessageType::Topen => {
            let fid = read_u32(&mut cursor)?;
            let mode = read_u8(&mut cursor)?;
            RequestBody::Open { fid, mode }
        }
        MessageType::Tcreate => {
            let fid = read_u32(&mut cursor)?;
            let name = read_string(&mut cursor)?;
            let perm = read_u32(&mut cursor)?;
            let mode = read_u8(&mut cursor)?;
            RequestBody::Create {
                fid,
                name,
                perm,
                mode,
            }
        }
        MessageType::Tread => {
            let fid = read_u32(&mut cursor)?;
            let offset = read_u64(&mut cursor)?;
            let count = read_u32(&mut cursor)?;
            RequestBody::Read { fid, offset, count }
        }
        MessageType::Twrite => {
            let fid = read_u32(&mut cursor)?;
            let offset = read_u64(&mut cursor)?;
            let count = read_u32(&mut cursor)? as usize;
            let data = read_bytes(&mut cursor, count)?;
            RequestBody::Write { fid, offset, data }
        }
        MessageType::Tclunk => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Clunk { fid }
        }
        MessageType::Tremove => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Remove { fid }
        }
        MessageType::Tstat => {
            let fid = read_u32(&mut cursor)?;
            RequestBody::Stat { fid }
        }
        MessageType::Twstat => {
            let fid = read_u32(&mut cursor)?;
            let n = read_u16(&mut cursor)? as usize;
            let raw = read_bytes(&mut cursor, n)?;
            let stat = decode_stat(&raw)?.0;
            RequestBody::Wstat { fid, stat }
        }
        other => return Err(CodecError::Unsupported(other as u8)),
    };
    Ok(Request { tag, body })
}

/// Decode a response from a full wire frame.
pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::Rversion => {
            let msize = read_u32(&mut cursor)?;
            let version = read_string(&mut cursor)?;
            ResponseBody::Version { msize, version }
        }
        MessageType::Rauth => {
            let aqid = read_qid(&mut cursor)?;
            ResponseBody::Auth { aqid }
        }
        MessageType::Rerror => {
            let ename = read_string(&mut cursor)?;
            ResponseBody::Error { ename }
        }
        MessageType::Rflush => ResponseBody::Flush,
        MessageType::Rattach => {
            let qid = read_qid(&mut cursor)?;
            ResponseBody::Attach { qid }
        }
        MessageType::Rwalk => {
            let count = read_u16(&mut cursor)? as usize;
            if count > MAXWELEM {
                return Err(CodecError::InvalidWalk);
            }
            let mut qids = Vec::with_capacity(count);
            for _ in 0..count {
                qids.push(read_qid(&mut cursor)?);
            }
            ResponseBody::Walk { qids }
        }
        MessageType::Ropen => {
            let qid = read_qid(&mut cursor)?;
            let iounit = read_u32(&mut cursor)?;
            ResponseBody::Open { qid, iounit }
        }
        MessageType::Rcreate => {
            let qid = read_qid(&mut cursor)?;
            let iounit = read_u32(&mut cursor)?;
            ResponseBody::Create { qid, iounit }
        }
        MessageType::Rread => {
            let count = read_u32(&mut cursor)? as usize;
            let data = read_bytes(&mut cursor, count)?;
            ResponseBody::Read { data }
        }
        MessageType::Rwrite => {
            let count = read_u32(&mut cursor)?;
            ResponseBody::Write { count }
        }
        MessageType::Rclunk => ResponseBody::Clunk,
        MessageType::Rremove => ResponseBody::Remove,
        MessageType::Rstat => {
            let n = read_u16(&mut cursor)? as usize;
            let raw = read_bytes(&mut cursor, n)?;
            ResponseBody::Stat {
                stat: decode_stat(&raw)?.0,
            }
        }
        MessageType::Rwstat => ResponseBody::Wstat,
        other => return Err(CodecError::Unsupported(other as u8)),
    };
    Ok(Response { tag, body })
}

/// Decode one packed stat record, returning it and the bytes consumed.
///
/// The input starts at the record's own `size[2]` field, as found in a
/// directory-read payload; trailing bytes are left untouched so callers
/// can iterate packed entries.
pub fn decode_stat(bytes: &[u8]) -> Result<(Stat, usize), CodecError> {
    let mut cursor = Cursor::new(bytes);
    let size = read_u16(&mut cursor)? as usize;
    if bytes.len() < size + 2 {
        return Err(CodecError::Truncated);
    }
    let typ = read_u16(&mut cursor)?;
    let dev = read_u32(&mut cursor)?;
    let qid = read_qid(&mut cursor)?;
    let mode = read_u32(&mut cursor)?;
    let atime = read_u32(&mut cursor)?;
    let mtime = read_u32(&mut cursor)?;
    let length = read_u64(&mut cursor)?;
    let name = read_string(&mut cursor)?;
    let uid = read_string(&mut cursor)?;
    let gid = read_string(&mut cursor)?;
    let muid = read_string(&mut cursor)?;
    Ok((
        Stat {
            typ,
            dev,
            qid,
            mode,
            atime,
            mtime,
            length,
            name,
            uid,
            gid,
            muid,
        },
        size + 2,
    ))
}

fn finish(ty: MessageType, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() + 5;
    let mut buffer = Vec::with_capacity(size);
    buffer.extend_from_slice(&(size as u32).to_le_bytes());
    buffer.push(ty as u8);
    buffer.extend_from_slice(payload);
    buffer
}

fn decode_message(bytes: &[u8]) -> Result<(MessageType, &[u8]), CodecError> {
    if bytes.len() < 5 {
        return Err(CodecError::Truncated);
    }
    let declared = u32::from_le_bytes(bytes[..4].try_into().expect("slice length checked"));
    if declared as usize != bytes.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let ty = MessageType::try_from(bytes[4])?;
    Ok((ty, &bytes[5..]))
}

fn read_u8(cursor: &mut Cursor<'_>) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(cursor: &mut Cursor<'_>) -> Result<u16, CodecError> {
    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(cursor: &mut Cursor<'_>) -> Result<u32, CodecError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<'_>) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_bytes(cursor: &mut Cursor<'_>, count: usize) -> Result<Vec<u8>, CodecError> {
    let mut data = vec![0u8; count];
    cursor.read_exact(&mut data)?;
    Ok(data)
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<String, CodecError> {
    let len = read_u16(cursor)? as usize;
    let buf = read_bytes(cursor, len)?;
    let text = str::from_utf8(&buf).map_err(|_| CodecError::InvalidUtf8)?;
    Ok(text.to_owned())
}

fn read_qid(cursor: &mut Cursor<'_>) -> Result<Qid, CodecError> {
    let ty = QidType::from_raw(read_u8(cursor)?);
    let version = read_u32(cursor)?;
    let path = read_u64(cursor)?;
    Ok(Qid::new(ty, version, path))
}

fn validate_component(component: &str) -> Result<(), CodecError> {
    if component.is_empty() || component.contains('/') {
        return Err(CodecError::InvalidWalk);
    }
    Ok(())
}

fn put_qid(buffer: &mut Vec<u8>, qid: &Qid) {
    buffer.push(qid.ty.raw());
    buffer.extend_from_slice(&qid.version.to_le_bytes());
    buffer.extend_from_slice(&qid.path.to_le_bytes());
}

fn put_string(buffer: &mut Vec<u8>, value: &str) -> Result<(), CodecError> {
    let len: u16 = value.len().try_into().map_err(|_| CodecError::TooLarge)?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), CodecError> {
        let end = self.pos.saturating_add(out.len());
        if end > self.buf.len() {
            return Err(CodecError::Truncated);
        }
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stat() -> Stat {
        Stat {
            typ: 0,
            dev: 0,
            qid: Qid::new(QidType::DIR, 0, 42),
            mode: DMDIR | 0o555,
            atime: 1_592_000_000,
            mtime: 1_592_000_000,
            length: 0,
            name: "users".to_owned(),
            uid: "glenda".to_owned(),
            gid: "glenda".to_owned(),
            muid: String::new(),
        }
    }

    #[test]
    fn request_round_trips() {
        let requests = [
            Request {
                tag: NOTAG,
                body: RequestBody::Version {
                    msize: MAX_MSIZE,
                    version: VERSION.to_owned(),
                },
            },
            Request {
                tag: 1,
                body: RequestBody::Attach {
                    fid: 0,
                    afid: NOFID,
                    uname: "glenda".to_owned(),
                    aname: String::new(),
                },
            },
            Request {
                tag: 2,
                body: RequestBody::Walk {
                    fid: 0,
                    newfid: 1,
                    wnames: vec!["users".to_owned(), "npr".to_owned()],
                },
            },
            Request {
                tag: 3,
                body: RequestBody::Read {
                    fid: 1,
                    offset: 128,
                    count: 4096,
                },
            },
            Request {
                tag: 4,
                body: RequestBody::Write {
                    fid: 2,
                    offset: 0,
                    data: b"batch 50".to_vec(),
                },
            },
            Request {
                tag: 5,
                body: RequestBody::Wstat {
                    fid: 1,
                    stat: sample_stat(),
                },
            },
        ];
        for request in requests {
            let frame = encode_request(&request).expect("encode");
            assert_eq!(decode_request(&frame).expect("decode"), request);
        }
    }

    #[test]
    fn response_round_trips() {
        let responses = [
            Response {
                tag: 1,
                body: ResponseBody::Walk {
                    qids: vec![Qid::new(QidType::DIR, 0, 7), Qid::new(QidType::FILE, 0, 8)],
                },
            },
            Response {
                tag: 2,
                body: ResponseBody::Error {
                    ename: "file not found".to_owned(),
                },
            },
            Response {
                tag: 3,
                body: ResponseBody::Read {
                    data: b"@npr \xe2\x80\x94 hello".to_vec(),
                },
            },
            Response {
                tag: 4,
                body: ResponseBody::Stat {
                    stat: sample_stat(),
                },
            },
        ];
        for response in responses {
            let frame = encode_response(&response).expect("encode");
            assert_eq!(decode_response(&frame).expect("decode"), response);
        }
    }

    #[test]
    fn stat_pack_is_self_describing() {
        let stat = sample_stat();
        let packed = stat.pack();
        let declared = u16::from_le_bytes([packed[0], packed[1]]) as usize;
        assert_eq!(declared + 2, packed.len());
        let (decoded, consumed) = decode_stat(&packed).expect("decode stat");
        assert_eq!(consumed, packed.len());
        assert_eq!(decoded, stat);
    }

    #[test]
    fn reject_walk_with_slash_component() {
        let request = Request {
            tag: 1,
            body: RequestBody::Walk {
                fid: 0,
                newfid: 1,
                wnames: vec!["users/npr".to_owned()],
            },
        };
        assert_eq!(encode_request(&request), Err(CodecError::InvalidWalk));
    }

    #[test]
    fn reject_oversized_walk() {
        let wnames = (0..MAXWELEM + 1).map(|i| format!("e{i}")).collect();
        let request = Request {
            tag: 1,
            body: RequestBody::Walk {
                fid: 0,
                newfid: 1,
                wnames,
            },
        };
        assert_eq!(encode_request(&request), Err(CodecError::InvalidWalk));
    }

    #[test]
    fn detect_truncated_frame() {
        let request = Request {
            tag: 9,
            body: RequestBody::Clunk { fid: 3 },
        };
        let mut frame = encode_request(&request).expect("encode");
        frame.truncate(3);
        assert_eq!(decode_request(&frame), Err(CodecError::Truncated));
    }

    #[test]
    fn detect_length_mismatch() {
        let request = Request {
            tag: 9,
            body: RequestBody::Clunk { fid: 3 },
        };
        let mut frame = encode_request(&request).expect("encode");
        frame.push(0);
        assert!(matches!(
            decode_request(&frame),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn detect_invalid_utf8() {
        let response = Response {
            tag: 1,
            body: ResponseBody::Error {
                ename: "invalid".to_owned(),
            },
        };
        let mut frame = encode_response(&response).expect("encode");
        let len = frame.len();
        frame[len - 2] = 0xfe;
        frame[len - 1] = 0xff;
        assert_eq!(decode_response(&frame), Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn reject_unknown_message_type() {
        let request = Request {
            tag: 9,
            body: RequestBody::Clunk { fid: 3 },
        };
        let mut frame = encode_request(&request).expect("encode");
        frame[4] = 106; // Terror is never a legal transmission
        assert_eq!(decode_request(&frame), Err(CodecError::Unsupported(106)));
    }
}
