// Author: Lukas Bower
// Purpose: TCP transport: accept loop and per-connection frame pump.

//! 9P over TCP.
//!
//! One thread per accepted connection; each reads length-prefixed frames,
//! dispatches them through the shared [`TwitterFs`], and writes the reply.
//! Requests within a connection are answered in order.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use log::{debug, info, warn};
use ninep_codec::{decode_request, encode_response, Response, ResponseBody, MAX_MSIZE};

use crate::{Session, TwitterFs};

/// Listen on `addr` and serve until the process is terminated.
pub fn serve(fs: Arc<TwitterFs>, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
    info!("twitter file server listening on {addr}");
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let fs = Arc::clone(&fs);
                thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_owned());
                    debug!("accepted {peer}");
                    match serve_connection(&fs, stream) {
                        Ok(()) => debug!("closed {peer}"),
                        Err(err) => debug!("connection {peer}: {err}"),
                    }
                });
            }
            Err(err) => warn!("accept failed: {err}"),
        }
    }
    Ok(())
}

/// Pump frames for one connection until EOF or a framing error.
fn serve_connection(fs: &TwitterFs, mut stream: TcpStream) -> io::Result<()> {
    let mut session = Session::new();
    loop {
        let mut size_bytes = [0u8; 4];
        match stream.read_exact(&mut size_bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(err) => return Err(err),
        }
        let size = u32::from_le_bytes(size_bytes) as usize;
        if !(7..=MAX_MSIZE as usize).contains(&size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad frame size {size}"),
            ));
        }
        let mut frame = vec![0u8; size];
        frame[..4].copy_from_slice(&size_bytes);
        stream.read_exact(&mut frame[4..])?;
        let response = match decode_request(&frame) {
            Ok(request) => fs.handle_request(&mut session, request),
            Err(err) => {
                debug!("undecodable frame: {err}");
                let tag = u16::from_le_bytes([frame[5], frame[6]]);
                Response {
                    tag,
                    body: ResponseBody::Error {
                        ename: err.to_string(),
                    },
                }
            }
        };
        let bytes = encode_response(&response)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        stream.write_all(&bytes)?;
    }
}
