use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use tracing::{debug, trace, warn};

use linerpc_protocol::{encode, CallDecoder, Error, Reply, Result};

use crate::registry::ServiceMap;
use crate::ServerOpt;

/// Why a connection stopped being served.
#[derive(Debug)]
pub enum Closed {
    /// The peer ended the stream between calls.
    PeerClosed,
    /// The next call could not be decoded. No reply was sent for it.
    DecodeFailed(Error),
    /// A reply could not be written.
    WriteFailed(Error),
}

/// Serves calls from `reader` until the stream ends or breaks, writing one
/// reply per call to `writer` in the order the calls arrived.
///
/// Returns the number of replies written and the reason the loop stopped.
pub fn serve<R, W>(
    services: &ServiceMap,
    reader: &mut R,
    writer: &mut W,
    max_message_size: usize,
) -> (u64, Closed)
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut decoder = CallDecoder::with_max_size(max_message_size);
    let mut replied = 0u64;

    loop {
        let call = match decoder.decode(&mut *reader) {
            Ok(Some(call)) => call,
            Ok(None) => return (replied, Closed::PeerClosed),
            Err(err) => return (replied, Closed::DecodeFailed(err)),
        };
        trace!(method = %call.method, id = %call.id, "dispatching");

        let reply = services.dispatch(&call);
        if let Err(err) = write_reply(&mut *writer, &reply) {
            return (replied, Closed::WriteFailed(err));
        }
        replied += 1;
    }
}

fn write_reply<W: Write + ?Sized>(writer: &mut W, reply: &Reply) -> Result<()> {
    encode(reply, &mut *writer)?;
    writer.flush()?;
    Ok(())
}

/// Runs the call loop for one accepted TCP connection, then shuts it down.
pub(crate) fn serve_conn(services: &ServiceMap, stream: TcpStream, opt: &ServerOpt) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_owned());
    debug!(%peer, "connection accepted");

    if let Err(err) = opt.apply(&stream) {
        warn!(%peer, error = %err, "failed to configure connection");
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }

    let mut reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(err) => {
            warn!(%peer, error = %err, "failed to clone connection");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    };
    let mut writer = std::io::BufWriter::new(&stream);

    let (replied, closed) = serve(services, &mut reader, &mut writer, opt.max_message_size);
    match closed {
        Closed::PeerClosed => debug!(%peer, replied, "connection closed by peer"),
        Closed::DecodeFailed(err) => warn!(%peer, replied, error = %err, "failed to read call"),
        Closed::WriteFailed(err) => warn!(%peer, replied, error = %err, "failed to write reply"),
    }

    drop(writer);
    let _ = stream.shutdown(Shutdown::Both);
}
