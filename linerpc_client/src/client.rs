use std::io::{BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use linerpc_protocol::{encode, Call, Error, Reply, ReplyDecoder, Result};

#[derive(Debug, Copy, Clone)]
pub struct Opt {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub nodelay: Option<bool>,
    pub ttl: Option<u32>,
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            connect_timeout: Default::default(),
            read_timeout: Default::default(),
            write_timeout: Default::default(),
            nodelay: None,
            ttl: None,
        }
    }
}

struct Conn {
    reader: TcpStream,
    writer: BufWriter<TcpStream>,
    decoder: ReplyDecoder,
}

/// A direct, blocking client. One call is in flight at a time.
pub struct Client {
    pub opt: Opt,
    addr: String,
    conn: Option<Conn>,
    seq: u64,
}

impl Client {
    pub fn new(addr: &str) -> Client {
        Client {
            opt: Default::default(),
            addr: String::from(addr),
            conn: None,
            seq: 0,
        }
    }

    /// Connects to the server, replacing any connection already open.
    pub fn start(&mut self) -> Result<()> {
        if self.is_started() {
            debug!(addr = %self.addr, "closing previous connection");
            self.close();
        }

        let stream = if self.opt.connect_timeout.as_millis() == 0 {
            TcpStream::connect(self.addr.as_str())?
        } else {
            let socket_addr: SocketAddr = self
                .addr
                .parse()
                .map_err(|err| Error::Network(format!("bad address {}: {}", self.addr, err)))?;
            TcpStream::connect_timeout(&socket_addr, self.opt.connect_timeout)?
        };

        if self.opt.read_timeout.as_millis() > 0 {
            stream.set_read_timeout(Some(self.opt.read_timeout))?;
        }
        if self.opt.write_timeout.as_millis() > 0 {
            stream.set_write_timeout(Some(self.opt.write_timeout))?;
        }
        if let Some(nodelay) = self.opt.nodelay {
            stream.set_nodelay(nodelay)?;
        }
        if let Some(ttl) = self.opt.ttl {
            stream.set_ttl(ttl)?;
        }

        let reader = stream.try_clone()?;
        self.conn = Some(Conn {
            reader,
            writer: BufWriter::new(stream),
            decoder: ReplyDecoder::new(),
        });
        debug!(addr = %self.addr, "connected");
        Ok(())
    }

    /// Calls `service_path.service_method` with `args` as the single
    /// positional param and waits for its reply.
    pub fn call<A, R>(&mut self, service_path: &str, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let seq = self.seq;
        self.seq += 1;

        let method = format!("{}.{}", service_path, service_method);
        let call = Call::new(&method, args, Value::from(seq))?;
        self.send(&call)?;

        let reply = match self.recv() {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_terminal() {
                    self.close();
                }
                return Err(err);
            }
        };
        if reply.id != call.id {
            return Err(Error::Network(format!(
                "reply id {} does not match call id {}",
                reply.id, call.id
            )));
        }
        reply.into_result()
    }

    /// Writes one call without waiting for the reply.
    pub fn send(&mut self, call: &Call) -> Result<()> {
        let conn = self.conn_mut()?;
        encode(call, &mut conn.writer)?;
        conn.writer.flush()?;
        Ok(())
    }

    /// Reads the next reply off the connection.
    pub fn recv(&mut self) -> Result<Reply> {
        let conn = self.conn_mut()?;
        conn.decoder
            .decode(&mut conn.reader)?
            .ok_or_else(|| Error::Network("connection closed by server".to_owned()))
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.reader.shutdown(Shutdown::Both);
        }
    }

    pub fn is_started(&self) -> bool {
        self.conn.is_some()
    }

    fn conn_mut(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| Error::Network("client is not started".to_owned()))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
