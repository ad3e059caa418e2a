use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

pub mod conn;
pub mod registry;

pub use linerpc_protocol::{decode_params, encode_result, Call, Error, Reply, Result};
pub use registry::{RpcFn, ServiceMap};

/// Per-connection socket settings. Zero durations leave the timeout unset.
#[derive(Debug, Clone)]
pub struct ServerOpt {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub nodelay: Option<bool>,
    pub max_message_size: usize,
}

impl Default for ServerOpt {
    fn default() -> Self {
        ServerOpt {
            read_timeout: Default::default(),
            write_timeout: Default::default(),
            nodelay: None,
            max_message_size: linerpc_protocol::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ServerOpt {
    fn apply(&self, stream: &TcpStream) -> std::io::Result<()> {
        if self.read_timeout.as_millis() > 0 {
            stream.set_read_timeout(Some(self.read_timeout))?;
        }
        if self.write_timeout.as_millis() > 0 {
            stream.set_write_timeout(Some(self.write_timeout))?;
        }
        if let Some(nodelay) = self.nodelay {
            stream.set_nodelay(nodelay)?;
        }
        Ok(())
    }
}

/// Collects methods, then binds an address and serves them.
pub struct Server {
    pub addr: String,
    services: ServiceMap,
}

impl Server {
    pub fn new(addr: String) -> Self {
        Server {
            addr,
            services: ServiceMap::new(),
        }
    }

    pub fn register_fn(&mut self, service_path: &str, service_method: &str, f: RpcFn) {
        self.services.register(service_path, service_method, f);
    }

    pub fn get_fn(&self, service_path: &str, service_method: &str) -> Option<RpcFn> {
        self.services.get(service_path, service_method)
    }

    /// Binds the configured address. The method table is frozen from here on.
    pub fn listen(self, opt: ServerOpt) -> Result<Listener> {
        let inner = TcpListener::bind(self.addr.as_str())
            .map_err(|err| Error::Network(format!("cannot listen on {}: {}", self.addr, err)))?;
        if self.services.is_empty() {
            warn!(addr = %self.addr, "no methods registered");
        }
        let listener = Listener {
            inner,
            services: Arc::new(self.services),
            opt,
        };
        info!(
            addr = %listener.local_addr()?,
            methods = ?listener.services.names(),
            "listening"
        );
        Ok(listener)
    }

    /// Binds with default options and serves forever.
    pub fn start(self) -> Result<()> {
        self.listen(ServerOpt::default())?.serve();
        Ok(())
    }
}

/// A bound server socket.
pub struct Listener {
    inner: TcpListener,
    services: Arc<ServiceMap>,
    opt: ServerOpt,
}

impl Listener {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accepts connections for as long as the socket lives, serving each on
    /// its own thread. A failed accept is logged and skipped.
    pub fn serve(&self) {
        for stream in self.inner.incoming() {
            match stream {
                Ok(stream) => self.spawn(stream),
                Err(err) => warn!(error = %err, "failed to accept connection"),
            }
        }
    }

    fn spawn(&self, stream: TcpStream) {
        let services = self.services.clone();
        let opt = self.opt.clone();
        let spawned = thread::Builder::new()
            .name("linerpc-conn".to_owned())
            .spawn(move || conn::serve_conn(&services, stream, &opt));
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn connection thread");
        }
    }
}

/// Wraps `service_fn(args: ArgType) -> Result<ReplyType, E>` into an [`RpcFn`].
///
/// The call's single positional param is decoded into `ArgType`; an `Err`
/// from the function becomes an error reply with `E`'s display text.
#[macro_export]
macro_rules! rpc_fn {
    ($service_fn:expr, $arg_type:ty, $reply_type:ty) => {{
        let f: $crate::RpcFn = |params| {
            let args: $arg_type = $crate::decode_params(params)?;
            let reply: $reply_type =
                $service_fn(args).map_err(|err| $crate::Error::Service(err.to_string()))?;
            $crate::encode_result(&reply)
        };
        f
    }};
}

#[macro_export]
macro_rules! register_func {
    ($rpc_server:expr, $service_path:expr, $service_method:expr, $service_fn:expr, $arg_type:ty, $reply_type:ty) => {{
        let f: $crate::RpcFn = $crate::rpc_fn!($service_fn, $arg_type, $reply_type);
        $rpc_server.register_fn($service_path, $service_method, f);
    }};
}
