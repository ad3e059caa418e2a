pub use linerpc_client::*;
pub use linerpc_protocol::*;
pub use linerpc_server::*;
