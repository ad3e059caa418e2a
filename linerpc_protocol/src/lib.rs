pub mod codec;
pub mod error;
pub mod message;

pub use codec::*;
pub use error::*;
pub use message::*;
