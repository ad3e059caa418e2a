use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::debug;

use linerpc::{rpc_fn, RpcFn, Server};

pub const SERVICE_PATH: &str = "Arithmetic";

/// Operands shared by every arithmetic method. Missing fields read as zero.
#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Args {
    #[serde(rename = "A", alias = "a")]
    pub a: i64,
    #[serde(rename = "B", alias = "b")]
    pub b: i64,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotient {
    #[serde(rename = "Quotient")]
    pub quotient: i64,
    #[serde(rename = "Remainder")]
    pub remainder: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArithError {
    #[error("cannot divide by zero")]
    DivisionByZero,
}

/// `a * b`, wrapping on overflow.
pub fn multiply(args: Args) -> Result<i64, ArithError> {
    Ok(args.a.wrapping_mul(args.b))
}

/// Truncating division: the quotient rounds toward zero and the remainder
/// takes the sign of `a`, so `quotient * b + remainder == a`.
///
/// `i64::MIN / -1` wraps to `i64::MIN` with remainder 0.
pub fn divide(args: Args) -> Result<Quotient, ArithError> {
    if args.b == 0 {
        return Err(ArithError::DivisionByZero);
    }
    Ok(Quotient {
        quotient: args.a.wrapping_div(args.b),
        remainder: args.a.wrapping_rem(args.b),
    })
}

/// The methods of the `Arithmetic` service.
#[derive(Debug, Copy, Clone, PartialEq, Display, EnumIter)]
pub enum ArithMethod {
    Multiply,
    Divide,
}

impl ArithMethod {
    pub fn handler(self) -> RpcFn {
        match self {
            ArithMethod::Multiply => rpc_fn!(multiply, Args, i64),
            ArithMethod::Divide => rpc_fn!(divide, Args, Quotient),
        }
    }

    /// Full wire name, e.g. `Arithmetic.Divide`.
    pub fn name(self) -> String {
        format!("{}.{}", SERVICE_PATH, self)
    }
}

/// Registers every [`ArithMethod`] under [`SERVICE_PATH`].
pub fn register(rpc_server: &mut Server) {
    for method in ArithMethod::iter() {
        rpc_server.register_fn(SERVICE_PATH, &method.to_string(), method.handler());
        debug!(method = %method.name(), "registered");
    }
}
