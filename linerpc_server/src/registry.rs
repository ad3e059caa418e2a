use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use linerpc_protocol::{split_method, Call, Error, Reply, Result};

/// A registered method: positional params in, result value out.
pub type RpcFn = fn(&Value) -> Result<Value>;

/// Method table keyed by service path, then method name.
///
/// Filled before the server starts listening and shared read-only by every
/// connection afterwards.
#[derive(Default, Clone)]
pub struct ServiceMap {
    services: HashMap<String, HashMap<String, RpcFn>>,
}

impl fmt::Debug for ServiceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl ServiceMap {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `f` as `service_path.service_method`, replacing any earlier
    /// registration under the same name.
    pub fn register(&mut self, service_path: &str, service_method: &str, f: RpcFn) {
        let methods = self
            .services
            .entry(service_path.to_owned())
            .or_insert_with(HashMap::new);
        if methods.insert(service_method.to_owned(), f).is_some() {
            warn!(
                service = service_path,
                method = service_method,
                "method registered twice, keeping the latest"
            );
        }
    }

    pub fn get(&self, service_path: &str, service_method: &str) -> Option<RpcFn> {
        self.services.get(service_path)?.get(service_method).copied()
    }

    /// Looks up a full `Service.Method` name.
    pub fn resolve(&self, name: &str) -> Result<RpcFn> {
        let (service_path, service_method) = split_method(name).ok_or_else(|| {
            Error::MethodNotFound(format!("rpc: service/method request ill-formed: {}", name))
        })?;
        let methods = self
            .services
            .get(service_path)
            .ok_or_else(|| Error::MethodNotFound(format!("rpc: can't find service {}", name)))?;
        methods
            .get(service_method)
            .copied()
            .ok_or_else(|| Error::MethodNotFound(format!("rpc: can't find method {}", name)))
    }

    /// Resolves and invokes the method a call names. Every outcome, including
    /// lookup failures, becomes a reply carrying the call's id.
    pub fn dispatch(&self, call: &Call) -> Reply {
        let outcome = self.resolve(&call.method).and_then(|f| f(&call.params));
        match outcome {
            Ok(result) => Reply::success(call.id.clone(), result),
            Err(err) => {
                debug!(method = %call.method, error = %err, "call failed");
                Reply::error(call.id.clone(), err.to_string())
            }
        }
    }

    /// Registered names in `Service.Method` form, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .iter()
            .flat_map(|(path, methods)| methods.keys().map(move |m| format!("{}.{}", path, m)))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
