//! Callbacks the HTTP front end consults for every request
//!
//! Error reporting, a per-request accept/trace decision, and the CONNECT
//! decision.

use super::request::RequestHead;
use std::fmt::Debug;
use std::net::SocketAddr;

/// How the front end should satisfy a CONNECT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectAction {
    /// Connect to this (rendezvous) address and relay through it
    Proxy(SocketAddr),
    /// Connect straight to this `host:port`, without device binding
    Direct(String),
}

impl ConnectAction {
    /// Address the front end opens its upstream connection to
    pub fn upstream(&self) -> String {
        match self {
            ConnectAction::Proxy(addr) => addr.to_string(),
            ConnectAction::Direct(target) => target.clone(),
        }
    }
}

/// Hooks into request handling
pub trait HttpHooks: Send + Sync + Debug {
    /// Report a failure at `stage` of handling one request
    fn on_error(&self, stage: &str, err: &anyhow::Error);

    /// Inspect a request before it is served.
    ///
    /// Returning `true` means the hook handled the request and the front end
    /// stops processing it.
    fn on_accept(&self, request: &RequestHead) -> bool;

    /// Decide how to serve a CONNECT to `host`
    fn on_connect(&self, host: &str) -> ConnectAction;
}
