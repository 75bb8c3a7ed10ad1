//! In-memory transport for tests
//!
//! Responses are scripted per (method, path) and consumed in order; the
//! last scripted response for a route is reused once the queue drains.
//! A route can be held so its response is only delivered after `release`,
//! which lets tests reorder completions.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::{ApiRequest, Method, Transport};
use crate::error::{SyncError, SyncResult};

#[derive(Clone)]
enum Scripted {
    Ok(Value),
    Status(u16),
    Unreachable,
}

type Route = (Method, String);

#[derive(Default)]
struct Inner {
    routes: HashMap<Route, VecDeque<Scripted>>,
    held: HashMap<Route, Arc<Notify>>,
    requests: Vec<ApiRequest>,
}

/// Scripted transport recording every request it sees
#[derive(Default)]
pub struct FakeTransport {
    inner: Mutex<Inner>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
    }

    /// Answer with a JSON body
    pub fn respond(&self, method: Method, path: &str, body: Value) {
        self.push(method, path, Scripted::Ok(body));
    }

    /// Answer with a non-success status
    pub fn fail_status(&self, method: Method, path: &str, status: u16) {
        self.push(method, path, Scripted::Status(status));
    }

    /// Fail as if the server could not be reached
    pub fn fail_transport(&self, method: Method, path: &str) {
        self.push(method, path, Scripted::Unreachable);
    }

    /// Hold responses on a route until `release` is called
    pub fn hold(&self, method: Method, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .held
            .insert((method, path.to_string()), Arc::new(Notify::new()));
    }

    /// Let a held route answer
    pub fn release(&self, method: Method, path: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(gate) = inner.held.remove(&(method, path.to_string())) {
            gate.notify_one();
        }
    }

    /// Every request sent so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Requests sent with the given method whose path starts with `prefix`
    pub fn requests_to(&self, method: Method, prefix: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> SyncResult<Value> {
        let route = (request.method, request.path.clone());
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(request.clone());
            inner.held.get(&route).cloned()
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = {
            let mut inner = self.inner.lock().unwrap();
            match inner.routes.get_mut(&route) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Ok(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(SyncError::Status {
                url: request.path,
                status,
                body: String::new(),
            }),
            Some(Scripted::Unreachable) => Err(SyncError::transport(
                request.path,
                io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            None => Err(SyncError::Status {
                url: request.path,
                status: 404,
                body: "no scripted response".to_string(),
            }),
        }
    }
}
