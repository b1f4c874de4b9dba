//! In-memory stand-ins for the host primitives

use crate::filter::host::{
    Clock, HostError, HttpDispatcher, HttpRequestHost, ProviderResponse, SharedData,
};
use crate::filter::types::{AUTHORITY_HEADER, CACHE_CONTROL_HEADER, PATH_HEADER};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ordered record of host interactions, shared between fakes
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

/// Request with a plain header list
#[derive(Debug, Default)]
pub struct FakeRequest {
    pub headers: Vec<(String, String)>,
    pub added: Vec<(String, String)>,
    pub resumed: usize,
    log: Option<EventLog>,
}

impl FakeRequest {
    pub fn new(authority: &str, path: &str) -> Self {
        Self::from_headers(vec![
            (AUTHORITY_HEADER, authority),
            (PATH_HEADER, path),
            (":method", "GET"),
        ])
    }

    pub fn from_headers(headers: Vec<(&str, &str)>) -> Self {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn added_pairs(&self) -> Vec<(&str, &str)> {
        self.added
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }
}

impl HttpRequestHost for FakeRequest {
    fn get_http_request_header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .chain(self.added.iter())
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn get_http_request_headers(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .chain(self.added.iter())
            .cloned()
            .collect()
    }

    fn add_http_request_header(&mut self, name: &str, value: &str) {
        self.added.push((name.to_string(), value.to_string()));
    }

    fn resume_http_request(&mut self) {
        self.resumed += 1;
        if let Some(log) = &self.log {
            log.lock().push("resume");
        }
    }
}

/// Shared store with Envoy-style compare-and-swap versions
#[derive(Debug, Default)]
pub struct FakeSharedData {
    entries: Mutex<HashMap<String, (Bytes, u32)>>,
    next_version: AtomicU32,
    failing_reads: AtomicBool,
    writes: AtomicU32,
    log: Option<EventLog>,
}

impl FakeSharedData {
    pub fn with_log(log: EventLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.entries.lock().get(key).map(|(data, _)| data.clone())
    }

    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .lock()
            .insert(key.to_string(), (Bytes::copy_from_slice(data), version));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful writes
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl SharedData for FakeSharedData {
    fn get_shared_data(&self, key: &str) -> Result<(Option<Bytes>, Option<u32>), HostError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(HostError::InternalFailure("read failed".to_string()));
        }
        Ok(match self.entries.lock().get(key) {
            Some((data, version)) => (Some(data.clone()), Some(*version)),
            None => (None, None),
        })
    }

    fn set_shared_data(&self, key: &str, value: &[u8], cas: Option<u32>) -> Result<(), HostError> {
        let mut entries = self.entries.lock();
        if let (Some(cas), Some((_, current))) = (cas, entries.get(key)) {
            if cas != *current {
                return Err(HostError::CasMismatch(key.to_string()));
            }
        }
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        entries.insert(key.to_string(), (Bytes::copy_from_slice(value), version));
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().push("cache_write");
        }
        Ok(())
    }
}

/// A dispatch as seen by the fake dispatcher
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub upstream: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Dispatcher that records calls and hands out call ids
#[derive(Debug, Default)]
pub struct FakeDispatcher {
    calls: Mutex<Vec<RecordedCall>>,
    next_id: AtomicU32,
    failing: AtomicBool,
}

impl FakeDispatcher {
    pub fn fail_dispatch(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl HttpDispatcher for FakeDispatcher {
    type Call = u32;

    fn dispatch_http_call(
        &self,
        upstream: &str,
        headers: Vec<(String, String)>,
        _body: Option<Bytes>,
        timeout: Duration,
    ) -> Result<u32, HostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostError::NotFound(upstream.to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().push(RecordedCall {
            upstream: upstream.to_string(),
            headers,
            timeout,
        });
        Ok(id)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn at(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Provider response with an optional cache-control header and a raw body
pub fn provider_response(cache_control: Option<&str>, body: Option<&str>) -> ProviderResponse {
    let mut headers = vec![(":status".to_string(), "200".to_string())];
    if let Some(cache_control) = cache_control {
        headers.push((CACHE_CONTROL_HEADER.to_string(), cache_control.to_string()));
    }
    ProviderResponse::new(
        headers,
        body.map(|body| Bytes::copy_from_slice(body.as_bytes())),
    )
}

/// The body most tests use: a single `Authorization: token` header
pub const TOKEN_BODY: &str = r#"[{"name": "Authorization", "value": "token"}]"#;
