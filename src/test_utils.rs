//! Helpers shared by unit tests.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    transport::{HttpRequest, HttpResponse, HttpTransport},
    EvaluatedFlag, Result, Value,
};

/// In-memory transport that serves queued responses and records requests.
///
/// Once the queue is exhausted, the last response is served again.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct MockInner {
    responses: VecDeque<HttpResponse>,
    last: Option<HttpResponse>,
    requests: Vec<HttpRequest>,
    on_next_call: Option<Hook>,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn push(&self, response: HttpResponse) {
        self.inner.lock().unwrap().responses.push_back(response);
    }

    /// Run `hook` while the next request is in flight.
    pub fn on_next_call(&self, hook: impl FnOnce() + Send + 'static) {
        self.inner.lock().unwrap().on_next_call = Some(Box::new(hook));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }
}

impl HttpTransport for MockTransport {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let hook = self.inner.lock().unwrap().on_next_call.take();
        if let Some(hook) = hook {
            hook();
        }

        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request);
        let response = match inner.responses.pop_front() {
            Some(response) => response,
            None => inner
                .last
                .clone()
                .unwrap_or_else(|| HttpResponse::new(500, "no response configured")),
        };
        inner.last = Some(response.clone());
        Ok(response)
    }
}

pub(crate) fn flag(key: &str, value: impl Into<Value>) -> EvaluatedFlag {
    EvaluatedFlag {
        key: key.to_owned(),
        value: value.into(),
        reason: Some("TARGETING_MATCH".to_owned()),
        variant: Some("variantA".to_owned()),
        error_code: None,
        error_details: None,
        metadata: Default::default(),
    }
}
