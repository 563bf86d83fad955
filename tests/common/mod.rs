use std::{
    collections::{HashMap, VecDeque},
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use ofrep::{HttpRequest, HttpResponse, HttpTransport, OfrepProvider, ProviderConfig};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves queued responses in order, then repeats the last one.
#[derive(Clone, Default)]
pub struct FakeServer {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    responses: VecDeque<HttpResponse>,
    last: Option<HttpResponse>,
    requests: Vec<HttpRequest>,
    paused: HashMap<usize, (Sender<()>, Receiver<()>)>,
}

/// A request held by the server until released.
pub struct PausedRequest {
    /// Signaled once the request has reached the server.
    pub entered: Receiver<()>,
    release: Sender<()>,
}

impl PausedRequest {
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl FakeServer {
    pub fn new() -> FakeServer {
        FakeServer::default()
    }

    pub fn respond(&self, status: u16, body: &str) -> &FakeServer {
        self.respond_with(HttpResponse::new(status, body))
    }

    pub fn respond_with(&self, response: HttpResponse) -> &FakeServer {
        self.inner.lock().unwrap().responses.push_back(response);
        self
    }

    /// Hold the request with the given index (starting at 0) until the returned handle is
    /// released.
    pub fn pause_request(&self, index: usize) -> PausedRequest {
        let (entered_sender, entered) = channel();
        let (release, release_receiver) = channel();
        self.inner
            .lock()
            .unwrap()
            .paused
            .insert(index, (entered_sender, release_receiver));
        PausedRequest { entered, release }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn request_body(&self, index: usize) -> serde_json::Value {
        serde_json::from_slice(&self.requests()[index].body).unwrap()
    }

    pub fn provider(&self) -> OfrepProvider {
        self.config().to_provider().unwrap()
    }

    pub fn config(&self) -> ProviderConfig {
        ProviderConfig::from_endpoint("http://localhost:1031")
            .polling_interval(Duration::from_secs(3600))
            .transport(self.clone())
    }
}

impl HttpTransport for FakeServer {
    fn post(&self, request: HttpRequest) -> ofrep::Result<HttpResponse> {
        let paused = {
            let mut state = self.inner.lock().unwrap();
            let index = state.requests.len();
            state.requests.push(request);
            state.paused.remove(&index)
        };
        if let Some((entered, release)) = paused {
            let _ = entered.send(());
            let _ = release.recv();
        }

        let mut state = self.inner.lock().unwrap();
        let response = match state.responses.pop_front() {
            Some(response) => response,
            None => state
                .last
                .clone()
                .unwrap_or_else(|| HttpResponse::new(500, "no response configured")),
        };
        state.last = Some(response.clone());
        Ok(response)
    }
}
