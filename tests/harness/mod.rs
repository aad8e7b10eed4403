//! Mock authorization service for integration tests.
//!
//! Runs a `tiny_http` server on a random local port in a background thread.
//! Each request is recorded and answered by a caller-supplied route function.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use tiny_http::{Header, Response, Server};

/// What the mock saw for one request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub otp: Option<String>,
    pub body: String,
}

/// Reply produced by a route function.
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply {
            status,
            headers: vec![("Content-Type", "application/json".into())],
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

pub struct MockService {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockService {
    /// Start serving; `route` gets the server base URL and the recorded request.
    pub fn start<F>(route: F) -> Self
    where
        F: Fn(&str, &Recorded) -> Reply + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("bind mock server");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("mock server has an ip address");
        let base_url = format!("http://{}", addr);
        let requests: Arc<Mutex<Vec<Recorded>>> = Arc::default();

        let log = requests.clone();
        let base = base_url.clone();
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let authorization = header("Authorization");
                let otp = header("X-GitHub-OTP");
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    otp,
                    body,
                };
                log.lock().unwrap().push(recorded.clone());

                let reply = route(&base, &recorded);
                let mut response = Response::from_string(reply.body).with_status_code(reply.status);
                for (name, value) in reply.headers {
                    let header = Header::from_bytes(name.as_bytes(), value.as_bytes())
                        .expect("valid header");
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        MockService { base_url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// `Authorization` header value for octocat / hunter2.
pub const OCTOCAT_BASIC: &str = "Basic b2N0b2NhdDpodW50ZXIy";
