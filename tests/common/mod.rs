// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pickaxe_lang::http::{DownloadError, HttpRequest, RequestFactory, Wire};
use pickaxe_lang::{Runnable, RuntimeTable, ScraperDomFactory, compile};

pub const PAGE: &str = r#"
<div>
    <span class="center">here</span>
    <a href="http://google.com">link</a>
    <div class="dollar">$6,566.00</div>
    <span class="address">4332 Forest Hill Blvd<br>West Palm Beach, FL 33406</span>
    <div id="match-tests">
        <li>6,566</li>
        <li>6</li>
        <li>8,975</li>
        <li>6,566,888</li>
    </div>
    <div id="match-tests">
        <li>10,566</li>
        <li>3</li>
        <li>1,975</li>
        <li>2,566,888</li>
    </div>
    <table>
        <tr>
            <td>1</td>
        </tr>
        <tr>
            <td>2</td>
            <td>3</td>
        </tr>
    </table>
</div>
"#;

/// Serves canned bodies by url; unknown urls get `PAGE`.
///
/// Urls containing "fail" answer 500. Urls with a `delay=<ms>` part sleep
/// first, so tests can make later wires finish earlier.
#[derive(Default)]
pub struct MockRequests {
    bodies: HashMap<String, String>,
    pub fetched: Arc<Mutex<Vec<String>>>,
}

impl MockRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

struct MockRequest {
    url: String,
    body: String,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl HttpRequest for MockRequest {
    fn download(&self) -> Result<Vec<u8>, DownloadError> {
        if let Some(ms) = self
            .url
            .split("delay=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .and_then(|ms| ms.parse::<u64>().ok())
        {
            thread::sleep(Duration::from_millis(ms));
        }
        self.fetched.lock().push(self.url.clone());
        if self.url.contains("fail") {
            return Err(DownloadError::Status(500));
        }
        Ok(self.body.clone().into_bytes())
    }
}

impl RequestFactory for MockRequests {
    fn create(&self, wire: &Wire) -> Box<dyn HttpRequest> {
        let body = self
            .bodies
            .get(&wire.url)
            .cloned()
            .unwrap_or_else(|| PAGE.to_string());
        Box::new(MockRequest {
            url: wire.url.clone(),
            body,
            fetched: Arc::clone(&self.fetched),
        })
    }
}

pub fn runnable(code: &str, requests: MockRequests) -> Runnable {
    let plan = compile(code).unwrap();
    Runnable::new(plan, Arc::new(requests), Arc::new(ScraperDomFactory::new()))
}

/// Compiles and runs `code` against the mock page.
pub fn run(code: &str) -> Vec<RuntimeTable> {
    runnable(code, MockRequests::new()).collect().unwrap()
}
