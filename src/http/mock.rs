use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::HttpError;
use super::runner::{HttpCall, HttpOutput, HttpRunner, ResponseCookie};

/// In-memory HTTP runner answering calls from canned responses keyed by URL.
#[derive(Clone, Default)]
pub struct MockHttpRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<HttpCall>>>,
}

#[derive(Clone)]
struct MockExpectation {
    url: String,
    method: Option<String>,
    response: MockResponse,
    delay: Option<Duration>,
    times_called: usize,
}

#[derive(Clone)]
enum MockResponse {
    Output(HttpOutput),
    Error(String),
}

pub struct MockResponseConfig {
    runner: MockHttpRunner,
    expectation: MockExpectation,
}

impl MockHttpRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(&self, url: &str) -> MockResponseConfig {
        MockResponseConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                url: url.to_string(),
                method: None,
                response: MockResponse::Output(HttpOutput {
                    status: 200,
                    status_text: "200 OK".to_string(),
                    headers: Vec::new(),
                    body: String::new(),
                    cookies: Vec::new(),
                    duration: Duration::from_millis(1),
                }),
                delay: None,
                times_called: 0,
            },
        }
    }

    pub fn get_call_history(&self) -> Vec<HttpCall> {
        self.call_history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, url: &str) -> Vec<HttpCall> {
        self.get_call_history()
            .into_iter()
            .filter(|call| call.url == url)
            .collect()
    }

    pub fn verify_called(&self, url: &str, times: usize) -> bool {
        self.calls_to(url).len() == times
    }
}

impl MockResponseConfig {
    pub fn method(mut self, method: &str) -> Self {
        self.expectation.method = Some(method.to_uppercase());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        if let MockResponse::Output(ref mut output) = self.expectation.response {
            output.status = status;
            output.status_text = status.to_string();
        }
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        if let MockResponse::Output(ref mut output) = self.expectation.response {
            output.body = body.to_string();
        }
        self
    }

    pub fn json(self, body: &str) -> Self {
        self.header("content-type", "application/json").body(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let MockResponse::Output(ref mut output) = self.expectation.response {
            output.headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn cookie(mut self, cookie: ResponseCookie) -> Self {
        if let MockResponse::Output(ref mut output) = self.expectation.response {
            output.cookies.push(cookie);
        }
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.expectation.delay = Some(delay);
        self
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.expectation.response = MockResponse::Error(message.to_string());
        self
    }

    pub fn finish(self) {
        if let Ok(mut expectations) = self.runner.expectations.lock() {
            expectations.push(self.expectation);
        }
    }
}

#[async_trait]
impl HttpRunner for MockHttpRunner {
    async fn send(&self, call: HttpCall) -> Result<HttpOutput, HttpError> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call.clone());
        }

        let matched = {
            let mut expectations = self
                .expectations
                .lock()
                .map_err(|e| HttpError::MockExpectationNotMet(e.to_string()))?;

            expectations
                .iter_mut()
                .find(|expectation| {
                    expectation.url == call.url
                        && expectation
                            .method
                            .as_ref()
                            .map_or(true, |method| *method == call.method.to_uppercase())
                })
                .map(|expectation| {
                    expectation.times_called += 1;
                    (expectation.response.clone(), expectation.delay)
                })
        };

        let (response, delay) = matched.ok_or_else(|| {
            HttpError::MockExpectationNotMet(format!(
                "no response configured for {} {}",
                call.method, call.url
            ))
        })?;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            MockResponse::Output(mut output) => {
                output.duration = delay.unwrap_or(output.duration);
                Ok(output)
            }
            MockResponse::Error(message) => Err(HttpError::Transport(message)),
        }
    }
}
