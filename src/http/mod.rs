//! HTTP transport used by the request executor
//!
//! The executor talks to an [`HttpRunner`]; production runs use reqwest and
//! tests swap in [`MockHttpRunner`].

pub mod error;
pub mod mock;
pub mod runner;

pub use error::HttpError;
pub use mock::{MockHttpRunner, MockResponseConfig};
pub use runner::{
    FormPart, HttpBody, HttpCall, HttpOutput, HttpRunner, ReqwestHttpRunner, ResponseCookie,
};

use std::sync::Arc;

#[derive(Clone)]
pub struct HttpClient {
    runner: Arc<dyn HttpRunner>,
}

impl HttpClient {
    pub fn new(runner: Arc<dyn HttpRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(ReqwestHttpRunner::new()))
    }

    pub fn mock() -> (Self, MockHttpRunner) {
        let mock = MockHttpRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn HttpRunner>;
        (Self::new(runner), mock)
    }

    pub async fn send(&self, call: HttpCall) -> Result<HttpOutput, HttpError> {
        self.runner.send(call).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}
