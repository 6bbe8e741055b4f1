use std::time::Duration;

use reqwest::{Client, Response};
use wayfinder_core::TravelError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(6);
const ERROR_BODY_LIMIT: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, TravelError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .user_agent("wayfinder/0.1")
        .build()
        .map_err(|e| TravelError::Transport {
            service: "http client",
            code: "HTTP_CLIENT_INIT",
            timed_out: false,
            detail: e.to_string(),
        })
}

pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Error codes a client reports for one remote service.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ServiceCodes {
    pub service: &'static str,
    pub status: &'static str,
    pub timeout: &'static str,
    pub network: &'static str,
}

impl ServiceCodes {
    pub fn transport(&self, err: reqwest::Error) -> TravelError {
        if err.is_decode() {
            return TravelError::parse(format!("{} response", self.service), err);
        }
        let timed_out = err.is_timeout();
        TravelError::Transport {
            service: self.service,
            code: if timed_out { self.timeout } else { self.network },
            timed_out,
            detail: err.to_string(),
        }
    }

    pub async fn upstream(&self, response: Response) -> TravelError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        TravelError::Upstream {
            service: self.service,
            code: self.status,
            status: Some(status),
            detail: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }
}
