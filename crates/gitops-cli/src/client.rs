use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Blocking HTTP client for a running gateway.
pub struct Client {
    base: String,
    agent: ureq::Agent,
}

impl Client {
    pub fn new(base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut req = self.agent.get(&self.url(path));
        for (k, v) in query {
            req = req.query(k, v);
        }
        self.send(req)
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut req = self.agent.post(&self.url(path));
        for (k, v) in query {
            req = req.query(k, v);
        }
        self.send(req)
    }

    fn send<T: DeserializeOwned>(&self, req: ureq::Request) -> Result<T> {
        let url = req.url().to_string();
        let body = match req.call() {
            Ok(resp) => resp.into_string()?,
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(api_error(code, &body));
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("could not reach gateway at {url}")))
            }
        };
        serde_json::from_str(&body).with_context(|| format!("unexpected response from {url}"))
    }
}

/// Turn a `{error, message}` body into a readable error.
fn api_error(code: u16, body: &str) -> anyhow::Error {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => {
            let kind = v["error"].as_str().unwrap_or("Error");
            let message = v["message"].as_str().unwrap_or(body);
            anyhow!("{kind} ({code}): {message}")
        }
        Err(_) => anyhow!("gateway returned {code}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_uses_code_and_message() {
        let err = api_error(
            409,
            r#"{"error":"AlreadyInProgress","message":"deployment of v2.0.0 already in progress"}"#,
        );
        assert_eq!(
            err.to_string(),
            "AlreadyInProgress (409): deployment of v2.0.0 already in progress"
        );
    }

    #[test]
    fn api_error_tolerates_plain_bodies() {
        let err = api_error(502, "bad gateway");
        assert_eq!(err.to_string(), "gateway returned 502: bad gateway");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = Client::new("http://localhost:3000/");
        assert_eq!(client.url("/api/status"), "http://localhost:3000/api/status");
    }
}
