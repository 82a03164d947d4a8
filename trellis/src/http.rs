//! Outbound HTTP transport. Every provider call in the oauth flow goes
//! through here so all of them share the same fixed timeout and the same
//! structured success/failure shape. Redirects are followed by minreq.

use thiserror::Error as ThisError;

/// Bound on connect plus response time for a single provider call.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, ThisError)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(#[from] minreq::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A fully buffered response. Callers branch on `status` themselves; a
/// non-200 is not a transport error.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<serde_json::Value, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Malformed(e.to_string()))
    }
}

pub fn get(url: &str) -> Result<Response, HttpError> {
    let response = minreq::get(url)
        .with_timeout(REQUEST_TIMEOUT_SECS)
        .send()?;
    convert(response)
}

pub fn post_form(url: &str, body: String) -> Result<Response, HttpError> {
    let response = minreq::post(url)
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_timeout(REQUEST_TIMEOUT_SECS)
        .with_body(body)
        .send()?;
    convert(response)
}

fn convert(response: minreq::Response) -> Result<Response, HttpError> {
    let status = u16::try_from(response.status_code)
        .map_err(|_| HttpError::Malformed(format!("status code {}", response.status_code)))?;
    Ok(Response {
        status,
        body: response.as_bytes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn get_buffers_status_and_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/v2/me");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"id":"U1"}"#);
        });

        let response = get(&server.url("/v2/me")).unwrap();
        mock.assert();
        assert!(response.is_success());
        assert_eq!(response.json().unwrap()["id"], "U1");
    }

    #[test]
    fn post_form_sends_urlencoded_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("grant_type=authorization_code");
            then.status(400).body("bad verification code");
        });

        let response = post_form(
            &server.url("/token"),
            "grant_type=authorization_code&code=XYZ".to_string(),
        )
        .unwrap();
        mock.assert();
        assert!(!response.is_success());
        assert_eq!(response.status, 400);
        assert_eq!(response.text(), "bad verification code");
    }
}
