use crate::{ReasoningClient, ReasoningError};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use rootcause_core::LlmConfig;
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a site reliability engineer performing root cause analysis. \
Follow the requested output format exactly.";

/// Blocking client for OpenAI-compatible `chat/completions` endpoints.
///
/// Performs exactly one HTTP request per `submit`; wrap it in
/// [`crate::RetryingClient`] for backoff.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    cfg: LlmConfig,
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(cfg: LlmConfig) -> Result<Self, ReasoningError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .map_err(|e| ReasoningError::Service(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { cfg, client })
    }

    /// Key from the configured environment variable, falling back to `llm.api_key`.
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.cfg.api_key.clone().filter(|k| !k.trim().is_empty()))
    }

    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.cfg.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.cfg.temperature,
            "max_tokens": self.cfg.max_tokens,
            "stream": false,
        })
    }
}

impl ReasoningClient for ChatCompletionsClient {
    fn submit(&self, prompt: &str) -> Result<String, ReasoningError> {
        let mut request = self
            .client
            .post(&self.cfg.endpoint)
            .json(&self.build_payload(prompt));
        if let Some(key) = self.api_key() {
            request = request.bearer_auth(key);
        }

        let resp = request.send().map_err(|e| format_transport_error(&e))?;
        let status = resp.status();
        let retry_after =
            parse_retry_after_seconds(resp.headers().get(RETRY_AFTER)).map(Duration::from_secs);
        let body = resp
            .text()
            .map_err(|e| ReasoningError::Service(format!("failed to read response body: {e}")))?;

        if status.is_success() {
            return parse_completion(&body);
        }
        Err(format_api_error(status, &body, retry_after, &self.cfg.api_key_env))
    }
}

/// Overload statuses the retry decorator is allowed to absorb.
fn is_rate_limit_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 529)
}

fn format_api_error(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
    api_key_env: &str,
) -> ReasoningError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    if is_rate_limit_status(status) {
        return ReasoningError::RateLimited {
            attempts: 1,
            retry_after,
            detail: format!("HTTP {}: {detail}", status.as_u16()),
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => ReasoningError::Service(format!(
            "invalid or missing API key (HTTP 401); set {api_key_env} or llm.api_key in settings"
        )),
        _ => ReasoningError::Service(format!("HTTP {}: {detail}", status.as_u16())),
    }
}

fn format_transport_error(err: &reqwest::Error) -> ReasoningError {
    let inner = err
        .source()
        .map(|e| e.to_string())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let msg = if err.is_timeout() {
        "request timed out; consider raising llm.timeout_seconds".to_string()
    } else if inner.contains("dns") || inner.contains("resolve") {
        "DNS resolution failed for the reasoning endpoint".to_string()
    } else if err.is_connect() {
        "could not connect to the reasoning endpoint".to_string()
    } else {
        format!("transport error: {err}")
    };
    ReasoningError::Service(msg)
}

fn parse_retry_after_seconds(header: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    let value = header?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    parse_retry_after_http_date(value)
}

fn parse_retry_after_http_date(value: &str) -> Option<u64> {
    let retry_at = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT")
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
        .ok()?;
    let delta = retry_at.signed_duration_since(Utc::now()).num_seconds();
    Some(delta.max(0) as u64)
}

fn parse_completion(body: &str) -> Result<String, ReasoningError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ReasoningError::Service(format!("invalid completion payload: {e}")))?;
    value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            ReasoningError::Service(
                "unexpected completion payload: missing choices[0].message.content".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];
        let mut header_end = None;
        while header_end.is_none() {
            let n = stream.read(&mut chunk).expect("read");
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            header_end = buffer
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .map(|i| i + 4);
        }
        let header_len = header_end.unwrap_or(buffer.len());
        let headers = String::from_utf8_lossy(&buffer[..header_len]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buffer.len() < header_len + content_length {
            let n = stream.read(&mut chunk).expect("read body");
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buffer).to_string()
    }

    fn serve_once(response: String) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let request = read_request(&mut stream);
            stream.write_all(response.as_bytes()).expect("write");
            request
        });
        (format!("http://{addr}/v1/chat/completions"), handle)
    }

    fn http_response(status_line: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn client_for(endpoint: String) -> ChatCompletionsClient {
        ChatCompletionsClient::new(LlmConfig {
            endpoint,
            api_key: Some("test-key".to_string()),
            api_key_env: "ROOTCAUSE_TEST_UNSET_KEY".to_string(),
            timeout_seconds: 5,
            ..LlmConfig::default()
        })
        .expect("client")
    }

    #[test]
    fn parses_completion_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Final Answer: oom"}}]}"#;
        assert_eq!(parse_completion(body).expect("parse"), "Final Answer: oom");
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn retry_after_parses_seconds_and_http_date() {
        let seconds = HeaderValue::from_static("7");
        assert_eq!(parse_retry_after_seconds(Some(&seconds)), Some(7));
        let past = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after_seconds(Some(&past)), Some(0));
        let junk = HeaderValue::from_static("soon");
        assert_eq!(parse_retry_after_seconds(Some(&junk)), None);
    }

    #[test]
    fn overload_statuses_map_to_rate_limited() {
        for code in [429_u16, 503, 529] {
            let status = StatusCode::from_u16(code).expect("status");
            let err = format_api_error(status, r#"{"error":{"message":"busy"}}"#, None, "K");
            assert!(err.is_rate_limited(), "{code} should be rate limited");
        }
        let err = format_api_error(StatusCode::BAD_REQUEST, "nope", None, "K");
        assert_eq!(err, ReasoningError::Service("HTTP 400: nope".to_string()));
    }

    #[test]
    fn unauthorized_mentions_key_sources() {
        let err = format_api_error(StatusCode::UNAUTHORIZED, "", None, "ROOTCAUSE_API_KEY");
        let msg = err.to_string();
        assert!(msg.contains("ROOTCAUSE_API_KEY"));
        assert!(msg.contains("llm.api_key"));
    }

    #[test]
    fn submit_posts_chat_payload_with_bearer_auth() {
        let body = r#"{"choices":[{"message":{"content":"Thought: check logs"}}]}"#;
        let (endpoint, server) = serve_once(http_response("200 OK", "", body));
        let text = client_for(endpoint).submit("why is checkout slow?").expect("submit");
        assert_eq!(text, "Thought: check logs");

        let request = server.join().expect("server");
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains("why is checkout slow?"));
        assert!(request.contains("\"stream\":false"));
    }

    #[test]
    fn submit_surfaces_retry_after_on_429() {
        let (endpoint, server) = serve_once(http_response(
            "429 Too Many Requests",
            "Retry-After: 3\r\n",
            r#"{"error":{"message":"slow down"}}"#,
        ));
        let err = client_for(endpoint).submit("prompt").expect_err("rate limited");
        server.join().expect("server");
        match err {
            ReasoningError::RateLimited {
                retry_after,
                detail,
                ..
            } => {
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
                assert!(detail.contains("slow down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
