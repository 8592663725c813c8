// ABOUTME: Integration tests for the HTTP validator.
// ABOUTME: Uses a raw TCP responder returning canned HTTP/1.1 responses.

use relevo::config::{EnvValue, ValidationConfig};
use relevo::types::StageName;
use relevo::validate::{HttpValidator, ValidationError, ValidationRequest, Validator};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve canned responses, one per accepted connection, and return the
/// raw requests as seen on the wire.
fn serve(
    listener: TcpListener,
    statuses: Vec<&'static str>,
) -> tokio::task::JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut requests = Vec::new();
        for status in statuses {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            requests.push(String::from_utf8_lossy(&raw).to_string());

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        }
        requests
    })
}

fn check(retries: u32) -> ValidationConfig {
    ValidationConfig {
        path: "item".to_string(),
        api_key: Some(EnvValue::Literal("sekrit".to_string())),
        timeout: Duration::from_secs(5),
        interval: Duration::from_millis(10),
        retries,
    }
}

#[tokio::test]
async fn passes_on_2xx_and_sends_expected_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = serve(listener, vec!["200 OK"]);

    let stage = StageName::new("dev").unwrap();
    let config = check(0);
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    HttpValidator::new().check(&request).await.unwrap();

    let requests = server.await.unwrap();
    let wire = &requests[0];
    assert!(wire.starts_with("GET /dev/item HTTP/1.1"), "got: {wire}");
    assert!(wire.contains("x-api-key: sekrit"), "got: {wire}");
    assert!(wire.to_lowercase().contains("host:"), "got: {wire}");
}

#[tokio::test]
async fn non_2xx_fails_after_retry_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = serve(listener, vec!["500 Internal Server Error"; 3]);

    let stage = StageName::new("dev").unwrap();
    let config = check(2);
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    let err = HttpValidator::new().check(&request).await.unwrap_err();
    assert!(matches!(err, ValidationError::UnexpectedStatus(500)));

    // Initial attempt plus two retries.
    assert_eq!(server.await.unwrap().len(), 3);
}

#[tokio::test]
async fn recovers_within_retry_budget() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = serve(listener, vec!["503 Service Unavailable", "200 OK"]);

    let stage = StageName::new("dev").unwrap();
    let config = check(1);
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    HttpValidator::new().check(&request).await.unwrap();
    assert_eq!(server.await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_endpoint_fails() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let stage = StageName::new("dev").unwrap();
    let config = check(0);
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    let err = HttpValidator::new().check(&request).await.unwrap_err();
    assert!(matches!(err, ValidationError::Unreachable(_)));
}

#[tokio::test]
async fn https_endpoint_is_rejected_before_any_attempt() {
    // A listener on the port the stripped-scheme fallback would target;
    // rejecting the endpoint means it never sees a connection.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("https://{}", listener.local_addr().unwrap());
    let server = serve(listener, vec![]);

    let stage = StageName::new("prod").unwrap();
    let config = check(2);
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    let err = HttpValidator::new().check(&request).await.unwrap_err();
    assert!(matches!(err, ValidationError::InvalidEndpoint(_)));
    assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn no_api_key_omits_header() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = serve(listener, vec!["200 OK"]);

    let stage = StageName::new("dev").unwrap();
    let config = ValidationConfig {
        api_key: None,
        ..check(0)
    };
    let request = ValidationRequest {
        endpoint: &endpoint,
        stage: &stage,
        check: &config,
    };

    HttpValidator::new().check(&request).await.unwrap();

    let requests = server.await.unwrap();
    assert!(!requests[0].to_lowercase().contains("x-api-key"));
}
