//! HttpProvider against a canned local backend.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use evalboard::{Config, DataProvider, HttpProvider, SampleId};

/// Serves `responses` in order, one per connection, and records request lines.
async fn serve(responses: Vec<(u16, &'static str, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        for (status, reason, body) in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let head = String::from_utf8_lossy(&buf);
            log.lock().unwrap().push(head.lines().next().unwrap_or_default().to_string());
            let reply = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        }
    });
    (format!("http://{}/api", addr), seen)
}

fn provider(base: &str, retries: u32) -> HttpProvider {
    let cfg = Config {
        api_base: base.to_string(),
        request_timeout_secs: 5,
        max_retries: retries,
        retry_base_ms: 1,
        retry_max_ms: 5,
    };
    HttpProvider::new(&cfg).unwrap()
}

#[tokio::test]
async fn test_cases_request_shape_and_decode() {
    let body = r#"[{"sample_id": 4, "text": "b"}, {"sample_id": "2", "text": "a"}]"#.to_string();
    let (base, seen) = serve(vec![(200, "OK", body)]).await;
    let p = provider(&base, 0);

    let ids = vec![SampleId::from(2u64), SampleId::from(4u64)];
    let records = p.get_examples_by_ids("sys-a", "example", &ids).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sample_id.as_str(), "4");
    assert_eq!(records[1].fields["text"], "a");

    let lines = seen.lock().unwrap().clone();
    assert_eq!(lines, vec!["GET /api/systems/sys-a/cases?level=example&case_ids=2%2C4 HTTP/1.1"]);
}

#[tokio::test]
async fn test_outputs_page_unwraps_envelope() {
    let body = r#"{"system_outputs": [{"id": "7", "output": "yes"}]}"#.to_string();
    let (base, seen) = serve(vec![(200, "OK", body)]).await;
    let p = provider(&base, 0);

    let page = p.get_outputs_page("sys-a", "7").await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].id.as_str(), "7");
    assert!(seen.lock().unwrap()[0].starts_with("GET /api/systems/sys-a/outputs?output_ids=7 "));
}

#[tokio::test]
async fn test_backend_error_body_surfaces() {
    let body = r#"{"error_code": 40302, "detail": "system access denied"}"#.to_string();
    let (base, seen) = serve(vec![(403, "Forbidden", body)]).await;
    let p = provider(&base, 2);

    let err = p.get_outputs_page("sys-a", "1").await.unwrap_err();
    assert_eq!(err.status, Some(403));
    assert_eq!(err.message(), "[Forbidden: 40302] system access denied");
    // 403 is not retried
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    let (base, seen) = serve(vec![
        (503, "Service Unavailable", "{}".to_string()),
        (200, "OK", r#"{"system_outputs": []}"#.to_string()),
    ])
    .await;
    let p = provider(&base, 2);

    let page = p.get_outputs_page("sys-a", "1").await.unwrap();
    assert!(page.records.is_empty());
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_body_is_not_retried() {
    let (base, seen) = serve(vec![
        (200, "OK", "<html>maintenance</html>".to_string()),
        (200, "OK", r#"{"system_outputs": []}"#.to_string()),
    ])
    .await;
    let p = provider(&base, 2);

    let err = p.get_outputs_page("sys-a", "1").await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.detail.starts_with("invalid response body"));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_cases_body_surfaces_once() {
    let (base, seen) = serve(vec![(200, "OK", r#"{"not": "a list"}"#.to_string())]).await;
    let p = provider(&base, 2);

    let err = p
        .get_examples_by_ids("sys-a", "example", &[SampleId::from("1")])
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
    assert!(!err.retryable);
    assert_eq!(seen.lock().unwrap().len(), 1);
}
