//! Remote tool client against canned tool-service responses on a local socket.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use marketlab_core::optimizer::GridSpec;
use marketlab_core::Recommendation;
use marketlab_runner::tools::{CrossParams, HttpTimeouts};
use marketlab_runner::{HttpTools, Tools};

// ─── Canned server ──────────────────────────────────────────────────

/// Serve one response, then hand back the raw request (head and body).
fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request
    });
    (base, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_line(request: &str) -> &str {
    request.lines().next().unwrap_or_default()
}

fn request_json(request: &str) -> Value {
    let body = request.split("\r\n\r\n").nth(1).unwrap_or_default();
    serde_json::from_str(body).unwrap()
}

const SIGNALS: &str = r#"{"momentum":0.8,"rsi":0.5,"trend":1.0,"sentiment":0.55,"overall":0.71}"#;
const METRICS: &str = r#"{"CAGR":0.083,"Sharpe":0.61,"MaxDrawdown":0.21,"WinRate":0.52}"#;

// ─── Decoding service payloads ──────────────────────────────────────

#[test]
fn screen_decodes_clean_response_with_null_errors() {
    let body = format!(
        r#"{{"results":[{{"symbol":"AAPL","recommendation":"BUY","confidence":0.71,"signals":{SIGNALS}}}],"errors":null}}"#
    );
    let (base, server) = serve_once("200 OK", &body);

    let out = HttpTools::new(&base)
        .unwrap()
        .screen(&["AAPL".to_string()], 365)
        .unwrap();
    assert_eq!(out.results.len(), 1);
    assert_eq!(out.results[0].recommendation, Recommendation::Buy);
    assert!(out.errors.is_empty());

    let request = server.join().unwrap();
    assert!(request_line(&request).starts_with("POST /screen "));
    let sent = request_json(&request);
    assert_eq!(sent["symbols"][0], "AAPL");
    assert_eq!(sent["days"], 365);
}

#[test]
fn screen_decodes_per_symbol_errors() {
    let body = r#"{"results":[],"errors":[{"symbol":"ZZZ","error":"No price data for ZZZ"}]}"#;
    let (base, server) = serve_once("200 OK", body);

    let out = HttpTools::new(&base).unwrap().screen(&["ZZZ".to_string()], 365).unwrap();
    assert!(out.results.is_empty());
    assert_eq!(out.errors[0].symbol, "ZZZ");
    server.join().unwrap();
}

#[test]
fn analyze_decodes_and_encodes_symbol_as_one_segment() {
    let body = format!(
        r#"{{"symbol":"BRK/B","recommendation":"BUY","confidence":0.71,"sentiment_compound":0.12,"signals":{SIGNALS},"rationale":"Momentum=0.80, RSI flag=0.50, Trend=1.00, News sentiment=0.55 => BUY (conf 0.71)"}}"#
    );
    let (base, server) = serve_once("200 OK", &body);

    let analysis = HttpTools::new(format!("{base}/")).unwrap().analyze("BRK/B", 365).unwrap();
    assert_eq!(analysis.symbol, "BRK/B");
    assert_eq!(analysis.signals.trend, 1.0);
    assert_eq!(analysis.confidence, 0.71);

    let request = server.join().unwrap();
    assert!(request_line(&request).starts_with("GET /analyze/BRK%2FB?days=365 "));
}

#[test]
fn backtest_decodes_null_series() {
    let body = format!(
        r#"{{"symbol":"AAPL","strategy":"sma_cross","params":{{"fast":50,"slow":200}},"metrics":{METRICS},"equity":null,"equity_index":null}}"#
    );
    let (base, server) = serve_once("200 OK", &body);

    let report = HttpTools::new(&base).unwrap().backtest("AAPL", 50, 200, 1000).unwrap();
    assert_eq!(report.params, CrossParams { fast: 50, slow: 200 });
    assert_eq!(report.metrics.sharpe, 0.61);
    assert_eq!(report.equity, None);
    assert_eq!(report.dataset_hash, None);

    let request = server.join().unwrap();
    assert!(request_line(&request).starts_with("POST /backtest "));
    let sent = request_json(&request);
    assert_eq!(sent["strategy"], "sma_cross");
    assert_eq!(sent["params"]["fast"], 50);
    assert_eq!(sent["params"]["slow"], 200);
}

#[test]
fn optimize_decodes_leaderboard() {
    let row = format!(r#"{{"fast":20,"slow":100,"IS":{METRICS},"OS":{METRICS}}}"#);
    let body = format!(
        r#"{{"symbol":"AAPL","split":0.7,"bars_total":1000,"bars_is":700,"bars_os":300,"best":{row},"leaderboard":[{row}]}}"#
    );
    let (base, server) = serve_once("200 OK", &body);

    let report = HttpTools::new(&base)
        .unwrap()
        .optimize_backtest("AAPL", 1200, &GridSpec::default())
        .unwrap();
    assert_eq!((report.result.bars_is, report.result.bars_os), (700, 300));
    assert_eq!((report.result.best.fast, report.result.best.slow), (20, 100));
    assert_eq!(report.result.leaderboard.len(), 1);
    assert_eq!(report.dataset_hash, None);

    let sent = request_json(&server.join().unwrap());
    assert_eq!(sent["top_k"], 5);
    assert_eq!(sent["slow_values"].as_array().unwrap().len(), 4);
}

// ─── Failure statuses ───────────────────────────────────────────────

#[test]
fn service_error_keeps_status_and_body() {
    let (base, server) = serve_once("400 Bad Request", r#"{"detail":"Not enough data"}"#);
    let err = HttpTools::new(&base).unwrap().analyze("AAPL", 365).unwrap_err();
    assert_eq!(err.status, 400);
    assert!(err.message.contains("Not enough data"));
    server.join().unwrap();
}

#[test]
fn malformed_body_is_502() {
    let (base, server) = serve_once("200 OK", r#"{"unexpected":true}"#);
    let err = HttpTools::new(&base).unwrap().analyze("AAPL", 365).unwrap_err();
    assert_eq!(err.status, 502);
    server.join().unwrap();
}

#[test]
fn refused_connection_is_503() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = HttpTools::new(format!("http://127.0.0.1:{port}"))
        .unwrap()
        .screen(&["AAPL".to_string()], 365)
        .unwrap_err();
    assert_eq!(err.status, 503);
}

#[test]
fn silent_service_times_out_as_504() {
    // bound but never answered: the request sits in the accept backlog
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let tools = HttpTools::new(&base).unwrap().with_timeouts(HttpTimeouts {
        analyze: Duration::from_millis(200),
        ..HttpTimeouts::default()
    });

    let err = tools.analyze("AAPL", 365).unwrap_err();
    assert_eq!(err.status, 504);
    drop(listener);
}

#[test]
fn default_timeouts_match_operation_weight() {
    let t = HttpTools::new("http://127.0.0.1:8000").unwrap().timeouts();
    assert_eq!(t.analyze, Duration::from_secs(60));
    assert_eq!(t.screen, Duration::from_secs(180));
    assert_eq!(t.backtest, Duration::from_secs(180));
    assert_eq!(t.optimize, Duration::from_secs(240));
}

#[test]
fn rejects_unusable_base_url() {
    assert_eq!(HttpTools::new("not a url").err().map(|e| e.status), Some(400));
    assert_eq!(HttpTools::new("mailto:ops@example.com").err().map(|e| e.status), Some(400));
}
