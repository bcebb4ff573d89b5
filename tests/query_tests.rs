use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use pgrest_client::{
    build_token, Config, Format, KeyMaterial, QueryClient, QueryError, QueryOptions, QueryResult,
    RequestTime,
};
use serde::Deserialize;
use std::io::Write;
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CLIENT_ID: &str = "pgrest";
const SECRET: &str = "98265691-8b9e-44dc-acf9-94610c392c00";

fn create_client(mock_server: &MockServer) -> QueryClient {
    let config = Config::new(mock_server.uri(), CLIENT_ID, SECRET);
    QueryClient::new(config).expect("failed to create client")
}

async fn single_request(mock_server: &MockServer) -> Request {
    let mut requests = mock_server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 1, "expected exactly one request");
    requests.remove(0)
}

fn header_value<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .expect("header is ASCII")
}

#[tokio::test]
async fn test_json_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "application/json"))
        .and(header_exists("X-Request-Time"))
        .and(header_exists("Authorization"))
        .and(body_string(r#"{"query":"SELECT * FROM weather","format":"json"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"entity_id": 2, "temperature": 21.5},
                {"entity_id": 2, "temperature": 19.0}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client.query_default("SELECT * FROM weather").await.unwrap();

    let value = result.as_json().expect("expected a JSON result");
    assert_eq!(value["data"].as_array().map(|rows| rows.len()), Some(2));

    let execution_time = result.execution_time().expect("executionTime is attached");
    assert!(
        execution_time.ends_with(" ms") || execution_time.ends_with(" s"),
        "unexpected execution time {}",
        execution_time
    );
}

#[tokio::test]
async fn test_signed_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    client.query_default("SELECT 1").await.unwrap();

    let request = single_request(&mock_server).await;
    assert_eq!(header_value(&request, "Accept-Encoding"), "gzip, br");

    // The token must verify against the exact timestamp header and body sent
    let time: i64 = header_value(&request, "X-Request-Time").parse().unwrap();
    let expected = build_token(
        &KeyMaterial::new(SECRET),
        CLIENT_ID,
        &request.body,
        RequestTime::from_unix(time),
    )
    .unwrap();

    assert_eq!(header_value(&request, "Authorization"), expected.bearer());

    let token = header_value(&request, "Authorization")
        .strip_prefix("Bearer ")
        .unwrap();
    let decoded = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
    assert!(decoded.starts_with("pgrest."));
}

#[tokio::test]
async fn test_base_url_with_trailing_slash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/reporting/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = Config::new(format!("{}/", mock_server.uri()), CLIENT_ID, SECRET)
        .with_connection("reporting");
    let client = QueryClient::new(config).unwrap();

    client.query_default("SELECT 1").await.unwrap();

    let request = single_request(&mock_server).await;
    assert_eq!(request.url.path(), "/api/reporting/query");
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_gzip_response_is_decompressed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(br#"{"data":[1]}"#)),
        )
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client.query_default("SELECT 1").await.unwrap();

    assert_eq!(result.get("data"), Some(&serde_json::json!([1])));
    assert!(result.execution_time().is_some());
}

#[tokio::test]
async fn test_deflate_response_is_decompressed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "deflate")
                .set_body_bytes(zlib(br#"{"data":[1]}"#)),
        )
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client
        .query("SELECT 1", QueryOptions::new().encoding("deflate"))
        .await
        .unwrap();

    assert_eq!(result.get("data"), Some(&serde_json::json!([1])));

    let request = single_request(&mock_server).await;
    assert_eq!(header_value(&request, "Accept-Encoding"), "deflate");
}

#[tokio::test]
async fn test_deflate_csv_response_is_decompressed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "text/csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "deflate")
                .set_body_bytes(zlib(b"a,b\n1,2")),
        )
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client
        .query(
            "SELECT a, b FROM t",
            QueryOptions::new().format(Format::Csv).encoding("deflate"),
        )
        .await
        .unwrap();

    assert_eq!(result.as_text(), Some("a,b\n1,2"));
}

#[tokio::test]
async fn test_gzip_error_body_is_decompressed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(br#"{"error":"invalid signature"}"#)),
        )
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let error = client.query_default("SELECT 1").await.unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(error.server_message(), Some("invalid signature"));
}

#[tokio::test]
async fn test_csv_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "text/csv"))
        .and(body_string(r#"{"query":"SELECT a, b FROM t","format":"csv"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2"))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let result = client
        .query("SELECT a, b FROM t", QueryOptions::new().format("csv"))
        .await
        .unwrap();

    assert_eq!(result, QueryResult::Text("a,b\n1,2".to_string()));
    assert_eq!(result.execution_time(), None);
}

#[tokio::test]
async fn test_binary_formats() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = vec![0xff, 0xff, 0xff, 0xff, 0x10, 0x00, 0x00, 0x00, 0x0c];

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "application/vnd.apache.arrow.stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PAR1....PAR1".to_vec()))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);

    let arrow = client
        .query("SELECT 1", QueryOptions::new().format(Format::Arrow))
        .await
        .unwrap();
    assert_eq!(arrow.as_bytes().map(|b| b.to_vec()), Some(payload));

    let parquet = client
        .query("SELECT 1", QueryOptions::new().format(Format::Parquet))
        .await
        .unwrap();
    assert_eq!(
        parquet.into_bytes().map(|b| b.to_vec()),
        Some(b"PAR1....PAR1".to_vec())
    );
}

#[tokio::test]
async fn test_json_data_array_query() {
    #[derive(Debug, Deserialize)]
    struct DataArray {
        fields: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
        #[serde(rename = "executionTime")]
        execution_time: String,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(r#"{"query":"SELECT id, name FROM users","format":"jsonDataArray"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fields": ["id", "name"],
            "rows": [[1, "ada"], [2, "grace"]]
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let data: DataArray = client
        .query_as(
            "SELECT id, name FROM users",
            QueryOptions::new().format(Format::JsonDataArray),
        )
        .await
        .unwrap();

    assert_eq!(data.fields, vec!["id", "name"]);
    assert_eq!(data.rows.len(), 2);
    assert_eq!(data.rows[1][1], "grace");
    assert!(!data.execution_time.is_empty());
}

#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid signature"
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let error = client.query_default("SELECT 1").await.unwrap_err();

    assert!(error.is_unauthorized());
    match error {
        QueryError::Server {
            status,
            status_text,
            message,
            details,
        } => {
            assert_eq!(status, 401);
            assert_eq!(status_text, "Unauthorized");
            assert_eq!(message, "invalid signature");
            assert!(details.is_none());
        }
        other => panic!("expected QueryError::Server, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_with_details() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/default/query"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "status": 400,
            "statusText": "Bad Request",
            "error": "query execution failed",
            "details": "ERROR: relation \"missing\" does not exist (SQLSTATE 42P01)"
        })))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let error = client
        .query("SELECT * FROM missing", QueryOptions::new().format("csv"))
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), Some(400));
    match error {
        QueryError::Server {
            message, details, ..
        } => {
            assert_eq!(message, "query execution failed");
            assert!(details.unwrap().contains("42P01"));
        }
        other => panic!("expected QueryError::Server, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_format_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server);
    let error = client
        .query("SELECT 1", QueryOptions::new().format("xlsx"))
        .await
        .unwrap_err();

    assert!(error.is_invalid_format());
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind and drop a listener so its port is very likely closed
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let client = QueryClient::new(Config::new(uri, CLIENT_ID, SECRET)).unwrap();
    let error = client.query_default("SELECT 1").await.unwrap_err();

    assert!(matches!(error, QueryError::Transport(_)), "got {:?}", error);
}

#[tokio::test]
#[ignore] // Run with: cargo test --test query_tests -- --ignored (needs PGREST_* env vars)
async fn test_live_server() {
    let client = QueryClient::from_env().expect("PGREST_* variables must be set");

    let result = client
        .query_default("SELECT 1 AS ok")
        .await
        .expect("failed to run query");

    println!("Live query passed: {:?}", result.as_json());
}
