use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::*;

async fn connected_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let connect = TcpStream::connect(addr);
    let accept = listener.accept();
    let (client, (server, _)) = tokio::join!(connect, accept);
    (client.expect("connect"), server.expect("accept"))
}

#[tokio::test]
async fn request_round_trips_over_the_wire() {
    let (client, server) = connected_pair().await;
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, _server_write) = server.into_split();
    let mut reader = BufReader::new(server_read);

    let request = ControlRequest::new("abc", "ping", serde_json::json!({"x": 1}));
    let mut line = serde_json::to_vec(&request).expect("serialize");
    line.push(b'\n');
    client_write.write_all(&line).await.expect("write");

    let received = read_request(&mut reader).await.expect("read_request").expect("some request");
    assert_eq!(received.id, "abc");
    assert_eq!(received.method, "ping");
    assert_eq!(received.params["x"], 1);
}

#[tokio::test]
async fn response_round_trips_over_the_wire() {
    let (client, server) = connected_pair().await;
    let (client_read, _client_write) = client.into_split();
    let (_server_read, mut server_write) = server.into_split();
    let mut reader = BufReader::new(client_read);

    let response = ControlResponse::ok("xyz", serde_json::json!({"pong": true}));
    write_response(&mut server_write, &response).await.expect("write_response");

    let mut line = String::new();
    tokio::io::AsyncBufReadExt::read_line(&mut reader, &mut line).await.expect("read line");
    let parsed: ControlResponse = serde_json::from_str(line.trim()).expect("valid json");
    assert!(parsed.ok);
    assert_eq!(parsed.id, "xyz");
}

#[tokio::test]
async fn read_request_returns_none_on_clean_eof() {
    let (client, server) = connected_pair().await;
    let (server_read, _server_write) = server.into_split();
    let mut reader = BufReader::new(server_read);

    drop(client);

    let result = read_request(&mut reader).await.expect("no io error");
    assert!(result.is_none());
}

#[tokio::test]
async fn read_request_errors_on_a_blank_line_before_eof() {
    let (client, server) = connected_pair().await;
    let (_client_read, mut client_write) = client.into_split();
    let (server_read, _server_write) = server.into_split();
    let mut reader = BufReader::new(server_read);

    client_write.write_all(b"\n").await.expect("write blank line");

    let result = read_request(&mut reader).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[test]
fn error_response_omits_result_and_carries_a_code() {
    let response = ControlResponse::err("1", "bad_params", "`roots`: missing field");
    assert!(!response.ok);
    assert!(response.result.is_none());
    let error = response.error.expect("error body present");
    assert_eq!(error.code, "bad_params");
    assert_eq!(error.message, "`roots`: missing field");
}
