use std::net::SocketAddr;

use cachette::server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Boot the real server on an ephemeral port and hand back its
/// address. The server task runs until the test process exits.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server::run(listener, std::future::pending::<()>()).await;
    });
    addr
}

async fn connect() -> TcpStream {
    let addr = start_server().await;
    TcpStream::connect(addr).await.unwrap()
}

/// Write one raw request and read back one raw response.
async fn roundtrip(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream.write_all(request).await.unwrap();
    let mut buf = [0u8; 512];
    let n = stream.read(&mut buf).await.unwrap();
    buf[..n].to_vec()
}

#[tokio::test]
async fn ping_answers_pong() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(res, b"+PONG\r\n");
}

#[tokio::test]
async fn ping_echoes_its_argument() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*2\r\n$4\r\nPING\r\n$5\r\nhello\r\n").await;
    assert_eq!(res, b"$5\r\nhello\r\n");
}

#[tokio::test]
async fn set_then_get_returns_the_value() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    assert_eq!(res, b"+OK\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b"$1\r\nv\r\n");
}

#[tokio::test]
async fn get_of_a_missing_key_is_nil() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n").await;
    assert_eq!(res, b"$-1\r\n");
}

#[tokio::test]
async fn set_with_ex_reports_its_ttl() {
    let mut stream = connect().await;
    let res = roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n10\r\n",
    )
    .await;
    assert_eq!(res, b"+OK\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":10\r\n");
}

#[tokio::test]
async fn set_with_px_reports_its_ttl_in_seconds() {
    let mut stream = connect().await;
    let res = roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$5\r\n10000\r\n",
    )
    .await;
    assert_eq!(res, b"+OK\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":10\r\n");
}

#[tokio::test]
async fn duplicate_expiry_options_are_a_syntax_error() {
    let mut stream = connect().await;
    let res = roundtrip(
        &mut stream,
        b"*7\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n10\r\n$2\r\nPX\r\n$5\r\n10000\r\n",
    )
    .await;
    assert_eq!(res, b"-ERR syntax error\r\n");
}

#[tokio::test]
async fn ttl_sentinels_for_missing_and_persistent_keys() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$5\r\nghost\r\n").await;
    assert_eq!(res, b":-2\r\n");

    roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":-1\r\n");
}

#[tokio::test]
async fn zero_second_expiry_is_dead_on_arrival() {
    let mut stream = connect().await;
    let res = roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$1\r\n0\r\n",
    )
    .await;
    assert_eq!(res, b"+OK\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b"$-1\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":-2\r\n");
}

#[tokio::test]
async fn del_counts_only_the_present_keys() {
    let mut stream = connect().await;
    roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nb\r\n$1\r\nv\r\n").await;
    let res = roundtrip(
        &mut stream,
        b"*4\r\n$3\r\nDEL\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
    )
    .await;
    assert_eq!(res, b":1\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nb\r\n").await;
    assert_eq!(res, b"$-1\r\n");
}

#[tokio::test]
async fn expire_follows_the_prior_expiry_rule() {
    let mut stream = connect().await;

    // Absent key.
    let res = roundtrip(
        &mut stream,
        b"*3\r\n$6\r\nEXPIRE\r\n$5\r\nghost\r\n$2\r\n10\r\n",
    )
    .await;
    assert_eq!(res, b":0\r\n");

    // Present key without a prior expiry.
    roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    let res = roundtrip(&mut stream, b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$2\r\n10\r\n").await;
    assert_eq!(res, b":0\r\n");

    // Present key with a live expiry.
    roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$3\r\n100\r\n",
    )
    .await;
    let res = roundtrip(&mut stream, b"*3\r\n$6\r\nEXPIRE\r\n$1\r\nk\r\n$2\r\n20\r\n").await;
    assert_eq!(res, b":1\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":20\r\n");
}

#[tokio::test]
async fn wrong_arity_is_reported_inline() {
    let mut stream = connect().await;
    let res = roundtrip(&mut stream, b"*1\r\n$3\r\nGET\r\n").await;
    assert_eq!(res, b"-ERR wrong number of arguments for 'get' command\r\n");
    let res = roundtrip(&mut stream, b"*3\r\n$4\r\nPING\r\n$1\r\na\r\n$1\r\nb\r\n").await;
    assert_eq!(res, b"-ERR wrong number of arguments for 'ping' command\r\n");
    // The connection survives argument errors.
    let res = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(res, b"+PONG\r\n");
}

#[tokio::test]
async fn unknown_commands_echo_name_and_args() {
    let mut stream = connect().await;
    let res = roundtrip(
        &mut stream,
        b"*3\r\n$8\r\nFLUSHALL\r\n$3\r\nnow\r\n$6\r\nplease\r\n",
    )
    .await;
    assert_eq!(
        res,
        b"-ERR unknown command 'FLUSHALL', with args beginning with: 'now' 'please'\r\n".to_vec()
    );
}

#[tokio::test]
async fn command_names_are_case_insensitive() {
    let mut stream = connect().await;
    roundtrip(&mut stream, b"*3\r\n$3\r\nsEt\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b"$1\r\nv\r\n");
}

#[tokio::test]
async fn malformed_requests_close_the_connection() {
    let mut stream = connect().await;
    stream.write_all(b"@what\r\n").await.unwrap();
    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "expected the server to close the connection");
}

#[tokio::test]
async fn non_array_requests_close_the_connection() {
    let mut stream = connect().await;
    stream.write_all(b"+PING\r\n").await.unwrap();
    let mut buf = [0u8; 64];
    let n = stream.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "expected the server to close the connection");
}

#[tokio::test]
async fn connections_are_independent() {
    let addr = start_server().await;
    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();

    let res = roundtrip(&mut first, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    assert_eq!(res, b"+OK\r\n");
    // A second connection to the same server sees the same keyspace.
    let res = roundtrip(&mut second, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b"$1\r\nv\r\n");

    // Closing one connection leaves the other usable.
    drop(first);
    let res = roundtrip(&mut second, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(res, b"+PONG\r\n");
}

#[tokio::test]
async fn overwriting_set_discards_the_old_expiry() {
    let mut stream = connect().await;
    roundtrip(
        &mut stream,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n10\r\n",
    )
    .await;
    roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nw\r\n").await;
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nTTL\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b":-1\r\n");
    let res = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(res, b"$1\r\nw\r\n");
}
