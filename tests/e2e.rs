//! End-to-end scenarios driving a real spawned server over loopback TCP
//! sockets, one server per test.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use lotto_server::protocol::framing;
use lotto_server::{Config, WinnerPredicate};

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn test_config(dir: &TempDir, port: u16, client_count: usize) -> Config {
    Config {
        port,
        listen_backlog: 16,
        client_count,
        storage_path: dir.path().join("bets.log"),
        read_timeout_secs: 5,
        log_file: None,
    }
}

async fn connect(port: u16) -> TcpStream {
    let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
    // The accept loop needs a moment to bind after the server task spawns.
    for _ in 0..50 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("could not connect to server on port {port}");
}

/// A single agency submits one batch and receives its one winner.
#[tokio::test]
async fn single_agency_single_batch_single_winner() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 1);
    let has_won: WinnerPredicate = Arc::new(|b| b.number == 7477);
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown));

    let mut client = connect(port).await;
    let payload = b"1;2\nana;soler;30111222;1990-01-01;7477\nluis;gomez;30333444;1985-05-05;1234\n";
    framing::send(&mut client, payload).await.unwrap();
    let ack = framing::receive(&mut client).await.unwrap();
    assert!(String::from_utf8(ack).unwrap().starts_with("success"));

    framing::send(&mut client, b"END").await.unwrap();
    let winners = framing::receive(&mut client).await.unwrap();
    assert_eq!(String::from_utf8(winners).unwrap(), "30111222");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// Two agencies; neither sees winners before both have sent END.
#[tokio::test]
async fn two_agencies_rendezvous_ordering() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 2);
    let has_won: WinnerPredicate = Arc::new(|b| b.number == 5);
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown));

    let mut client_a = connect(port).await;
    let mut client_b = connect(port).await;

    framing::send(&mut client_a, b"1;1\na;b;1001;1990-01-01;5\n")
        .await
        .unwrap();
    let ack_a = framing::receive(&mut client_a).await.unwrap();
    assert!(String::from_utf8(ack_a).unwrap().starts_with("success"));

    framing::send(&mut client_b, b"2;1\nc;d;2002;1990-01-01;5\n")
        .await
        .unwrap();
    let ack_b = framing::receive(&mut client_b).await.unwrap();
    assert!(String::from_utf8(ack_b).unwrap().starts_with("success"));

    framing::send(&mut client_a, b"END").await.unwrap();
    framing::send(&mut client_b, b"END").await.unwrap();

    let winners_a = framing::receive(&mut client_a).await.unwrap();
    let winners_b = framing::receive(&mut client_b).await.unwrap();
    assert_eq!(String::from_utf8(winners_a).unwrap(), "1001");
    assert_eq!(String::from_utf8(winners_b).unwrap(), "2002");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// An invalid batch NACKs, the session continues, and only the valid bet
/// reaches the draw.
#[tokio::test]
async fn invalid_batch_session_continues() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 1);
    let has_won: WinnerPredicate = Arc::new(|_| true);
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown));

    let mut client = connect(port).await;
    framing::send(&mut client, b"1;2\nbad-line\nx;y;z;w;q;extra\n")
        .await
        .unwrap();
    let nack = framing::receive(&mut client).await.unwrap();
    assert!(String::from_utf8(nack).unwrap().starts_with("error"));

    framing::send(&mut client, b"1;1\na;b;c;1990-01-01;1\n")
        .await
        .unwrap();
    let ack = framing::receive(&mut client).await.unwrap();
    assert!(String::from_utf8(ack).unwrap().starts_with("success"));

    framing::send(&mut client, b"END").await.unwrap();
    let winners = framing::receive(&mut client).await.unwrap();
    assert_eq!(String::from_utf8(winners).unwrap(), "c");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// A client with no winning bets gets the literal `NO_WINNERS`.
#[tokio::test]
async fn empty_winners_literal() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 1);
    let has_won: WinnerPredicate = Arc::new(|_| false);
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown));

    let mut client = connect(port).await;
    framing::send(&mut client, b"1;1\na;b;c;1990-01-01;1\n")
        .await
        .unwrap();
    let _ = framing::receive(&mut client).await.unwrap();

    framing::send(&mut client, b"END").await.unwrap();
    let winners = framing::receive(&mut client).await.unwrap();
    assert_eq!(String::from_utf8(winners).unwrap(), "NO_WINNERS");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

/// One client disconnects before END; the other stays blocked at the
/// barrier until shutdown is signaled, after which it exits cleanly with no
/// winners frame.
#[tokio::test]
async fn disconnect_before_end_then_shutdown_breaks_barrier() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 2);
    let has_won: WinnerPredicate = Arc::new(|_| false);
    let shutdown = CancellationToken::new();

    let shutdown_clone = shutdown.clone();
    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown_clone));

    let mut client_a = connect(port).await;
    let client_b = connect(port).await;

    framing::send(&mut client_a, b"1;1\na;b;c;1990-01-01;1\n")
        .await
        .unwrap();
    let _ = framing::receive(&mut client_a).await.unwrap();
    framing::send(&mut client_a, b"END").await.unwrap();

    // Client B disconnects without ever sending END; A is now stuck at the
    // barrier since only one of the two expected arrivals ever happens.
    drop(client_b);

    // Give the worker loop a moment to actually park on the rendezvous.
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not exit after shutdown broke the barrier")
        .unwrap()
        .unwrap();

    // A's socket should now be closed server-side with no winners frame
    // having been sent (the read below must fail, not return a payload).
    let read_result = framing::receive(&mut client_a).await;
    assert!(read_result.is_err());
}

/// A single large batch of 10,000 bets is all appended and returned by
/// one ACK.
#[tokio::test]
async fn large_batch() {
    let dir = TempDir::new().unwrap();
    let port = free_port().await;
    let config = test_config(&dir, port, 1);
    let has_won: WinnerPredicate = Arc::new(|b| b.number == 9999);
    let shutdown = CancellationToken::new();

    let server = tokio::spawn(lotto_server::server::run(config, has_won, shutdown));

    let mut client = connect(port).await;
    let mut payload = String::from("1;10000\n");
    for i in 0..10_000u32 {
        payload.push_str(&format!("f{i};l{i};doc{i};1990-01-01;{i}\n"));
    }
    framing::send(&mut client, payload.as_bytes()).await.unwrap();
    let ack = framing::receive(&mut client).await.unwrap();
    assert!(String::from_utf8(ack).unwrap().starts_with("success"));

    framing::send(&mut client, b"END").await.unwrap();
    let winners = framing::receive(&mut client).await.unwrap();
    assert_eq!(String::from_utf8(winners).unwrap(), "doc9999");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
