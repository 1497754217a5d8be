//! Minimal embedding example for relink-core
//!
//! This example demonstrates using relink-core as a library in a custom
//! application. It stands up a short-lived loopback server, drives a link
//! against it through one disconnect/reconnect cycle, and prints every
//! notification the link emits.

use relink_core::{LinkConfig, LinkEvent, TcpLink};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_stream::StreamExt;

#[tokio::main]
async fn main() -> relink_core::Result<()> {
    tracing_subscriber::fmt::init();

    // A stand-in server: accepts, greets, drops the connection, then
    // accepts once more so the reconnect has somewhere to land.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let port = listener.local_addr().expect("listener address").port();

    tokio::spawn(async move {
        let (mut first, _) = listener.accept().await.expect("accept");
        first.write_all(b"welcome").await.expect("greet");
        drop(first);

        let (_second, _) = listener.accept().await.expect("accept reconnect");
        // Hold the reconnected socket open until the demo finishes.
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    });

    let link = TcpLink::new(LinkConfig::new("127.0.0.1", port))?;
    let mut events = link.subscribe();
    link.start();

    let mut reconnects = 0;
    while let Some(event) = events.next().await {
        match event {
            LinkEvent::Connected => {
                println!("[demo] link up (connection #{})", reconnects + 1);
                reconnects += 1;
                if reconnects == 2 {
                    break;
                }
                link.send(b"hello from the embedder");
            }
            LinkEvent::Disconnected => println!("[demo] link down, self-healing"),
            LinkEvent::Data(payload) => {
                println!("[demo] received: {}", String::from_utf8_lossy(&payload));
            }
        }
    }

    link.stop().await;
    println!("[demo] stopped cleanly");
    Ok(())
}
