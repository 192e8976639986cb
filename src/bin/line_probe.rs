//! Connectivity smoke test: connect to the broker, subscribe to `probe.>`,
//! publish a ping on `probe.hello`, and print whatever comes back. Useful
//! for checking a broker is reachable and the handshake completes without
//! standing up the full OMS service.

use std::time::Duration;

use lineoms::broker::{callback, Client, Message};
use lineoms::Config;

#[tokio::main]
async fn main() {
    Config::init_logging();
    let config = Config::from_env();

    println!("connecting to {}...", config.addr());
    let client = match Client::connect(&config).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("handshake failed: {e}");
            std::process::exit(1);
        }
    };
    println!("connected, is_connected={}", client.is_connected());

    client
        .subscribe(
            "probe.>",
            callback(|msg: Message| async move {
                println!(
                    "received on {}: {} bytes",
                    msg.subject,
                    msg.payload.len()
                );
            }),
        )
        .await
        .expect("subscribe failed");

    client
        .publish("probe.hello", None, b"ping")
        .await
        .expect("publish failed");

    tokio::time::sleep(Duration::from_millis(200)).await;
    client.close().await;
    println!("done");
}
