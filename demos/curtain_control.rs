//! Example: Move a Switchbot curtain and read back its state
//!
//! Run with: cargo run --example curtain_control -- <address> [open|close|stop|0-100]

use std::time::Duration;
use switchbot_rust_ble::{BtleplugTransport, DeviceConfig, Result, SwitchbotCurtain};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("switchbot_rust_ble=info".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("Usage: curtain_control <address> [open|close|stop|0-100]");
        return Ok(());
    };

    let transport = BtleplugTransport::new().await?;
    let curtain = SwitchbotCurtain::with_config(transport, address, &DeviceConfig::default());

    println!("Reading curtain state (5 seconds)...");
    let frames = curtain.update().await?;
    println!(
        "  {} advertisements: position {}%, battery {}%, light {}",
        frames,
        curtain.position(),
        curtain.battery_percent(),
        curtain.light_level()
    );

    if let Some(action) = args.next() {
        let sent = match action.as_str() {
            "open" => curtain.open().await,
            "close" => curtain.close().await,
            "stop" => curtain.stop().await,
            other => match other.parse::<u8>() {
                Ok(position) => curtain.set_position(position).await,
                Err(_) => {
                    eprintln!("Unknown action: {}", other);
                    return Ok(());
                }
            },
        };

        println!(
            "{} -> {} (cached position {}%)",
            action,
            if sent { "acknowledged" } else { "failed" },
            curtain.position()
        );

        // Give the motor time to move before reading back.
        tokio::time::sleep(Duration::from_secs(3)).await;
        curtain.update_state(Duration::from_secs(3)).await?;
        println!("Reported position: {}%", curtain.position());
    }

    Ok(())
}
