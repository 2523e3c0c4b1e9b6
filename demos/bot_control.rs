//! Basic example: Press a Switchbot bot, or turn it on/off
//!
//! Run with: cargo run --example bot_control -- <address> [press|on|off] [password]

use switchbot_rust_ble::{BtleplugTransport, DeviceConfig, Result, Switchbot};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("switchbot_rust_ble=debug".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("Usage: bot_control <address> [press|on|off] [password]");
        return Ok(());
    };
    let action = args.next().unwrap_or_else(|| "press".to_string());

    let mut config = DeviceConfig::default();
    if let Some(password) = args.next() {
        config = config.with_password(password);
    }

    let transport = BtleplugTransport::new().await?;
    let bot = Switchbot::with_config(transport, address, &config);

    println!("Sending '{}' to {}...", action, bot.address());

    let sent = match action.as_str() {
        "on" => bot.turn_on().await,
        "off" => bot.turn_off().await,
        _ => bot.press().await,
    };

    if sent {
        println!("Command acknowledged");
    } else {
        println!("Command failed after {} retries", bot.retry_count());
    }

    Ok(())
}
