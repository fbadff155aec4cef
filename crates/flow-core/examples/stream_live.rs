//! Example: Streaming Live PM2.5 Readings
//!
//! This example connects to a Flow 2 and prints each live particulate
//! matter reading as the device pushes it, until interrupted with Ctrl-C.
//!
//! Run with: `cargo run --example stream_live -- <DEVICE_ADDRESS>`

use std::env;

use flow_core::Session;
use flow_types::PmLevel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Get device address from command line
    let args: Vec<String> = env::args().collect();
    let address = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} CC:BB:AA:EE:22:11", args[0]);
        std::process::exit(1);
    };

    println!("Connecting to {}...", address);

    let mut session = Session::new(address);
    session.connect().await?;
    println!("Connected!");

    let battery = session.read_battery().await?;
    println!("Battery: {}%", battery);
    println!();

    println!("Streaming live readings (Ctrl-C to stop)...");
    session
        .start_stream(|pm, at| {
            let level = PmLevel::from_concentration(pm);
            println!("  {}  PM2.5: {:6.1} µg/m³  [{}]", at, pm, level);
        })
        .await?;

    tokio::signal::ctrl_c().await?;

    println!();
    println!("Stopping stream...");
    session.stop_stream().await?;
    session.disconnect().await?;
    println!("Disconnected.");

    Ok(())
}
