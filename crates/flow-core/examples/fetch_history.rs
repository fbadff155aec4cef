//! Example: Downloading Measurement History
//!
//! This example downloads the measurements a Flow 2 stored while away from
//! the phone. The device replays fixed-size records until it signals
//! end-of-data.
//!
//! Run with: `cargo run --example fetch_history -- <DEVICE_ADDRESS>`

use std::env;

use flow_core::Session;

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
    println!();

    println!("Downloading history (this may take a moment)...");
    let records = session.fetch_history().await?;

    println!();
    println!("Downloaded {} records:", records.len());
    println!();
    println!("{:<35} {:>14}", "Timestamp", "Payload bytes");

    for record in &records {
        println!("{:<35} {:>14}", record.timestamp.to_string(), record.payload.len());
    }

    session.disconnect().await?;
    println!();
    println!("Disconnected.");

    Ok(())
}
