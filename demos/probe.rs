//! Bring up a fob reader over I2C and dump what it reports.
//!
//! Usage: cargo run --example probe [BUS]
//!
//! Default bus: 1 (/dev/i2c-1)

use fobreader_host::bus::I2cBus;
use fobreader_host::config::BusConfig;
use fobreader_host::fob::DeviceSession;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let bus_number: u8 = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(1);
    let config = BusConfig {
        i2c_bus: bus_number,
        ..BusConfig::default()
    };

    println!("Probing fob reader on /dev/i2c-{bus_number}");
    println!("======================================");

    println!("\n[1] Opening bus...");
    let bus = I2cBus::open(&config)?;
    let mut session = DeviceSession::new(bus);

    println!("\n[2] Discovering and initializing...");
    if let Err(e) = session.start() {
        println!("    Failed: {e}");
        return Ok(());
    }
    if let Some(address) = session.address() {
        println!("    Reader initialized at 0x{address:02X}");
    }
    println!("    Firmware: {}", session.firmware_version());
    println!(
        "    RFID front-end: 0x{:02X} - {}",
        session.peripheral_version(),
        session.peripheral_version_label()
    );

    println!("\n[3] Running self-test...");
    println!("    Result: {}", if session.self_test()? { "PASS" } else { "FAIL" });

    println!("\n[4] Polling for a tag...");
    if session.is_tag_present()? {
        match session.read_tag_data() {
            Ok(tag) => println!("    Tag ({} records):{tag}", tag.records),
            Err(e) => println!("    Warning: could not read tag: {e}"),
        }
    } else {
        println!("    No tag in the field");
    }

    println!("\n======================================");
    println!("Done!");

    Ok(())
}
