//! Send a short riff through a loopback connection and print what arrives.

use patchline_client::{Client, LoopbackDriver, PortDirection};
use std::sync::Arc;

fn main() -> patchline_client::Result<()> {
    tracing_subscriber::fmt().init();

    let driver = Arc::new(LoopbackDriver::new(48_000));
    let client = Client::new("demo", driver.clone());

    let out = client.register_port("out", PortDirection::Output)?;
    let input = client.register_port("in", PortDirection::Input)?;
    client.connect(&out, &input)?;

    for (index, note) in [60u8, 64, 67].into_iter().enumerate() {
        out.send(&[0x90, note, 0x64], index as f64 * 0.005)?;
    }

    for period in 1..=4u32 {
        driver.run_period(256);
        while let Some(message) = input.receive() {
            println!(
                "period {period}: {:02x?} at {:.4}s into the period",
                message.bytes, message.time
            );
        }
    }
    Ok(())
}
