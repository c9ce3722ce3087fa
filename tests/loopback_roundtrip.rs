//! End-to-end scheduling through the umbrella surface.

#![cfg(feature = "loopback")]

use approx::assert_relative_eq;
use patchline::prelude::*;
use std::sync::Arc;

const PERIOD: u32 = 256;
const RATE: u32 = 48_000;

fn looped_client() -> (Arc<LoopbackDriver>, Client, Port, Port) {
    let driver = Arc::new(LoopbackDriver::new(RATE));
    let client = Client::new("loop", driver.clone());
    let out = client.register_port("out", PortDirection::Output).unwrap();
    let input = client.register_port("in", PortDirection::Input).unwrap();
    client.connect(&out, &input).unwrap();
    (driver, client, out, input)
}

#[test]
fn test_note_at_time_zero_arrives_at_offset_zero() {
    let (driver, _client, out, input) = looped_client();
    out.send(&[0x90, 0x40, 0x7F], 0.0).unwrap();

    driver.run_period(PERIOD); // delivered into the output buffer
    driver.run_period(PERIOD); // looped back and captured

    let message = input.receive().expect("note should have arrived");
    assert_eq!(message.bytes, vec![0x90, 0x40, 0x7F]);
    assert_relative_eq!(message.time, 0.0);
}

#[test]
fn test_future_send_crosses_periods_re_based() {
    let (driver, _client, out, input) = looped_client();
    // 0.01 s = 480 frames: one whole period plus 224.
    out.send(&[0x80, 0x40, 0x00], 0.01).unwrap();

    driver.run_period(PERIOD);
    driver.run_period(PERIOD);
    assert!(input.receive().is_none(), "not due until the second period");

    driver.run_period(PERIOD);
    let message = input.receive().expect("due on the second period");
    assert_relative_eq!(message.time, 224.0 / RATE as f64, epsilon = 1e-9);
}

#[test]
fn test_identical_times_arrive_at_adjacent_offsets() {
    let (driver, _client, out, input) = looped_client();
    out.send(&[1], 0.0).unwrap();
    out.send(&[2], 0.0).unwrap();

    driver.run_period(PERIOD);
    driver.run_period(PERIOD);

    let first = input.receive().unwrap();
    let second = input.receive().unwrap();
    assert_relative_eq!(first.time, 0.0);
    assert_relative_eq!(second.time, 1.0 / RATE as f64, epsilon = 1e-12);
}

#[test]
fn test_time_base_round_trip() {
    let time_base = TimeBase::new(RATE);
    for &t in &[0.0, 0.001, 0.02, 1.5] {
        let back = time_base.seconds(time_base.frames(t));
        assert!((back - t).abs() <= 1.0 / RATE as f64);
    }
}

#[test]
fn test_teardown_with_pending_messages_is_clean() {
    let driver = Arc::new(LoopbackDriver::new(RATE));
    for cycle in 0..100 {
        let client = Client::new(format!("cycle-{cycle}"), driver.clone());
        let out = client.register_port("out", PortDirection::Output).unwrap();
        out.send(&[0x90, 0x40, 0x7F], 10.0).unwrap();
        if cycle % 2 == 0 {
            driver.run_period(PERIOD);
        }
    }
    driver.run_period(PERIOD);
}
