//! Device listing and live MIDI monitoring
//!
//! `--list-devices` prints what the engine can activate; `--monitor <device>`
//! activates a device and prints every received message until Ctrl+C.

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::engine::{MidiEvent, MidiProcessor};
use crate::midi::{format_hex, MessageClass};
use crate::queue::SpscQueue;

/// Events buffered between two monitor ticks
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Print the activatable devices in a formatted way
pub fn list_devices_formatted(processor: &MidiProcessor) {
    println!("\n{}", "=== Available MIDI Devices ===".bold().cyan());
    println!("API: {}", processor.api_name().bright_white());

    let devices = processor.available_devices();
    println!("\n{}", "Input Devices:".bold());
    if devices.is_empty() {
        println!("  {}", "No input devices found".dimmed());
    } else {
        for (port, name) in devices.iter().enumerate() {
            println!("  {} {}", format!("[{}]", port).green(), name);
        }
    }

    println!();
}

/// Activate `device` and print incoming traffic until Ctrl+C
pub async fn run_monitor(mut processor: MidiProcessor, device: &str, poll_ms: u64) -> Result<()> {
    processor
        .activate_profile(device)
        .with_context(|| format!("Failed to activate '{}'", device))?;

    let events = Arc::new(SpscQueue::<MidiEvent>::new(EVENT_QUEUE_CAPACITY));
    let producer = Arc::clone(&events);
    let callback = processor.add_callback(move |event| {
        producer.push_overwrite(*event);
    });

    println!("{}", "=== MIDI Monitor ===".bold().cyan());
    println!("Device: {}", device.bright_white());
    println!("Press Ctrl+C to exit\n");
    println!("{}", "Format: [timestamp] HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(60).dimmed());

    if let Some(virtual_device) = processor.virtual_device() {
        // No hardware in test mode; play a short demo sequence
        let demo: [[u8; 3]; 3] = [[0x90, 60, 100], [0xB0, 7, 64], [0x80, 60, 0]];
        for (step, bytes) in demo.iter().enumerate() {
            virtual_device.inject(step as u64 * 250_000, bytes);
        }
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(Duration::from_millis(poll_ms));
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                for event in events.drain() {
                    print_event(&event);
                }
            }
        }
    }

    processor.remove_callback(callback);
    processor.deactivate_profile();
    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}

fn print_event(event: &MidiEvent) {
    let timestamp = format!("{:>10.3}ms", event.timestamp as f64 / 1000.0);
    let hex = format_hex(event.message.as_bytes());

    let hex_colored = match event.message.class() {
        MessageClass::NoteOn if event.message.value() > 0 => hex.bright_green(),
        MessageClass::NoteOn | MessageClass::NoteOff => hex.bright_red(),
        MessageClass::ControlChange => hex.bright_yellow(),
        MessageClass::PitchBend => hex.bright_cyan(),
        MessageClass::System => hex.bright_magenta(),
        _ => hex.normal(),
    };

    let learned = match event.captured {
        Some(id) => format!(" (learned by {})", id).bright_white().to_string(),
        None => String::new(),
    };

    println!(
        "[{}] {} => {}{}",
        timestamp.dimmed(),
        hex_colored,
        event.message.to_string().bright_blue(),
        learned
    );
}
