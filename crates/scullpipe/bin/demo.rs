//! Demonstration of scullpipe features.
//!
//! Run with: `RUST_LOG=scullpipe=debug cargo run -p scullpipe --features demo --bin demo`

use anyhow::Result;
use scullpipe::{
    AccessMode, ChannelTable, Config, OpenOptions, PipeError, ReadinessEvent, SMALL_CONFIG,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== scullpipe Demo ===\n");

    demo_short_counts()?;
    demo_blocking_pipeline()?;
    demo_nonblocking_and_poll()?;
    demo_cancellation()?;
    demo_status_report()?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: Truncated writes and wrapped reads
fn demo_short_counts() -> Result<()> {
    println!("--- Demo 1: Short Counts ---");

    // 8-byte buffer, 7 usable
    let table = ChannelTable::new(Config::new(1, 8, false))?;
    let writer = table.open(0, AccessMode::Write)?;
    let reader = table.open(0, AccessMode::Read)?;

    println!("  write HELLO  -> {}", writer.write(b"HELLO")?);
    println!("  read 3       -> {:?}", String::from_utf8_lossy(&reader.read_bytes(3)?));
    println!("  write WORLD! -> {}", writer.write(b"WORLD!")?);
    println!("  read 7       -> {:?}", String::from_utf8_lossy(&reader.read_bytes(7)?));

    println!();
    Ok(())
}

/// Demo 2: Producer and consumer threads with blocking handoff
fn demo_blocking_pipeline() -> Result<()> {
    println!("--- Demo 2: Blocking Pipeline ---");

    let table = Arc::new(ChannelTable::new(SMALL_CONFIG)?);
    let reader = table.open(0, AccessMode::Read)?;
    let wakeups = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&wakeups);
    reader.subscribe(move |event: ReadinessEvent| {
        if event == ReadinessEvent::Readable {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let t = Arc::clone(&table);
    let producer = thread::spawn(move || -> Result<(), PipeError> {
        let writer = t.open(0, AccessMode::Write)?;
        for line in 0..20 {
            writer.write_all(format!("line {line:02}\n").as_bytes())?;
        }
        Ok(())
    });

    let mut received = Vec::new();
    while received.len() < 20 * 8 {
        received.extend(reader.read_bytes(32)?);
    }
    producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer panicked"))??;

    println!("  received {} bytes through a 64-byte buffer", received.len());
    println!("  readable notifications: {}", wakeups.load(Ordering::Relaxed));
    let metrics = table.channel(0)?.status().metrics.unwrap_or_default();
    println!(
        "  reader slept {} times, writer slept {} times",
        metrics.read_waits, metrics.write_waits
    );

    println!();
    Ok(())
}

/// Demo 3: Non-blocking handles and readiness polling
fn demo_nonblocking_and_poll() -> Result<()> {
    println!("--- Demo 3: Non-blocking + Poll ---");

    let table = ChannelTable::new(Config::new(1, 4, false))?;
    let rw = OpenOptions::new(AccessMode::ReadWrite)
        .nonblocking(true)
        .open(&table, 0)?;

    println!("  poll (empty): {}", rw.poll());
    match rw.read_bytes(1) {
        Err(PipeError::WouldBlock) => println!("  read on empty: would block"),
        other => println!("  read on empty: {:?}", other),
    }

    rw.write_all(b"abc")?;
    println!("  poll (full):  {}", rw.poll());
    match rw.write(b"d") {
        Err(err) => println!("  write on full: {err}"),
        Ok(n) => println!("  write on full: {n} bytes"),
    }

    println!();
    Ok(())
}

/// Demo 4: Cancelling and timing out blocked calls
fn demo_cancellation() -> Result<()> {
    println!("--- Demo 4: Cancellation ---");

    let table = ChannelTable::new(Config::new(1, 16, false))?;
    let reader = table.open(0, AccessMode::Read)?;
    let cancel = reader.cancel_token();

    thread::scope(|s| {
        let blocked = s.spawn(|| reader.read_bytes(8));
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
        println!("  blocked read -> {:?}", blocked.join());
    });

    let timed = OpenOptions::new(AccessMode::Read)
        .read_timeout(Some(Duration::from_millis(50)))
        .open(&table, 0)?;
    println!("  read with 50ms timeout -> {:?}", timed.read_bytes(8));

    println!();
    Ok(())
}

/// Demo 5: Device status report
fn demo_status_report() -> Result<()> {
    println!("--- Demo 5: Status Report ---");

    let table = ChannelTable::new(Config::default().with_metrics(true))?;
    let writer = table.open(1, AccessMode::Write)?;
    let _reader = table.open(1, AccessMode::Read)?;
    writer.write(b"queued but unread")?;

    print!("{table}");
    Ok(())
}
