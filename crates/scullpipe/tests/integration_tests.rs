use scullpipe::{AccessMode, ChannelTable, Config, OpenOptions, PipeError, ReadinessEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn table(capacity: usize) -> ChannelTable {
    ChannelTable::new(Config::new(2, capacity, true)).unwrap()
}

#[test]
fn test_hello_world_scenario() {
    let table = table(8);
    let writer = table.open(0, AccessMode::Write).unwrap();
    let reader = table.open(0, AccessMode::Read).unwrap();
    let channel = table.channel(0).unwrap();

    assert_eq!(writer.write(b"HELLO").unwrap(), 5);
    assert_eq!(channel.used_space(), 5);

    assert_eq!(reader.read_bytes(3).unwrap(), b"HEL");
    assert_eq!(channel.used_space(), 2);

    // Only 5 of 7 usable slots are free; "!" is dropped
    assert_eq!(writer.write(b"WORLD!").unwrap(), 5);
    assert_eq!(channel.used_space(), 7);

    assert_eq!(reader.read_bytes(7).unwrap(), b"LOWORLD");
    assert_eq!(channel.used_space(), 0);
}

#[test]
fn test_nonblocking_read_on_empty_leaves_state_untouched() {
    let table = table(8);
    let reader = OpenOptions::new(AccessMode::Read)
        .nonblocking(true)
        .open(&table, 0)
        .unwrap();
    let before = table.channel(0).unwrap().status();

    let mut buf = [0xAAu8; 4];
    assert_eq!(reader.read(&mut buf), Err(PipeError::WouldBlock));
    assert_eq!(buf, [0xAA; 4]);

    let after = table.channel(0).unwrap().status();
    assert_eq!(after.used, before.used);
    assert_eq!(after.read_pos, before.read_pos);
    assert_eq!(after.write_pos, before.write_pos);
}

#[test]
fn test_blocked_reader_wakes_on_write() {
    let table = Arc::new(table(16));
    let reader = table.open(0, AccessMode::Read).unwrap();

    let t = Arc::clone(&table);
    let writer_thread = thread::spawn(move || {
        let writer = t.open(0, AccessMode::Write).unwrap();
        thread::sleep(Duration::from_millis(30));
        writer.write(b"late").unwrap();
        // keep the buffer alive until the reader is done
        thread::sleep(Duration::from_millis(30));
    });

    assert_eq!(reader.read_bytes(16).unwrap(), b"late");
    writer_thread.join().unwrap();

    let metrics = table.channel(0).unwrap().status().metrics.unwrap();
    assert!(metrics.read_waits >= 1);
}

#[test]
fn test_full_writer_accepts_exactly_one_byte_after_one_byte_drain() {
    let table = Arc::new(table(4));
    let writer = table.open(0, AccessMode::Write).unwrap();
    let reader = table.open(0, AccessMode::Read).unwrap();

    assert_eq!(writer.write(b"abc").unwrap(), 3);

    let writer_thread = thread::spawn(move || writer.write(b"de"));

    thread::sleep(Duration::from_millis(30));
    assert_eq!(reader.read_bytes(1).unwrap(), b"a");

    assert_eq!(writer_thread.join().unwrap(), Ok(1));
    assert_eq!(reader.read_bytes(8).unwrap(), b"bcd");
}

#[test]
fn test_cancel_unblocks_writer_after_handles_close() {
    // capacity 4: a 4-byte write_all stores 3 bytes, then blocks on the 4th
    let table = Arc::new(table(4));
    let reader = table.open(0, AccessMode::Read).unwrap();
    let writer = table.open(0, AccessMode::Write).unwrap();
    let cancel = writer.cancel_token();

    let writer_thread = thread::spawn(move || writer.write_all(b"wxyz"));

    thread::sleep(Duration::from_millis(30));
    assert_eq!(table.channel(0).unwrap().used_space(), 3);

    // Closing the reader does not wake the writer; cancelling does
    drop(reader);
    thread::sleep(Duration::from_millis(10));
    assert!(!writer_thread.is_finished());

    cancel.cancel();
    assert_eq!(writer_thread.join().unwrap(), Err(PipeError::Cancelled));

    // Writer handle dropped with the thread: the buffer is gone
    assert!(!table.channel(0).unwrap().is_allocated());
}

#[test]
fn test_cancel_transfers_nothing() {
    let table = table(8);
    let reader = table.open(1, AccessMode::Read).unwrap();
    let writer = table.open(1, AccessMode::Write).unwrap();
    let cancel = reader.cancel_token();

    thread::scope(|s| {
        let blocked = s.spawn(|| reader.read_bytes(4));
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(blocked.join().unwrap(), Err(PipeError::Cancelled));
    });

    // A cancelled token only fails calls that would block
    writer.write(b"ok").unwrap();
    assert_eq!(reader.read_bytes(4).unwrap(), b"ok");
    assert_eq!(table.channel(1).unwrap().status().metrics.unwrap().bytes_read, 2);
}

#[test]
fn test_fresh_token_resumes_blocking() {
    let table = table(8);
    let mut reader = table.open(0, AccessMode::Read).unwrap();
    reader.cancel_token().cancel();
    assert_eq!(reader.read_bytes(1), Err(PipeError::Cancelled));

    reader.set_cancel_token(Default::default());
    reader.set_read_timeout(Some(Duration::from_millis(20)));
    assert_eq!(reader.read_bytes(1), Err(PipeError::TimedOut));
}

#[test]
fn test_shared_token_cancels_several_waiters() {
    let table = table(8);
    let token = scullpipe::CancelToken::new();
    let r0 = OpenOptions::new(AccessMode::Read)
        .cancel_token(token.clone())
        .open(&table, 0)
        .unwrap();
    let r1 = OpenOptions::new(AccessMode::Read)
        .cancel_token(token.clone())
        .open(&table, 1)
        .unwrap();

    thread::scope(|s| {
        let a = s.spawn(|| r0.read_bytes(1));
        let b = s.spawn(|| r1.read_bytes(1));
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert_eq!(a.join().unwrap(), Err(PipeError::Cancelled));
        assert_eq!(b.join().unwrap(), Err(PipeError::Cancelled));
    });
}

#[test]
fn test_write_timeout_on_full_buffer() {
    let table = table(4);
    let _reader = table.open(0, AccessMode::Read).unwrap();
    let writer = OpenOptions::new(AccessMode::Write)
        .write_timeout(Some(Duration::from_millis(20)))
        .open(&table, 0)
        .unwrap();

    assert_eq!(writer.write(b"abcdef").unwrap(), 3);
    assert_eq!(writer.write(b"def"), Err(PipeError::TimedOut));
    assert_eq!(table.channel(0).unwrap().used_space(), 3);
}

#[test]
fn test_unrepresentable_timeout_means_no_deadline() {
    let table = table(4);
    let reader = OpenOptions::new(AccessMode::Read)
        .read_timeout(Some(Duration::MAX))
        .open(&table, 0)
        .unwrap();
    let writer = OpenOptions::new(AccessMode::Write)
        .write_timeout(Some(Duration::MAX))
        .open(&table, 0)
        .unwrap();

    // Transfers that never block ignore the timeout entirely
    assert_eq!(writer.write(b"abcd").unwrap(), 3);
    assert_eq!(reader.read_bytes(3).unwrap(), b"abc");

    // A blocked call still waits, and cancellation still reaches it
    reader.cancel_token().cancel();
    assert_eq!(reader.read_bytes(1), Err(PipeError::Cancelled));

    writer.write_all(b"xyz").unwrap();
    writer.cancel_token().cancel();
    assert_eq!(writer.write(b"!"), Err(PipeError::Cancelled));
    assert_eq!(table.channel(0).unwrap().used_space(), 3);
}

#[test]
fn test_single_writer_fifo_across_many_wraps() {
    const TOTAL: usize = 100_000;
    let table = Arc::new(table(61));
    let writer = table.open(0, AccessMode::Write).unwrap();
    let reader = table.open(0, AccessMode::Read).unwrap();

    let producer = thread::spawn(move || {
        let data: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
        for chunk in data.chunks(37) {
            writer.write_all(chunk).unwrap();
        }
    });

    let mut received = Vec::with_capacity(TOTAL);
    let mut buf = [0u8; 50];
    while received.len() < TOTAL {
        let n = reader.read(&mut buf).unwrap();
        assert!(n > 0);
        received.extend_from_slice(&buf[..n]);
    }
    producer.join().unwrap();

    for (i, byte) in received.iter().enumerate() {
        assert_eq!(*byte, (i % 251) as u8, "FIFO violation at byte {}", i);
    }
}

#[test]
fn test_concurrent_writers_deliver_every_byte() {
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 20_000;
    let table = Arc::new(table(128));
    let reader = table.open(0, AccessMode::Read).unwrap();

    let mut handles = vec![];
    for id in 0..WRITERS {
        let t = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let writer = t.open(0, AccessMode::Write).unwrap();
            writer.write_all(&vec![id as u8; PER_WRITER]).unwrap();
        }));
    }

    let mut counts = [0usize; WRITERS];
    let mut buf = [0u8; 256];
    let mut total = 0;
    while total < WRITERS * PER_WRITER {
        let n = reader.read(&mut buf).unwrap();
        for byte in &buf[..n] {
            counts[*byte as usize] += 1;
        }
        total += n;
    }

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(counts, [PER_WRITER; WRITERS]);
}

#[test]
fn test_subscriber_sees_every_write() {
    let table = table(64);
    let reader = table.open(0, AccessMode::Read).unwrap();
    let writer = table.open(0, AccessMode::Write).unwrap();
    let readable = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&readable);
    reader.subscribe(move |event: ReadinessEvent| {
        if event == ReadinessEvent::Readable {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    for _ in 0..5 {
        writer.write(b"x").unwrap();
    }
    assert_eq!(readable.load(Ordering::SeqCst), 5);
    assert!(reader.poll().readable);
}

#[test]
fn test_reopen_after_full_close_is_empty() {
    let table = table(16);
    {
        let rw = table.open(1, AccessMode::ReadWrite).unwrap();
        rw.write(b"leftover").unwrap();
    }
    let mut reader = table.open(1, AccessMode::Read).unwrap();
    reader.set_nonblocking(true);
    assert_eq!(table.channel(1).unwrap().used_space(), 0);
    assert_eq!(reader.read_bytes(16), Err(PipeError::WouldBlock));
}
