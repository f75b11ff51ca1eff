//! Full transmitter/receiver sessions over in-memory and spool media.

use proptest::prelude::*;
use qrlink::link::{ReceiveReport, Receiver, ReceiverConfig, TransferStats, Transmitter, TransmitterConfig};
use qrlink::optical::{spool, Loopback, LoopbackConfig, PassthroughCodec, QrCodec, SpoolRole};
use qrlink::{LinkError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Raise the abort flag if a session is still running after `limit`, so a
/// protocol bug fails the test instead of hanging it.
fn deadline(limit: Duration) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let watchdog = Arc::clone(&flag);
    thread::spawn(move || {
        thread::sleep(limit);
        watchdog.store(true, Ordering::SeqCst);
    });
    flag
}

fn write_source(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn run_loopback(
    medium: &Loopback,
    source: &Path,
    output_dir: &Path,
    chunk_size: usize,
) -> (Result<TransferStats>, Result<ReceiveReport>) {
    let abort = deadline(Duration::from_secs(30));

    let (tx_camera, tx_screen) = medium.transmitter_end();
    let tx_abort = Arc::clone(&abort);
    let source = source.to_path_buf();
    let sender = thread::spawn(move || {
        Transmitter::new(
            TransmitterConfig { chunk_size },
            PassthroughCodec,
            tx_camera,
            tx_screen,
        )
        .with_abort_flag(tx_abort)
        .transmit(&source)
    });

    let (rx_camera, rx_screen) = medium.receiver_end();
    let config = ReceiverConfig {
        output_dir: output_dir.to_path_buf(),
        grace_period: Duration::ZERO,
    };
    let received = Receiver::new(config, PassthroughCodec, rx_camera, rx_screen)
        .with_abort_flag(abort)
        .receive();

    (sender.join().unwrap(), received)
}

#[test]
fn test_roundtrip_lossless() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let data: Vec<u8> = (0..1000u32).map(|i| (i * 7 % 256) as u8).collect();
    let source = write_source(src.path(), "payload.bin", &data);

    let (sent, received) = run_loopback(&Loopback::perfect(), &source, out.path(), 45);
    let sent = sent.unwrap();
    let report = received.unwrap();

    assert_eq!(report.path, out.path().join("payload.bin"));
    assert_eq!(fs::read(&report.path).unwrap(), data);
    assert_eq!(sent.bytes, 1000);
    // filename + 23 data + end
    assert_eq!(sent.frames, 25);
}

#[test]
fn test_empty_file() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let source = write_source(src.path(), "empty.txt", b"");

    let (sent, received) = run_loopback(&Loopback::perfect(), &source, out.path(), 45);
    assert_eq!(sent.unwrap().frames, 2);

    let report = received.unwrap();
    assert!(report.path.exists());
    assert_eq!(fs::metadata(&report.path).unwrap().len(), 0);
}

#[test]
fn test_tag_wraparound_across_many_frames() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let data: Vec<u8> = (0..=255u8).collect();
    let source = write_source(src.path(), "wrap.bin", &data);

    // 26 data frames of 10 bytes: tags wrap twice.
    let (sent, received) = run_loopback(&Loopback::perfect(), &source, out.path(), 10);
    assert_eq!(sent.unwrap().frames, 28);
    assert_eq!(fs::read(received.unwrap().path).unwrap(), data);
}

#[test]
fn test_missed_frames_are_recovered() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let data = b"The quick brown fox jumps over the lazy dog. ".repeat(8);
    let source = write_source(src.path(), "fox.txt", &data);

    let medium = Loopback::new(LoopbackConfig {
        miss_every: Some(3),
        frame_interval: Duration::ZERO,
    });
    let (sent, received) = run_loopback(&medium, &source, out.path(), 16);

    let sent = sent.unwrap();
    assert!(sent.unmatched_polls > 0);
    assert_eq!(fs::read(received.unwrap().path).unwrap(), data);
}

#[test]
fn test_existing_files_are_not_overwritten() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::write(out.path().join("out.txt"), b"first").unwrap();
    fs::write(out.path().join("out.txt (1)"), b"second").unwrap();
    let source = write_source(src.path(), "out.txt", b"third");

    let (sent, received) = run_loopback(&Loopback::perfect(), &source, out.path(), 45);
    sent.unwrap();
    let report = received.unwrap();

    assert_eq!(report.path, out.path().join("out.txt (2)"));
    assert_eq!(fs::read(out.path().join("out.txt")).unwrap(), b"first");
    assert_eq!(fs::read(out.path().join("out.txt (1)")).unwrap(), b"second");
    assert_eq!(fs::read(&report.path).unwrap(), b"third");
}

#[test]
fn test_cut_channel_is_fatal_for_receiver() {
    let out = TempDir::new().unwrap();
    let medium = Loopback::perfect();
    medium.cut();

    let (camera, screen) = medium.receiver_end();
    let config = ReceiverConfig {
        output_dir: out.path().to_path_buf(),
        grace_period: Duration::ZERO,
    };
    let err = Receiver::new(config, PassthroughCodec, camera, screen)
        .receive()
        .unwrap_err();
    assert!(matches!(err, LinkError::ChannelClosed(_)));
}

#[test]
fn test_qr_over_spool() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let spool_dir = TempDir::new().unwrap();
    let data = b"hello over the air gap, in three small frames".to_vec();
    let source = write_source(src.path(), "note.txt", &data);

    let abort = deadline(Duration::from_secs(60));
    let poll = Duration::from_millis(5);
    let codec = QrCodec::new(qrcode::EcLevel::L, 4, 4);

    let (tx_camera, tx_screen) = spool::open(spool_dir.path(), SpoolRole::Transmitter, poll).unwrap();
    let tx_abort = Arc::clone(&abort);
    let tx_codec = codec.clone();
    let sender = thread::spawn(move || {
        Transmitter::new(
            TransmitterConfig { chunk_size: 20 },
            tx_codec,
            tx_camera,
            tx_screen,
        )
        .with_abort_flag(tx_abort)
        .transmit(&source)
    });

    let (rx_camera, rx_screen) = spool::open(spool_dir.path(), SpoolRole::Receiver, poll).unwrap();
    // The receiver removes its ack file on exit; keep it up long enough for
    // the transmitter to see the final ack.
    let config = ReceiverConfig {
        output_dir: out.path().to_path_buf(),
        grace_period: Duration::from_secs(2),
    };
    let report = Receiver::new(config, codec, rx_camera, rx_screen)
        .with_abort_flag(abort)
        .receive()
        .unwrap();

    let sent = sender.join().unwrap().unwrap();
    assert_eq!(sent.frames, 5);
    assert_eq!(fs::read(&report.path).unwrap(), data);
    assert_eq!(report.path, out.path().join("note.txt"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_roundtrip_is_byte_identical(
        data in proptest::collection::vec(any::<u8>(), 0..400),
        chunk_size in 1usize..64,
    ) {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source = write_source(src.path(), "p.bin", &data);

        let (sent, received) = run_loopback(&Loopback::perfect(), &source, out.path(), chunk_size);
        prop_assert_eq!(sent.unwrap().bytes, data.len() as u64);
        prop_assert_eq!(fs::read(received.unwrap().path).unwrap(), data);
    }
}
