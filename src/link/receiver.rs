//! Receiver engine: reassembles the file from captured frames.
//!
//! 1. Capture until a payload frame decodes; that is the filename.
//! 2. Pick a free destination path and open it for append.
//! 3. Capture, decode, act, acknowledge, until the EOT frame.
//!
//! A DATA frame is written only when its tag equals the expected tag, which
//! then advances. Every decoded frame is acknowledged with its own tag, written
//! or not, so a sender still showing an old frame can move on.

use crate::error::{LinkError, Result};
use crate::link::device::{DisplayGuard, FrameSink, FrameSource, OpticalCodec};
use crate::link::frame::{Ack, Inbound, Tag};
use crate::link::resolver::{resolve_destination, sanitize};
use crate::link::{abort_requested, TransferStats};
use crate::optical::Image;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// How long the final ack stays up before the receiver exits.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Called with every captured frame, before decoding (debug preview).
pub type CaptureObserver = Box<dyn FnMut(&Image) + Send>;

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Directory the received file is written into
    pub output_dir: PathBuf,
    /// Delay between showing the final ack and returning
    pub grace_period: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Outcome of a completed reception.
#[derive(Debug, Clone)]
pub struct ReceiveReport {
    /// Where the file was written
    pub path: PathBuf,
    /// Filename as sent, before collision handling
    pub sent_name: String,
    pub stats: TransferStats,
}

pub struct Receiver<C, S, K> {
    config: ReceiverConfig,
    codec: C,
    camera: S,
    display: K,
    observer: Option<CaptureObserver>,
    abort: Option<Arc<AtomicBool>>,
}

impl<C, S, K> Receiver<C, S, K>
where
    C: OpticalCodec,
    S: FrameSource,
    K: FrameSink,
{
    pub fn new(config: ReceiverConfig, codec: C, camera: S, display: K) -> Self {
        Self {
            config,
            codec,
            camera,
            display,
            observer: None,
            abort: None,
        }
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&Image) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Check `flag` once per capture; when set the session ends with
    /// [`LinkError::Interrupted`] and whatever was written so far stays.
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    pub fn receive(&mut self) -> Result<ReceiveReport> {
        let abort = self.abort.clone();
        let mut display = DisplayGuard::new(&mut self.display);
        let mut stats = TransferStats::new();

        // Filename: first frame that decodes to a payload.
        let sent_name = loop {
            if abort_requested(abort.as_deref()) {
                return Err(LinkError::Interrupted);
            }
            let image = capture(&mut self.camera, &mut self.observer)?;
            match decode(&self.codec, &image, &mut stats) {
                Some(Inbound::Payload { tag, bytes }) => {
                    let name = String::from_utf8_lossy(&bytes).into_owned();
                    tracing::debug!("Filename frame tag={}: {:?}", tag, name);
                    stats.frames += 1;
                    break name;
                }
                Some(Inbound::End { tag }) => {
                    tracing::debug!("Ignoring EOT tag={} before any filename", tag);
                }
                None => {}
            }
        };

        let path = resolve_destination(&self.config.output_dir, &sanitize(&sent_name));
        let mut file = open_destination(&path)?;
        tracing::info!("Receiving {:?} into {}", sent_name, path.display());

        let mut expected = Tag::FIRST.next();
        loop {
            if abort_requested(abort.as_deref()) {
                tracing::warn!(
                    "Reception interrupted, {} bytes kept in {}",
                    stats.bytes,
                    path.display()
                );
                return Err(LinkError::Interrupted);
            }

            let image = capture(&mut self.camera, &mut self.observer)?;
            let Some(inbound) = decode(&self.codec, &image, &mut stats) else {
                continue;
            };

            match inbound {
                Inbound::End { tag } => {
                    if tag != expected {
                        tracing::warn!("EOT tag={} while expecting tag={}", tag, expected);
                    }
                    show_ack(&self.codec, &mut display, tag)?;
                    file.sync_all().map_err(|e| destination_error(&path, e))?;
                    stats.frames += 1;
                    tracing::info!(
                        "Reception complete: {} bytes in {}",
                        stats.bytes,
                        path.display()
                    );

                    if !self.config.grace_period.is_zero() {
                        std::thread::sleep(self.config.grace_period);
                    }
                    display.release()?;
                    return Ok(ReceiveReport {
                        path,
                        sent_name,
                        stats,
                    });
                }
                Inbound::Payload { tag, bytes } => {
                    if tag == expected {
                        file.write_all(&bytes)
                            .map_err(|e| destination_error(&path, e))?;
                        stats.frames += 1;
                        stats.bytes += bytes.len() as u64;
                        expected = expected.next();
                        tracing::debug!("Accepted tag={} ({} bytes)", tag, bytes.len());
                    } else {
                        stats.duplicates += 1;
                        tracing::trace!("Discarded tag={} (expecting {})", tag, expected);
                    }
                    show_ack(&self.codec, &mut display, tag)?;
                }
            }
        }
    }

    pub fn into_parts(self) -> (C, S, K) {
        (self.codec, self.camera, self.display)
    }
}

fn capture<S: FrameSource>(
    camera: &mut S,
    observer: &mut Option<CaptureObserver>,
) -> Result<Image> {
    let image = camera.capture()?;
    if let Some(observe) = observer.as_mut() {
        observe(&image);
    }
    Ok(image)
}

/// Decode one capture; nothing visible and unparseable codes both yield `None`.
fn decode<C: OpticalCodec>(codec: &C, image: &Image, stats: &mut TransferStats) -> Option<Inbound> {
    let raw = codec.decode(image)?;
    match Inbound::decode(&raw) {
        Ok(inbound) => Some(inbound),
        Err(e) => {
            stats.undecoded += 1;
            tracing::debug!("Skipping unparseable code: {}", e);
            None
        }
    }
}

fn show_ack<C: OpticalCodec, K: FrameSink>(
    codec: &C,
    display: &mut DisplayGuard<'_, K>,
    tag: Tag,
) -> Result<()> {
    let image = codec.encode(&Ack::encode(tag))?;
    display.show(&image)
}

fn open_destination(path: &Path) -> Result<File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| destination_error(path, e))
}

fn destination_error(path: &Path, source: std::io::Error) -> LinkError {
    LinkError::Destination {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::frame::Frame;
    use crate::optical::{PassthroughCodec, RecordingDisplay, ScriptedCamera};
    use bytes::Bytes;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn tag(v: u8) -> Tag {
        Tag::new(v).unwrap()
    }

    fn data(t: u8, bytes: &'static [u8]) -> Option<Frame> {
        Some(Frame::data(tag(t), Bytes::from_static(bytes)))
    }

    /// Script the camera with encoded frames; `None` is a blank capture.
    fn camera(frames: Vec<Option<Frame>>) -> ScriptedCamera {
        let script = frames
            .into_iter()
            .map(|f| match f {
                Some(frame) => PassthroughCodec.encode(&frame.encode()).unwrap(),
                None => Image::empty(),
            })
            .collect();
        ScriptedCamera::new(script)
    }

    fn receiver(
        dir: &Path,
        cam: ScriptedCamera,
    ) -> Receiver<PassthroughCodec, ScriptedCamera, RecordingDisplay> {
        let config = ReceiverConfig {
            output_dir: dir.to_path_buf(),
            grace_period: Duration::ZERO,
        };
        Receiver::new(config, PassthroughCodec, cam, RecordingDisplay::new())
    }

    fn acks(rx: Receiver<PassthroughCodec, ScriptedCamera, RecordingDisplay>) -> Vec<String> {
        let (_, _, display) = rx.into_parts();
        display
            .decoded(&PassthroughCodec)
            .into_iter()
            .map(|b| String::from_utf8(b).unwrap())
            .collect()
    }

    #[test]
    fn test_receive_basic() {
        let tmp = TempDir::new().unwrap();
        let cam = camera(vec![
            None,
            Some(Frame::filename(tag(0), "hello.txt")),
            Some(Frame::filename(tag(0), "hello.txt")),
            data(1, b"hello "),
            data(2, b"world"),
            Some(Frame::end(tag(3))),
        ]);
        let mut rx = receiver(tmp.path(), cam);

        let report = rx.receive().unwrap();
        assert_eq!(report.path, tmp.path().join("hello.txt"));
        assert_eq!(report.sent_name, "hello.txt");
        assert_eq!(report.stats.bytes, 11);
        assert_eq!(fs::read(&report.path).unwrap(), b"hello world");

        // The filename frame is acked from the data loop, tag 0 != expected 1.
        assert_eq!(acks(rx), vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_duplicate_frame_written_once() {
        let tmp = TempDir::new().unwrap();
        let cam = camera(vec![
            Some(Frame::filename(tag(0), "dup.bin")),
            data(1, b"abc"),
            data(1, b"abc"),
            None,
            data(1, b"abc"),
            data(2, b"def"),
            Some(Frame::end(tag(3))),
        ]);
        let mut rx = receiver(tmp.path(), cam);

        let report = rx.receive().unwrap();
        assert_eq!(fs::read(&report.path).unwrap(), b"abcdef");
        assert_eq!(report.stats.duplicates, 2);
        assert_eq!(acks(rx), vec!["1", "1", "1", "2", "3"]);
    }

    #[test]
    fn test_wraparound_accepts_reused_tags() {
        let tmp = TempDir::new().unwrap();
        let mut frames = vec![Some(Frame::filename(tag(0), "wrap.bin"))];
        let mut t = tag(0);
        let mut expected = Vec::new();
        for i in 0..12u8 {
            t = t.next();
            frames.push(Some(Frame::data(t, Bytes::from(vec![i]))));
            expected.push(i);
        }
        frames.push(Some(Frame::end(t.next())));

        let mut rx = receiver(tmp.path(), camera(frames));
        let report = rx.receive().unwrap();

        assert_eq!(fs::read(&report.path).unwrap(), expected);
        assert_eq!(report.stats.duplicates, 0);
        assert_eq!(report.stats.bytes, 12);
    }

    #[test]
    fn test_collision_creates_next_suffix() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("out.txt"), b"").unwrap();
        fs::write(tmp.path().join("out.txt (1)"), b"").unwrap();

        let cam = camera(vec![
            Some(Frame::filename(tag(0), "out.txt")),
            data(1, b"new"),
            Some(Frame::end(tag(2))),
        ]);
        let report = receiver(tmp.path(), cam).receive().unwrap();

        assert_eq!(report.path, tmp.path().join("out.txt (2)"));
        assert_eq!(fs::read(&report.path).unwrap(), b"new");
        assert_eq!(fs::metadata(tmp.path().join("out.txt")).unwrap().len(), 0);
        assert_eq!(fs::metadata(tmp.path().join("out.txt (1)")).unwrap().len(), 0);
    }

    #[test]
    fn test_end_frame_acked_and_display_released() {
        let tmp = TempDir::new().unwrap();
        let cam = camera(vec![
            Some(Frame::filename(tag(0), "e.bin")),
            Some(Frame::end(tag(1))),
        ]);
        let mut rx = receiver(tmp.path(), cam);

        let report = rx.receive().unwrap();
        assert_eq!(fs::metadata(&report.path).unwrap().len(), 0);

        let (_, cam, display) = rx.into_parts();
        assert_eq!(cam.remaining(), 0);
        assert_eq!(display.releases(), 1);
        assert_eq!(display.decoded(&PassthroughCodec), vec![b"1".to_vec()]);
    }

    #[test]
    fn test_channel_loss_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let cam = camera(vec![Some(Frame::filename(tag(0), "lost.bin")), data(1, b"x")]);
        let mut rx = receiver(tmp.path(), cam);

        let err = rx.receive().unwrap_err();
        assert!(err.is_channel_closed());

        let (_, _, display) = rx.into_parts();
        assert_eq!(display.releases(), 1);
        assert_eq!(fs::read(tmp.path().join("lost.bin")).unwrap(), b"x");
    }

    #[test]
    fn test_channel_loss_before_filename() {
        let tmp = TempDir::new().unwrap();
        let err = receiver(tmp.path(), camera(vec![None, None]))
            .receive()
            .unwrap_err();
        assert!(err.is_channel_closed());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unparseable_codes_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut cam = camera(vec![Some(Frame::filename(tag(0), "m.bin"))]);
        cam.push(PassthroughCodec.encode(b"x-not-a-frame").unwrap());
        cam.push(PassthroughCodec.encode(b"1$$$").unwrap());
        cam.push(PassthroughCodec.encode(&Frame::data(tag(1), Bytes::from_static(b"ok")).encode()).unwrap());
        cam.push(PassthroughCodec.encode(&Frame::end(tag(2)).encode()).unwrap());

        let mut rx = receiver(tmp.path(), cam);
        let report = rx.receive().unwrap();
        assert_eq!(fs::read(&report.path).unwrap(), b"ok");
        assert_eq!(report.stats.undecoded, 2);
    }

    #[test]
    fn test_filename_is_reduced_to_base_name() {
        let tmp = TempDir::new().unwrap();
        let cam = camera(vec![
            Some(Frame::filename(tag(0), "../../escape.txt")),
            Some(Frame::end(tag(1))),
        ]);
        let report = receiver(tmp.path(), cam).receive().unwrap();
        assert_eq!(report.path, tmp.path().join("escape.txt"));
        assert_eq!(report.sent_name, "../../escape.txt");
    }

    #[test]
    fn test_observer_sees_every_capture() {
        let tmp = TempDir::new().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let cam = camera(vec![
            None,
            Some(Frame::filename(tag(0), "o.bin")),
            None,
            Some(Frame::end(tag(1))),
        ]);
        receiver(tmp.path(), cam)
            .with_observer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .receive()
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_interrupt_is_not_success() {
        let tmp = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let cam = camera(vec![Some(Frame::filename(tag(0), "i.bin"))]);

        let result = receiver(tmp.path(), cam).with_abort_flag(flag).receive();
        assert!(matches!(result, Err(LinkError::Interrupted)));
    }
}
