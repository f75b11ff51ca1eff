//! In-memory optical medium for simulations.
//!
//! Two screens facing two cameras: whatever one end shows is what the other
//! end captures next. Fault injection is deterministic so failing runs can be
//! replayed exactly:
//!
//! | Fault        | Description                                          |
//! |--------------|------------------------------------------------------|
//! | Missed frame | Every `miss_every`-th capture sees nothing.          |
//! | Cut          | [`Loopback::cut`] closes the channel for both ends.  |
//!
//! A released screen keeps its last image, like a frozen monitor, so a peer
//! that is still polling can observe the final acknowledgment.

use crate::error::Result;
use crate::link::device::{channel_closed, FrameSink, FrameSource};
use crate::optical::Image;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Configuration for the loopback medium.
#[derive(Debug, Clone, Default)]
pub struct LoopbackConfig {
    /// Drop every n-th capture (`None` = lossless).
    pub miss_every: Option<u32>,
    /// Time one capture takes (`ZERO` = just yield).
    pub frame_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Transmitter = 0,
    Receiver = 1,
}

impl End {
    fn peer(self) -> Self {
        match self {
            End::Transmitter => End::Receiver,
            End::Receiver => End::Transmitter,
        }
    }
}

#[derive(Default)]
struct Medium {
    screens: [Mutex<Image>; 2],
    closed: AtomicBool,
}

impl Medium {
    fn screen(&self, end: End) -> &Mutex<Image> {
        &self.screens[end as usize]
    }
}

#[derive(Clone, Default)]
pub struct Loopback {
    medium: Arc<Medium>,
    config: LoopbackConfig,
}

impl Loopback {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            medium: Arc::new(Medium::default()),
            config,
        }
    }

    /// Lossless medium.
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn transmitter_end(&self) -> (LoopbackCamera, LoopbackScreen) {
        self.end(End::Transmitter)
    }

    pub fn receiver_end(&self) -> (LoopbackCamera, LoopbackScreen) {
        self.end(End::Receiver)
    }

    fn end(&self, end: End) -> (LoopbackCamera, LoopbackScreen) {
        (
            LoopbackCamera {
                medium: Arc::clone(&self.medium),
                end,
                config: self.config.clone(),
                captures: 0,
            },
            LoopbackScreen {
                medium: Arc::clone(&self.medium),
                end,
            },
        )
    }

    /// Close the channel: every later capture on either end fails.
    pub fn cut(&self) {
        self.medium.closed.store(true, Ordering::SeqCst);
    }
}

pub struct LoopbackScreen {
    medium: Arc<Medium>,
    end: End,
}

impl FrameSink for LoopbackScreen {
    fn show(&mut self, image: &Image) -> Result<()> {
        let mut screen = self
            .medium
            .screen(self.end)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *screen = image.clone();
        Ok(())
    }
}

pub struct LoopbackCamera {
    medium: Arc<Medium>,
    end: End,
    config: LoopbackConfig,
    captures: u64,
}

impl LoopbackCamera {
    pub fn captures(&self) -> u64 {
        self.captures
    }
}

impl FrameSource for LoopbackCamera {
    fn capture(&mut self) -> Result<Image> {
        if self.config.frame_interval.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.config.frame_interval);
        }

        if self.medium.closed.load(Ordering::SeqCst) {
            return Err(channel_closed("loopback medium cut"));
        }

        self.captures += 1;
        if let Some(n) = self.config.miss_every {
            if n > 0 && self.captures % u64::from(n) == 0 {
                return Ok(Image::empty());
            }
        }

        let screen = self
            .medium
            .screen(self.end.peer())
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(screen.clone())
    }
}
