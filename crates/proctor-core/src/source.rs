//! Signal sources: the boundary to whatever produces classified signals.
//!
//! Acquisition is the only async step (it stands in for the camera and
//! microphone permission prompt). The feed it returns is polled at the
//! controller's own cadence; sources are free to produce faster or slower.
//! A feed whose producer has gone away reports [`FeedClosed`] so callers never
//! mistake a dead detector for a quiet one.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::domain::{AcquisitionError, Signal};

/// The producer behind a feed is gone; no further signals will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signal feed closed")]
pub struct FeedClosed;

/// A pollable stream of signals.
pub trait SignalFeed: Send {
    /// Newest signal since the previous poll, `Ok(None)` if nothing new.
    fn next_signal(&mut self) -> Result<Option<Signal>, FeedClosed>;
}

/// Something that can be acquired to produce a [`SignalFeed`].
#[async_trait]
pub trait SignalSource: Send {
    type Feed: SignalFeed + 'static;

    async fn acquire(&mut self) -> Result<Self::Feed, AcquisitionError>;
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Replays a fixed sequence of signals, one per poll.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    signals: Vec<Signal>,
    denial: Option<AcquisitionError>,
}

impl ScriptedSource {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
            denial: None,
        }
    }

    /// Make every acquisition attempt fail with `error`.
    pub fn denied(mut self, error: AcquisitionError) -> Self {
        self.denial = Some(error);
        self
    }

    /// Let the next acquisition succeed.
    pub fn grant(&mut self) {
        self.denial = None;
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    type Feed = ScriptedFeed;

    async fn acquire(&mut self) -> Result<ScriptedFeed, AcquisitionError> {
        if let Some(err) = &self.denial {
            return Err(err.clone());
        }
        Ok(ScriptedFeed {
            remaining: self.signals.iter().copied().collect(),
        })
    }
}

/// Feed returned by [`ScriptedSource`]. An exhausted script is quiet, not
/// closed: it yields `Ok(None)` from then on.
#[derive(Debug)]
pub struct ScriptedFeed {
    remaining: VecDeque<Signal>,
}

impl ScriptedFeed {
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl SignalFeed for ScriptedFeed {
    fn next_signal(&mut self) -> Result<Option<Signal>, FeedClosed> {
        Ok(self.remaining.pop_front())
    }
}

// ---------------------------------------------------------------------------
// FixedSource
// ---------------------------------------------------------------------------

/// Produces the same signal on every poll.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    signal: Signal,
}

impl FixedSource {
    pub fn new(signal: Signal) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl SignalSource for FixedSource {
    type Feed = FixedFeed;

    async fn acquire(&mut self) -> Result<FixedFeed, AcquisitionError> {
        Ok(FixedFeed(self.signal))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedFeed(Signal);

impl SignalFeed for FixedFeed {
    fn next_signal(&mut self) -> Result<Option<Signal>, FeedClosed> {
        Ok(Some(self.0))
    }
}

// ---------------------------------------------------------------------------
// ChannelSource
// ---------------------------------------------------------------------------

/// Bridges an external detector that pushes signals on its own schedule.
///
/// The detector holds the `Sender` returned by [`ChannelSource::new`]. Each
/// poll drains the channel and keeps only the newest signal. Once every
/// sender is dropped and the buffer is drained the feed reports
/// [`FeedClosed`].
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Option<mpsc::Receiver<Signal>>,
}

impl ChannelSource {
    /// A zero `capacity` is raised to one.
    pub fn new(capacity: usize) -> (mpsc::Sender<Signal>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { receiver: Some(rx) })
    }
}

#[async_trait]
impl SignalSource for ChannelSource {
    type Feed = ChannelFeed;

    async fn acquire(&mut self) -> Result<ChannelFeed, AcquisitionError> {
        self.receiver
            .take()
            .map(|receiver| ChannelFeed { receiver })
            .ok_or_else(|| {
                AcquisitionError::DeviceUnavailable("detector channel already in use".into())
            })
    }
}

#[derive(Debug)]
pub struct ChannelFeed {
    receiver: mpsc::Receiver<Signal>,
}

impl SignalFeed for ChannelFeed {
    fn next_signal(&mut self) -> Result<Option<Signal>, FeedClosed> {
        let mut newest = None;
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => newest = Some(signal),
                Err(TryRecvError::Empty) => return Ok(newest),
                // Hand over what was buffered; the next poll reports the close.
                Err(TryRecvError::Disconnected) if newest.is_some() => return Ok(newest),
                Err(TryRecvError::Disconnected) => return Err(FeedClosed),
            }
        }
    }
}
