//! # Audio Capture Module
//!
//! The capture side of the tuner. Detection only ever sees the
//! [`FrameSource`] trait; this module provides the channel-backed source the
//! live input feeds, and the cpal input stream that feeds it.
//!
//! ## Features
//! - Whole-frame delivery only: callbacks are accumulated into fixed-size
//!   mono frames before they are sent
//! - Newest-frame-wins: stale frames queued behind a slow tick are dropped
//! - Immediate stop through a [`StopHandle`]
//! - Stream and device failures surface as `CaptureUnavailable`; the
//!   audio callback reports them through an [`ErrorReporter`] and never blocks

use cpal::{SupportedStreamConfig, SupportedStreamConfigRange};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::TunerConfig;
use crate::error::{Result, TunerError};

/// Frames the capture callback may queue ahead of the detection loop.
const FRAME_QUEUE: usize = 4;

/// One block of mono samples, owned by the tick that processes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Samples in roughly [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }
}

/// Something that delivers audio frames on demand.
pub trait FrameSource {
    /// Waits for the next whole frame.
    ///
    /// * `Ok(Some(frame))` - a frame to process
    /// * `Ok(None)` - capture was stopped; no more frames
    /// * `Err(CaptureUnavailable)` - capture failed and cannot continue
    fn next_frame(&mut self) -> Result<Option<AudioFrame>>;
}

/// Requests an immediate stop of a [`ChannelFrameSource`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    shutdown_tx: Sender<()>,
}

impl StopHandle {
    pub fn stop(&self) {
        // A full channel already holds a stop request.
        let _ = self.shutdown_tx.try_send(());
    }
}

/// Hands a fatal capture error to a [`ChannelFrameSource`] without blocking.
///
/// Safe to call from a real-time audio callback. Only the first error is
/// kept; it already ends the detection loop.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    error_tx: Sender<TunerError>,
}

impl ErrorReporter {
    pub fn report(&self, error: TunerError) {
        if let Err(TrySendError::Full(error)) = self.error_tx.try_send(error) {
            log::trace!("[AUDIO] Capture error already pending, dropping: {}", error);
        }
    }
}

/// A [`FrameSource`] fed through a crossbeam channel.
///
/// Each message is either a frame or a capture failure. Failures can also
/// arrive out of band through an [`ErrorReporter`]. A pending stop request
/// wins over everything queued, a pending failure wins over queued frames,
/// and when several frames are queued only the newest is handed out.
#[derive(Debug)]
pub struct ChannelFrameSource {
    frames: Receiver<Result<AudioFrame>>,
    error_tx: Sender<TunerError>,
    error_rx: Receiver<TunerError>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl ChannelFrameSource {
    pub fn new(frames: Receiver<Result<AudioFrame>>) -> Self {
        let (error_tx, error_rx) = crossbeam_channel::bounded(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        Self {
            frames,
            error_tx,
            error_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    pub fn error_reporter(&self) -> ErrorReporter {
        ErrorReporter {
            error_tx: self.error_tx.clone(),
        }
    }

    fn stop_requested(&self) -> bool {
        self.shutdown_rx.try_recv().is_ok()
    }

    fn pending_error(&self) -> Option<TunerError> {
        self.error_rx.try_recv().ok()
    }
}

fn stream_closed() -> TunerError {
    TunerError::CaptureUnavailable("capture stream closed".into())
}

impl FrameSource for ChannelFrameSource {
    fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        if self.stop_requested() {
            return Ok(None);
        }
        if let Some(error) = self.pending_error() {
            return Err(error);
        }

        let message = crossbeam_channel::select! {
            recv(self.frames) -> msg => msg,
            // The source holds an error sender, so this arm never sees a disconnect.
            recv(self.error_rx) -> error => return Err(error.unwrap_or_else(|_| stream_closed())),
            recv(self.shutdown_rx) -> _ => return Ok(None),
        };
        let mut frame = message.map_err(|_| stream_closed())??;

        let mut skipped = 0;
        while let Ok(next) = self.frames.try_recv() {
            frame = next?;
            skipped += 1;
        }
        if skipped > 0 {
            log::trace!("[AUDIO] Skipped {} stale frames", skipped);
        }

        if self.stop_requested() {
            return Ok(None);
        }
        if let Some(error) = self.pending_error() {
            return Err(error);
        }
        Ok(Some(frame))
    }
}

/// Collects interleaved callback buffers into whole mono frames.
///
/// Channels are averaged into one. A frame is emitted only once
/// `frame_size` mono samples are available.
#[derive(Debug)]
pub struct FrameAccumulator {
    frame_size: usize,
    channels: usize,
    pending: Vec<f32>,
}

impl FrameAccumulator {
    pub fn new(frame_size: usize, channels: u16) -> Self {
        Self {
            frame_size: frame_size.max(1),
            channels: usize::from(channels.max(1)),
            pending: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Adds interleaved samples and hands every completed frame to `emit`.
    pub fn push(&mut self, interleaved: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        if self.channels == 1 {
            self.pending.extend_from_slice(interleaved);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.pending.extend(
                interleaved
                    .chunks_exact(self.channels)
                    .map(|sample| sample.iter().sum::<f32>() * scale),
            );
        }

        while self.pending.len() >= self.frame_size {
            emit(self.pending.drain(..self.frame_size).collect());
        }
    }

    /// Mono samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// A running cpal input stream and the frames it produces.
pub struct CaptureSession {
    stream: cpal::Stream,
    source: ChannelFrameSource,
    sample_rate: u32,
}

impl CaptureSession {
    pub fn source(&mut self) -> &mut ChannelFrameSource {
        &mut self.source
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.source.stop_handle()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pauses the stream and releases the device.
    pub fn close(self) {
        if let Err(e) = self.stream.pause() {
            log::warn!("[AUDIO] Error pausing stream: {}", e);
        }
        drop(self.stream);
        log::info!("[AUDIO] Capture closed");
    }
}

fn unavailable<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> TunerError {
    move |e| TunerError::CaptureUnavailable(format!("{context}: {e}"))
}

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an f32 configuration, preferring mono and the configured rate
/// 3. Streams whole frames of `config.frame_size` samples into a channel
///
/// # Arguments
/// * `config` - Target sample rate and frame size
///
/// # Returns
/// * `Ok(session)` - The running stream and the [`ChannelFrameSource`] it feeds
/// * `Err(CaptureUnavailable)` - No device, no f32 format, or the stream
///   could not be opened or started
///
/// Stream errors after start-up go through an [`ErrorReporter`] and end
/// the detection loop. Neither audio callback ever blocks.
pub fn start_audio_capture(config: &TunerConfig) -> Result<CaptureSession> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| TunerError::CaptureUnavailable("no input device available".into()))?;

    log::info!(
        "[AUDIO] Using audio input device: {}",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );

    let configs = device
        .supported_input_configs()
        .map_err(unavailable("cannot query input configs"))?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, config.sample_rate).ok_or_else(|| {
        TunerError::CaptureUnavailable("no suitable f32 input format found".into())
    })?;

    let supported_config = with_clamped_rate(supported_config, config.sample_rate);
    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels();
    let stream_config: cpal::StreamConfig = supported_config.into();

    log::info!(
        "[AUDIO] Selected {} Hz, {} channel(s), {}-sample frames",
        sample_rate,
        channels,
        config.frame_size
    );

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<AudioFrame>>(FRAME_QUEUE);
    let source = ChannelFrameSource::new(frame_rx);
    let reporter = source.error_reporter();
    let mut accumulator = FrameAccumulator::new(config.frame_size, channels);

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                accumulator.push(data, |samples| {
                    let frame = AudioFrame::new(samples, sample_rate);
                    if let Err(TrySendError::Full(_)) = frame_tx.try_send(Ok(frame)) {
                        log::trace!("[AUDIO] Frame queue full, dropping frame");
                    }
                });
            },
            move |err| {
                log::error!("[AUDIO] An error occurred on the audio stream: {}", err);
                reporter.report(TunerError::CaptureUnavailable(err.to_string()));
            },
            None,
        )
        .map_err(unavailable("cannot open input stream"))?;

    stream.play().map_err(unavailable("cannot start input stream"))?;
    log::info!("[AUDIO] Audio capture started");

    Ok(CaptureSession {
        stream,
        source,
        sample_rate,
    })
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only f32 formats qualify. Fewer channels win first, then the range
/// closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let (min, max) = (c.min_sample_rate().0, c.max_sample_rate().0);
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels(), distance)
        })
}

/// Fixes the stream rate: `target_rate` clamped into the range's bounds.
fn with_clamped_rate(
    range: SupportedStreamConfigRange,
    target_rate: u32,
) -> SupportedStreamConfig {
    let rate = target_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    range.with_sample_rate(cpal::SampleRate(rate))
}
