//! Solver iteration telemetry
//!
//! Every NLP iterate is turned into a [`MultiCarousel`] snapshot (one kite
//! frame per interval plus status messages) and handed to a [`Publisher`]
//! as a single two-part message `(topic, payload)`. Delivery is
//! fire-and-forget: failures are logged and never retried.

use std::sync::mpsc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use rawe_core::MapError;

use crate::config::{CarouselConfig, TelemetryConfig};
use crate::nlp::IterationCallback;
use crate::ocp::{OcpError, OcpLayout, OcpSolution};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("publisher is disconnected")]
    Disconnected,
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("failed to decode iterate: {0}")]
    Snapshot(#[from] OcpError),
}

/// Sink for `(topic, payload)` messages
pub trait Publisher {
    fn send_multipart(&mut self, topic: &str, payload: &[u8]) -> Result<(), TelemetryError>;
}

/// Publisher feeding a channel, typically drained by a visualizer thread
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<(String, Vec<u8>)>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::Receiver<(String, Vec<u8>)>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn send_multipart(&mut self, topic: &str, payload: &[u8]) -> Result<(), TelemetryError> {
        self.tx
            .send((topic.to_string(), payload.to_vec()))
            .map_err(|_| TelemetryError::Disconnected)
    }
}

/// Publisher that keeps every message, for inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    pub messages: Vec<(String, Vec<u8>)>,
}

impl Publisher for MemoryPublisher {
    fn send_multipart(&mut self, topic: &str, payload: &[u8]) -> Result<(), TelemetryError> {
        self.messages.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Pose of one kite for the visualizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KiteFrame {
    pub position: [f64; 3],
    /// Body-to-world rotation, row-major
    pub dcm: [[f64; 3]; 3],
    /// Carousel angle [rad]
    pub delta: f64,
    /// Tether length [m]
    pub line_length: f64,
    pub r_arm: f64,
    pub zt: f64,
    pub w0: Option<f64>,
    pub kite_transparency: f64,
    pub line_transparency: f64,
}

/// `Ok(None)` when the model has no such quantity
fn optional(value: Result<f64, MapError>) -> Result<Option<f64>, MapError> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(MapError::UnknownName { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

impl KiteFrame {
    /// Build a frame from named lookups at one node
    ///
    /// The position `x y z` is required. The rotation `e11 .. e33` defaults
    /// to identity, the tether length `r` and the carousel angle `delta` to
    /// zero when the model lacks them.
    pub fn from_lookup<F>(
        lookup: F,
        carousel: &CarouselConfig,
        telemetry: &TelemetryConfig,
        w0: Option<f64>,
    ) -> Result<Self, MapError>
    where
        F: Fn(&str) -> Result<f64, MapError>,
    {
        let position = [lookup("x")?, lookup("y")?, lookup("z")?];

        let mut dcm = IDENTITY;
        for (i, row) in dcm.iter_mut().enumerate() {
            for (j, entry) in row.iter_mut().enumerate() {
                if let Some(v) = optional(lookup(&format!("e{}{}", i + 1, j + 1)))? {
                    *entry = v;
                }
            }
        }
        let delta = optional(lookup("delta"))?.unwrap_or(0.0);
        let line_length = optional(lookup("r"))?.unwrap_or(0.0);

        Ok(Self {
            position,
            dcm,
            delta,
            line_length,
            r_arm: carousel.r_arm,
            zt: carousel.zt,
            w0,
            kite_transparency: telemetry.kite_transparency,
            line_transparency: telemetry.line_transparency,
        })
    }
}

/// One visualizer update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiCarousel {
    pub frames: Vec<KiteFrame>,
    pub messages: Vec<String>,
}

impl MultiCarousel {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TelemetryError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TelemetryError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Iteration callback publishing a snapshot of every iterate
pub struct TelemetryCallback<P> {
    layout: OcpLayout,
    publisher: P,
    carousel: CarouselConfig,
    telemetry: TelemetryConfig,
    /// Parameters reported as `name: value` messages
    parameters: Vec<String>,
    /// Frames of earlier solves, shown alongside every snapshot
    retained: Vec<KiteFrame>,
}

impl<P: Publisher> TelemetryCallback<P> {
    pub fn new(
        layout: OcpLayout,
        publisher: P,
        carousel: CarouselConfig,
        telemetry: TelemetryConfig,
    ) -> Self {
        Self {
            layout,
            publisher,
            carousel,
            telemetry,
            parameters: Vec::new(),
            retained: Vec::new(),
        }
    }

    /// Report these parameters in every snapshot
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn retained_frames(&self) -> &[KiteFrame] {
        &self.retained
    }

    fn frames(&self, solution: &OcpSolution) -> Result<Vec<KiteFrame>, MapError> {
        let w0 = optional(solution.lookup("w0", None))?;
        (0..solution.nk())
            .map(|k| {
                KiteFrame::from_lookup(
                    |name| solution.lookup(name, Some(k)),
                    &self.carousel,
                    &self.telemetry,
                    w0,
                )
            })
            .collect()
    }

    /// Keep the frames of a finished solve in later snapshots
    pub fn retain(&mut self, solution: &OcpSolution) -> Result<(), TelemetryError> {
        let frames = self.frames(solution)?;
        self.retained.extend(frames);
        Ok(())
    }

    pub fn snapshot(&self, iteration: usize, x: &[f64]) -> Result<MultiCarousel, TelemetryError> {
        let solution = self.layout.devectorize(x)?;
        let mut frames = self.frames(&solution)?;
        frames.extend(self.retained.iter().cloned());

        let mut messages = Vec::with_capacity(self.parameters.len() + 1);
        for name in &self.parameters {
            let value = solution.lookup(name, None)?;
            messages.push(format!("{name}: {value}"));
        }
        messages.push(format!("iter: {iteration}"));

        Ok(MultiCarousel { frames, messages })
    }

    fn publish(&mut self, iteration: usize, x: &[f64]) -> Result<(), TelemetryError> {
        let payload = self.snapshot(iteration, x)?.to_bytes()?;
        self.publisher
            .send_multipart(&self.telemetry.topic, &payload)?;
        debug!(iteration, bytes = payload.len(), "published iterate");
        Ok(())
    }
}

impl<P: Publisher> IterationCallback for TelemetryCallback<P> {
    fn on_iteration(&mut self, iteration: usize, x: &[f64]) {
        if let Err(e) = self.publish(iteration, x) {
            warn!(iteration, error = %e, "failed to publish iterate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_defaults_for_missing_quantities() {
        let lookup = |name: &str| match name {
            "x" => Ok(1.0),
            "y" => Ok(2.0),
            "z" => Ok(3.0),
            "e22" => Ok(-1.0),
            _ => Err(MapError::UnknownName {
                name: name.to_string(),
                namespace: rawe_core::Namespace::Design,
            }),
        };
        let frame = KiteFrame::from_lookup(
            lookup,
            &CarouselConfig::default(),
            &TelemetryConfig::default(),
            Some(10.0),
        )
        .unwrap();

        assert_eq!(frame.position, [1.0, 2.0, 3.0]);
        assert_eq!(frame.dcm[0], [1.0, 0.0, 0.0]);
        assert_eq!(frame.dcm[1], [0.0, -1.0, 0.0]);
        assert_eq!(frame.delta, 0.0);
        assert_eq!(frame.line_length, 0.0);
        assert_eq!(frame.w0, Some(10.0));
    }

    #[test]
    fn test_position_is_required() {
        let lookup = |name: &str| {
            Err(MapError::UnknownName {
                name: name.to_string(),
                namespace: rawe_core::Namespace::Design,
            })
        };
        assert!(KiteFrame::from_lookup(
            lookup,
            &CarouselConfig::default(),
            &TelemetryConfig::default(),
            None
        )
        .is_err());
    }

    #[test]
    fn test_other_lookup_errors_propagate() {
        let lookup = |name: &str| match name {
            "delta" => Err(MapError::TimestepRequired {
                name: name.to_string(),
            }),
            _ => Ok(0.0),
        };
        assert!(matches!(
            KiteFrame::from_lookup(
                lookup,
                &CarouselConfig::default(),
                &TelemetryConfig::default(),
                None
            ),
            Err(MapError::TimestepRequired { .. })
        ));
    }

    #[test]
    fn test_channel_publisher() {
        let (mut publisher, rx) = ChannelPublisher::new();
        publisher.send_multipart("topic", b"payload").unwrap();
        assert_eq!(rx.recv().unwrap(), ("topic".to_string(), b"payload".to_vec()));

        drop(rx);
        assert!(matches!(
            publisher.send_multipart("topic", b"x"),
            Err(TelemetryError::Disconnected)
        ));
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snapshot = MultiCarousel {
            frames: Vec::new(),
            messages: vec!["iter: 3".to_string()],
        };
        let bytes = snapshot.to_bytes().unwrap();
        assert_eq!(MultiCarousel::from_bytes(&bytes).unwrap(), snapshot);
    }
}
