//! The ingestion graph: stages connected by named output ports.
//!
//! A port belongs to exactly one source stage and delivers every item to all
//! of its consumers. Every stage except the driver has exactly one inbound
//! port, so closing a port when its source finishes is enough to shut the
//! whole graph down from the driver outwards.

use std::collections::BTreeSet;

use crate::core::StageKind;
use crate::error::{PipelineError, PipelineResult};

/// What travels over a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload {
    Frames,
    FaceSets,
}

pub fn input_payload(stage: StageKind) -> Option<Payload> {
    match stage {
        StageKind::Driver => None,
        StageKind::FaceDetection | StageKind::ExcitementScoring => Some(Payload::Frames),
        StageKind::AgeInference | StageKind::GenderInference => Some(Payload::FaceSets),
    }
}

pub fn output_payload(stage: StageKind) -> Option<Payload> {
    match stage {
        StageKind::Driver => Some(Payload::Frames),
        StageKind::FaceDetection => Some(Payload::FaceSets),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub source: StageKind,
    pub payload: Payload,
    pub consumers: Vec<StageKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    ports: Vec<PortSpec>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port from `source` to `consumers`. Checked by `validate`.
    pub fn connect(mut self, name: impl Into<String>, source: StageKind, consumers: &[StageKind]) -> Self {
        self.ports.push(PortSpec {
            name: name.into(),
            source,
            payload: output_payload(source).unwrap_or(Payload::Frames),
            consumers: consumers.to_vec(),
        });
        self
    }

    /// Driver fans frames out to face detection and excitement scoring;
    /// face detection fans faces out to age and gender inference.
    pub fn video_analytics() -> Self {
        Self::new()
            .connect(
                "frames",
                StageKind::Driver,
                &[StageKind::FaceDetection, StageKind::ExcitementScoring],
            )
            .connect(
                "faces",
                StageKind::FaceDetection,
                &[StageKind::AgeInference, StageKind::GenderInference],
            )
    }

    pub fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    pub fn port_from(&self, stage: StageKind) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.source == stage)
    }

    pub fn inbound_of(&self, stage: StageKind) -> Option<&PortSpec> {
        self.ports.iter().find(|p| p.consumers.contains(&stage))
    }

    /// Every stage named by some port
    pub fn stages(&self) -> BTreeSet<StageKind> {
        self.ports
            .iter()
            .flat_map(|p| std::iter::once(p.source).chain(p.consumers.iter().copied()))
            .collect()
    }

    /// Stages with no outbound port; the run is over once all of them finish
    pub fn terminal_stages(&self) -> Vec<StageKind> {
        self.stages()
            .into_iter()
            .filter(|s| self.port_from(*s).is_none())
            .collect()
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.ports.is_empty() {
            return Err(PipelineError::Topology("no ports defined".to_string()));
        }

        let mut names = BTreeSet::new();
        let mut sources = BTreeSet::new();
        let mut consumed = BTreeSet::new();

        for port in &self.ports {
            if !names.insert(port.name.as_str()) {
                return Err(PipelineError::Topology(format!("duplicate port name '{}'", port.name)));
            }

            let produced = output_payload(port.source).ok_or_else(|| {
                PipelineError::Topology(format!("{} has no output to publish on '{}'", port.source, port.name))
            })?;
            if produced != port.payload {
                return Err(PipelineError::Topology(format!(
                    "port '{}' carries {:?} but {} produces {:?}",
                    port.name, port.payload, port.source, produced
                )));
            }

            if !sources.insert(port.source) {
                return Err(PipelineError::Topology(format!("{} owns more than one port", port.source)));
            }

            if port.consumers.is_empty() {
                return Err(PipelineError::Topology(format!("port '{}' has no consumers", port.name)));
            }

            for consumer in &port.consumers {
                if input_payload(*consumer) != Some(port.payload) {
                    return Err(PipelineError::Topology(format!(
                        "{} cannot consume {:?} from '{}'",
                        consumer, port.payload, port.name
                    )));
                }
                if !consumed.insert(*consumer) {
                    return Err(PipelineError::Topology(format!(
                        "{} is fed by more than one port",
                        consumer
                    )));
                }
            }
        }

        if !sources.contains(&StageKind::Driver) {
            return Err(PipelineError::Topology("the driver publishes no frames".to_string()));
        }

        // One inbound edge per stage plus reachability from the driver
        // rules out cycles.
        let mut reached = BTreeSet::from([StageKind::Driver]);
        let mut frontier = vec![StageKind::Driver];
        while let Some(stage) = frontier.pop() {
            if let Some(port) = self.port_from(stage) {
                for consumer in &port.consumers {
                    if reached.insert(*consumer) {
                        frontier.push(*consumer);
                    }
                }
            }
        }
        if let Some(orphan) = self.stages().into_iter().find(|s| !reached.contains(s)) {
            return Err(PipelineError::Topology(format!("{} is not reachable from the driver", orphan)));
        }

        Ok(())
    }
}
