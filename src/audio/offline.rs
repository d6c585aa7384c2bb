//! Instrumented offline audio graph
//!
//! Implements `AudioGraph` without rendering any audio: every create,
//! connect, and dispose is recorded and validated against the ownership
//! contract. The tests and the demo binary run the whole engine against this
//! graph and then assert on its counters.

use std::collections::HashMap;
use std::sync::Arc;

use crate::audio::{AudioGraph, NodeId, NodeParam, NodeSpec};
use crate::catalog::BufferHandle;
use crate::error::{EngineError, EngineResult};

#[derive(Debug)]
struct NodeRecord {
    spec: NodeSpec,
    outputs: Vec<NodeId>,
    to_destination: bool,
    source: Option<Arc<str>>,
    playing: bool,
    reverse: bool,
    playback_rate: f64,
    grain_size: Option<f64>,
    overlap: Option<f64>,
    detune: Option<f64>,
}

impl NodeRecord {
    fn new(spec: NodeSpec) -> Self {
        Self {
            spec,
            outputs: Vec::new(),
            to_destination: false,
            source: None,
            playing: false,
            reverse: false,
            playback_rate: 1.0,
            grain_size: None,
            overlap: None,
            detune: None,
        }
    }
}

/// Graph double that tracks node lifecycles instead of producing sound.
#[derive(Debug, Default)]
pub struct OfflineGraph {
    nodes: HashMap<NodeId, NodeRecord>,
    next_id: u64,
    created: usize,
    disposed: usize,
    connections_made: usize,
}

impl OfflineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes currently allocated. Zero after a clean teardown.
    pub fn live_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn disposed_count(&self) -> usize {
        self.disposed
    }

    pub fn connections_made(&self) -> usize {
        self.connections_made
    }

    /// Live node ids of one kind, in id order. Lets tests find, say, every
    /// live panner.
    pub fn live_of_kind(&self, kind: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, record)| record.spec.kind() == kind)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn is_playing(&self, node: NodeId) -> bool {
        self.nodes.get(&node).map_or(false, |record| record.playing)
    }

    pub fn source_key(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node)?.source.as_deref()
    }

    pub fn is_reversed(&self, node: NodeId) -> bool {
        self.nodes.get(&node).map_or(false, |record| record.reverse)
    }

    pub fn playback_rate(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node).map(|record| record.playback_rate)
    }

    pub fn grain_size(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node)?.grain_size
    }

    pub fn overlap(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node)?.overlap
    }

    pub fn detune(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(&node)?.detune
    }

    pub fn spec(&self, node: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&node).map(|record| &record.spec)
    }

    /// Direct downstream connections of a node.
    pub fn outputs(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|record| record.outputs.clone())
            .unwrap_or_default()
    }

    pub fn is_routed_to_destination(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .map_or(false, |record| record.to_destination)
    }

    fn record(&self, node: NodeId) -> EngineResult<&NodeRecord> {
        self.nodes.get(&node).ok_or(EngineError::UnknownNode(node))
    }

    fn record_mut(&mut self, node: NodeId) -> EngineResult<&mut NodeRecord> {
        self.nodes
            .get_mut(&node)
            .ok_or(EngineError::UnknownNode(node))
    }

    fn require_player(&self, node: NodeId) -> EngineResult<()> {
        let record = self.record(node)?;
        if !record.spec.is_player() {
            return Err(EngineError::NodeKindMismatch {
                node,
                expected: "player",
                actual: record.spec.kind(),
            });
        }
        Ok(())
    }
}

impl AudioGraph for OfflineGraph {
    fn create(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;
        self.created += 1;
        self.nodes.insert(id, NodeRecord::new(spec));
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> EngineResult<()> {
        self.record(to)?;
        let record = self.record_mut(from)?;
        record.outputs.push(to);
        self.connections_made += 1;
        Ok(())
    }

    fn connect_to_destination(&mut self, node: NodeId) -> EngineResult<()> {
        self.record_mut(node)?.to_destination = true;
        self.connections_made += 1;
        Ok(())
    }

    fn set_source(&mut self, player: NodeId, buffer: &BufferHandle) -> EngineResult<()> {
        self.require_player(player)?;
        self.record_mut(player)?.source = Some(buffer.key_arc());
        Ok(())
    }

    fn set_param(&mut self, node: NodeId, param: NodeParam) -> EngineResult<()> {
        self.require_player(node)?;
        let record = self.record_mut(node)?;
        match param {
            NodeParam::Reverse(reverse) => record.reverse = reverse,
            NodeParam::PlaybackRate(rate) => record.playback_rate = rate,
            NodeParam::GrainSize(size) => record.grain_size = Some(size),
            NodeParam::Overlap(overlap) => record.overlap = Some(overlap),
            NodeParam::Detune(detune) => record.detune = Some(detune),
        }
        Ok(())
    }

    fn start_player(&mut self, player: NodeId) -> EngineResult<()> {
        self.require_player(player)?;
        let record = self.record_mut(player)?;
        if record.source.is_none() {
            return Err(EngineError::NoSource(player));
        }
        record.playing = true;
        Ok(())
    }

    fn stop_player(&mut self, player: NodeId) -> EngineResult<()> {
        self.require_player(player)?;
        self.record_mut(player)?.playing = false;
        Ok(())
    }

    fn dispose(&mut self, node: NodeId) -> EngineResult<()> {
        if self.nodes.remove(&node).is_none() {
            return Err(EngineError::UnknownNode(node));
        }
        self.disposed += 1;
        // Drop dangling routes into the removed node
        for record in self.nodes.values_mut() {
            record.outputs.retain(|output| *output != node);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer() -> BufferHandle {
        BufferHandle::new("audio/loops/tide.wav", 12.0)
    }

    #[test]
    fn test_create_connect_dispose_counts() {
        let mut graph = OfflineGraph::new();

        let player = graph.create(NodeSpec::Player {
            looped: true,
            volume_db: -12.0,
            fade_in: 4.0,
            fade_out: 4.0,
        });
        let panner = graph.create(NodeSpec::Panner { position: -1.0 });

        graph.connect(player, panner).unwrap();
        graph.connect_to_destination(panner).unwrap();

        assert_eq!(graph.created_count(), 2);
        assert_eq!(graph.live_count(), 2);
        assert_eq!(graph.connections_made(), 2);
        assert_eq!(graph.outputs(player), vec![panner]);
        assert!(graph.is_routed_to_destination(panner));

        graph.dispose(panner).unwrap();
        graph.dispose(player).unwrap();
        assert_eq!(graph.live_count(), 0);
        assert_eq!(graph.disposed_count(), 2);
    }

    #[test]
    fn test_dispose_removes_dangling_routes() {
        let mut graph = OfflineGraph::new();
        let gain = graph.create(NodeSpec::Gain { volume_db: 0.0 });
        let delay = graph.create(NodeSpec::FeedbackDelay {
            delay_time: 0.5,
            feedback: 0.3,
        });

        graph.connect(gain, delay).unwrap();
        graph.dispose(delay).unwrap();

        assert!(graph.outputs(gain).is_empty());
    }

    #[test]
    fn test_double_dispose_is_an_error() {
        let mut graph = OfflineGraph::new();
        let gain = graph.create(NodeSpec::Gain { volume_db: 0.0 });

        graph.dispose(gain).unwrap();
        assert!(matches!(
            graph.dispose(gain),
            Err(EngineError::UnknownNode(id)) if id == gain
        ));
    }

    #[test]
    fn test_start_requires_source() {
        let mut graph = OfflineGraph::new();
        let player = graph.create(NodeSpec::Player {
            looped: false,
            volume_db: -6.0,
            fade_in: 0.25,
            fade_out: 0.25,
        });

        assert!(matches!(
            graph.start_player(player),
            Err(EngineError::NoSource(id)) if id == player
        ));

        graph.set_source(player, &test_buffer()).unwrap();
        graph.start_player(player).unwrap();
        assert!(graph.is_playing(player));

        graph.stop_player(player).unwrap();
        assert!(!graph.is_playing(player));
    }

    #[test]
    fn test_player_operations_reject_wrong_kind() {
        let mut graph = OfflineGraph::new();
        let panner = graph.create(NodeSpec::Panner { position: 0.0 });

        assert!(matches!(
            graph.set_source(panner, &test_buffer()),
            Err(EngineError::NodeKindMismatch { expected: "player", .. })
        ));
        assert!(matches!(
            graph.start_player(panner),
            Err(EngineError::NodeKindMismatch { .. })
        ));
    }

    #[test]
    fn test_live_of_kind_filters() {
        let mut graph = OfflineGraph::new();
        let panner = graph.create(NodeSpec::Panner { position: 0.5 });
        graph.create(NodeSpec::Gain { volume_db: -3.0 });

        assert_eq!(graph.live_of_kind("panner"), vec![panner]);
        assert!(graph.live_of_kind("reverb").is_empty());
    }
}
