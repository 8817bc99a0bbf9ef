use crate::engine::Engine;
use crate::entity::{AlertEvent, NodeEntity, NodeId};
use crate::overlay::Anchor;
use crate::renderer::RenderState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A read-only snapshot of what the engine is showing.
///
/// Design intent:
/// - Observers cannot mutate or steer the engine.
/// - Snapshotting is *on-demand* and can allocate; the frame loop stays unchanged.
/// - Node data reflects the last simulation period, so it trails the live state by at most
///   one period.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineSnapshot {
    pub render_state: RenderState,
    pub frames: u64,
    pub simulation_ticks: u64,
    pub globe_rotation: f32,

    pub entity_count: usize,
    pub online_count: usize,
    pub offline_count: usize,
    pub nodes: Vec<NodeEntity>,

    pub hovered: Option<HoverSnapshot>,
    pub selected: Option<SelectionSnapshot>,
    /// Newest first.
    pub alerts: Vec<AlertEvent>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HoverSnapshot {
    pub index: usize,
    pub id: NodeId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectionSnapshot {
    pub index: usize,
    pub node: NodeEntity,
    pub anchor: Option<Anchor>,
}

pub struct EngineAdapter<'a> {
    engine: &'a Engine,
}

impl<'a> EngineAdapter<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let engine = self.engine;
        let nodes = engine.entities().to_vec();
        let online_count = nodes.iter().filter(|n| n.is_online()).count();

        EngineSnapshot {
            render_state: engine.render_state(),
            frames: engine.renderer().frames(),
            simulation_ticks: engine.simulation_ticks(),
            globe_rotation: engine.renderer().globe_rotation(),

            entity_count: nodes.len(),
            online_count,
            offline_count: nodes.len() - online_count,

            hovered: engine
                .hovered_index()
                .zip(engine.hovered_entity())
                .map(|(index, node)| HoverSnapshot {
                    index,
                    id: node.id,
                    label: node.tooltip_label(),
                }),
            selected: engine
                .selected_index()
                .zip(engine.selected())
                .map(|(index, node)| SelectionSnapshot {
                    index,
                    node: node.clone(),
                    anchor: engine.anchor(),
                }),
            alerts: engine.alert_log().to_vec(),
            nodes,
        }
    }
}

/// Lightweight summary without the per-node list, for periodic status lines.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineSummary {
    pub entity_count: usize,
    pub online_count: usize,
    pub frames: u64,
    pub simulation_ticks: u64,
    pub selected: Option<NodeId>,
}

impl EngineSummary {
    pub fn of(engine: &Engine) -> Self {
        Self {
            entity_count: engine.entity_count(),
            online_count: engine.entities().iter().filter(|n| n.is_online()).count(),
            frames: engine.renderer().frames(),
            simulation_ticks: engine.simulation_ticks(),
            selected: engine.selected_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::config::EngineConfig;
    use crate::input::{InputEvent, Key};

    #[test]
    fn snapshot_reflects_engine_state() {
        let cfg = EngineConfig::default().with_seed(9);
        let mut engine = Engine::new(cfg, Box::new(HeadlessBackend::new()), 0).unwrap();
        engine.mount().unwrap();
        engine.on_frame();
        engine.handle_event(InputEvent::Key(Key::ArrowRight));

        let snap = engine.snapshot();
        assert_eq!(snap.entity_count, 12);
        assert_eq!(snap.online_count + snap.offline_count, 12);
        assert_eq!(snap.frames, 1);
        assert_eq!(snap.render_state, RenderState::Running);
        assert_eq!(snap.alerts.len(), 1);
        assert_eq!(snap.alerts[0].message, "No recent errors");
        let selected = snap.selected.unwrap();
        assert_eq!(selected.index, 0);
        assert_eq!(selected.node.name, "Node-1");
        assert!(selected.anchor.is_some());
        assert!(snap.hovered.is_none());

        let summary = EngineSummary::of(&engine);
        assert_eq!(summary.selected, Some(1));
        assert_eq!(summary.entity_count, 12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_to_json() {
        let engine = Engine::new(
            EngineConfig::default().with_node_count(2),
            Box::new(HeadlessBackend::new()),
            0,
        )
        .unwrap();
        let json = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(json["render_state"], "uninitialized");
        assert_eq!(json["nodes"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["alerts"][0]["kind"], "info");
    }
}
