//! The engine handle: owns every piece of state and wires the callbacks together.
//!
//! Hosts drive it from one cooperative thread:
//!
//! - [`Engine::on_frame`] once per display frame,
//! - [`Engine::on_timer`] once per simulation period (or [`Engine::poll_simulation`] from the
//!   frame loop),
//! - [`Engine::handle_event`] for pointer, keyboard, resize, scroll and visibility input.
//!
//! UI collaborators read [`Engine::hovered_entity`], [`Engine::selected`], [`Engine::anchor`]
//! and [`Engine::alert_log`], or drain [`EngineEvent`]s after each callback.

use glam::Vec2;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::backend::{select_backend, RenderBackend};
use crate::camera::{Camera, OrbitControls, Viewport};
use crate::config::EngineConfig;
use crate::entity::{AlertEvent, AlertLog, NodeEntity, NodeId, Timestamp};
use crate::error::EngineError;
use crate::input::{InputEvent, Key};
use crate::observer::{EngineAdapter, EngineSnapshot};
use crate::overlay::{anchor_for, Anchor};
use crate::picker::{HoverTracker, Picker};
use crate::prng::Prng;
use crate::renderer::{FrameOutcome, FrameRenderer, RenderState};
use crate::schedule::{
    ListenerRegistry, PlatformCapabilities, ResizeSource, ScheduleHandle, ScheduleKind,
};
use crate::simulator::Simulator;
use crate::store::EntityStore;

/// Notifications for UI collaborators, drained with [`Engine::drain_events`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum EngineEvent {
    HoverChanged {
        index: Option<usize>,
        id: Option<NodeId>,
        label: Option<String>,
    },
    SelectionChanged {
        index: Option<usize>,
        id: Option<NodeId>,
    },
    AnchorMoved {
        id: NodeId,
        anchor: Anchor,
    },
    AlertRaised {
        alert: AlertEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    id: NodeId,
    index: usize,
}

pub struct Engine {
    config: EngineConfig,
    store: EntityStore,
    simulator: Simulator,
    renderer: FrameRenderer,
    camera: Camera,
    controls: OrbitControls,
    viewport: Viewport,
    picker: Picker,
    hover: HoverTracker,
    /// Last pointer position in NDC; re-picked every frame.
    pointer: Option<Vec2>,
    selection: Option<Selection>,
    anchor: Option<Anchor>,
    platform: PlatformCapabilities,
    listeners: ListenerRegistry,
    frame_schedule: Option<ScheduleHandle>,
    timer_schedule: Option<ScheduleHandle>,
    events: Vec<EngineEvent>,
    mounted: bool,
    torn_down: bool,
}

impl Engine {
    /// Build an engine around an explicit backend. The node set is generated at `now`.
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn RenderBackend>,
        now: Timestamp,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let mut rng = Prng::new(config.effective_seed());
        let store = EntityStore::new(
            config.initial_node_count,
            config.simulation,
            rng.fork(1),
            now,
        );
        let simulator = Simulator::new(config.simulation, rng.fork(2));

        let viewport = Viewport::new(0.0, 0.0, config.viewport_width, config.viewport_height);
        let camera = Camera::new(&config.camera, viewport.aspect());
        let controls = OrbitControls::new(&config.camera);
        let renderer = FrameRenderer::new(&config, backend);

        debug!(
            nodes = store.len(),
            seed = config.effective_seed(),
            "engine created"
        );

        Ok(Self {
            picker: Picker::new(config.node_radius),
            config,
            store,
            simulator,
            renderer,
            camera,
            controls,
            viewport,
            hover: HoverTracker::new(),
            pointer: None,
            selection: None,
            anchor: None,
            platform: PlatformCapabilities::default(),
            listeners: ListenerRegistry::new(),
            frame_schedule: None,
            timer_schedule: None,
            events: Vec::new(),
            mounted: false,
            torn_down: false,
        })
    }

    /// Build an engine with the backend named in the configuration (falling back to headless).
    pub fn from_config(config: EngineConfig, now: Timestamp) -> Result<Self, EngineError> {
        let backend = select_backend(config.backend, EngineConfig::MAX_NODES);
        Self::new(config, backend, now)
    }

    /// Declare optional host facilities. Only effective before [`mount`](Self::mount).
    pub fn with_platform(mut self, platform: PlatformCapabilities) -> Self {
        self.platform = platform;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Allocate render resources, register listeners and arm the frame and timer schedules.
    pub fn mount(&mut self) -> Result<(), EngineError> {
        if self.mounted || self.torn_down {
            warn!("mount ignored: engine already mounted or torn down");
            return Ok(());
        }
        self.renderer.mount(self.store.len())?;
        self.listeners.register_all(self.platform.resize_source());
        self.frame_schedule = Some(ScheduleHandle::new(ScheduleKind::Frame));
        self.timer_schedule = Some(ScheduleHandle::new(ScheduleKind::Timer));
        self.mounted = true;
        debug!("engine mounted");
        Ok(())
    }

    /// Cancel schedules, deregister listeners, then release resources. Idempotent.
    ///
    /// Safe after a failed or missing mount.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        for handle in [self.frame_schedule.take(), self.timer_schedule.take()]
            .into_iter()
            .flatten()
        {
            handle.cancel();
        }
        self.listeners.deregister_all();
        self.pointer = None;
        self.hover.clear();
        self.renderer.dispose();
        debug!("engine torn down");
        true
    }

    /// Handle the host polls before invoking [`on_frame`](Self::on_frame).
    pub fn frame_schedule(&self) -> Option<ScheduleHandle> {
        self.frame_schedule.clone()
    }

    /// Handle the host polls before invoking [`on_timer`](Self::on_timer).
    pub fn timer_schedule(&self) -> Option<ScheduleHandle> {
        self.timer_schedule.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Callbacks
    // ═══════════════════════════════════════════════════════════════════════

    /// Frame callback: orbit damping, instance write, draw, hover re-pick, anchor follow-up.
    pub fn on_frame(&mut self) -> FrameOutcome {
        if !is_active(&self.frame_schedule) || self.renderer.state() != RenderState::Running {
            return FrameOutcome::Idle;
        }
        self.controls.update(&mut self.camera);

        let outcome = self.renderer.frame(
            self.store.snapshot(),
            self.camera.view_projection(),
            (
                self.viewport.width.round() as u32,
                self.viewport.height.round() as u32,
            ),
        );
        if let Some(ndc) = self.pointer {
            self.update_hover(ndc);
        }
        if self.selection.is_some() {
            self.refresh_anchor();
        }
        outcome
    }

    /// Simulation timer callback.
    pub fn on_timer(&mut self, now: Timestamp) -> Option<AlertEvent> {
        if !is_active(&self.timer_schedule) {
            return None;
        }
        let alert = self.simulator.run_period(&mut self.store, now)?;
        self.events.push(EngineEvent::AlertRaised {
            alert: alert.clone(),
        });
        Some(alert)
    }

    /// Run the simulation if its period has elapsed. For hosts with a single loop.
    pub fn poll_simulation(&mut self, now: Timestamp) -> Option<AlertEvent> {
        if !is_active(&self.timer_schedule) || !self.simulator.due(now) {
            return None;
        }
        self.on_timer(now)
    }

    pub fn handle_event(&mut self, event: InputEvent) {
        if !self.listeners.is_listening(event.listener()) {
            if self.torn_down {
                warn!(?event, "event after teardown dropped");
            }
            return;
        }
        match event {
            InputEvent::PointerMove { x, y } | InputEvent::TouchMove { x, y } => {
                let ndc = self.viewport.client_to_ndc(x, y);
                self.pointer = Some(ndc);
                self.update_hover(ndc);
            }
            InputEvent::PointerDown { x, y } | InputEvent::TouchStart { x, y } => {
                let ndc = self.viewport.client_to_ndc(x, y);
                self.resolve_click(ndc);
            }
            InputEvent::PointerDrag { dx, dy } => self.controls.drag(dx, dy),
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::Resize { width, height } => {
                self.viewport =
                    Viewport::new(self.viewport.left, self.viewport.top, width, height);
                self.camera.set_aspect(self.viewport.aspect());
                self.refresh_anchor();
            }
            InputEvent::Scroll { left, top } => {
                self.viewport.left = left;
                self.viewport.top = top;
                self.refresh_anchor();
            }
            InputEvent::Visibility { visible } => self.renderer.set_visible(visible),
        }
    }

    /// Grow or shrink the node set and the instance buffer together.
    ///
    /// A selection or hover pointing past the new end is cleared.
    pub fn resize_entities(&mut self, new_count: usize, now: Timestamp) {
        let new_count = new_count.min(EngineConfig::MAX_NODES);
        let old = self.store.len();
        self.store.resize(new_count, now);
        self.renderer.resize_instances(new_count);

        if self.selection.is_some_and(|s| s.index >= new_count) {
            self.set_selection(None);
        }
        if self.hover.clear_if_stale(new_count) {
            self.push_hover_event();
        }
        debug!(from = old, to = new_count, "entities resized");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Picking & selection
    // ═══════════════════════════════════════════════════════════════════════

    fn pick(&self, ndc: Vec2) -> Option<usize> {
        let buffer = self.renderer.buffer()?;
        self.picker
            .pick(&self.camera, ndc, buffer, self.store.len())
    }

    /// Re-pick under the pointer; emits an event only when the hovered index changes.
    pub fn update_hover(&mut self, ndc: Vec2) {
        let picked = self.pick(ndc);
        if self.hover.update(picked) {
            self.push_hover_event();
        }
    }

    /// Click at `ndc`: select the hit node, or clear the selection on a miss.
    pub fn resolve_click(&mut self, ndc: Vec2) {
        let picked = self.pick(ndc);
        self.select_index(picked);
    }

    fn handle_key(&mut self, key: Key) {
        let count = self.store.len();
        let current = self.selection.map(|s| s.index);
        let next = match key {
            Key::Escape => None,
            Key::ArrowRight | Key::ArrowDown => {
                if count == 0 {
                    return;
                }
                Some(current.map_or(0, |i| (i + 1).min(count - 1)))
            }
            Key::ArrowLeft | Key::ArrowUp => {
                if count == 0 {
                    return;
                }
                Some(current.map_or(count - 1, |i| i.saturating_sub(1)))
            }
            Key::Enter => match self.hover.current() {
                Some(i) => Some(i),
                None => return,
            },
        };
        self.select_index(next);
    }

    fn select_index(&mut self, index: Option<usize>) {
        let selection = index.and_then(|i| {
            self.store.get(i).map(|node| Selection {
                id: node.id,
                index: i,
            })
        });
        self.set_selection(selection);
        self.refresh_anchor();
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        if self.selection == selection {
            return;
        }
        self.selection = selection;
        if selection.is_none() {
            self.anchor = None;
        }
        self.events.push(EngineEvent::SelectionChanged {
            index: selection.map(|s| s.index),
            id: selection.map(|s| s.id),
        });
    }

    /// Recompute the selected node's anchor; clear the selection if its slot went stale.
    fn refresh_anchor(&mut self) {
        let Some(sel) = self.selection else {
            return;
        };
        if sel.index >= self.store.len() {
            self.set_selection(None);
            return;
        }
        let Some(buffer) = self.renderer.buffer() else {
            return;
        };
        let anchor = anchor_for(
            sel.index,
            buffer,
            self.store.len(),
            &self.camera,
            &self.viewport,
        );
        if let Some(anchor) = anchor {
            if self.anchor != Some(anchor) {
                self.anchor = Some(anchor);
                self.events.push(EngineEvent::AnchorMoved { id: sel.id, anchor });
            }
        }
    }

    fn push_hover_event(&mut self) {
        let node = self.hovered_entity();
        let event = EngineEvent::HoverChanged {
            index: self.hover.current(),
            id: node.map(|n| n.id),
            label: node.map(NodeEntity::tooltip_label),
        };
        self.events.push(event);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Outputs
    // ═══════════════════════════════════════════════════════════════════════

    pub fn hovered_index(&self) -> Option<usize> {
        self.hover.current()
    }

    pub fn hovered_entity(&self) -> Option<&NodeEntity> {
        self.store.get(self.hover.current()?)
    }

    /// Tooltip text for the hovered node.
    pub fn hover_label(&self) -> Option<String> {
        self.hovered_entity().map(NodeEntity::tooltip_label)
    }

    pub fn selected_id(&self) -> Option<NodeId> {
        self.selection.map(|s| s.id)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selection.map(|s| s.index)
    }

    pub fn selected(&self) -> Option<&NodeEntity> {
        self.store.get(self.selection?.index)
    }

    /// Screen anchor of the selected node, if any.
    pub fn anchor(&self) -> Option<Anchor> {
        self.selection.and(self.anchor)
    }

    /// Newest first, at most six entries.
    pub fn alert_log(&self) -> &AlertLog {
        self.store.alerts()
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn entities(&self) -> &[NodeEntity] {
        self.store.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineAdapter::new(self).snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn render_state(&self) -> RenderState {
        self.renderer.state()
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    pub fn simulation_ticks(&self) -> u64 {
        self.simulator.ticks()
    }

    pub fn resize_source(&self) -> Option<ResizeSource> {
        self.listeners.resize_source()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn is_active(handle: &Option<ScheduleHandle>) -> bool {
    handle.as_ref().is_some_and(ScheduleHandle::is_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;

    const NOW: Timestamp = 1_700_000_000_000;

    fn engine(count: usize) -> Engine {
        let cfg = EngineConfig::default().with_node_count(count).with_seed(42);
        let mut e = Engine::new(cfg, Box::new(HeadlessBackend::new()), NOW).unwrap();
        e.mount().unwrap();
        e.on_frame();
        e
    }

    fn key(e: &mut Engine, k: Key) {
        e.handle_event(InputEvent::Key(k));
    }

    /// Client pixel position of slot `i` as currently drawn.
    fn client_pos(e: &Engine, i: usize) -> (f32, f32) {
        let a = anchor_for(
            i,
            e.renderer().buffer().unwrap(),
            e.entity_count(),
            e.camera(),
            e.viewport(),
        )
        .unwrap();
        (a.x, a.y)
    }

    /// First slot whose marker is visible and wins the pick at its own center.
    fn pickable_slot(e: &Engine) -> Option<usize> {
        (0..e.entity_count()).find(|&i| {
            let (x, y) = client_pos(e, i);
            e.pick(e.viewport().client_to_ndc(x, y)) == Some(i)
        })
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = EngineConfig::default();
        cfg.globe_radius = -1.0;
        let err = Engine::new(cfg, Box::new(HeadlessBackend::new()), NOW).err();
        assert!(matches!(err, Some(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn keyboard_cycling_is_clamped() {
        let mut e = engine(5);
        key(&mut e, Key::ArrowRight);
        assert_eq!(e.selected_index(), Some(0));
        for _ in 0..5 {
            key(&mut e, Key::ArrowRight);
        }
        assert_eq!(e.selected_index(), Some(4));
        key(&mut e, Key::ArrowLeft);
        assert_eq!(e.selected_index(), Some(3));

        for _ in 0..10 {
            key(&mut e, Key::ArrowUp);
        }
        assert_eq!(e.selected_index(), Some(0));
        key(&mut e, Key::Escape);
        assert_eq!(e.selected_index(), None);
        assert_eq!(e.anchor(), None);

        key(&mut e, Key::ArrowLeft);
        assert_eq!(e.selected_index(), Some(4));
        assert_eq!(e.selected_id(), Some(5));
    }

    #[test]
    fn selection_clears_on_shrink() {
        let mut e = engine(12);
        for _ in 0..11 {
            key(&mut e, Key::ArrowDown);
        }
        assert_eq!(e.selected_index(), Some(10));
        assert!(e.anchor().is_some());
        e.drain_events();

        e.resize_entities(5, NOW);
        assert_eq!(e.entity_count(), 5);
        assert_eq!(e.selected(), None);
        assert_eq!(e.anchor(), None);
        assert!(e
            .drain_events()
            .contains(&EngineEvent::SelectionChanged { index: None, id: None }));
        assert_eq!(e.renderer().buffer().unwrap().len(), 5);
    }

    #[test]
    fn hover_follows_orbit_under_still_pointer() {
        let mut e = engine(12);
        let slot = pickable_slot(&e).expect("some node faces the camera");
        let (x, y) = client_pos(&e, slot);
        e.handle_event(InputEvent::PointerMove { x, y });
        assert_eq!(e.hovered_index(), Some(slot));
        e.drain_events();

        e.handle_event(InputEvent::PointerDrag { dx: 400.0, dy: 0.0 });
        for _ in 0..200 {
            e.on_frame();
        }
        let under = e.pick(e.viewport().client_to_ndc(x, y));
        assert_eq!(e.hovered_index(), under);
        assert_ne!(under, Some(slot));
        assert!(e
            .drain_events()
            .iter()
            .any(|ev| matches!(ev, EngineEvent::HoverChanged { .. })));
    }

    #[test]
    fn hover_clears_on_shrink() {
        let mut e = engine(12);
        let slot = (0..e.entity_count())
            .rev()
            .find(|&i| {
                let (x, y) = client_pos(&e, i);
                e.pick(e.viewport().client_to_ndc(x, y)) == Some(i)
            })
            .expect("some node faces the camera");
        let (x, y) = client_pos(&e, slot);
        e.handle_event(InputEvent::PointerMove { x, y });
        assert_eq!(e.hovered_index(), Some(slot));
        e.drain_events();

        e.resize_entities(slot, NOW);
        assert_eq!(e.hovered_index(), None);
        assert_eq!(e.hovered_entity(), None);
        assert!(e.drain_events().contains(&EngineEvent::HoverChanged {
            index: None,
            id: None,
            label: None,
        }));
    }

    #[test]
    fn selection_survives_growth() {
        let mut e = engine(6);
        key(&mut e, Key::ArrowLeft);
        let id = e.selected_id();
        e.resize_entities(20, NOW);
        assert_eq!(e.selected_id(), id);
        assert_eq!(e.selected_index(), Some(5));
        assert_eq!(e.entities()[19].id, 20);
        assert!(matches!(e.on_frame(), FrameOutcome::Drawn { instances: 20 }));
    }

    #[test]
    fn click_selects_hit_and_clears_on_miss() {
        let mut e = engine(12);
        let slot = pickable_slot(&e).expect("some node faces the camera");
        let (x, y) = client_pos(&e, slot);

        e.handle_event(InputEvent::PointerDown { x, y });
        assert_eq!(e.selected_index(), Some(slot));
        let anchor = e.anchor().unwrap();
        assert!((anchor.x - x).abs() < 1e-3 && (anchor.y - y).abs() < 1e-3);

        // Corner of the viewport is empty space.
        e.handle_event(InputEvent::TouchStart { x: 1.0, y: 1.0 });
        assert_eq!(e.selected_index(), None);
    }

    #[test]
    fn hover_then_enter_promotes() {
        let mut e = engine(12);
        let slot = pickable_slot(&e).expect("some node faces the camera");
        let (x, y) = client_pos(&e, slot);

        e.handle_event(InputEvent::PointerMove { x, y });
        e.handle_event(InputEvent::PointerMove { x, y });
        let hovers = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, EngineEvent::HoverChanged { .. }))
            .count();
        assert_eq!(hovers, 1);
        assert_eq!(e.hovered_index(), Some(slot));
        let label = e.hover_label().unwrap();
        assert!(label.starts_with(&format!("Node-{} — ", slot + 1)));

        key(&mut e, Key::Enter);
        assert_eq!(e.selected_index(), Some(slot));

        e.handle_event(InputEvent::TouchMove { x: 1.0, y: 1.0 });
        assert_eq!(e.hovered_index(), None);
        // Enter with nothing hovered keeps the selection.
        key(&mut e, Key::Enter);
        assert_eq!(e.selected_index(), Some(slot));
    }

    #[test]
    fn scroll_and_resize_move_the_anchor() {
        let mut e = engine(8);
        key(&mut e, Key::ArrowRight);
        let before = e.anchor().unwrap();

        e.handle_event(InputEvent::Scroll { left: 30.0, top: -20.0 });
        let scrolled = e.anchor().unwrap();
        assert!((scrolled.x - before.x - 30.0).abs() < 1e-3);
        assert!((scrolled.y - before.y + 20.0).abs() < 1e-3);

        e.handle_event(InputEvent::Resize { width: 440.0, height: 400.0 });
        assert!((e.camera().aspect - 1.1).abs() < 1e-6);
        assert_ne!(e.anchor(), Some(scrolled));
    }

    #[test]
    fn visibility_pauses_frames() {
        let mut e = engine(4);
        e.handle_event(InputEvent::Visibility { visible: false });
        assert_eq!(e.render_state(), RenderState::Paused);
        assert_eq!(e.on_frame(), FrameOutcome::Idle);
        e.handle_event(InputEvent::Visibility { visible: true });
        assert_eq!(e.on_frame(), FrameOutcome::Drawn { instances: 4 });
    }

    #[test]
    fn timer_ticks_and_reports_alerts() {
        let mut cfg = EngineConfig::default().with_seed(7);
        cfg.simulation.alert_probability = 1.0;
        let mut e = Engine::new(cfg, Box::new(HeadlessBackend::new()), NOW).unwrap();
        e.mount().unwrap();
        for i in 1..=10 {
            assert!(e.on_timer(NOW + i * 3_000).is_some());
        }
        assert_eq!(e.simulation_ticks(), 10);
        assert_eq!(e.alert_log().len(), 6);
        let raised = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, EngineEvent::AlertRaised { .. }))
            .count();
        assert_eq!(raised, 10);
        assert!(e.entities().iter().all(|n| n.last_seen == NOW + 30_000));
    }

    #[test]
    fn poll_simulation_follows_period() {
        let mut e = engine(3);
        assert!(e.poll_simulation(NOW).is_none());
        e.poll_simulation(NOW + 2_999);
        assert_eq!(e.simulation_ticks(), 0);
        e.poll_simulation(NOW + 3_000);
        assert_eq!(e.simulation_ticks(), 1);
    }

    #[test]
    fn teardown_is_idempotent_and_stops_everything() {
        let mut e = engine(12);
        let slot = pickable_slot(&e).expect("some node faces the camera");
        let (x, y) = client_pos(&e, slot);
        e.handle_event(InputEvent::PointerMove { x, y });
        assert_eq!(e.hovered_index(), Some(slot));
        let frame = e.frame_schedule().unwrap();
        let timer = e.timer_schedule().unwrap();
        assert!(e.teardown());
        assert!(!e.teardown());
        assert!(!frame.is_active());
        assert!(!timer.is_active());
        assert_eq!(e.render_state(), RenderState::Disposed);
        assert_eq!(e.hovered_index(), None);

        assert_eq!(e.on_frame(), FrameOutcome::Idle);
        assert!(e.on_timer(NOW).is_none());
        key(&mut e, Key::ArrowRight);
        assert_eq!(e.selected_index(), None);
        e.resize_entities(2, NOW);
        assert_eq!(e.entity_count(), 2);
    }

    #[test]
    fn teardown_without_mount() {
        let cfg = EngineConfig::default();
        let mut e = Engine::new(cfg, Box::new(HeadlessBackend::new()), NOW).unwrap();
        assert!(e.teardown());
        e.mount().unwrap();
        assert_eq!(e.render_state(), RenderState::Disposed);
    }

    #[test]
    fn events_before_mount_are_ignored() {
        let cfg = EngineConfig::default();
        let mut e = Engine::new(cfg, Box::new(HeadlessBackend::new()), NOW).unwrap();
        key(&mut e, Key::ArrowRight);
        assert_eq!(e.selected_index(), None);
        assert_eq!(e.resize_source(), None);
        e.mount().unwrap();
        assert_eq!(e.resize_source(), Some(ResizeSource::Window));
    }

    #[test]
    fn drag_orbits_camera_and_moves_anchor() {
        let mut e = engine(6);
        key(&mut e, Key::ArrowRight);
        let before = e.anchor().unwrap();
        e.handle_event(InputEvent::PointerDrag { dx: 120.0, dy: 0.0 });
        for _ in 0..5 {
            e.on_frame();
        }
        assert!(e.camera().yaw < 0.0);
        assert_ne!(e.anchor(), Some(before));
    }
}
