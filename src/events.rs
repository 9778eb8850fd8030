//! Simulation events and subscribers.
//!
//! The [`Simulator`](crate::solver::Simulator) publishes an event for every
//! lifecycle transition, structural edit and completed tick. Anything
//! implementing [`Subscriber`] (including plain closures) can listen.

use serde::Serialize;

use crate::circuit::{ComponentId, NodeId, TerminalRef};
use crate::components::DeviceKind;
use crate::solver::TickStats;

/// Something that happened inside the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimulationEvent {
    Started { time: f64 },
    Paused { time: f64 },
    Resumed { time: f64 },
    Stopped { time: f64 },
    Reset,
    TickCompleted(TickStats),
    TopologyRebuilt {
        nodes: usize,
        components: usize,
        ground: NodeId,
    },
    ComponentAdded {
        id: ComponentId,
        #[serde(serialize_with = "serialize_kind")]
        kind: DeviceKind,
    },
    ComponentRemoved { id: ComponentId },
    Connected { a: TerminalRef, b: TerminalRef },
    Disconnected { a: TerminalRef, b: TerminalRef },
    SolveFailed { time: f64, message: String },
}

fn serialize_kind<S: serde::Serializer>(kind: &DeviceKind, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.name())
}

impl SimulationEvent {
    /// Short event name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            SimulationEvent::Started { .. } => "started",
            SimulationEvent::Paused { .. } => "paused",
            SimulationEvent::Resumed { .. } => "resumed",
            SimulationEvent::Stopped { .. } => "stopped",
            SimulationEvent::Reset => "reset",
            SimulationEvent::TickCompleted(_) => "tick_completed",
            SimulationEvent::TopologyRebuilt { .. } => "topology_rebuilt",
            SimulationEvent::ComponentAdded { .. } => "component_added",
            SimulationEvent::ComponentRemoved { .. } => "component_removed",
            SimulationEvent::Connected { .. } => "connected",
            SimulationEvent::Disconnected { .. } => "disconnected",
            SimulationEvent::SolveFailed { .. } => "solve_failed",
        }
    }
}

/// Receiver of simulation events.
pub trait Subscriber {
    fn notify(&mut self, event: &SimulationEvent);
}

impl<F> Subscriber for F
where
    F: FnMut(&SimulationEvent),
{
    fn notify(&mut self, event: &SimulationEvent) {
        self(event)
    }
}

/// Forwards events to the `log` facade: lifecycle and edits at info/debug,
/// ticks at trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn notify(&mut self, event: &SimulationEvent) {
        match event {
            SimulationEvent::TickCompleted(stats) => log::trace!(
                "Tick {} at t={:.6}s: {} solve(s), {:?}, {} conservation violation(s)",
                stats.tick_count,
                stats.simulation_time,
                stats.iterations,
                stats.status,
                stats.conservation_violations
            ),
            SimulationEvent::SolveFailed { time, message } => {
                log::warn!("Solve failed at t={:.6}s: {}", time, message)
            }
            SimulationEvent::TopologyRebuilt {
                nodes,
                components,
                ground,
            } => log::debug!(
                "Topology rebuilt: {} nodes over {} components, ground {}",
                nodes,
                components,
                ground
            ),
            SimulationEvent::ComponentAdded { .. }
            | SimulationEvent::ComponentRemoved { .. }
            | SimulationEvent::Connected { .. }
            | SimulationEvent::Disconnected { .. } => log::debug!("{:?}", event),
            _ => log::info!("Simulation {}", event.name()),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of subscribers. Events are delivered synchronously in
/// subscription order.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriptionId, Box<dyn Subscriber + Send>)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<S: Subscriber + Send + 'static>(&mut self, subscriber: S) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn publish(&mut self, event: &SimulationEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber.notify(event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
