//! Per-component MNA stamps.
//!
//! Nonlinear devices are stamped from an [`OperatingPoint`]: the conduction
//! state or region they were in at the end of the previous tick (or, inside
//! a fixed-point pass, the classification of the latest solve).

use crate::circuit::{Terminal, TerminalRef, Topology};
use crate::components::{
    BjtRegion, Component, Device, DeviceState, Switch, TickContext, OFF_CONDUCTANCE, ON_RESISTANCE,
};

use super::mna::MnaMatrix;

/// Linearization choice for one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingPoint {
    /// Linear device or source; no choice to make
    Linear,
    /// Diode or LED
    Junction { conducting: bool },
    /// BJT region plus the base current driving the collector source
    Bjt { region: BjtRegion, base_current: f64 },
    Switch { closed: bool },
}

impl OperatingPoint {
    /// Operating point recorded in a state block.
    pub fn of_state(state: &DeviceState) -> Self {
        match state {
            DeviceState::Diode(s) => OperatingPoint::Junction {
                conducting: s.conducting,
            },
            DeviceState::Led(s) => OperatingPoint::Junction {
                conducting: s.conducting,
            },
            DeviceState::Bjt(s) => OperatingPoint::Bjt {
                region: s.region,
                base_current: s.currents[1],
            },
            DeviceState::Switch(s) => OperatingPoint::Switch { closed: s.closed },
            _ => OperatingPoint::Linear,
        }
    }

    /// Operating point left by the previous tick.
    pub fn previous(device: &Device) -> Self {
        match device {
            Device::Diode(d) => OperatingPoint::Junction {
                conducting: d.state.conducting,
            },
            Device::Led(d) => OperatingPoint::Junction {
                conducting: d.state.conducting,
            },
            Device::Bjt(d) => OperatingPoint::Bjt {
                region: d.state.region,
                base_current: d.previous_base_current(),
            },
            Device::Switch(d) => OperatingPoint::Switch {
                closed: d.state.closed,
            },
            _ => OperatingPoint::Linear,
        }
    }

    /// Reclassify junctions and transistors against freshly solved voltages.
    /// Switches keep their stamped position for the whole tick.
    pub fn reclassify(&self, component: &Component, ctx: &TickContext) -> Self {
        match self {
            OperatingPoint::Junction { .. } | OperatingPoint::Bjt { .. } => {
                Self::of_state(&component.calculate(ctx))
            }
            other => *other,
        }
    }

    /// Same discrete classification, ignoring continuous values.
    pub fn same_class(&self, other: &Self) -> bool {
        match (self, other) {
            (OperatingPoint::Bjt { region: a, .. }, OperatingPoint::Bjt { region: b, .. }) => a == b,
            _ => self == other,
        }
    }
}

/// Inputs shared by every stamp in one assembly.
#[derive(Debug, Clone, Copy)]
pub struct StampContext<'a> {
    pub topology: &'a Topology,
    /// Instant being solved
    pub time: f64,
    pub dt: f64,
    /// Penalty conductance for voltage sources
    pub source_conductance: f64,
}

impl StampContext<'_> {
    fn index(&self, component: &Component, terminal: Terminal) -> Option<usize> {
        self.topology.terminal_index(TerminalRef::new(component.id, terminal))
    }

    fn pair(&self, component: &Component, a: Terminal, b: Terminal) -> (Option<usize>, Option<usize>) {
        (self.index(component, a), self.index(component, b))
    }
}

/// Stamp one component into the system.
pub fn stamp_component(matrix: &mut MnaMatrix, component: &Component, op: OperatingPoint, ctx: &StampContext) {
    use Terminal::*;

    match &component.device {
        Device::Resistor(r) => {
            let (n1, n2) = ctx.pair(component, P1, P2);
            matrix.stamp_conductance(n1, n2, r.conductance());
        }

        Device::Capacitor(c) => {
            let (n1, n2) = ctx.pair(component, P1, P2);
            matrix.stamp_conductance(n1, n2, c.conductance(ctx.dt));
            // Companion current source pushing the stored charge back into p1
            let i_eq = c.history_current(ctx.dt);
            matrix.add_source(n1, i_eq);
            matrix.add_source(n2, -i_eq);
        }

        Device::Inductor(l) => {
            let (n1, n2) = ctx.pair(component, P1, P2);
            matrix.stamp_conductance(n1, n2, l.conductance(ctx.dt));
            matrix.stamp_current_source(n1, n2, l.previous_current());
        }

        Device::Ground(_) => {}

        Device::DcVoltageSource(v) => {
            let (np, nn) = ctx.pair(component, Pos, Neg);
            matrix.stamp_voltage_source(np, nn, v.voltage(ctx.time), ctx.source_conductance);
        }

        Device::AcVoltageSource(v) => {
            let (np, nn) = ctx.pair(component, Pos, Neg);
            matrix.stamp_voltage_source(np, nn, v.voltage(ctx.time), ctx.source_conductance);
        }

        Device::DcCurrentSource(i) => {
            let (np, nn) = ctx.pair(component, Pos, Neg);
            matrix.stamp_current_source(np, nn, i.current());
        }

        Device::Diode(d) => {
            let (na, nk) = ctx.pair(component, Anode, Cathode);
            stamp_junction(matrix, na, nk, d.properties.forward_voltage, op);
        }

        Device::Led(d) => {
            let (na, nk) = ctx.pair(component, Anode, Cathode);
            stamp_junction(matrix, na, nk, d.properties.forward_voltage, op);
        }

        Device::Bjt(q) => {
            let (region, ib) = match op {
                OperatingPoint::Bjt { region, base_current } => (region, base_current),
                _ => (q.state.region, q.previous_base_current()),
            };
            let nc = ctx.index(component, Collector);
            let nb = ctx.index(component, Base);
            let ne = ctx.index(component, Emitter);

            let s = region.stamp(q.properties.gain);
            matrix.stamp_conductance(nb, ne, 1.0 / s.rbe);
            matrix.stamp_conductance(nc, ne, 1.0 / s.rce);

            // Controlled collector current, signed by the base current so a
            // PNP device drives it emitter to collector
            let limit = q.properties.max_collector_current;
            let ic = (s.current_factor * ib).clamp(-limit, limit);
            if ic != 0.0 {
                matrix.stamp_current_source(nc, ne, ic);
            }
        }

        Device::Switch(sw) => {
            let closed = match op {
                OperatingPoint::Switch { closed } => closed,
                _ => sw.state.closed,
            };
            let (n1, n2) = ctx.pair(component, P1, P2);
            matrix.stamp_conductance(n1, n2, 1.0 / Switch::resistance(closed));
        }
    }
}

/// Piecewise-linear junction: R_on in series with Vf, or the leakage conductance.
fn stamp_junction(matrix: &mut MnaMatrix, na: Option<usize>, nk: Option<usize>, vf: f64, op: OperatingPoint) {
    let conducting = matches!(op, OperatingPoint::Junction { conducting: true });
    if conducting {
        let g = 1.0 / ON_RESISTANCE;
        matrix.stamp_conductance(na, nk, g);
        matrix.add_source(na, g * vf);
        matrix.add_source(nk, -g * vf);
    } else {
        matrix.stamp_conductance(na, nk, OFF_CONDUCTANCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, ComponentId};
    use crate::components::{Bjt, BjtPolarity, Capacitor, DcVoltageSource, Diode, Ground, Inductor, Resistor};
    use approx::assert_relative_eq;

    /// A lone ground plus `device`, whose two terminals land on nodes 0 and 1.
    fn two_node(device: Device) -> (Circuit, ComponentId) {
        let mut c = Circuit::new();
        c.add(Device::Ground(Ground::new()));
        let id = c.add(device);
        (c, id)
    }

    fn assemble(circuit: &Circuit, id: ComponentId, op: OperatingPoint) -> MnaMatrix {
        let topo = Topology::build(circuit);
        let mut m = MnaMatrix::new(topo.unknowns());
        let ctx = StampContext {
            topology: &topo,
            time: 0.0,
            dt: 1e-3,
            source_conductance: 1e9,
        };
        stamp_component(&mut m, circuit.component(id).unwrap(), op, &ctx);
        m
    }

    #[test]
    fn test_capacitor_companion_stamp() {
        let mut cap = Capacitor::new(1e-6);
        cap.state.voltages = [2.0, 0.0];
        let (c, id) = two_node(Device::Capacitor(cap));
        let m = assemble(&c, id, OperatingPoint::Linear);
        // G = C/dt = 1e-3, I_eq = 2e-3
        assert_relative_eq!(m.get(0, 0), 1e-3);
        assert_relative_eq!(m.get(0, 1), -1e-3);
        assert_relative_eq!(m.z[0], 2e-3);
        assert_relative_eq!(m.z[1], -2e-3);
    }

    #[test]
    fn test_inductor_companion_stamp() {
        let mut l = Inductor::new(1e-3);
        l.state.currents = [0.5, -0.5];
        let (c, id) = two_node(Device::Inductor(l));
        let m = assemble(&c, id, OperatingPoint::Linear);
        assert_relative_eq!(m.get(1, 1), 1.0);
        assert_relative_eq!(m.z[0], -0.5);
        assert_relative_eq!(m.z[1], 0.5);
    }

    #[test]
    fn test_voltage_source_penalty_stamp() {
        let (c, id) = two_node(Device::DcVoltageSource(DcVoltageSource::new(5.0)));
        let m = assemble(&c, id, OperatingPoint::Linear);
        assert_relative_eq!(m.get(0, 0), 1e9);
        assert_relative_eq!(m.z[0], 5e9);
        assert_relative_eq!(m.z[1], -5e9);
    }

    #[test]
    fn test_junction_stamp_follows_operating_point() {
        let (c, id) = two_node(Device::Diode(Diode::default()));
        let off = assemble(&c, id, OperatingPoint::Junction { conducting: false });
        assert_relative_eq!(off.get(0, 0), OFF_CONDUCTANCE);
        assert_eq!(off.z, vec![0.0, 0.0]);

        let on = assemble(&c, id, OperatingPoint::Junction { conducting: true });
        assert_relative_eq!(on.get(0, 0), 10.0);
        assert_relative_eq!(on.z[0], 7.0, epsilon = 1e-12);
        assert_relative_eq!(on.z[1], -7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bjt_stamp_regions() {
        let mut c = Circuit::new();
        let q = c.add(Device::Bjt(Bjt::new(BjtPolarity::Npn, 100.0)));
        let topo = Topology::build(&c);
        // No ground component or source: the collector node is ground
        assert_eq!(topo.unknowns(), 2);

        let cutoff = assemble(&c, q, OperatingPoint::Bjt {
            region: BjtRegion::Cutoff,
            base_current: 1e-4,
        });
        assert_eq!(cutoff.z, vec![0.0, 0.0]);

        let active = assemble(&c, q, OperatingPoint::Bjt {
            region: BjtRegion::Active,
            base_current: 1e-4,
        });
        // base (index 0): 1/1k; emitter (index 1): 1/1k + 1/1M
        assert_relative_eq!(active.get(0, 0), 1e-3);
        assert_relative_eq!(active.get(1, 1), 1e-3 + 1e-6);
        // β·Ib = 10mA delivered into the emitter node
        assert_relative_eq!(active.z[1], 1e-2, epsilon = 1e-15);
    }

    #[test]
    fn test_previous_operating_point() {
        let mut d = Diode::default();
        d.state.conducting = true;
        assert_eq!(
            OperatingPoint::previous(&Device::Diode(d)),
            OperatingPoint::Junction { conducting: true }
        );
        assert_eq!(
            OperatingPoint::previous(&Device::Resistor(Resistor::default())),
            OperatingPoint::Linear
        );
    }

    #[test]
    fn test_same_class_ignores_base_current() {
        let a = OperatingPoint::Bjt {
            region: BjtRegion::Active,
            base_current: 1e-4,
        };
        let b = OperatingPoint::Bjt {
            region: BjtRegion::Active,
            base_current: 2e-4,
        };
        assert!(a.same_class(&b));
        assert!(!a.same_class(&OperatingPoint::Bjt {
            region: BjtRegion::Saturation,
            base_current: 1e-4,
        }));
    }
}
