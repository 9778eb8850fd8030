//! Built-in example circuits.
//!
//! Every example grounds the negative terminal of its source, so all of
//! them solve from the first tick.

use crate::circuit::{Circuit, ComponentId, Terminal, TerminalRef};
use crate::components::{
    AcVoltageSource, Bjt, BjtPolarity, Capacitor, DcVoltageSource, Device, Diode, Ground, Led,
    LedParams, Resistor, Switch,
};
use crate::error::{CircuitError, Result};

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 7] = [
    "voltage_divider",
    "rc_circuit",
    "diode_circuit",
    "led_circuit",
    "bjt_circuit",
    "oscillator_circuit",
    "switch_circuit",
];

/// Build an example by name. Case and spaces are ignored
/// (`"Voltage Divider"` works).
pub fn by_name(name: &str) -> Result<Circuit> {
    let key = name.trim().to_lowercase().replace(' ', "_");
    match key.as_str() {
        "voltage_divider" => voltage_divider(),
        "rc_circuit" => rc_circuit(),
        "diode_circuit" => diode_circuit(),
        "led_circuit" => led_circuit(),
        "bjt_circuit" => bjt_circuit(),
        "oscillator_circuit" => oscillator_circuit(),
        "switch_circuit" => switch_circuit(),
        _ => Err(CircuitError::invalid_param(format!(
            "unknown example circuit '{}' (expected one of: {})",
            name,
            NAMES.join(", ")
        ))),
    }
}

fn place(circuit: &mut Circuit, device: Device, position: (f64, f64)) -> Result<ComponentId> {
    let id = circuit.add(device);
    circuit.component_mut(id)?.position = position;
    Ok(id)
}

fn wire(circuit: &mut Circuit, a: (ComponentId, Terminal), b: (ComponentId, Terminal)) -> Result<()> {
    circuit.connect(TerminalRef::new(a.0, a.1), TerminalRef::new(b.0, b.1))
}

/// 10 V across two 1 kΩ resistors; the midpoint sits at 5 V.
pub fn voltage_divider() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(10.0)), (5.0, 5.0))?;
    let r1 = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (8.0, 5.0))?;
    let r2 = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (r1, Terminal::P1))?;
    wire(&mut c, (r1, Terminal::P2), (r2, Terminal::P1))?;
    wire(&mut c, (r2, Terminal::P2), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// 5 V charging 1 µF through 1 kΩ (τ = 1 ms).
pub fn rc_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(5.0)), (5.0, 5.0))?;
    let r = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (8.0, 5.0))?;
    let cap = place(&mut c, Device::Capacitor(Capacitor::new(1e-6)), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (r, Terminal::P1))?;
    wire(&mut c, (r, Terminal::P2), (cap, Terminal::P1))?;
    wire(&mut c, (cap, Terminal::P2), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// 5 V through 1 kΩ into a silicon diode.
pub fn diode_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(5.0)), (5.0, 5.0))?;
    let r = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (8.0, 5.0))?;
    let d = place(&mut c, Device::Diode(Diode::default()), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (r, Terminal::P1))?;
    wire(&mut c, (r, Terminal::P2), (d, Terminal::Anode))?;
    wire(&mut c, (d, Terminal::Cathode), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// 5 V through 220 Ω into a red LED.
pub fn led_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(5.0)), (5.0, 5.0))?;
    let r = place(&mut c, Device::Resistor(Resistor::new(220.0)), (8.0, 5.0))?;
    let led = place(&mut c, Device::Led(Led::new(LedParams::colored("red", 2.0))), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (r, Terminal::P1))?;
    wire(&mut c, (r, Terminal::P2), (led, Terminal::Anode))?;
    wire(&mut c, (led, Terminal::Cathode), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// Common-emitter NPN stage: 9 V, 1 kΩ collector load, 10 kΩ base feed.
pub fn bjt_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(9.0)), (5.0, 5.0))?;
    let rc = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (8.0, 3.0))?;
    let rb = place(&mut c, Device::Resistor(Resistor::new(10_000.0)), (8.0, 7.0))?;
    let q = place(&mut c, Device::Bjt(Bjt::new(BjtPolarity::Npn, 100.0)), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (rc, Terminal::P1))?;
    wire(&mut c, (rc, Terminal::P2), (q, Terminal::Collector))?;
    wire(&mut c, (v, Terminal::Pos), (rb, Terminal::P1))?;
    wire(&mut c, (rb, Terminal::P2), (q, Terminal::Base))?;
    wire(&mut c, (q, Terminal::Emitter), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// 5 V, 1 kHz sine driving an RC low-pass (1 kΩ, 1 µF).
pub fn oscillator_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::AcVoltageSource(AcVoltageSource::new(5.0, 1000.0)), (5.0, 5.0))?;
    let r = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (8.0, 5.0))?;
    let cap = place(&mut c, Device::Capacitor(Capacitor::new(1e-6)), (11.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (14.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (r, Terminal::P1))?;
    wire(&mut c, (r, Terminal::P2), (cap, Terminal::P1))?;
    wire(&mut c, (cap, Terminal::P2), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}

/// 5 V through an open switch and 1 kΩ into a green LED.
pub fn switch_circuit() -> Result<Circuit> {
    let mut c = Circuit::new();
    let v = place(&mut c, Device::DcVoltageSource(DcVoltageSource::new(5.0)), (5.0, 5.0))?;
    let sw = place(&mut c, Device::Switch(Switch::new(false)), (8.0, 5.0))?;
    let r = place(&mut c, Device::Resistor(Resistor::new(1000.0)), (11.0, 5.0))?;
    let led = place(&mut c, Device::Led(Led::new(LedParams::colored("green", 2.0))), (14.0, 5.0))?;
    let g = place(&mut c, Device::Ground(Ground::new()), (17.0, 7.0))?;

    wire(&mut c, (v, Terminal::Pos), (sw, Terminal::P1))?;
    wire(&mut c, (sw, Terminal::P2), (r, Terminal::P1))?;
    wire(&mut c, (r, Terminal::P2), (led, Terminal::Anode))?;
    wire(&mut c, (led, Terminal::Cathode), (g, Terminal::Gnd))?;
    wire(&mut c, (v, Terminal::Neg), (g, Terminal::Gnd))?;
    Ok(c)
}
