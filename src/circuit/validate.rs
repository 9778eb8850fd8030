//! Circuit validation.

use crate::error::{CircuitError, Result};

use super::{Circuit, TerminalRef};

/// Validate the connection table of a circuit.
///
/// Checks:
/// - Every recorded terminal exists on its component
/// - Every peer component and peer terminal exists
/// - No terminal lists itself or the same peer twice
/// - Every connection is recorded on both sides
pub fn validate_circuit(circuit: &Circuit) -> Result<()> {
    for component in circuit.components() {
        for (terminal, peers) in component.connections() {
            component.check_terminal(*terminal).map_err(|e| {
                CircuitError::invalid_document(format!("component {}: {}", component.id, e))
            })?;
            let local = TerminalRef::new(component.id, *terminal);

            for (i, peer) in peers.iter().enumerate() {
                if *peer == local {
                    return Err(CircuitError::invalid_document(format!(
                        "terminal {} is connected to itself",
                        local
                    )));
                }
                if peers[..i].contains(peer) {
                    return Err(CircuitError::invalid_document(format!(
                        "terminal {} lists {} twice",
                        local, peer
                    )));
                }

                let other = circuit.get(peer.component).ok_or_else(|| {
                    CircuitError::invalid_document(format!(
                        "terminal {} references missing component {}",
                        local, peer.component
                    ))
                })?;
                if !other.has_terminal(peer.terminal) {
                    return Err(CircuitError::invalid_document(format!(
                        "terminal {} references unknown terminal {}",
                        local, peer
                    )));
                }
                if !other.is_connected(peer.terminal, local) {
                    return Err(CircuitError::invalid_document(format!(
                        "connection {} -> {} is not recorded on both sides",
                        local, peer
                    )));
                }
            }
        }
    }

    Ok(())
}
