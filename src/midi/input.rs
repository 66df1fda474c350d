use crossbeam::channel::Sender;
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info};

use crate::engine::EngineCommand;
use crate::error::EngineError;
use crate::events::RawMessage;

/// Connects the first input port whose name contains `name_fragment` (or the
/// first port at all when the fragment is empty) and forwards every short
/// message to the engine as [`EngineCommand::LiveMessage`].
pub fn connect_input(
    name_fragment: &str,
    commands: Sender<EngineCommand>,
) -> Result<MidiInputConnection<()>, EngineError> {
    let mut midi_in = MidiInput::new("combitone")?;
    midi_in.ignore(Ignore::All);

    let ports = midi_in.ports();
    for port in &ports {
        debug!(port = %midi_in.port_name(port).unwrap_or_default(), "MIDI input available");
    }
    let port = ports
        .iter()
        .find(|p| {
            midi_in
                .port_name(p)
                .unwrap_or_default()
                .contains(name_fragment)
        })
        .or_else(|| ports.first())
        .ok_or_else(|| EngineError::MidiInput("no MIDI input found".into()))?;

    info!(port = %midi_in.port_name(port).unwrap_or_default(), "connecting MIDI input");

    let connection = midi_in.connect(
        port,
        "combitone-input",
        move |_timestamp, message, _| {
            if let Some(raw) = RawMessage::new(message) {
                let _ = commands.send(EngineCommand::LiveMessage(raw));
            }
        },
        (),
    )?;
    Ok(connection)
}
