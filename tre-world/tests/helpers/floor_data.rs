//! Floor data word encoders

use tre_world::{
    ActivationState, CameraParameters, ChunkHeader, ChunkType, Command, CommandOpcode, ObjectId,
    SequenceCondition,
};

pub fn header(chunk_type: ChunkType, condition: SequenceCondition, is_last: bool) -> u16 {
    ChunkHeader {
        chunk_type,
        is_last,
        sequence_condition: condition,
    }
    .to_word()
}

/// Activation request word
pub fn request(bits: u8, oneshot: bool, timeout: u8) -> u16 {
    let mut state = ActivationState::with_activation_set(bits);
    state.set_oneshot(oneshot);
    state.set_timeout(timeout);
    state.to_word()
}

pub fn command(opcode: CommandOpcode, parameter: u16, is_last: bool) -> u16 {
    Command::new(opcode, parameter, is_last).to_word()
}

/// Parameter word following a SwitchCamera command
pub fn camera_word(timeout: i8, oneshot: bool, is_last: bool) -> u16 {
    CameraParameters {
        timeout,
        oneshot,
        smoothness: 0,
        is_last,
    }
    .to_word()
}

/// A complete, last command sequence chunk.
///
/// The final command gets the last bit. Commands that need extra words
/// (SwitchCamera) are not supported here.
pub fn sequence(
    condition: SequenceCondition,
    request_word: u16,
    object: Option<ObjectId>,
    commands: &[(CommandOpcode, u16)],
) -> Vec<u16> {
    let mut words = vec![header(ChunkType::CommandSequence, condition, true), request_word];
    if let Some(id) = object {
        words.push(id);
    }
    for (i, (opcode, parameter)) in commands.iter().enumerate() {
        words.push(command(*opcode, *parameter, i + 1 == commands.len()));
    }
    words
}
