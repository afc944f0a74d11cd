//! Floor data decoding
//!
//! Floor data is a level-wide array of 16-bit words. Each sector points at an
//! offset into it where a list of chunks starts:
//!
//! ```text
//! [portal][floor slant][ceiling slant][death][command sequence]
//! ```
//!
//! Every chunk is optional but the order is fixed. A command sequence is a
//! header, an activation request word, an optional object word (depending on
//! the condition) and then commands until one has its last bit set.

use crate::error::{Error, Result};
use std::sync::Arc;
use tre_common::units::timeout_to_frames;

const CHUNK_TYPE_MASK: u16 = 0x1f;
const SEQUENCE_CONDITION_MASK: u16 = 0x3f00;
const IS_LAST_BIT: u16 = 0x8000;

const TIMEOUT_MASK: u16 = 0x00ff;
const ONESHOT_BIT: u16 = 0x0100;
const ACTIVATION_MASK: u16 = 0x3e00;
const INVERTED_BIT: u16 = 0x4000;
const LOCKED_BIT: u16 = 0x8000;

const OPCODE_MASK: u16 = 0x7c00;
const PARAMETER_MASK: u16 = 0x03ff;

const CAMERA_SMOOTHNESS_MASK: u16 = 0x3e00;

/// All five activation bits set
pub const FULL_ACTIVATION: u8 = 0x1f;

/// Level-wide floor data words.
///
/// Cheap to clone; the trigger engine keeps a clone while it mutates the
/// world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloorData {
    words: Arc<[u16]>,
}

impl FloorData {
    pub fn new(words: Vec<u16>) -> Self {
        Self {
            words: words.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn cursor(&self, offset: usize) -> FloorDataCursor<'_> {
        FloorDataCursor {
            words: &self.words,
            position: offset,
        }
    }

    /// Offset of the first Death or CommandSequence chunk at `offset`.
    ///
    /// Portal and slant chunks are skipped. Returns `None` if the chunk list
    /// ends without a trigger chunk.
    pub fn locate_trigger_chunk(&self, offset: usize) -> Result<Option<usize>> {
        let mut cursor = self.cursor(offset);
        loop {
            let start = cursor.position();
            let header = ChunkHeader::from_word(cursor.read_word()?, start)?;
            match header.chunk_type {
                ChunkType::Death | ChunkType::CommandSequence => return Ok(Some(start)),
                ChunkType::Portal | ChunkType::FloorSlant | ChunkType::CeilingSlant => {
                    cursor.read_word()?;
                }
            }
            if header.is_last {
                return Ok(None);
            }
        }
    }

    /// Target room of the portal chunk at `offset`, if there is one.
    ///
    /// The portal always precedes trigger chunks, so the walk stops at the
    /// first Death or CommandSequence chunk.
    pub fn portal_target(&self, offset: usize) -> Result<Option<usize>> {
        let mut cursor = self.cursor(offset);
        loop {
            let start = cursor.position();
            let header = ChunkHeader::from_word(cursor.read_word()?, start)?;
            match header.chunk_type {
                ChunkType::Portal => return Ok(Some(usize::from(cursor.read_word()?))),
                ChunkType::FloorSlant | ChunkType::CeilingSlant => {
                    cursor.read_word()?;
                }
                ChunkType::Death | ChunkType::CommandSequence => return Ok(None),
            }
            if header.is_last {
                return Ok(None);
            }
        }
    }
}

impl From<Vec<u16>> for FloorData {
    fn from(words: Vec<u16>) -> Self {
        Self::new(words)
    }
}

/// Read position inside the floor data.
///
/// Commands and conditions consume a variable number of words; all reads go
/// through [`FloorDataCursor::read_word`] so the stream stays aligned.
#[derive(Debug, Clone)]
pub struct FloorDataCursor<'a> {
    words: &'a [u16],
    position: usize,
}

impl FloorDataCursor<'_> {
    pub fn position(&self) -> usize {
        self.position
    }

    /// Consume the next word.
    pub fn read_word(&mut self) -> Result<u16> {
        let word = self.peek_word()?;
        self.position += 1;
        Ok(word)
    }

    /// Look at the next word without consuming it.
    pub fn peek_word(&self) -> Result<u16> {
        self.words
            .get(self.position)
            .copied()
            .ok_or_else(|| Error::corrupt(self.position, "read past end of floor data"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Portal,
    FloorSlant,
    CeilingSlant,
    CommandSequence,
    Death,
}

impl ChunkType {
    fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            1 => Some(Self::Portal),
            2 => Some(Self::FloorSlant),
            3 => Some(Self::CeilingSlant),
            4 => Some(Self::CommandSequence),
            5 => Some(Self::Death),
            _ => None,
        }
    }

    fn bits(self) -> u16 {
        match self {
            Self::Portal => 1,
            Self::FloorSlant => 2,
            Self::CeilingSlant => 3,
            Self::CommandSequence => 4,
            Self::Death => 5,
        }
    }
}

/// What must hold for a command sequence to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCondition {
    LaraIsHere,
    LaraOnGround,
    /// Consumes a switch object word
    ItemActivated,
    /// Consumes a keyhole object word
    KeyUsed,
    /// Consumes a pickup object word
    ItemPickedUp,
    /// Only satisfied by heavy triggers (objects, not the player)
    ItemIsHere,
    LaraOnGroundInverted,
    LaraInCombatMode,
    Dummy,
    /// Unknown condition; treated as always satisfied
    Other(u8),
}

impl SequenceCondition {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::LaraIsHere,
            1 => Self::LaraOnGround,
            2 => Self::ItemActivated,
            3 => Self::KeyUsed,
            4 => Self::ItemPickedUp,
            5 => Self::ItemIsHere,
            6 => Self::LaraOnGroundInverted,
            7 => Self::LaraInCombatMode,
            8 => Self::Dummy,
            other => Self::Other(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::LaraIsHere => 0,
            Self::LaraOnGround => 1,
            Self::ItemActivated => 2,
            Self::KeyUsed => 3,
            Self::ItemPickedUp => 4,
            Self::ItemIsHere => 5,
            Self::LaraOnGroundInverted => 6,
            Self::LaraInCombatMode => 7,
            Self::Dummy => 8,
            Self::Other(bits) => bits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: ChunkType,
    pub is_last: bool,
    /// Only meaningful for command sequences
    pub sequence_condition: SequenceCondition,
}

impl ChunkHeader {
    /// Decode a header word read from `offset`.
    pub fn from_word(word: u16, offset: usize) -> Result<Self> {
        let chunk_type = ChunkType::from_bits(word & CHUNK_TYPE_MASK).ok_or_else(|| {
            Error::corrupt(offset, format!("unknown chunk type {}", word & CHUNK_TYPE_MASK))
        })?;
        Ok(Self {
            chunk_type,
            is_last: word & IS_LAST_BIT != 0,
            sequence_condition: SequenceCondition::from_bits(((word & SEQUENCE_CONDITION_MASK) >> 8) as u8),
        })
    }

    pub fn to_word(&self) -> u16 {
        let mut word =
            self.chunk_type.bits() | ((u16::from(self.sequence_condition.bits()) << 8) & SEQUENCE_CONDITION_MASK);
        if self.is_last {
            word |= IS_LAST_BIT;
        }
        word
    }
}

/// Activation bits, timeout and flags of an object, flip slot or track.
///
/// The same layout encodes activation requests in a command sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationState {
    timeout: u8,
    oneshot: bool,
    inverted: bool,
    locked: bool,
    activation_set: u8,
}

impl ActivationState {
    pub fn from_word(word: u16) -> Self {
        Self {
            timeout: (word & TIMEOUT_MASK) as u8,
            oneshot: word & ONESHOT_BIT != 0,
            inverted: word & INVERTED_BIT != 0,
            locked: word & LOCKED_BIT != 0,
            activation_set: ((word & ACTIVATION_MASK) >> 9) as u8,
        }
    }

    pub fn to_word(&self) -> u16 {
        let mut word = u16::from(self.timeout) | ((u16::from(self.activation_set) << 9) & ACTIVATION_MASK);
        if self.oneshot {
            word |= ONESHOT_BIT;
        }
        if self.inverted {
            word |= INVERTED_BIT;
        }
        if self.locked {
            word |= LOCKED_BIT;
        }
        word
    }

    /// Request with the given bits and no flags
    pub fn with_activation_set(activation_set: u8) -> Self {
        Self {
            activation_set: activation_set & FULL_ACTIVATION,
            ..Self::default()
        }
    }

    /// Timeout in seconds as stored in level data
    pub fn timeout(&self) -> u8 {
        self.timeout
    }

    /// Timeout in simulation frames
    pub fn timeout_frames(&self) -> u32 {
        timeout_to_frames(self.timeout)
    }

    pub fn set_timeout(&mut self, timeout: u8) {
        self.timeout = timeout;
    }

    pub fn activation_set(&self) -> u8 {
        self.activation_set
    }

    pub fn set_activation_set(&mut self, bits: u8) {
        self.activation_set = bits & FULL_ACTIVATION;
    }

    pub fn is_fully_activated(&self) -> bool {
        self.activation_set == FULL_ACTIVATION
    }

    pub fn is_oneshot(&self) -> bool {
        self.oneshot
    }

    pub fn set_oneshot(&mut self, oneshot: bool) {
        self.oneshot = oneshot;
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Merge requested bits according to the sequence condition.
    ///
    /// Switches toggle (XOR), inverted pads clear (AND NOT), everything else
    /// sets (OR).
    pub fn combine(&mut self, request: u8, condition: SequenceCondition) {
        let request = request & FULL_ACTIVATION;
        self.activation_set = match condition {
            SequenceCondition::ItemActivated => self.activation_set ^ request,
            SequenceCondition::LaraOnGroundInverted => self.activation_set & !request,
            _ => self.activation_set | request,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOpcode {
    Activate,
    SwitchCamera,
    UnderwaterCurrent,
    FlipMap,
    FlipOn,
    FlipOff,
    LookAt,
    EndLevel,
    PlayTrack,
    FlipEffect,
    Secret,
    /// Not interpreted
    Other(u8),
}

impl CommandOpcode {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Activate,
            1 => Self::SwitchCamera,
            2 => Self::UnderwaterCurrent,
            3 => Self::FlipMap,
            4 => Self::FlipOn,
            5 => Self::FlipOff,
            6 => Self::LookAt,
            7 => Self::EndLevel,
            8 => Self::PlayTrack,
            9 => Self::FlipEffect,
            10 => Self::Secret,
            other => Self::Other(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Activate => 0,
            Self::SwitchCamera => 1,
            Self::UnderwaterCurrent => 2,
            Self::FlipMap => 3,
            Self::FlipOn => 4,
            Self::FlipOff => 5,
            Self::LookAt => 6,
            Self::EndLevel => 7,
            Self::PlayTrack => 8,
            Self::FlipEffect => 9,
            Self::Secret => 10,
            Self::Other(bits) => bits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: CommandOpcode,
    pub parameter: u16,
    pub is_last: bool,
}

impl Command {
    pub fn new(opcode: CommandOpcode, parameter: u16, is_last: bool) -> Self {
        Self {
            opcode,
            parameter: parameter & PARAMETER_MASK,
            is_last,
        }
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            opcode: CommandOpcode::from_bits(((word & OPCODE_MASK) >> 10) as u8),
            parameter: word & PARAMETER_MASK,
            is_last: word & IS_LAST_BIT != 0,
        }
    }

    pub fn to_word(&self) -> u16 {
        let mut word = ((u16::from(self.opcode.bits()) << 10) & OPCODE_MASK) | (self.parameter & PARAMETER_MASK);
        if self.is_last {
            word |= IS_LAST_BIT;
        }
        word
    }
}

/// Extra word following a SwitchCamera command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraParameters {
    /// Seconds; stored as a signed byte
    pub timeout: i8,
    pub oneshot: bool,
    pub smoothness: u16,
    /// Terminates the whole command sequence
    pub is_last: bool,
}

impl CameraParameters {
    pub fn from_word(word: u16) -> Self {
        Self {
            timeout: (word & TIMEOUT_MASK) as u8 as i8,
            oneshot: word & ONESHOT_BIT != 0,
            smoothness: (word & CAMERA_SMOOTHNESS_MASK) >> 6,
            is_last: word & IS_LAST_BIT != 0,
        }
    }

    pub fn to_word(&self) -> u16 {
        let mut word = u16::from(self.timeout as u8) | ((self.smoothness << 6) & CAMERA_SMOOTHNESS_MASK);
        if self.oneshot {
            word |= ONESHOT_BIT;
        }
        if self.is_last {
            word |= IS_LAST_BIT;
        }
        word
    }

    /// Timeout in simulation frames; negative timeouts count as none
    pub fn timeout_frames(&self) -> u32 {
        u8::try_from(self.timeout).map_or(0, timeout_to_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_word_layout() {
        let state = ActivationState::from_word(0x4000 | 0x3e00 | 0x0100 | 5);
        assert_eq!(state.timeout(), 5);
        assert_eq!(state.timeout_frames(), 150);
        assert!(state.is_oneshot());
        assert!(state.is_inverted());
        assert!(!state.is_locked());
        assert!(state.is_fully_activated());
        assert_eq!(state.to_word(), 0x4000 | 0x3e00 | 0x0100 | 5);
    }

    #[test]
    fn test_combine_rules() {
        let mut state = ActivationState::with_activation_set(0b00110);

        state.combine(0b00011, SequenceCondition::ItemActivated);
        assert_eq!(state.activation_set(), 0b00101);

        state.combine(0b00100, SequenceCondition::LaraOnGroundInverted);
        assert_eq!(state.activation_set(), 0b00001);

        state.combine(0b11110, SequenceCondition::LaraIsHere);
        assert!(state.is_fully_activated());
    }

    #[test]
    fn test_command_word_layout() {
        let command = Command::from_word(0x8000 | (10 << 10) | 3);
        assert_eq!(command.opcode, CommandOpcode::Secret);
        assert_eq!(command.parameter, 3);
        assert!(command.is_last);
        assert_eq!(CommandOpcode::from_bits(15), CommandOpcode::Other(15));
    }

    #[test]
    fn test_camera_word_layout() {
        let params = CameraParameters::from_word(0x8000 | 0x0100 | (0x10 << 9) | 0xff);
        assert_eq!(params.timeout, -1);
        assert_eq!(params.timeout_frames(), 0);
        assert!(params.oneshot);
        assert_eq!(params.smoothness, 0x10 << 3);
        assert!(params.is_last);
    }

    #[test]
    fn test_header_word_layout() {
        let header = ChunkHeader::from_word(0x8000 | (2 << 8) | 4, 0).unwrap();
        assert_eq!(header.chunk_type, ChunkType::CommandSequence);
        assert_eq!(header.sequence_condition, SequenceCondition::ItemActivated);
        assert!(header.is_last);
        assert_eq!(header.to_word(), 0x8000 | (2 << 8) | 4);

        assert!(matches!(
            ChunkHeader::from_word(0x1f, 7),
            Err(Error::CorruptFloorData { offset: 7, .. })
        ));
        assert_eq!(
            ChunkHeader::from_word(4 | (0x3f << 8), 0).unwrap().sequence_condition,
            SequenceCondition::Other(0x3f)
        );
    }

    #[test]
    fn test_locate_skips_geometry_chunks() {
        // portal(room 3), floor slant, command sequence
        let data = FloorData::new(vec![1, 3, 2, 0x0101, 0x8004, 0x3e00, 0x8000]);
        assert_eq!(data.locate_trigger_chunk(0).unwrap(), Some(4));
        assert_eq!(data.portal_target(0).unwrap(), Some(3));
        assert_eq!(data.portal_target(2).unwrap(), None);
    }

    #[test]
    fn test_locate_without_trigger() {
        let data = FloorData::new(vec![0x8002, 0x0000]);
        assert_eq!(data.locate_trigger_chunk(0).unwrap(), None);

        let truncated = FloorData::new(vec![0x0002]);
        assert!(truncated.locate_trigger_chunk(0).is_err());
    }

    #[test]
    fn test_cursor_peek_does_not_advance() {
        let data = FloorData::new(vec![7, 8]);
        let mut cursor = data.cursor(0);
        assert_eq!(cursor.peek_word().unwrap(), 7);
        assert_eq!(cursor.read_word().unwrap(), 7);
        assert_eq!(cursor.read_word().unwrap(), 8);
        assert!(cursor.peek_word().is_err());
        assert_eq!(cursor.position(), 2);
    }
}
