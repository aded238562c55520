//! World-server wiring: the default handler set and the built-in opcode
//! definition table.

pub mod handlers;

/// The opcode definition table shipped with this build, used unless the
/// configuration points at an override file.
pub const DEFAULT_DEFINITIONS: &str = include_str!("../data/opcodes.ron");
