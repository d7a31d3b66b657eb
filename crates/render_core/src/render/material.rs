//! Material identifiers carried through batching

/// Opaque material handle
///
/// The batcher does not interpret materials; it copies the id into each
/// instance record for the shader to index its material table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);
