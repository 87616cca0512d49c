//! C4: per-instruction SQL fragment builders (§4.4).

pub mod cursor;
pub mod including;
pub mod limit;
pub mod order;
pub mod preset;
pub mod select;
pub mod to;
pub mod with;
