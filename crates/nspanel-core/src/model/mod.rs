// ── Card and entity model ──
//
// Cards, their entity slots and the registry that owns them. Built once
// from `PanelConfig` and never mutated afterwards; navigation and render
// state live in the session.

pub mod card;
pub mod entity;
pub mod registry;

pub use card::{Card, CardKind};
pub use entity::{Entity, EntityKind, IidAllocator, ShortId};
pub use registry::CardRegistry;
