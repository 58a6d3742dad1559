pub mod attributes;
pub mod frame;
pub mod stage;

pub use attributes::{AttributeTable, Gender, Person};
pub use frame::{FaceSet, Frame, ThumbnailTemplate};
pub use stage::{run_stage, Outlet, Stage, StageKind};
