pub mod bundle;
pub mod elements;
pub mod events;
pub mod naming;
pub mod options;
pub mod tasks;

pub use bundle::{ComponentArtifact, GeneratedArtifactBundle};
pub use elements::{Shape, ShapeElement};
pub use events::{EventPayload, EventWriter};
pub use options::{FrameworkVersion, ProjectOptions, StyleLanguage, StylingAddOn};
