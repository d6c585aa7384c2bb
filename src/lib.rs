//! An ever-changing generative sound composition engine.
//!
//! The engine arranges three layers of material against one shared clock:
//! background loops that crossfade into fresh material on a slow rotation,
//! foreground one-shots that fire at random stereo positions and retire
//! themselves, and an optional granular drone bed. Every voice plays
//! through a randomly built effect chain, and every timing decision runs
//! on the transport rather than wall-clock time.
//!
//! The surrounding application supplies the parts the engine deliberately
//! does not own: an [`audio::AudioGraph`] implementation over real audio
//! primitives, a populated [`catalog::BufferCatalog`], and a control
//! surface feeding [`commands::EngineCommand`]s. The
//! [`sequencing::Director`] ties it all together; calling `pump` on a
//! cadence is the whole integration.

pub mod audio;
pub mod catalog;
pub mod choices;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod sequencing;

pub use audio::offline::OfflineGraph;
pub use audio::AudioGraph;
pub use catalog::{BufferCatalog, BufferHandle, SoundCategory};
pub use commands::{CommandQueue, EngineCommand};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use events::{Notice, NoticeQueue};
pub use sequencing::Director;
