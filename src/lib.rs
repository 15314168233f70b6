// Public modules
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod fragment;
pub mod logging;
pub mod provider;
pub mod render;
pub mod section;
pub mod session;
pub mod sse;
pub mod turn;

mod observability;

// Re-exports
pub use checkpoint::{Checkpointer, MemoryCheckpointer};
pub use classify::{Channel, Segment, Segments, classify, classify_block};
pub use config::{Config, ProviderKind};
pub use error::{Error, Result};
pub use fragment::{ContentBlock, RawFragment};
pub use observability::register_biometrics;
pub use provider::{FragmentStream, Provider};
pub use render::{Directive, DirectiveLog, PlainTextRenderer, Renderer};
pub use section::{ChannelState, finish_turn, render};
pub use session::{ChatSession, TurnOutcome};
pub use turn::{Message, Role, Turn};
