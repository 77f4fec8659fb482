pub mod constants;
pub mod syndrome;
pub mod block;
pub mod drift;
pub mod pi_tracker;
pub mod diversity;
pub mod emitter;
pub mod config;
pub mod error;
pub mod decoder;
pub mod simulation;
pub mod tracing_init;

pub use block::{BlockClass, BlockDecoder, DecodedBlock, GroupDecode, OffsetWord, RawGroup};
pub use config::{DecoderConfig, DiversityMode, EccThreshold, PiIntegration};
pub use decoder::{is_gap, RdsDecoder, SyncState, Transition, GAP};
pub use emitter::{Datagram, GroupEmitter};
pub use error::ConfigError;
pub use syndrome::{syndrome, SyndromeEntry, SyndromeLocatorTable, SYNDROME_TABLE};
