//! Netpipe Core Library
//!
//! Measurement core of the netpipe ping-pong benchmark: aligned buffer
//! pools, cache flushing, blocking transports, role rendezvous, the size
//! sweep and the timed trial loop. Also hosts the RAPL package energy
//! reader used by the `energy` subcommand.

pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod energy;
pub mod error;
pub mod integrity;
pub mod schedule;
pub mod transport;
pub mod trial;
pub mod types;

// Re-export commonly used types
pub use config::{BenchConfig, BenchSettings, ConfigLoader};
pub use coordinator::Coordinator;
pub use energy::{EnergyPaths, EnergyReader, EnergySnapshot};
pub use error::{
    BufferError, ConfigError, EnergyError, IntegrityError, NetpipeError, NetpipeResult,
    TransportError,
};
pub use transport::{ChannelTransport, TcpOptions, TcpTransport, Transport};
pub use trial::{ResultSink, SizePoint, SizeResult, TrialLoop, TrialPhase};
pub use types::{BufferOffsets, CacheMode, Port, RepeatPolicy, Role, SizeRange};
