//! Turn execution: the reader/writer gate, the per-frame orchestrator,
//! pipeline executors and the idle sweep.

pub mod executor;
pub mod gate;
pub mod idle_monitor;
pub mod orchestrator;

pub use executor::{create_executor, LocalPipeline, PipelineExecutor, RemotePipeline};
pub use gate::{GateStatus, TurnGate};
pub use idle_monitor::IdleSessionMonitor;
pub use orchestrator::{parse_frame, ClientAction, SessionOrchestrator};
