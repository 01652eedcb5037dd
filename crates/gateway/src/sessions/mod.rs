pub mod registry;

pub use registry::{ConnectionHandle, Outbound, SessionRegistry, SessionSnapshot};
