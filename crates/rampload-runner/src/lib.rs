//! Execution engine: HTTP clients, virtual users, the load driver and reports.

pub mod client;
pub mod driver;
pub mod error;
pub mod reporter;
pub mod simulated;
pub mod vu;

pub use client::{HttpClient, ReqwestClient};
pub use driver::LoadDriver;
pub use error::{RunError, RunResult};
pub use reporter::{ReportFormat, ResultWriter, RunOutcome};
pub use simulated::{SimulatedClient, SimulatedRoute};
