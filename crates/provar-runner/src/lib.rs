pub mod error;
pub mod ledger;
pub mod report;
pub mod run;
pub mod verify;

pub use error::RunError;
pub use ledger::{AuditEvent, LedgerEntry, RunLedger};
pub use report::{DestroyReport, FlowSelection, RunReport, RunRequest, Step};
pub use run::{destroy, run};
pub use verify::{Finding, Severity};
