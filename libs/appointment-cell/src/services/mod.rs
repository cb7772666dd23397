pub mod booking;
pub mod capacity;
pub mod effects;
pub mod ledger;
pub mod lifecycle;

pub use booking::{AppointmentSchedulingService, SlotLockRegistry};
pub use capacity::SlotCapacityEvaluator;
pub use effects::{SideEffectFailure, StatusSideEffectHandler};
pub use ledger::{AppointmentLedger, InMemoryAppointmentLedger};
pub use lifecycle::AppointmentLifecycle;
