//! Daily quiz series: durable rows in `schedulers`, in-process timers, and a delivery pipeline.

mod actor;
mod delivery;
mod worker;

pub use actor::{SchedulerHandle, spawn};
pub use delivery::{DeliveryContext, DeliveryReport, deliver};
