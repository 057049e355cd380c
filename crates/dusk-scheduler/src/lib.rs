//! dusk-scheduler — shutdown evaluation and postponement.
//!
//! Two entry points share one set of collaborators:
//!
//! - [`Evaluator`] runs the periodic pass: it starts tracking opted-in
//!   instances, sends a postpone notice once per deadline, and stops
//!   instances whose deadline has just passed.
//! - [`PostponementHandler`] redeems the one-time token from a notice and
//!   pushes the deadline back.
//!
//! # Architecture
//!
//! ```text
//! Evaluator / PostponementHandler
//!   ├── InstanceRepository (list, read tags, conditional tag writes, stop)
//!   ├── TokenStore (put, atomic take, purge)
//!   ├── Notifier (postpone + shutdown notices)
//!   └── ScheduleWriter (typed, timeout-bounded tag writes)
//! ```

pub mod error;
pub mod evaluator;
pub mod postpone;
pub mod tracking;

#[cfg(test)]
mod testing;

pub use error::{SchedulerError, SchedulerResult};
pub use evaluator::{
    Action, EvaluationReport, Evaluator, InstanceFailure, InstanceOutcome, TriggerResponse,
};
pub use postpone::{PostponeOutcome, PostponeStatus, PostponementHandler};
pub use tracking::ScheduleWriter;
