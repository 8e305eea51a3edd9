#![warn(missing_docs)]

//! Execution tracing callbacks and recorded traces.

mod trace;
mod tracer;

pub use self::{
    trace::{Trace, TraceMessage, TraceRecorder},
    tracer::Tracer,
};
