//! Turn accumulation and completion policy.
//!
//! Everything here is independent of HTTP and of any concrete backend: the
//! pieces take the collaborator traits and plain data, and `agent` wires them
//! together per request.

pub mod accumulator;
pub mod encoding;
pub mod fallback;
pub mod locks;
pub mod projection;
pub mod selection;
