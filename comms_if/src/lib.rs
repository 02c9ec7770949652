//! # Communications interface crate.
//!
//! Provides all types that cross the boundary between the navigation executable and its external
//! clients: poses in the external representation, the goal protocol, telecommands, and telemetry.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// External pose, transform and velocity types
pub mod geom;

/// Goal protocol (request, feedback, result)
pub mod goal;

/// Telecommands and their responses
pub mod tc;

/// Telemetry messages
pub mod tm;

/// Network module
pub mod net;
