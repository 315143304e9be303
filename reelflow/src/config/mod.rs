//! Channel configuration types and the resolver that loads them.
//!
//! Channel differences are pure data: every stage consumes the same typed
//! [`ChannelConfig`], never a per-channel code path.

mod channel;
mod resolver;

pub use channel::{ChannelConfig, PacingTargets, SafetyRules, ScheduleTime};
pub use resolver::ConfigResolver;
