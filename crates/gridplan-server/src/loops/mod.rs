//! Background loops for timed exploration and session housekeeping.

pub mod exploration_loop;
pub mod session_sweeper;
