//! Parsing of PBS scheduler text output.
//!
//! Pure functions over the textual formats the scheduler's tools emit:
//! size strings, walltime and timestamp formats, and the qmgr limit-listing
//! grammar. Nothing here talks to the network.

pub mod limits;
pub mod size;
pub mod time;

pub use limits::{Limit, LimitClass, LimitError, LimitScope, Principal, parse_attribute, parse_limits};
pub use size::{format_size_bytes, parse_size_bytes};
pub use time::{format_walltime, parse_pbs_timestamp, parse_walltime_secs};
