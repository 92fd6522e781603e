//! Operator panels
//!
//! Each client reads or writes one backend resource and shares no state with
//! the others. [`faults`] talks to the load-test service; everything else to
//! the primary API.

pub mod business;
pub mod faults;
pub mod loadtest;
pub mod ratelimit;

pub use business::{BusinessClient, BusinessDashboard, BusinessOverview, SalesItem};
pub use faults::{DeadlockStatus, FaultClient, DEFAULT_FAULT_TABLE};
pub use loadtest::{
    parse_goods_ids, BatchCreateParams, BatchCreated, LoadTestClient, LoadTestParams, LoadTestRun,
    OperationMix, StatusPoller,
};
pub use ratelimit::{RateLimitClient, RateLimitConfig};
