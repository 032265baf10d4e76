//! Client-side routing and page-I/O core for a distributed page-cache tier
//! fronting UFS storage (S3, HDFS, ...): membership discovery and a
//! consistent-hash ring (C1-C4), a page-addressing I/O engine (C5-C6), the
//! asynchronous load-job control protocol (C7), and the public client facade
//! (C8) that composes them. See `SPEC_FULL.md` for the full component
//! breakdown.

pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod load;
pub mod metadata;
pub mod metrics;
pub mod page_io;
pub mod path;
pub mod registry;
pub mod ring_manager;
pub mod worker;

pub use client::DoraClient;
pub use config::{DoraClientConfig, DoraClientConfigBuilder, MembershipSource};
pub use error::{DoraError, DoraResult};
pub use load::LoadJobState;
pub use metadata::{CpOption, RmOption};
pub use worker::{WorkerEntity, WorkerIdentity, WorkerNetAddress};
