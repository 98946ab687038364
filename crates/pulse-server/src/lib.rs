//! Session-scoped market analysis service
//!
//! A submission creates a [`Session`] and returns its id at once; a
//! [`PipelineRunner`] then takes the session through data retrieval,
//! indicators, pattern analysis, signals, optional AI insights and report
//! generation on its own task. Progress is published per session through the
//! [`ProgressBroadcaster`] and the finished HTML report lands in the
//! [`ReportStore`].
//!
//! # Example
//!
//! ```no_run
//! use pulse_server::{AnalysisService, AnalyzeRequest, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = AnalysisService::new(ServerConfig::default())?;
//! let id = service.submit(AnalyzeRequest::new("AAPL"))?;
//! println!("{}", service.status(id)?.current_step);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod broadcaster;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod service;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use broadcaster::{EventSubscription, ProgressBroadcaster, ProgressEnvelope, ProgressEvent};
pub use client::{View, ViewController, WatchOptions, watch_session};
pub use config::ServerConfig;
pub use error::{Result, ServiceError};
pub use pipeline::{PipelineRunner, Stage};
pub use registry::SessionRegistry;
pub use service::{AnalysisService, AnalyzeRequest};
pub use session::{ReportHandle, ReportSummary, Session, SessionId, SessionStatus, SubjectParameters};
pub use store::{ReportStore, StoredReport};
