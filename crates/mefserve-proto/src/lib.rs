//! mefserve protocol buffer definitions.
//!
//! Generated message types plus the tonic service trait and client for the
//! `MefServe` API.
//!
//! ## Usage
//!
//! ### Client-side
//!
//! ```ignore
//! use mefserve_proto::mefserve::{
//!     mef_serve_client::MefServeClient, OpenFileRequest, GetSignalSegmentRequest,
//! };
//!
//! let mut client = MefServeClient::connect("http://localhost:50051").await?;
//! client
//!     .open_file(OpenFileRequest { file_path: "/data/session01.mefd".into() })
//!     .await?;
//! let segment = client
//!     .get_signal_segment(GetSignalSegmentRequest {
//!         file_path: "/data/session01.mefd".into(),
//!         segment_index: 0,
//!     })
//!     .await?
//!     .into_inner();
//! ```
//!
//! ### Server-side
//!
//! ```ignore
//! use mefserve_proto::mefserve::mef_serve_server::{MefServe, MefServeServer};
//! ```

/// Generated `mefserve` package: messages, service trait, client.
pub mod mefserve {
    tonic::include_proto!("mefserve");
}
