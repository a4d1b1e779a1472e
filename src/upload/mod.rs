//! Uploading finished reports to a WATS server

mod client;

pub use client::{UploadReceipt, WatsClient};

use crate::common::Result;
use async_trait::async_trait;

/// Anything that can take serialized report bytes and deliver them
#[async_trait]
pub trait ReportUploader: Send + Sync {
    /// Upload one serialized report
    async fn upload(&self, payload: &[u8]) -> Result<UploadReceipt>;
}
