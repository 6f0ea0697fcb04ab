//! Appliance operations outside the gateway core
//!
//! Volume passphrase management, file storage, key management and power
//! control live behind [`ApplianceOps`]. The gateway authenticates and
//! routes; an installed backend does the work.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, StatusCode},
};
use ilock_core::{Envelope, IlockResult};
use ilock_crypto::Registry;
use tracing::warn;

use crate::command::Command;
use crate::dispatch::Reply;

/// Context handed to backend operations
pub struct OpContext<'a> {
    pub registry: &'a Registry,
    pub headers: &'a HeaderMap,
}

#[async_trait]
pub trait ApplianceOps: Send + Sync {
    /// Run a fixed-table command the gateway does not serve itself.
    async fn execute(&self, ctx: OpContext<'_>, command: Command, body: Body) -> Reply;

    /// Stream a file previously prepared by `/api/file/download`.
    async fn download_by_id(&self, ctx: OpContext<'_>, id: &str) -> Reply;

    async fn poweroff(&self) -> IlockResult<()>;
}

/// Backend for a gateway deployed without appliance storage: every
/// operation reports that it is unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedOps;

#[async_trait]
impl ApplianceOps for UnsupportedOps {
    async fn execute(&self, _ctx: OpContext<'_>, command: Command, _body: Body) -> Reply {
        match command {
            // Upload has no envelope to carry the failure
            Command::FileUpload => Reply::raw(StatusCode::NOT_IMPLEMENTED, "upload not available"),
            _ => Reply::Envelope(Envelope::error(format!(
                "{} not available on this appliance",
                command.path()
            ))),
        }
    }

    async fn download_by_id(&self, _ctx: OpContext<'_>, _id: &str) -> Reply {
        Reply::raw(StatusCode::NOT_FOUND, "invalid download identifier")
    }

    async fn poweroff(&self) -> IlockResult<()> {
        warn!("poweroff requested but no appliance backend is installed");
        Ok(())
    }
}
