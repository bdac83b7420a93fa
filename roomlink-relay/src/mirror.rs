use crate::error::Result;
use async_trait::async_trait;
use roomlink_core::{RoomId, RoomSummary};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Best-effort copy of live rooms into the directory service
///
/// Failures never feed back into relay state.
#[async_trait]
pub trait DirectoryMirror: Send + Sync {
    async fn room_opened(&self, token: &str, summary: &RoomSummary) -> Result<()>;
    async fn room_updated(&self, token: &str, summary: &RoomSummary) -> Result<()>;
    async fn room_closed(&self, token: &str, room_id: &RoomId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MirrorOp {
    Opened(RoomSummary),
    Updated(RoomSummary),
    Closed(RoomId),
}

/// One mirror call, made with the room creator's token
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorJob {
    pub token: String,
    pub op: MirrorOp,
}

/// Run mirror calls one at a time, in the order the relay queued them
pub fn spawn_mirror_worker(
    mirror: Arc<dyn DirectoryMirror>,
) -> (UnboundedSender<MirrorJob>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<MirrorJob>();

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let result = match &job.op {
                MirrorOp::Opened(summary) => mirror.room_opened(&job.token, summary).await,
                MirrorOp::Updated(summary) => mirror.room_updated(&job.token, summary).await,
                MirrorOp::Closed(room_id) => mirror.room_closed(&job.token, room_id).await,
            };
            if let Err(e) = result {
                warn!(error = %e, op = ?job.op, "Directory mirror call failed");
            }
        }
        debug!("Mirror worker stopped");
    });

    (tx, handle)
}

/// Mirror talking to the directory's REST surface
pub struct HttpMirror {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMirror {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn room_url(&self, room_id: &RoomId) -> String {
        format!("{}/rooms/{}", self.base_url, room_id)
    }
}

#[async_trait]
impl DirectoryMirror for HttpMirror {
    #[instrument(skip(self, token, summary), fields(room_id = %summary.room_id))]
    async fn room_opened(&self, token: &str, summary: &RoomSummary) -> Result<()> {
        let body = serde_json::json!({
            "roomId": summary.room_id,
            "name": summary.name,
            "maxMembers": summary.max_members,
            "currentMembers": summary.member_count,
            "private": summary.private,
            "hasPassword": summary.has_password,
            "status": summary.status,
            "description": summary.description,
            "gameVersion": summary.game_version,
        });

        self.client
            .post(format!("{}/rooms", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        debug!("Mirrored new room");
        Ok(())
    }

    #[instrument(skip(self, token, summary), fields(room_id = %summary.room_id))]
    async fn room_updated(&self, token: &str, summary: &RoomSummary) -> Result<()> {
        let body = serde_json::json!({
            "currentMembers": summary.member_count,
            "status": summary.status,
        });

        self.client
            .patch(self.room_url(&summary.room_id))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        debug!("Mirrored room update");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn room_closed(&self, token: &str, room_id: &RoomId) -> Result<()> {
        self.client
            .delete(self.room_url(room_id))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        debug!("Mirrored room closure");
        Ok(())
    }
}
