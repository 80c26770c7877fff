use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use registry_core::registry::UploadSessionStore;
use registry_core::Error as CoreError;

use super::errors::Result;
use super::state::{RepositoryData, SessionState};
use super::types::UploadSession;

#[derive(Clone)]
pub struct MemorySessionStore {
    data: Arc<RwLock<RepositoryData>>,
}

impl MemorySessionStore {
    pub(crate) fn new(data: Arc<RwLock<RepositoryData>>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl UploadSessionStore for MemorySessionStore {
    type Error = super::errors::Error;
    type UploadSession = UploadSession;

    async fn new_upload_session(&self) -> Result<Self::UploadSession> {
        let mut data = self.data.write()?;
        let session = UploadSession::new();
        data.sessions.insert(
            session.uuid,
            SessionState {
                session: session.clone(),
                buffer: Vec::new(),
            },
        );
        Ok(session)
    }

    async fn get_upload_session(&self, session_uuid: &Uuid) -> Result<Self::UploadSession> {
        let data = self.data.read()?;
        data.sessions
            .get(session_uuid)
            .map(|s| s.session.clone())
            .ok_or_else(|| CoreError::BlobUploadUnknown(None).into())
    }

    async fn delete_session(&self, session_uuid: &Uuid) -> Result<()> {
        let mut data = self.data.write()?;
        data.sessions.remove(session_uuid);
        Ok(())
    }
}
