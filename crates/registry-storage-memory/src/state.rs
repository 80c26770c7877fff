use std::collections::HashMap;

use bytes::Bytes;
use uuid::Uuid;

use super::types::UploadSession;

#[derive(Clone)]
pub(crate) struct StoredBlob {
    pub bytes: Bytes,
}

#[derive(Clone)]
pub(crate) struct StoredManifest {
    pub bytes: Bytes,
    pub manifest: super::types::Manifest,
}

pub(crate) struct SessionState {
    pub session: UploadSession,
    pub buffer: Vec<u8>,
}

/// All state for a single repository: content-addressed blobs, content-addressed manifests,
/// the tag namespace pointing into that manifest set, and in-flight upload sessions.
#[derive(Default)]
pub(crate) struct RepositoryData {
    pub blobs: HashMap<String, StoredBlob>,
    pub manifests: HashMap<String, StoredManifest>,
    pub tags: HashMap<String, String>,
    pub sessions: HashMap<Uuid, SessionState>,
}

impl RepositoryData {
    pub fn new() -> Self {
        Self::default()
    }
}
