use oci_spec::image::MediaType;
use uuid::Uuid;

use registry_core::registry::{Blob as BlobTrait, Manifest as ManifestTrait, UploadSession as UploadSessionTrait};
use registry_core::OciDigest;

pub struct Blob {
    pub digest: String,
    pub byte_size: u64,
}

impl BlobTrait for Blob {
    fn bytes_on_disk(&self) -> u64 {
        self.byte_size
    }
}

#[derive(Clone)]
pub struct Manifest {
    pub digest: OciDigest,
    pub media_type: Option<MediaType>,
    pub byte_size: u64,
}

impl ManifestTrait for Manifest {
    fn bytes_on_disk(&self) -> u64 {
        self.byte_size
    }

    fn digest(&self) -> &OciDigest {
        &self.digest
    }

    fn media_type(&self) -> &Option<MediaType> {
        &self.media_type
    }
}

#[derive(Debug, Clone)]
pub struct UploadSession {
    pub uuid: Uuid,
    pub upload_id: Option<String>,
    pub chunk_number: i32,
    pub last_range_end: i64,
}

impl UploadSession {
    pub fn new() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            upload_id: None,
            chunk_number: 0,
            last_range_end: -1,
        }
    }

    /// Mirrors `registry_storage_postgres`'s session validation: the first chunk must start at
    /// byte 0, every subsequent chunk must continue immediately after the last one written.
    pub fn validate_range(&self, start: u64) -> bool {
        if self.chunk_number == 0 {
            return start == 0;
        }
        start as i64 == self.last_range_end + 1
    }
}

impl UploadSessionTrait for UploadSession {
    fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    fn upload_id(&self) -> &Option<String> {
        &self.upload_id
    }

    fn last_range_end(&self) -> i64 {
        self.last_range_end
    }
}
