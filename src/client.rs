//! Client facade (C8): the public surface composing the ring manager, page
//! I/O engine, load controller, and metadata wrappers.
//!
//! Grounded on `original_source/alluxio/client.py`'s `AlluxioClient` (the
//! single class exposing `read`, `read_range`, `write_page`, `submit_load`,
//! `load`, etc., each first resolving the preferred worker then delegating)
//! and on the teacher's facade-over-registries shape in
//! `model_gateway/src/routers/grpc/common/stages/worker_selection.rs`,
//! where a router stage resolves a worker before delegating to the RPC
//! layer.

use std::sync::Arc;
use std::time::Duration;

use crate::config::DoraClientConfig;
use crate::error::DoraResult;
use crate::load::{LoadController, LoadJobState};
use crate::metadata::{CpOption, MetadataClient, RmOption};
use crate::page_io::PageIoClient;
use crate::path;
use crate::ring_manager::RingManager;

/// The crate's public entry point. One instance per logical connection to a
/// cluster; cheap to clone (internals are `Arc`-backed where it matters).
pub struct DoraClient {
    ring_manager: Arc<RingManager>,
    page_io: PageIoClient,
    load: LoadController,
    metadata: MetadataClient,
    page_size: u64,
}

impl DoraClient {
    pub async fn new(config: DoraClientConfig) -> DoraResult<Self> {
        let ring_manager = RingManager::new(&config).await?;
        Ok(Self {
            page_io: PageIoClient::new(config.concurrency)?,
            load: LoadController::new(),
            metadata: MetadataClient::new(),
            page_size: config.page_size,
            ring_manager,
        })
    }

    fn path_id_for(path: &str) -> String {
        path::path_id(path)
    }

    async fn preferred_worker(&self, ufs_path: &str) -> DoraResult<crate::worker::WorkerNetAddress> {
        path::validate_path(ufs_path)?;
        self.ring_manager.select_preferred(ufs_path)
    }

    pub async fn list(&self, ufs_path: &str) -> DoraResult<serde_json::Value> {
        let address = self.preferred_worker(ufs_path).await?;
        self.page_io.list(&address, ufs_path).await
    }

    pub async fn stat(&self, ufs_path: &str) -> DoraResult<serde_json::Value> {
        let address = self.preferred_worker(ufs_path).await?;
        self.page_io.stat(&address, ufs_path).await
    }

    /// Reads the whole file, sequentially, from page 0 (§4.5).
    pub async fn read(&self, ufs_path: &str) -> DoraResult<Vec<u8>> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.page_io.read_full(&address, &path_id, self.page_size).await
    }

    /// Reads `[offset, offset+length)`. `length = None` means "to EOF" and
    /// is resolved via a preceding `stat` call (§4.5).
    pub async fn read_range(&self, ufs_path: &str, offset: u64, length: Option<u64>) -> DoraResult<Vec<u8>> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        let length = match length {
            Some(len) => len,
            None => {
                let file_length = self.page_io.file_length(&address, ufs_path).await?;
                file_length.saturating_sub(offset)
            }
        };
        self.page_io
            .read_range(&address, &path_id, offset, length, self.page_size)
            .await
    }

    /// Writes one full page (`bytes.len()` must equal the configured page
    /// size).
    pub async fn write_page(&self, ufs_path: &str, page_index: u64, bytes: Vec<u8>) -> DoraResult<()> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.page_io.write_page(&address, &path_id, page_index, bytes).await
    }

    pub async fn submit_load(&self, ufs_path: &str) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        self.load.submit(&address, ufs_path, false).await
    }

    pub async fn stop_load(&self, ufs_path: &str) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        self.load.stop(&address, ufs_path).await
    }

    pub async fn load_progress(&self, ufs_path: &str) -> DoraResult<(LoadJobState, String)> {
        let address = self.preferred_worker(ufs_path).await?;
        self.load.progress(&address, ufs_path, false).await
    }

    /// Submits a load job and polls until terminal or `timeout` elapses (§4.6).
    pub async fn load(&self, ufs_path: &str, timeout: Option<Duration>) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        self.load.wait_until_done(&address, ufs_path, timeout).await
    }

    pub async fn mkdir(&self, ufs_path: &str) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.metadata.mkdir(&address, &path_id, ufs_path).await
    }

    pub async fn touch(&self, ufs_path: &str) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.metadata.touch(&address, &path_id, ufs_path).await
    }

    pub async fn mv(&self, src_path: &str, dst_path: &str) -> DoraResult<bool> {
        path::validate_path(dst_path)?;
        let address = self.preferred_worker(src_path).await?;
        let path_id = Self::path_id_for(src_path);
        self.metadata.mv(&address, &path_id, src_path, dst_path).await
    }

    pub async fn rm(&self, ufs_path: &str, option: RmOption) -> DoraResult<bool> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.metadata.rm(&address, &path_id, ufs_path, option).await
    }

    pub async fn cp(&self, src_path: &str, dst_path: &str, option: CpOption) -> DoraResult<bool> {
        path::validate_path(dst_path)?;
        let address = self.preferred_worker(src_path).await?;
        let path_id = Self::path_id_for(src_path);
        self.metadata.cp(&address, &path_id, src_path, dst_path, option).await
    }

    pub async fn tail(&self, ufs_path: &str, num_of_bytes: Option<u64>) -> DoraResult<Vec<u8>> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.metadata.tail(&address, &path_id, ufs_path, num_of_bytes).await
    }

    pub async fn head(&self, ufs_path: &str, num_of_bytes: Option<u64>) -> DoraResult<Vec<u8>> {
        let address = self.preferred_worker(ufs_path).await?;
        let path_id = Self::path_id_for(ufs_path);
        self.metadata.head(&address, &path_id, ufs_path, num_of_bytes).await
    }

    /// Stops the background ring refresh task, if any, and joins it (§5).
    pub async fn shutdown(&self) {
        self.ring_manager.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> DoraClient {
        let (host, port) = server.uri().trim_start_matches("http://").split_once(':').unwrap();
        let config = DoraClientConfig::builder()
            .worker_hosts(host)
            .worker_http_port(port.parse().unwrap())
            .page_size("4B")
            .build()
            .unwrap();
        DoraClient::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn invalid_path_is_rejected_before_any_http_call() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let err = client.read("not-a-valid-path").await.unwrap_err();
        assert!(matches!(err, crate::error::DoraError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn read_delegates_to_preferred_worker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/file/.+/page/0$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'Z'; 2]))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let body = client.read("s3://bucket/key").await.unwrap();
        assert_eq!(body, vec![b'Z'; 2]);
    }
}
