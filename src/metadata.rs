//! Metadata wrappers (§4.8 ambient supplement): `mkdir`/`touch`/`mv`/`rm`/
//! `cp`/`tail`/`head` against the same worker + path-id plumbing as the
//! page I/O engine.
//!
//! Grounded on `original_source/alluxio/client.py` (`_create`, `move`,
//! `remove`, `copy`, `_ends`/`tail`/`head`): those wrappers POST/GET against
//! per-file endpoints addressed by `path_id`, exactly like the page
//! endpoints in §4.5. The source's exact URL-format constants for these
//! calls are not present in the retrieved Python sources (only the page,
//! list/info, and load endpoints are), so this module extends the `/v1/file/<pathId>/...`
//! shape already defined for pages to the remaining operations rather than
//! inventing an unrelated scheme.

use crate::error::{DoraError, DoraResult};
use crate::worker::WorkerNetAddress;

#[derive(Debug, Clone, Default)]
pub struct RmOption {
    pub recursive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CpOption {
    pub recursive: bool,
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    fn base_url(address: &WorkerNetAddress, path_id: &str) -> String {
        format!(
            "http://{}:{}/v1/file/{path_id}",
            address.host, address.http_server_port
        )
    }

    async fn post(&self, url: String, params: &[(&str, String)], path: &str) -> DoraResult<bool> {
        let response = self
            .http
            .post(&url)
            .query(params)
            .send()
            .await
            .map_err(|source| DoraError::FileStatus {
                path: path.to_string(),
                source,
            })?;
        Ok(response.status().is_success())
    }

    pub async fn mkdir(&self, address: &WorkerNetAddress, path_id: &str, path: &str) -> DoraResult<bool> {
        let url = format!("{}/mkdir", Self::base_url(address, path_id));
        self.post(url, &[("path", path.to_string())], path).await
    }

    pub async fn touch(&self, address: &WorkerNetAddress, path_id: &str, path: &str) -> DoraResult<bool> {
        let url = format!("{}/touch", Self::base_url(address, path_id));
        self.post(url, &[("path", path.to_string())], path).await
    }

    pub async fn mv(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        src_path: &str,
        dst_path: &str,
    ) -> DoraResult<bool> {
        let url = format!("{}/mv", Self::base_url(address, path_id));
        self.post(
            url,
            &[
                ("srcPath", src_path.to_string()),
                ("dstPath", dst_path.to_string()),
            ],
            src_path,
        )
        .await
    }

    pub async fn rm(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        path: &str,
        option: RmOption,
    ) -> DoraResult<bool> {
        let url = format!("{}/rm", Self::base_url(address, path_id));
        self.post(
            url,
            &[
                ("path", path.to_string()),
                ("recursive", option.recursive.to_string()),
            ],
            path,
        )
        .await
    }

    pub async fn cp(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        src_path: &str,
        dst_path: &str,
        option: CpOption,
    ) -> DoraResult<bool> {
        let url = format!("{}/cp", Self::base_url(address, path_id));
        self.post(
            url,
            &[
                ("srcPath", src_path.to_string()),
                ("dstPath", dst_path.to_string()),
                ("recursive", option.recursive.to_string()),
            ],
            src_path,
        )
        .await
    }

    async fn ends(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        path: &str,
        endpoint: &str,
        num_of_bytes: Option<u64>,
    ) -> DoraResult<Vec<u8>> {
        let url = format!("{}/{endpoint}", Self::base_url(address, path_id));
        let mut request = self.http.get(&url).query(&[("path", path)]);
        if let Some(n) = num_of_bytes {
            request = request.query(&[("numOfBytes", n)]);
        }
        let response = request.send().await.map_err(|source| DoraError::FileStatus {
            path: path.to_string(),
            source,
        })?;
        let response = response.error_for_status().map_err(|source| DoraError::FileStatus {
            path: path.to_string(),
            source,
        })?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn tail(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        path: &str,
        num_of_bytes: Option<u64>,
    ) -> DoraResult<Vec<u8>> {
        self.ends(address, path_id, path, "tail", num_of_bytes).await
    }

    pub async fn head(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        path: &str,
        num_of_bytes: Option<u64>,
    ) -> DoraResult<Vec<u8>> {
        self.ends(address, path_id, path, "head", num_of_bytes).await
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(server: &MockServer) -> WorkerNetAddress {
        let (host, port) = server.uri().trim_start_matches("http://").split_once(':').unwrap();
        WorkerNetAddress::from_host(host, port.parse().unwrap())
    }

    #[tokio::test]
    async fn mkdir_reports_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/file/abc/mkdir"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = MetadataClient::new();
        assert!(client.mkdir(&address(&server), "abc", "s3://b/dir").await.unwrap());
    }

    #[tokio::test]
    async fn rm_reports_failure_on_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/file/abc/rm"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MetadataClient::new();
        let ok = client
            .rm(&address(&server), "abc", "s3://b/x", RmOption::default())
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn tail_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/tail"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"last bytes".to_vec()))
            .mount(&server)
            .await;

        let client = MetadataClient::new();
        let body = client
            .tail(&address(&server), "abc", "s3://b/x", Some(10))
            .await
            .unwrap();
        assert_eq!(body, b"last bytes");
    }
}
