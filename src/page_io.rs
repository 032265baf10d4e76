//! Page I/O engine (C6): GET/POST page traffic against a chosen worker.
//!
//! Grounded on `original_source/alluxio/client.py` (`_read_page`,
//! `read_range`, `read`, `write_page`) for the exact page-boundary
//! arithmetic and termination rules, and on `reqwest`-pool usage patterns
//! already present in `data_connector/src/core.rs` for the HTTP client
//! construction idiom (builder with a timeout and a sized connection pool).

use crate::error::{DoraError, DoraResult};
use crate::worker::WorkerNetAddress;

/// Thin wrapper over a pooled `reqwest::Client`, sized by `concurrency`
/// (§4.5). The same pool backs both full-page and range-page requests;
/// writes get their own short-lived connections to avoid head-of-line
/// blocking of concurrent reads sharing the pool.
#[derive(Debug, Clone)]
pub struct PageIoClient {
    http: reqwest::Client,
    write_http: reqwest::Client,
}

impl PageIoClient {
    pub fn new(concurrency: usize) -> DoraResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(concurrency)
            .build()
            .map_err(|e| DoraError::Transport(format!("build page I/O HTTP client: {e}")))?;
        let write_http = reqwest::Client::builder()
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| DoraError::Transport(format!("build page write HTTP client: {e}")))?;
        Ok(Self { http, write_http })
    }

    fn base_url(address: &WorkerNetAddress) -> String {
        format!("http://{}:{}", address.host, address.http_server_port)
    }

    /// `GET /v1/files?path=<ufs>`
    pub async fn list(&self, address: &WorkerNetAddress, path: &str) -> DoraResult<serde_json::Value> {
        let url = format!("{}/v1/files", Self::base_url(address));
        let response = self
            .http
            .get(&url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|source| DoraError::FileStatus {
                path: path.to_string(),
                source,
            })?;
        let response = response.error_for_status().map_err(|source| DoraError::FileStatus {
            path: path.to_string(),
            source,
        })?;
        Ok(response.json().await?)
    }

    /// `GET /v1/info?path=<ufs>`
    pub async fn stat(&self, address: &WorkerNetAddress, path: &str) -> DoraResult<serde_json::Value> {
        let url = format!("{}/v1/info", Self::base_url(address));
        let response = self
            .http
            .get(&url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|source| DoraError::FileStatus {
                path: path.to_string(),
                source,
            })?;
        let response = response.error_for_status().map_err(|source| DoraError::FileStatus {
            path: path.to_string(),
            source,
        })?;
        Ok(response.json().await?)
    }

    /// Reads the `mLength` field from a `stat` response, used to resolve
    /// `length == -1`/unset range reads to an explicit EOF bound.
    pub async fn file_length(&self, address: &WorkerNetAddress, path: &str) -> DoraResult<u64> {
        let info = self.stat(address, path).await?;
        let entry = info.as_array().and_then(|a| a.first()).unwrap_or(&info);
        entry
            .get("mLength")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| DoraError::StatParse {
                path: path.to_string(),
                field: "mLength".to_string(),
            })
    }

    async fn get_page(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        page_index: u64,
        range: Option<(u32, u32)>,
    ) -> Result<Vec<u8>, reqwest::Error> {
        let url = format!(
            "{}/v1/file/{path_id}/page/{page_index}",
            Self::base_url(address)
        );
        let mut request = self.http.get(&url);
        if let Some((offset, length)) = range {
            request = request.query(&[("offset", offset), ("length", length)]);
        }
        tracing::debug!(%url, page_index, ?range, "fetching page");
        let started = std::time::Instant::now();
        let response = request.send().await?.error_for_status()?;
        let body = response.bytes().await?.to_vec();
        crate::metrics::page_read_latency(started.elapsed().as_secs_f64());
        Ok(body)
    }

    /// Reads a whole file sequentially from page 0 (§4.5 full-file rules).
    pub async fn read_full(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        page_size: u64,
    ) -> DoraResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut index = 0u64;
        loop {
            match self.get_page(address, path_id, index, None).await {
                Ok(body) => {
                    let short = (body.len() as u64) < page_size;
                    let empty = body.is_empty();
                    out.extend_from_slice(&body);
                    if empty || short {
                        break;
                    }
                }
                Err(source) => {
                    if index == 0 {
                        return Err(DoraError::PageRead {
                            path_id: path_id.to_string(),
                            page_index: index,
                            source,
                        });
                    }
                    // Failure on a non-first page can't be told apart from
                    // end-of-file on the server side; stop silently.
                    break;
                }
            }
            index += 1;
        }
        Ok(out)
    }

    /// Reads `[offset, offset+length)` (§4.5 range rules). A `length` of
    /// `None` means "to EOF", resolved by the caller via `file_length`
    /// before calling this (the engine itself performs no implicit stat).
    pub async fn read_range(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        offset: u64,
        length: u64,
        page_size: u64,
    ) -> DoraResult<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let p = page_size;
        let s = offset / p;
        let off_s = (offset % p) as u32;
        let last_byte = offset + length - 1;
        let e = last_byte / p;
        let end_read_to = ((last_byte % p) + 1) as u32;

        let mut out = Vec::new();
        for index in s..=e {
            let (page_offset, page_len) = if index == s && index == e {
                (off_s, end_read_to - off_s)
            } else if index == s {
                (off_s, (p as u32) - off_s)
            } else if index == e {
                (0, end_read_to)
            } else {
                (0, p as u32)
            };

            let range = if page_offset == 0 && page_len as u64 == p {
                None
            } else {
                Some((page_offset, page_len))
            };

            match self.get_page(address, path_id, index, range).await {
                Ok(body) => {
                    let short = (body.len() as u32) < page_len;
                    out.extend_from_slice(&body);
                    if short {
                        break;
                    }
                }
                Err(source) => {
                    if index == s {
                        return Err(DoraError::PageRead {
                            path_id: path_id.to_string(),
                            page_index: index,
                            source,
                        });
                    }
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Writes a full page. `bytes.len()` must equal the configured page
    /// size; the caller enforces this (§4.5 "MUST BE FULL PAGE").
    pub async fn write_page(
        &self,
        address: &WorkerNetAddress,
        path_id: &str,
        page_index: u64,
        bytes: Vec<u8>,
    ) -> DoraResult<()> {
        let url = format!(
            "{}/v1/file/{path_id}/page/{page_index}",
            Self::base_url(address)
        );
        let started = std::time::Instant::now();
        let response = self
            .write_http
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| DoraError::PageWrite {
                path_id: path_id.to_string(),
                page_index,
                reason: e.to_string(),
            })?;
        crate::metrics::page_write_latency(started.elapsed().as_secs_f64());

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DoraError::PageWrite {
                path_id: path_id.to_string(),
                page_index,
                reason: format!("server returned {}", response.status()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address(server: &MockServer) -> WorkerNetAddress {
        let (host, port) = server
            .uri()
            .trim_start_matches("http://")
            .split_once(':')
            .unwrap();
        WorkerNetAddress::from_host(host, port.parse().unwrap())
    }

    #[tokio::test]
    async fn read_full_stops_on_short_final_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'A'; 4]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'B'; 2]))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        let body = client
            .read_full(&address(&server), "abc", 4)
            .await
            .unwrap();
        assert_eq!(body, [b'A', b'A', b'A', b'A', b'B', b'B']);
    }

    #[tokio::test]
    async fn read_full_surfaces_page_zero_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        let err = client.read_full(&address(&server), "abc", 4).await.unwrap_err();
        assert!(matches!(err, DoraError::PageRead { page_index: 0, .. }));
    }

    #[tokio::test]
    async fn read_full_swallows_failure_past_first_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'A'; 4]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        let body = client.read_full(&address(&server), "abc", 4).await.unwrap();
        assert_eq!(body, vec![b'A'; 4]);
    }

    #[tokio::test]
    async fn range_read_crosses_page_boundary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'A'; 3]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'B'; 3]))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        // page_size = 4, offset = 1 (= P - 3), length = 6
        let body = client
            .read_range(&address(&server), "abc", 1, 6, 4)
            .await
            .unwrap();
        assert_eq!(body, [b'A', b'A', b'A', b'B', b'B', b'B']);
    }

    #[tokio::test]
    async fn range_read_of_zero_length_issues_no_io() {
        let server = MockServer::start().await;
        let client = PageIoClient::new(4).unwrap();
        let body = client
            .read_range(&address(&server), "abc", 0, 0, 4)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn write_page_then_read_back_via_range() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'X'; 4]))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        client
            .write_page(&address(&server), "abc", 0, vec![b'X'; 4])
            .await
            .unwrap();
        let body = client.read_range(&address(&server), "abc", 0, 4, 4).await.unwrap();
        assert_eq!(body, vec![b'X'; 4]);
    }

    #[tokio::test]
    async fn write_page_failure_surfaces_page_write_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/file/abc/page/0"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PageIoClient::new(4).unwrap();
        let err = client
            .write_page(&address(&server), "abc", 0, vec![b'X'; 4])
            .await
            .unwrap_err();
        assert!(matches!(err, DoraError::PageWrite { .. }));
    }
}

