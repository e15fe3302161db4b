use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{ListedObject, RemoteStore, StorageError, StorageLister, StorageTransfer};

const REQUIRED_SAS_PARAMS: [&str; 2] = ["sv", "sig"];

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
            pool_max_idle_per_host: 10,
        }
    }
}

/// A container (plus optional folder inside it) addressed by a SAS URL.
///
/// `https://acct.blob.core.windows.net/container/root/folder1?sv=..&sig=..`
/// has container `container` and additional path `root/folder1`. Object ids
/// handed to and returned from the store are relative to the additional path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasLocation {
    /// Scheme, host and container path without query.
    container_url: Url,
    container: String,
    additional_path: String,
    /// Raw SAS query, appended verbatim to every request.
    sas_query: String,
}

impl SasLocation {
    pub fn parse(sas_url: &str) -> Result<Self, StorageError> {
        let url = Url::parse(sas_url.trim())
            .map_err(|err| StorageError::InvalidLocation(format!("invalid SAS URL: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(StorageError::InvalidLocation(
                "SAS URL must be an http(s) URL with a host".into(),
            ));
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|parts| {
                parts
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let Some((container, rest)) = segments.split_first() else {
            return Err(StorageError::InvalidLocation(
                "SAS URL does not name a container".into(),
            ));
        };

        let present: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        let missing: Vec<&str> = REQUIRED_SAS_PARAMS
            .iter()
            .copied()
            .filter(|p| !present.iter().any(|k| k == p))
            .collect();
        if !missing.is_empty() {
            return Err(StorageError::InvalidLocation(format!(
                "SAS URL is missing required parameters: {}",
                missing.join(", ")
            )));
        }

        let mut container_url = url.clone();
        container_url.set_query(None);
        container_url.set_fragment(None);
        container_url.set_path(&format!("/{container}"));

        Ok(Self {
            container_url,
            container: container.clone(),
            additional_path: rest.join("/"),
            sas_query: url.query().unwrap_or_default().to_string(),
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn additional_path(&self) -> &str {
        &self.additional_path
    }

    /// Full blob name inside the container for a store-relative id.
    pub fn blob_name(&self, id: &str) -> String {
        let id = id.trim_start_matches('/');
        if self.additional_path.is_empty() {
            id.to_string()
        } else {
            format!("{}/{}", self.additional_path, id)
        }
    }

    /// Store-relative id for a full blob name, if it lies under the additional path.
    fn relative_id<'a>(&self, blob_name: &'a str) -> Option<&'a str> {
        if self.additional_path.is_empty() {
            return Some(blob_name);
        }
        blob_name
            .strip_prefix(self.additional_path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    pub fn blob_url(&self, id: &str) -> Url {
        let mut url = self.container_url.clone();
        let blob_name = self.blob_name(id);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(blob_name.split('/'));
        }
        url.set_query(Some(&self.sas_query));
        url
    }

    fn list_url(&self, prefix: &str, marker: Option<&str>) -> Url {
        let mut url = self.container_url.clone();
        url.set_query(Some(&self.sas_query));
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("prefix", &self.blob_name(prefix));
            if let Some(marker) = marker {
                pairs.append_pair("marker", marker);
            }
        }
        url
    }

    /// Location without credentials, for logs.
    pub fn redacted(&self) -> String {
        let mut shown = self.container_url.to_string();
        if !self.additional_path.is_empty() {
            shown.push('/');
            shown.push_str(&self.additional_path);
        }
        shown
    }
}

/// Blob container accessed through the Blob service REST API.
#[derive(Debug, Clone)]
pub struct SasBlobStore {
    location: SasLocation,
    client: reqwest::Client,
}

impl SasBlobStore {
    pub fn new(location: SasLocation, settings: TransferSettings) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .pool_max_idle_per_host(settings.pool_max_idle_per_host)
            .build()
            .map_err(|err| StorageError::Network(err.to_string()))?;
        Ok(Self { location, client })
    }

    pub fn location(&self) -> &SasLocation {
        &self.location
    }

    async fn list_page(
        &self,
        prefix: &str,
        marker: Option<&str>,
    ) -> Result<(Vec<ListedObject>, Option<String>), StorageError> {
        let response = self
            .client
            .get(self.location.list_url(prefix, marker))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::HttpStatus {
                id: prefix.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        let page = parse_listing(&body)?;

        let objects = page
            .blobs
            .into_iter()
            .filter_map(|(name, size_bytes)| {
                let id = self.location.relative_id(&name)?.to_string();
                Some(ListedObject { id, size_bytes })
            })
            .collect();
        Ok((objects, page.next_marker))
    }
}

#[async_trait::async_trait]
impl StorageLister for SasBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ListedObject>, StorageError> {
        let mut all = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let (page, next) = self.list_page(prefix, marker.as_deref()).await?;
            all.extend(page);
            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(all)
    }
}

#[async_trait::async_trait]
impl StorageTransfer for SasBlobStore {
    async fn download(&self, id: &str, local_path: &Path) -> Result<u64, StorageError> {
        let response = self
            .client
            .get(self.location.blob_url(id))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(id, response.status())?;

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn upload(&self, local_path: &Path, dest_id: &str) -> Result<(), StorageError> {
        let body = tokio::fs::read(local_path).await?;
        let response = self
            .client
            .put(self.location.blob_url(dest_id))
            .header("x-ms-blob-type", "BlockBlob")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(dest_id, response.status())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let response = self
            .client
            .delete(self.location.blob_url(id))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(id, response.status())
    }
}

impl RemoteStore for SasBlobStore {
    fn describe(&self) -> String {
        format!("blob:{}", self.location.redacted())
    }
}

fn check_status(id: &str, status: reqwest::StatusCode) -> Result<(), StorageError> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(id.to_string()));
    }
    if !status.is_success() {
        return Err(StorageError::HttpStatus {
            id: id.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn map_reqwest_error(err: reqwest::Error) -> StorageError {
    if err.is_timeout() {
        return StorageError::Network(format!("timeout: {err}"));
    }
    StorageError::Network(err.to_string())
}

/// One page of a List Blobs response: `(name, Content-Length)` per blob.
#[derive(Debug, Default, PartialEq)]
struct ListingPage {
    blobs: Vec<(String, Option<u64>)>,
    next_marker: Option<String>,
}

fn parse_listing(xml: &str) -> Result<ListingPage, StorageError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = ListingPage::default();
    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut name: Option<String> = None;
    let mut size: Option<u64> = None;

    loop {
        match reader.read_event().map_err(listing_error)? {
            Event::Start(tag) => {
                let tag = String::from_utf8_lossy(tag.local_name().as_ref()).into_owned();
                match tag.as_str() {
                    "EnumerationResults" => seen_root = true,
                    "Blob" => {
                        name = None;
                        size = None;
                    }
                    _ => {}
                }
                path.push(tag);
            }
            Event::Empty(tag) => {
                if tag.local_name().as_ref() == b"EnumerationResults" {
                    seen_root = true;
                }
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("Blob") {
                    if let Some(name) = name.take() {
                        page.blobs.push((name, size.take()));
                    }
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(listing_error)?;
                let in_blob = path.iter().any(|tag| tag == "Blob");
                match path.last().map(String::as_str) {
                    Some("Name") if in_blob => name = Some(text.into_owned()),
                    Some("Content-Length") if in_blob => size = text.trim().parse().ok(),
                    Some("NextMarker") if path.len() == 2 && !text.is_empty() => {
                        page.next_marker = Some(text.into_owned());
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(StorageError::Listing("missing EnumerationResults".into()));
    }
    Ok(page)
}

fn listing_error(err: impl std::fmt::Display) -> StorageError {
    StorageError::Listing(err.to_string())
}
