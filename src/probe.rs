//! Existence and dimension probes: the I/O boundary of the gallery.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::asset::{Dimensions, MediaKind};
use crate::error::Error;
use crate::processing::dimensions::{self, HeaderScan};

/// Answers whether a numbered asset exists and how large it is.
///
/// Implementations must not panic on missing or broken assets; every failure
/// is reported as an [`Error`] and later normalized to
/// [`ProbeOutcome::Absent`].
#[async_trait]
pub trait AssetProbe: Send + Sync {
    /// Natural dimensions of the asset at `locator`.
    async fn probe(&self, kind: MediaKind, locator: &str) -> Result<Dimensions, Error>;

    /// Cheap existence check used during discovery.
    async fn exists(&self, kind: MediaKind, locator: &str) -> Result<(), Error> {
        self.probe(kind, locator).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists(Dimensions),
    Absent,
}

impl ProbeOutcome {
    pub fn from_result(locator: &str, result: Result<Dimensions, Error>) -> Self {
        match result {
            Ok(dims) => Self::Exists(dims),
            Err(err) => {
                debug!(locator, error = %err, "probe normalized to absent");
                Self::Absent
            }
        }
    }

    pub fn dimensions(self) -> Option<Dimensions> {
        match self {
            Self::Exists(dims) => Some(dims),
            Self::Absent => None,
        }
    }
}

/// [`AssetProbe::exists`] bounded by `timeout`.
pub async fn exists_within(
    probe: &dyn AssetProbe,
    kind: MediaKind,
    locator: &str,
    timeout: Duration,
) -> Result<(), Error> {
    tokio::time::timeout(timeout, probe.exists(kind, locator))
        .await
        .map_err(|_| Error::ProbeTimeout {
            locator: locator.to_owned(),
        })?
}

/// [`AssetProbe::probe`] bounded by `timeout`.
pub async fn probe_within(
    probe: &dyn AssetProbe,
    kind: MediaKind,
    locator: &str,
    timeout: Duration,
) -> Result<Dimensions, Error> {
    tokio::time::timeout(timeout, probe.probe(kind, locator))
        .await
        .map_err(|_| Error::ProbeTimeout {
            locator: locator.to_owned(),
        })?
}

/// Probes assets in a local directory tree; locators are file paths.
#[derive(Debug, Clone, Default)]
pub struct FsProbe;

#[async_trait]
impl AssetProbe for FsProbe {
    async fn probe(&self, kind: MediaKind, locator: &str) -> Result<Dimensions, Error> {
        let path = Path::new(locator).to_path_buf();
        tokio::task::spawn_blocking(move || dimensions::from_file(kind, &path))
            .await
            .map_err(|e| Error::ProbeFailed {
                locator: locator.to_owned(),
                reason: e.to_string(),
            })?
    }

    async fn exists(&self, _kind: MediaKind, locator: &str) -> Result<(), Error> {
        match tokio::fs::metadata(locator).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(Error::not_found(locator, "not a regular file")),
            Err(e) => Err(Error::not_found(locator, e)),
        }
    }
}

/// Probes assets served over HTTP(S); locators are URLs.
///
/// `exists` issues a `HEAD`. `probe` issues a `GET` and reads the body only
/// until the header yields a size, then drops the connection.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(request_timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::ProbeFailed {
                locator: String::new(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetProbe for HttpProbe {
    async fn probe(&self, kind: MediaKind, locator: &str) -> Result<Dimensions, Error> {
        let mut response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| transport_error(locator, e))?;
        check_status(locator, response.status())?;

        let mut scan = HeaderScan::new(kind, locator);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(locator, e))?
        {
            if let Some(dims) = scan.push(&chunk)? {
                debug!(locator, buffered = scan.buffered(), "size read from header");
                return Ok(dims);
            }
        }
        Err(scan.end_of_input())
    }

    async fn exists(&self, _kind: MediaKind, locator: &str) -> Result<(), Error> {
        let response = self
            .client
            .head(locator)
            .send()
            .await
            .map_err(|e| transport_error(locator, e))?;
        check_status(locator, response.status())
    }
}

fn check_status(locator: &str, status: StatusCode) -> Result<(), Error> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::not_found(locator, format!("http status {status}")))
    }
}

fn transport_error(locator: &str, err: reqwest::Error) -> Error {
    Error::ProbeFailed {
        locator: locator.to_owned(),
        reason: err.to_string(),
    }
}
