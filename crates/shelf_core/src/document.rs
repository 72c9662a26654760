//! crates/shelf_core/src/document.rs
//!
//! Strategy adapters that turn a document URL into something a viewer can load,
//! and the resolver that chains them in the viewers' fixed order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::domain::{DocumentFormat, DocumentHandle, FetchedBody, ViewerKind};
use crate::ports::{BlobStore, DocumentFetcher, PortError, PortResult, Strategy};
use crate::sequencer::{FallbackSequencer, Resolution};

const GOOGLE_DOCS_VIEWER: &str = "https://docs.google.com/viewer";
const PDFJS_VIEWER: &str = "https://mozilla.github.io/pdf.js/web/viewer.html";
pub const PROXY_PATH: &str = "/api/pdf/fetch-pdf";

//=========================================================================================
// Request
//=========================================================================================

/// A validated request to make a document viewable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRequest {
    pub url: String,
    pub format: DocumentFormat,
}

impl DocumentRequest {
    /// Only absolute `http`/`https` URLs are accepted. The format is guessed from
    /// the URL path when not given.
    pub fn parse(url: &str, format: Option<DocumentFormat>) -> PortResult<Self> {
        let parsed = parse_source_url(url)?;
        Ok(Self {
            format: format.unwrap_or_else(|| DocumentFormat::from_url(parsed.as_str())),
            url: parsed.into(),
        })
    }
}

/// Parses a user-supplied document URL, rejecting anything that is not plain http(s).
pub fn parse_source_url(raw: &str) -> PortResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PortError::InvalidArgument("url is required".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|e| PortError::InvalidArgument(format!("'{trimmed}' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(PortError::InvalidArgument(format!(
            "unsupported URL scheme '{scheme}'"
        ))),
    }
}

/// Resolves a service path such as `/api/blobs/1` under `base`, keeping any
/// path prefix the base carries (`https://host/shelf` serves `/shelf/api/...`).
pub fn service_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }
    base.join(path.trim_start_matches('/'))
}

/// Builds the URL of the server-side proxy endpoint for `source`.
pub fn proxy_url(base: &Url, source: &str) -> PortResult<Url> {
    let mut url = service_url(base, PROXY_PATH)
        .map_err(|e| PortError::InvalidArgument(format!("invalid proxy base: {e}")))?;
    url.query_pairs_mut().append_pair("url", source);
    Ok(url)
}

/// Builds the URL that hands `source` to a hosted viewer.
pub fn viewer_url(viewer: ViewerKind, source: &str) -> PortResult<Url> {
    let built = match viewer {
        ViewerKind::GoogleDocs => {
            Url::parse_with_params(GOOGLE_DOCS_VIEWER, &[("url", source), ("embedded", "true")])
        }
        ViewerKind::PdfJs => Url::parse_with_params(PDFJS_VIEWER, &[("file", source)]),
    };
    built.map_err(|e| PortError::Unexpected(format!("viewer URL: {e}")))
}

fn cors_allows(origin: Option<&str>, allow_origin: Option<&str>) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    match allow_origin.map(str::trim) {
        Some("*") => true,
        Some(allowed) => allowed.trim_end_matches('/') == origin.trim_end_matches('/'),
        None => false,
    }
}

fn require_cors(origin: Option<&str>, allow_origin: Option<&str>) -> PortResult<()> {
    if cors_allows(origin, allow_origin) {
        Ok(())
    } else {
        Err(PortError::Network(format!(
            "cross-origin read not permitted for origin {}",
            origin.unwrap_or("<none>")
        )))
    }
}

/// Checks that a fetched body really is a document of the requested format.
fn verify_body(format: DocumentFormat, body: &FetchedBody) -> PortResult<()> {
    if body.bytes.is_empty() {
        return Err(PortError::Parse("empty response body".to_string()));
    }
    if !format.accepts_content_type(body.content_type.as_deref()) {
        return Err(PortError::UnsupportedFormat(format!(
            "expected {}, got {}",
            format.mime_type(),
            body.content_type.as_deref().unwrap_or("<none>")
        )));
    }
    if !format.matches_bytes(&body.bytes) {
        return Err(PortError::Parse(format!(
            "body is not a valid {} document",
            format.mime_type()
        )));
    }
    Ok(())
}

async fn store_blob(
    blobs: &dyn BlobStore,
    format: DocumentFormat,
    body: FetchedBody,
) -> PortResult<DocumentHandle> {
    let size = body.bytes.len();
    let mime_type = format.mime_type().to_string();
    let url = blobs.put(body.bytes, &mime_type).await?;
    debug!(%url, size, "Stored document blob.");
    Ok(DocumentHandle::Blob {
        url,
        mime_type,
        size,
    })
}

//=========================================================================================
// Strategy Adapters
//=========================================================================================

/// Hands the original URL to the viewer, after checking it would load.
pub struct DirectUrlStrategy {
    fetcher: Arc<dyn DocumentFetcher>,
    request: DocumentRequest,
    origin: Option<String>,
}

impl DirectUrlStrategy {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        request: DocumentRequest,
        origin: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            request,
            origin,
        }
    }
}

#[async_trait]
impl Strategy<DocumentHandle> for DirectUrlStrategy {
    fn name(&self) -> &str {
        "direct_url"
    }

    async fn attempt(&self) -> PortResult<DocumentHandle> {
        let probe = self
            .fetcher
            .probe(&self.request.url, self.origin.as_deref())
            .await?;
        if !(200..300).contains(&probe.status) {
            return Err(PortError::from_status(probe.status, "direct probe"));
        }
        if !self
            .request
            .format
            .accepts_content_type(probe.content_type.as_deref())
        {
            return Err(PortError::UnsupportedFormat(format!(
                "expected {}, got {}",
                self.request.format.mime_type(),
                probe.content_type.as_deref().unwrap_or("<none>")
            )));
        }
        require_cors(self.origin.as_deref(), probe.allow_origin.as_deref())?;
        Ok(DocumentHandle::Direct {
            url: self.request.url.clone(),
        })
    }
}

/// Downloads the bytes as the client would and parks them behind a blob URL.
pub struct BlobFetchStrategy {
    fetcher: Arc<dyn DocumentFetcher>,
    blobs: Arc<dyn BlobStore>,
    request: DocumentRequest,
    origin: Option<String>,
}

impl BlobFetchStrategy {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        blobs: Arc<dyn BlobStore>,
        request: DocumentRequest,
        origin: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            request,
            origin,
        }
    }
}

#[async_trait]
impl Strategy<DocumentHandle> for BlobFetchStrategy {
    fn name(&self) -> &str {
        "blob_fetch"
    }

    async fn attempt(&self) -> PortResult<DocumentHandle> {
        let body = self
            .fetcher
            .fetch(&self.request.url, self.origin.as_deref(), None)
            .await?;
        require_cors(self.origin.as_deref(), body.allow_origin.as_deref())?;
        verify_body(self.request.format, &body)?;
        store_blob(self.blobs.as_ref(), self.request.format, body).await
    }
}

/// Asks the backend proxy to fetch the document server-side.
pub struct ServerProxyStrategy {
    fetcher: Arc<dyn DocumentFetcher>,
    blobs: Arc<dyn BlobStore>,
    request: DocumentRequest,
    proxy_base: Url,
    token: Option<String>,
}

impl ServerProxyStrategy {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        blobs: Arc<dyn BlobStore>,
        request: DocumentRequest,
        proxy_base: Url,
        token: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            blobs,
            request,
            proxy_base,
            token,
        }
    }
}

#[async_trait]
impl Strategy<DocumentHandle> for ServerProxyStrategy {
    fn name(&self) -> &str {
        "server_proxy"
    }

    async fn attempt(&self) -> PortResult<DocumentHandle> {
        let url = proxy_url(&self.proxy_base, &self.request.url)?;
        let body = self
            .fetcher
            .fetch(url.as_str(), None, self.token.as_deref())
            .await?;
        verify_body(self.request.format, &body)?;
        store_blob(self.blobs.as_ref(), self.request.format, body).await
    }
}

/// Redirects to a hosted viewer. Succeeds by constructing a URL; whether the
/// viewer can render the document is never checked.
pub struct ExternalViewerStrategy {
    viewer: ViewerKind,
    request: DocumentRequest,
}

impl ExternalViewerStrategy {
    pub fn new(viewer: ViewerKind, request: DocumentRequest) -> Self {
        Self { viewer, request }
    }
}

#[async_trait]
impl Strategy<DocumentHandle> for ExternalViewerStrategy {
    fn name(&self) -> &str {
        match self.viewer {
            ViewerKind::GoogleDocs => "google_docs_viewer",
            ViewerKind::PdfJs => "pdfjs_viewer",
        }
    }

    async fn attempt(&self) -> PortResult<DocumentHandle> {
        if self.viewer == ViewerKind::PdfJs && self.request.format != DocumentFormat::Pdf {
            return Err(PortError::UnsupportedFormat(
                "the PDF.js viewer only renders PDF".to_string(),
            ));
        }
        let url = viewer_url(self.viewer, &self.request.url)?;
        Ok(DocumentHandle::ExternalViewer {
            viewer: self.viewer,
            url: url.into(),
            verified: false,
        })
    }
}

//=========================================================================================
// Resolver
//=========================================================================================

/// The strategy shapes a document chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStrategyKind {
    Direct,
    Blob,
    Proxy,
    GoogleDocs,
    PdfJs,
}

impl DocumentStrategyKind {
    /// direct load → fetch blob → proxy → Google Docs viewer → PDF.js viewer
    pub const DEFAULT_CHAIN: [DocumentStrategyKind; 5] = [
        DocumentStrategyKind::Direct,
        DocumentStrategyKind::Blob,
        DocumentStrategyKind::Proxy,
        DocumentStrategyKind::GoogleDocs,
        DocumentStrategyKind::PdfJs,
    ];

    /// Parses a comma-separated chain such as `direct,blob,proxy`.
    pub fn parse_chain(raw: &str) -> Result<Vec<Self>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<DocumentStrategyKind>())
            .collect()
    }
}

impl FromStr for DocumentStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(DocumentStrategyKind::Direct),
            "blob" => Ok(DocumentStrategyKind::Blob),
            "proxy" => Ok(DocumentStrategyKind::Proxy),
            "google_docs" => Ok(DocumentStrategyKind::GoogleDocs),
            "pdf_js" | "pdfjs" => Ok(DocumentStrategyKind::PdfJs),
            other => Err(format!("unknown document strategy '{other}'")),
        }
    }
}

impl fmt::Display for DocumentStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentStrategyKind::Direct => "direct",
            DocumentStrategyKind::Blob => "blob",
            DocumentStrategyKind::Proxy => "proxy",
            DocumentStrategyKind::GoogleDocs => "google_docs",
            DocumentStrategyKind::PdfJs => "pdf_js",
        };
        f.write_str(name)
    }
}

/// Builds and runs document chains.
#[derive(Clone)]
pub struct DocumentResolver {
    fetcher: Arc<dyn DocumentFetcher>,
    blobs: Arc<dyn BlobStore>,
    chain: Vec<DocumentStrategyKind>,
    client_origin: Option<String>,
    proxy_base: Option<Url>,
    proxy_token: Option<String>,
    attempt_timeout: Option<Duration>,
}

impl DocumentResolver {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            fetcher,
            blobs,
            chain: DocumentStrategyKind::DEFAULT_CHAIN.to_vec(),
            client_origin: None,
            proxy_base: None,
            proxy_token: None,
            attempt_timeout: None,
        }
    }

    pub fn with_chain(mut self, chain: Vec<DocumentStrategyKind>) -> Self {
        self.chain = chain;
        self
    }

    /// The browser origin whose CORS grants the client-side strategies need.
    pub fn with_client_origin(mut self, origin: impl Into<String>) -> Self {
        self.client_origin = Some(origin.into());
        self
    }

    pub fn with_proxy(mut self, base: Url, token: Option<String>) -> Self {
        self.proxy_base = Some(base);
        self.proxy_token = token;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Builds the sequencer for one request. The proxy step is skipped when no
    /// proxy is configured.
    pub fn sequencer_for(&self, request: &DocumentRequest) -> FallbackSequencer<DocumentHandle> {
        let mut sequencer = FallbackSequencer::new(format!("document:{}", request.url));
        if let Some(timeout) = self.attempt_timeout {
            sequencer = sequencer.with_attempt_timeout(timeout);
        }
        for kind in &self.chain {
            let strategy: Box<dyn Strategy<DocumentHandle>> = match kind {
                DocumentStrategyKind::Direct => Box::new(DirectUrlStrategy::new(
                    self.fetcher.clone(),
                    request.clone(),
                    self.client_origin.clone(),
                )),
                DocumentStrategyKind::Blob => Box::new(BlobFetchStrategy::new(
                    self.fetcher.clone(),
                    self.blobs.clone(),
                    request.clone(),
                    self.client_origin.clone(),
                )),
                DocumentStrategyKind::Proxy => match &self.proxy_base {
                    Some(base) => Box::new(ServerProxyStrategy::new(
                        self.fetcher.clone(),
                        self.blobs.clone(),
                        request.clone(),
                        base.clone(),
                        self.proxy_token.clone(),
                    )),
                    None => continue,
                },
                DocumentStrategyKind::GoogleDocs => Box::new(ExternalViewerStrategy::new(
                    ViewerKind::GoogleDocs,
                    request.clone(),
                )),
                DocumentStrategyKind::PdfJs => {
                    Box::new(ExternalViewerStrategy::new(ViewerKind::PdfJs, request.clone()))
                }
            };
            sequencer = sequencer.with_boxed(strategy);
        }
        sequencer
    }

    pub async fn resolve(
        &self,
        request: &DocumentRequest,
        cancel: &CancellationToken,
    ) -> Resolution<DocumentHandle> {
        self.sequencer_for(request).run(cancel).await
    }
}
