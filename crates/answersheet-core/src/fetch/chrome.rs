//! Headless Chromium renderer over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    SetCookiesParams,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures_util::{stream, StreamExt};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use super::idle::{wait_for_idle, NetworkEvent};
use super::{cookie_domain, split_cookie_header, FetchError, PdfRenderer};
use crate::config::BrowserSettings;
use crate::storage;

/// A4 paper in inches, as expected by `Page.printToPDF`.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// Launched browser plus the task pumping its CDP connection.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(settings: &BrowserSettings) -> Result<Self, FetchError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(settings.navigation_timeout())
            .args(settings.args.iter());
        if let Some(exe) = &settings.executable {
            builder = builder.chrome_executable(exe);
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("cdp handler: {}", e);
                }
            }
        });
        tracing::info!(
            executable = ?settings.executable,
            headless = settings.headless,
            "browser launched"
        );
        Ok(BrowserSession { browser, handler })
    }

    async fn close(mut self) -> Result<(), FetchError> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        let _ = self.handler.await;
        tracing::info!("browser closed");
        Ok(())
    }
}

/// [`PdfRenderer`] backed by a single shared headless browser.
///
/// The browser is started on the first render, so runs that never fetch never
/// spawn one. Call [`ChromeRenderer::close`] once at the end of the run; if that
/// is skipped (e.g. a panic), dropping the browser kills the child process.
pub struct ChromeRenderer {
    settings: BrowserSettings,
    session: OnceCell<BrowserSession>,
}

impl ChromeRenderer {
    pub fn new(settings: BrowserSettings) -> Self {
        ChromeRenderer {
            settings,
            session: OnceCell::new(),
        }
    }

    pub fn is_launched(&self) -> bool {
        self.session.initialized()
    }

    /// Closes the browser if it was launched.
    pub async fn close(self) -> Result<(), FetchError> {
        match self.session.into_inner() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    async fn session(&self) -> Result<&BrowserSession, FetchError> {
        self.session
            .get_or_try_init(|| BrowserSession::launch(&self.settings))
            .await
    }

    async fn print(
        &self,
        page: &Page,
        url: &str,
        output_path: &Path,
        cookie_header: &str,
    ) -> Result<(), FetchError> {
        if !cookie_header.is_empty() {
            install_cookies(page, url, cookie_header).await?;
        }

        // Subscribe before navigating so no request of the page load is missed.
        let sent = page.event_listener::<EventRequestWillBeSent>().await?;
        let finished = page.event_listener::<EventLoadingFinished>().await?;
        let failed = page.event_listener::<EventLoadingFailed>().await?;
        let events = stream::select(
            sent.map(|e| NetworkEvent::Started(e.request_id.clone())),
            stream::select(
                finished.map(|e| NetworkEvent::Done(e.request_id.clone())),
                failed.map(|e| NetworkEvent::Done(e.request_id.clone())),
            ),
        );

        let navigation = async {
            page.goto(url).await?;
            wait_for_idle(
                events,
                self.settings.network_idle(),
                self.settings.max_idle_inflight,
            )
            .await;
            Ok::<(), FetchError>(())
        };
        bounded_navigation(url, self.settings.navigation_timeout(), navigation).await?;
        tracing::debug!(url, "network idle, printing");

        let pdf = page.pdf(pdf_params()).await?;
        storage::write_atomically(output_path, &pdf)
            .await
            .map_err(|source| FetchError::Io {
                path: output_path.to_path_buf(),
                source,
            })
    }
}

#[async_trait]
impl PdfRenderer for ChromeRenderer {
    async fn render_pdf(
        &self,
        url: &str,
        output_path: &Path,
        cookie_header: &str,
    ) -> Result<(), FetchError> {
        let session = self.session().await?;
        let page = session.browser.new_page("about:blank").await?;
        let result = self.print(&page, url, output_path, cookie_header).await;
        if let Err(e) = page.close().await {
            tracing::warn!(url, "failed to close page: {}", e);
        }
        result
    }
}

/// A4 portrait with background graphics.
fn pdf_params() -> PrintToPdfParams {
    PrintToPdfParams {
        print_background: Some(true),
        paper_width: Some(A4_WIDTH_IN),
        paper_height: Some(A4_HEIGHT_IN),
        ..Default::default()
    }
}

/// Runs `navigation`, mapping an overrun of `timeout` to [`FetchError::NavigationTimeout`].
async fn bounded_navigation<F, T>(
    url: &str,
    timeout: Duration,
    navigation: F,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    tokio::time::timeout(timeout, navigation)
        .await
        .map_err(|_| FetchError::NavigationTimeout {
            url: url.to_string(),
            timeout_secs: timeout.as_secs(),
        })?
}

/// CDP cookie params for `cookie_header`, scoped to the host of `url` and path `/`.
fn cookie_params(url: &str, cookie_header: &str) -> Result<Vec<CookieParam>, FetchError> {
    let domain = cookie_domain(url)?;
    split_cookie_header(cookie_header)
        .into_iter()
        .map(|pair| {
            CookieParam::builder()
                .name(pair.name)
                .value(pair.value)
                .domain(domain.clone())
                .path("/")
                .build()
                .map_err(FetchError::Cookie)
        })
        .collect()
}

async fn install_cookies(page: &Page, url: &str, cookie_header: &str) -> Result<(), FetchError> {
    let cookies = cookie_params(url, cookie_header)?;
    tracing::debug!(count = cookies.len(), "installing cookies");
    page.execute(SetCookiesParams::new(cookies)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_params_scope_to_host_and_root_path() {
        let params = cookie_params("https://exam.example.edu/sheet/1", "sid=abc123; lang=en").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "sid");
        assert_eq!(params[0].value, "abc123");
        assert_eq!(params[1].name, "lang");
        for p in &params {
            assert_eq!(p.domain.as_deref(), Some("exam.example.edu"));
            assert_eq!(p.path.as_deref(), Some("/"));
        }
    }

    #[test]
    fn cookie_params_reject_bad_url() {
        assert!(matches!(
            cookie_params("::nope", "a=1"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn pdf_params_are_a4_with_background() {
        let params = pdf_params();
        assert_eq!(params.paper_width, Some(8.27));
        assert_eq!(params.paper_height, Some(11.69));
        assert_eq!(params.print_background, Some(true));
        assert_ne!(params.landscape, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_that_never_settles_times_out() {
        let timeout = BrowserSettings::default().navigation_timeout();
        let err = bounded_navigation(
            "https://exam.example.edu/slow",
            timeout,
            std::future::pending::<Result<(), FetchError>>(),
        )
        .await
        .unwrap_err();
        match err {
            FetchError::NavigationTimeout { url, timeout_secs } => {
                assert_eq!(url, "https://exam.example.edu/slow");
                assert_eq!(timeout_secs, 300);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_result_passes_through() {
        let ok = bounded_navigation("https://h/", Duration::from_secs(300), async {
            tokio::time::sleep(Duration::from_secs(299)).await;
            Ok::<_, FetchError>(7)
        })
        .await
        .unwrap();
        assert_eq!(ok, 7);

        let err = bounded_navigation("https://h/", Duration::from_secs(300), async {
            Err::<(), _>(FetchError::NoHost("https://h/".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::NoHost(_)));
    }

    #[test]
    fn renderer_starts_without_browser() {
        let renderer = ChromeRenderer::new(BrowserSettings::default());
        assert!(!renderer.is_launched());
    }
}
