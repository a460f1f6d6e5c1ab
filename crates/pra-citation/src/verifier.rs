//! Citation verifier
//!
//! Resolution of a URL (redirects, status, specificity, visible text) is
//! cached per verifier instance, so each distinct URL is fetched at most once
//! per run. Quote matching runs on every call against the cached text, which
//! keeps records for identical `(url, quote)` inputs identical.

use crate::cache::{CacheStats, PageCache};
use crate::config::VerifierConfig;
use crate::error::{FetchError, PolicyError, TransportErrorKind};
use crate::fetch::{FetchMethod, FetchResponse, PageFetcher};
use crate::html::{canonical_url, visible_text};
use crate::matching::{QuoteMatch, QuoteMatcher};
use crate::types::{
    Classification, HttpOutcome, ProposedCitation, RejectionReason, VerificationRecord,
    VerificationStatus,
};
use crate::url_policy::{parse_citation_url, PathPolicy};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// HEAD statuses that mean "method not supported here", retried as GET
const HEAD_FALLBACK_STATUSES: &[u16] = &[400, 403, 405, 501];

/// A page that resolved to a reachable, specific URL
#[derive(Debug, Clone)]
struct ResolvedPage {
    resolved_url: String,
    status: u16,
    text: Option<Arc<str>>,
    body_error: Option<TransportErrorKind>,
}

/// A page that failed resolution, independent of any quote
#[derive(Debug, Clone)]
struct PageRejection {
    rejection: RejectionReason,
    classification: Classification,
    http_outcome: HttpOutcome,
    resolved_url: Option<String>,
    detail: String,
}

#[derive(Debug, Clone)]
enum PageOutcome {
    Resolved(ResolvedPage),
    Rejected(PageRejection),
}

/// Verifies proposed citations against the live pages they point to
#[derive(Debug)]
pub struct CitationVerifier {
    config: VerifierConfig,
    fetcher: Arc<dyn PageFetcher>,
    permits: Semaphore,
    policy: PathPolicy,
    matcher: QuoteMatcher,
    cache: PageCache<Arc<PageOutcome>>,
}

impl CitationVerifier {
    /// Create verifier with an empty cache
    pub fn new(config: VerifierConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self, PolicyError> {
        if config.max_concurrent_fetches == 0 {
            return Err(PolicyError::InvalidSetting(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.similarity_floor) {
            return Err(PolicyError::InvalidSetting(format!(
                "similarity_floor {} is outside [0, 1]",
                config.similarity_floor
            )));
        }

        let policy = PathPolicy::new(&config.blocked_path_patterns)?;
        let matcher = QuoteMatcher::new(config.similarity_floor, config.min_splice_words);

        Ok(Self {
            permits: Semaphore::new(config.max_concurrent_fetches),
            cache: PageCache::new(config.cache_capacity),
            config,
            fetcher,
            policy,
            matcher,
        })
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Cache statistics so far
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Verify one citation.
    ///
    /// Never fails: every problem is reported as a rejected record.
    pub async fn verify(&self, citation: &ProposedCitation) -> VerificationRecord {
        let url = match parse_citation_url(&citation.url) {
            Ok(url) => url,
            Err(detail) => {
                tracing::debug!(url = %citation.url, "Malformed citation url: {}", detail);
                return VerificationRecord::rejected(
                    citation.url.clone(),
                    RejectionReason::MalformedUrl,
                    None,
                    HttpOutcome::NotAttempted,
                    format!("malformed url: {detail}"),
                );
            }
        };

        let outcome = self
            .cache
            .get_or_resolve(&citation.url, || async move {
                Arc::new(self.resolve(url).await)
            })
            .await;

        let record = match outcome.as_ref() {
            PageOutcome::Rejected(rejection) => VerificationRecord::rejected(
                citation.url.clone(),
                rejection.rejection,
                Some(rejection.classification),
                rejection.http_outcome,
                rejection.detail.clone(),
            )
            .with_resolved_url(rejection.resolved_url.clone()),
            PageOutcome::Resolved(page) => self.check_quote(citation, page),
        };

        tracing::debug!(
            url = %record.url,
            status = ?record.status,
            rejection = ?record.rejection,
            "Citation verified"
        );
        record
    }

    fn check_quote(&self, citation: &ProposedCitation, page: &ResolvedPage) -> VerificationRecord {
        let accepted =
            VerificationRecord::accepted(citation.url.clone(), page.resolved_url.clone(), page.status);
        let Some(quote) = citation.quote() else {
            return accepted;
        };

        let Some(text) = page.text.as_deref() else {
            let kind = page.body_error.unwrap_or(TransportErrorKind::Other);
            return VerificationRecord::rejected(
                citation.url.clone(),
                RejectionReason::Unreachable,
                Some(Classification::Unreachable),
                HttpOutcome::Transport(kind),
                format!("page body could not be read ({kind})"),
            )
            .with_resolved_url(Some(page.resolved_url.clone()));
        };

        let quote_rejected = |detail: String| {
            VerificationRecord::rejected(
                citation.url.clone(),
                RejectionReason::QuoteNotFound,
                Some(Classification::Article),
                HttpOutcome::Status(page.status),
                detail,
            )
            .with_resolved_url(Some(page.resolved_url.clone()))
        };

        match self.matcher.find(quote, text) {
            QuoteMatch::Exact => VerificationRecord {
                matched_quote: Some(quote.to_string()),
                ..accepted
            },
            QuoteMatch::Paraphrase { span, score } => {
                tracing::debug!(url = %citation.url, score, "Quote paraphrased");
                VerificationRecord {
                    status: VerificationStatus::UnverifiedParaphrase,
                    corrected_quote: Some(span),
                    ..accepted
                }
            }
            QuoteMatch::Spliced => {
                quote_rejected("quote joins passages that are not adjacent on the page".to_string())
            }
            QuoteMatch::NotFound { best_score } => quote_rejected(format!(
                "quote not found on page (best similarity {best_score:.2})"
            )),
        }
    }

    async fn resolve(&self, start: Url) -> PageOutcome {
        let mut current = start;
        let mut visited = HashSet::from([current.to_string()]);
        let mut hops = 0usize;

        let (status, mut body) = loop {
            let response = match self.head_or_get(&current).await {
                Ok(response) => response,
                Err(err) => return unreachable_page(&err, (hops > 0).then(|| current.to_string())),
            };

            if response.is_redirect() {
                let location = response.location.as_deref().unwrap_or_default();
                let Ok(next) = current.join(location) else {
                    return PageOutcome::Rejected(PageRejection {
                        rejection: RejectionReason::ErrorPage,
                        classification: Classification::ErrorPage,
                        http_outcome: HttpOutcome::Status(response.status),
                        resolved_url: Some(current.to_string()),
                        detail: format!("invalid redirect location '{location}'"),
                    });
                };
                hops += 1;
                if hops > self.config.max_redirects || !visited.insert(next.to_string()) {
                    return PageOutcome::Rejected(PageRejection {
                        rejection: RejectionReason::RedirectLoop,
                        classification: Classification::RedirectLoop,
                        http_outcome: HttpOutcome::Status(response.status),
                        resolved_url: Some(next.to_string()),
                        detail: format!(
                            "redirect chain exceeds {} hops or revisits a url",
                            self.config.max_redirects
                        ),
                    });
                }
                current = next;
                continue;
            }

            break (response.status, response.body);
        };

        // 3xx that carried no followable location
        if (300..400).contains(&status) {
            return PageOutcome::Rejected(PageRejection {
                rejection: RejectionReason::ErrorPage,
                classification: Classification::ErrorPage,
                http_outcome: HttpOutcome::Status(status),
                resolved_url: Some(current.to_string()),
                detail: format!("redirect status {status} without a location"),
            });
        }

        if !(200..400).contains(&status) {
            return PageOutcome::Rejected(PageRejection {
                rejection: RejectionReason::ErrorPage,
                classification: Classification::ErrorPage,
                http_outcome: HttpOutcome::Status(status),
                resolved_url: Some(current.to_string()),
                detail: format!("final status {status}"),
            });
        }

        if self.policy.is_non_specific(&current) {
            return PageOutcome::Rejected(homepage(status, &current));
        }

        let mut body_error = None;
        if body.is_none() {
            match self.fetch_with_retry(FetchMethod::Get, &current).await {
                Ok(response) if response.status >= 400 => {
                    return PageOutcome::Rejected(PageRejection {
                        rejection: RejectionReason::ErrorPage,
                        classification: Classification::ErrorPage,
                        http_outcome: HttpOutcome::Status(response.status),
                        resolved_url: Some(current.to_string()),
                        detail: format!("document request returned {}", response.status),
                    });
                }
                Ok(response) => body = response.body,
                Err(err) => {
                    tracing::warn!(url = %current, "Page body unavailable: {}", err);
                    body_error = Some(err.kind().unwrap_or(TransportErrorKind::Other));
                }
            }
        }

        let mut resolved_url = current.to_string();
        let text = body.map(|html| {
            if let Some(canonical) = canonical_url(&html, &current) {
                if self.policy.is_non_specific(&canonical) {
                    tracing::debug!(url = %current, canonical = %canonical, "Ignoring non-specific canonical");
                } else {
                    resolved_url = canonical.to_string();
                }
            }
            Arc::<str>::from(visible_text(&html))
        });

        PageOutcome::Resolved(ResolvedPage {
            resolved_url,
            status,
            text,
            body_error,
        })
    }

    /// HEAD, falling back to GET when the server refuses HEAD
    async fn head_or_get(&self, url: &Url) -> Result<FetchResponse, FetchError> {
        let response = self.fetch_with_retry(FetchMethod::Head, url).await?;
        if HEAD_FALLBACK_STATUSES.contains(&response.status) {
            tracing::debug!(url = %url, status = response.status, "HEAD refused, retrying with GET");
            return self.fetch_with_retry(FetchMethod::Get, url).await;
        }
        Ok(response)
    }

    async fn fetch_with_retry(
        &self,
        method: FetchMethod,
        url: &Url,
    ) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(method, url).await {
                Err(err) if err.is_transient() && attempt < self.config.transport_retries => {
                    let delay = self.config.backoff_for(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        "{} failed, retrying in {:?}: {}",
                        method,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(&self, method: FetchMethod, url: &Url) -> Result<FetchResponse, FetchError> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            FetchError::transport(TransportErrorKind::Other, "fetch permits closed")
        })?;

        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, self.fetcher.fetch(method, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::transport(
                TransportErrorKind::Timeout,
                format!("{method} {url} timed out after {timeout:?}"),
            )),
        }
    }
}

fn unreachable_page(err: &FetchError, resolved_url: Option<String>) -> PageOutcome {
    let kind = err.kind().unwrap_or(TransportErrorKind::Other);
    PageOutcome::Rejected(PageRejection {
        rejection: RejectionReason::Unreachable,
        classification: Classification::Unreachable,
        http_outcome: HttpOutcome::Transport(kind),
        resolved_url,
        detail: err.to_string(),
    })
}

fn homepage(status: u16, url: &Url) -> PageRejection {
    PageRejection {
        rejection: RejectionReason::Homepage,
        classification: Classification::Homepage,
        http_outcome: HttpOutcome::Status(status),
        resolved_url: Some(url.to_string()),
        detail: format!("{url} is a homepage or listing page, not a specific article"),
    }
}
