use async_trait::async_trait;
use pra_citation::{
    CitationVerifier, Classification, FetchError, FetchMethod, FetchResponse, HttpOutcome,
    PageFetcher, ProposedCitation, RejectionReason, StaticFetcher, TransportErrorKind,
    VerificationStatus, VerifierConfig,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const ARTICLE: &str = r#"<html><head><title>Checkout study</title>
<link rel="canonical" href="https://example.com/research/checkout-study"></head>
<body><nav><a href="/">Home</a></nav>
<article><h1>Checkout study 2024</h1>
<p>Our 2024 survey found many problems. Users are frustrated with checkout friction.
Most abandon their carts at the payment step.</p>
<p>Separately, loyalty members book twice as often as guests.</p></article>
</body></html>"#;

fn build(fetcher: StaticFetcher) -> (CitationVerifier, Arc<StaticFetcher>) {
    let fetcher = Arc::new(fetcher);
    let config = VerifierConfig::default().with_retries(2, Duration::from_millis(1));
    let verifier = CitationVerifier::new(config, fetcher.clone()).unwrap();
    (verifier, fetcher)
}

#[tokio::test]
async fn test_homepage_is_rejected_despite_200() {
    let (verifier, _) = build(StaticFetcher::new().with_page("https://example.com/", ARTICLE));

    let record = verifier
        .verify(&ProposedCitation::new("https://example.com/"))
        .await;

    assert_eq!(record.status, VerificationStatus::Rejected);
    assert_eq!(record.classification, Some(Classification::Homepage));
    assert_eq!(record.rejection, Some(RejectionReason::Homepage));
    assert_eq!(record.http_outcome, HttpOutcome::Status(200));
}

#[tokio::test]
async fn test_not_found_is_error_page() {
    let (verifier, _) = build(StaticFetcher::new().with_status("https://example.com/gone", 404));

    let record = verifier
        .verify(&ProposedCitation::new("https://example.com/gone"))
        .await;

    assert_eq!(record.status, VerificationStatus::Rejected);
    assert_eq!(record.classification, Some(Classification::ErrorPage));
    assert_eq!(record.http_outcome, HttpOutcome::Status(404));
}

#[tokio::test]
async fn test_verbatim_quote_is_verified() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, _) = build(StaticFetcher::new().with_page(url, ARTICLE));
    let quote = "Users are frustrated with checkout friction";

    let record = verifier
        .verify(&ProposedCitation::new(url).with_quote(quote))
        .await;

    assert_eq!(record.status, VerificationStatus::Verified);
    assert_eq!(record.classification, Some(Classification::Article));
    assert_eq!(record.matched_quote.as_deref(), Some(quote));
    assert_eq!(record.corrected_quote, None);
}

#[tokio::test]
async fn test_reworded_quote_is_corrected_and_correction_reverifies() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, _) = build(StaticFetcher::new().with_page(url, ARTICLE));

    let record = verifier
        .verify(&ProposedCitation::new(url).with_quote("Checkout friction frustrates users"))
        .await;

    assert_eq!(record.status, VerificationStatus::UnverifiedParaphrase);
    let corrected = record.corrected_quote.clone().unwrap();
    assert_eq!(corrected, "Users are frustrated with checkout friction");

    let again = verifier
        .verify(&ProposedCitation::new(url).with_quote(corrected.clone()))
        .await;
    assert_eq!(again.status, VerificationStatus::Verified);
    assert_eq!(again.matched_quote, Some(corrected));
}

#[tokio::test]
async fn test_fabricated_and_spliced_quotes_are_rejected() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, _) = build(StaticFetcher::new().with_page(url, ARTICLE));

    let fabricated = verifier
        .verify(&ProposedCitation::new(url).with_quote("Ninety percent of shoppers love queues"))
        .await;
    assert_eq!(fabricated.rejection, Some(RejectionReason::QuoteNotFound));
    assert_eq!(fabricated.classification, Some(Classification::Article));

    let spliced = verifier
        .verify(&ProposedCitation::new(url).with_quote(
            "Users are frustrated with checkout friction ... loyalty members book twice as often",
        ))
        .await;
    assert_eq!(spliced.rejection, Some(RejectionReason::QuoteNotFound));
}

#[tokio::test]
async fn test_identical_lookups_hit_cache() {
    let url = "https://example.com/research/checkout-study";
    let other = "https://example.com/research/other";
    let (verifier, fetcher) = build(
        StaticFetcher::new()
            .with_page(url, ARTICLE)
            .with_page(other, "<p>Other page</p>"),
    );
    let citation = ProposedCitation::new(url).with_quote("Users are frustrated with checkout friction");

    let first = verifier.verify(&citation).await;
    let second = verifier.verify(&citation).await;
    let _ = verifier.verify(&ProposedCitation::new(url)).await;
    let _ = verifier.verify(&ProposedCitation::new(other)).await;

    assert_eq!(first, second);
    // HEAD + GET per unique url
    assert_eq!(fetcher.calls_for(url), 2);
    assert_eq!(fetcher.call_count(), 4);

    let stats = verifier.stats();
    assert_eq!(stats.lookups, 4);
    assert_eq!(stats.fetches, 2);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_concurrent_duplicates_fetch_once() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, fetcher) = build(StaticFetcher::new().with_page(url, ARTICLE));
    let citation = ProposedCitation::new(url);

    let records =
        futures::future::join_all((0..10).map(|_| verifier.verify(&citation))).await;

    assert!(records.iter().all(|r| r.is_verified()));
    assert_eq!(fetcher.calls_for(url), 2);
    assert_eq!(verifier.stats().hits, 9);
}

#[tokio::test]
async fn test_redirects_are_followed_and_canonical_preferred() {
    let (verifier, _) = build(
        StaticFetcher::new()
            .with_redirect("http://example.com/s/abc", "https://example.com/amp/checkout")
            .with_page("https://example.com/amp/checkout", ARTICLE),
    );

    let record = verifier
        .verify(&ProposedCitation::new("http://example.com/s/abc"))
        .await;

    assert!(record.is_verified());
    assert_eq!(record.url, "http://example.com/s/abc");
    assert_eq!(
        record.resolved_url.as_deref(),
        Some("https://example.com/research/checkout-study")
    );
}

#[tokio::test]
async fn test_redirect_cycle_and_long_chain() {
    let (verifier, _) = build(
        StaticFetcher::new()
            .with_redirect("https://example.com/a", "https://example.com/b")
            .with_redirect("https://example.com/b", "https://example.com/a")
            .with_redirect("https://example.com/1", "/2")
            .with_redirect("https://example.com/2", "/3")
            .with_redirect("https://example.com/3", "/4")
            .with_redirect("https://example.com/4", "/5")
            .with_page("https://example.com/5", ARTICLE),
    );

    let cycle = verifier.verify(&ProposedCitation::new("https://example.com/a")).await;
    assert_eq!(cycle.classification, Some(Classification::RedirectLoop));

    let long = verifier.verify(&ProposedCitation::new("https://example.com/1")).await;
    assert_eq!(long.classification, Some(Classification::RedirectLoop));
    assert_eq!(long.rejection, Some(RejectionReason::RedirectLoop));
}

#[tokio::test]
async fn test_redirect_to_homepage_is_rejected() {
    let (verifier, _) = build(
        StaticFetcher::new()
            .with_redirect("https://example.com/old-article", "https://example.com/")
            .with_page("https://example.com/", ARTICLE),
    );

    let record = verifier
        .verify(&ProposedCitation::new("https://example.com/old-article"))
        .await;

    assert_eq!(record.classification, Some(Classification::Homepage));
    assert_eq!(record.resolved_url.as_deref(), Some("https://example.com/"));
}

#[tokio::test]
async fn test_redirect_without_location_is_error_page() {
    let (verifier, _) = build(StaticFetcher::new().with_status("https://example.com/research/moved", 302));

    let record = verifier
        .verify(&ProposedCitation::new("https://example.com/research/moved"))
        .await;

    assert_eq!(record.status, VerificationStatus::Rejected);
    assert_eq!(record.classification, Some(Classification::ErrorPage));
    assert_eq!(record.rejection, Some(RejectionReason::ErrorPage));
    assert_eq!(record.http_outcome, HttpOutcome::Status(302));
}

#[tokio::test]
async fn test_head_rejection_falls_back_to_get() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, fetcher) = build(StaticFetcher::new().with_head_rejected(url, ARTICLE));

    let record = verifier
        .verify(&ProposedCitation::new(url).with_quote("Most abandon their carts at the payment step"))
        .await;

    assert!(record.is_verified());
    let methods: Vec<FetchMethod> = fetcher.calls().into_iter().map(|(m, _)| m).collect();
    assert_eq!(methods, vec![FetchMethod::Head, FetchMethod::Get]);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let url = "https://example.com/research/checkout-study";
    let (verifier, fetcher) = build(StaticFetcher::new().with_flaky_page(
        url,
        TransportErrorKind::ConnectionRefused,
        2,
        ARTICLE,
    ));

    let record = verifier.verify(&ProposedCitation::new(url)).await;

    assert!(record.is_verified());
    // two failed HEADs, one good HEAD, one GET
    assert_eq!(fetcher.calls_for(url), 4);
}

#[tokio::test]
async fn test_dns_failure_is_not_retried() {
    let url = "https://no-such-host.invalid/article";
    let (verifier, fetcher) =
        build(StaticFetcher::new().with_failure(url, TransportErrorKind::Dns));

    let record = verifier.verify(&ProposedCitation::new(url)).await;

    assert_eq!(record.classification, Some(Classification::Unreachable));
    assert_eq!(
        record.http_outcome,
        HttpOutcome::Transport(TransportErrorKind::Dns)
    );
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_policy_rejections_are_not_retried() {
    let (verifier, fetcher) = build(StaticFetcher::new().with_status("https://example.com/x", 500));

    let record = verifier.verify(&ProposedCitation::new("https://example.com/x")).await;

    assert_eq!(record.classification, Some(Classification::ErrorPage));
    assert_eq!(fetcher.call_count(), 1);
}

#[derive(Debug)]
struct SlowFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch(&self, _method: FetchMethod, _url: &Url) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(FetchResponse {
            status: 200,
            location: None,
            body: None,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_timeout_is_unreachable() {
    let fetcher = Arc::new(SlowFetcher {
        calls: AtomicUsize::new(0),
    });
    let config = VerifierConfig::default()
        .with_timeout(Duration::from_secs(10))
        .with_retries(2, Duration::from_millis(250));
    let verifier = CitationVerifier::new(config, fetcher.clone()).unwrap();

    let record = verifier
        .verify(&ProposedCitation::new("https://slow.example.com/article"))
        .await;

    assert_eq!(record.classification, Some(Classification::Unreachable));
    assert_eq!(
        record.http_outcome,
        HttpOutcome::Transport(TransportErrorKind::Timeout)
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
}

#[derive(Debug, Default)]
struct GaugeFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl PageFetcher for GaugeFetcher {
    async fn fetch(&self, method: FetchMethod, _url: &Url) -> Result<FetchResponse, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(FetchResponse {
            status: 200,
            location: None,
            body: (method == FetchMethod::Get).then(|| "<p>article</p>".to_string()),
        })
    }
}

#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    let fetcher = Arc::new(GaugeFetcher::default());
    let config = VerifierConfig::default().with_max_concurrent_fetches(3);
    let verifier = CitationVerifier::new(config, fetcher.clone()).unwrap();

    let citations: Vec<ProposedCitation> = (0..20)
        .map(|i| ProposedCitation::new(format!("https://example.com/articles/{i}")))
        .collect();
    let records = futures::future::join_all(citations.iter().map(|c| verifier.verify(c))).await;

    assert!(records.iter().all(|r| r.is_verified()));
    assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
    assert!(fetcher.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_malformed_url_skips_network() {
    let (verifier, fetcher) = build(StaticFetcher::new());

    for raw in ["example.com/article", "mailto:someone@example.com", "  "] {
        let record = verifier.verify(&ProposedCitation::new(raw)).await;
        assert_eq!(record.rejection, Some(RejectionReason::MalformedUrl), "{raw}");
        assert_eq!(record.http_outcome, HttpOutcome::NotAttempted);
    }
    assert_eq!(fetcher.call_count(), 0);
}
