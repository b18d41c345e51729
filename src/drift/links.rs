//! Link checking
//!
//! Internal links are resolved against the project's indexed doc set and
//! need no I/O. External links are probed through a `LinkProber` under a
//! bounded semaphore with a per-check timeout; timeout and transport
//! failure yield `LinkStatus::Unknown`, never `Broken`.

use super::{DriftKind, DriftObservation, LinkStatus};
use crate::model::DocPage;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Probes an external link target.
///
/// Implementations decide what Broken means (e.g. HTTP 404/410); anything
/// inconclusive must come back Unknown.
#[async_trait::async_trait]
pub trait LinkProber: Send + Sync {
    async fn probe(&self, url: &str) -> LinkStatus;
}

/// HTTP prober using a HEAD request
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl LinkProber for HttpProber {
    async fn probe(&self, url: &str) -> LinkStatus {
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    LinkStatus::Valid
                } else if status == reqwest::StatusCode::NOT_FOUND
                    || status == reqwest::StatusCode::GONE
                {
                    LinkStatus::Broken
                } else {
                    // 401/403/429/5xx say nothing about the target
                    LinkStatus::Unknown
                }
            }
            Err(_) => LinkStatus::Unknown,
        }
    }
}

/// Resolve every internal link against the project's doc set.
///
/// A `path#anchor` target needs the page and the anchor; a bare `path`
/// needs the page only; a same-page `#anchor` needs the anchor on the
/// linking page itself.
pub fn check_internal(docs: &[DocPage]) -> Vec<DriftObservation> {
    let mut index: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for doc in docs {
        let anchors = index.entry(doc.path.as_str()).or_default();
        for heading in &doc.headings {
            anchors.insert(heading.anchor.as_str());
        }
    }

    let mut observations = Vec::new();

    for doc in docs {
        for link in &doc.links {
            if link.external {
                continue;
            }

            let (path, anchor) = match link.url.split_once('#') {
                Some(("", anchor)) => (doc.path.as_str(), anchor),
                Some((path, anchor)) => (path, anchor),
                None => (link.url.as_str(), ""),
            };

            let evidence = match index.get(path) {
                None => Some(format!(
                    "link at line {} targets '{}' but no such page is indexed",
                    link.line, link.url
                )),
                Some(anchors) if !anchor.is_empty() && !anchors.contains(anchor) => {
                    Some(format!(
                        "link at line {} targets '{}' but '{}' has no anchor '{}'",
                        link.line, link.url, path, anchor
                    ))
                }
                Some(_) => None,
            };

            if let Some(evidence) = evidence {
                observations.push(DriftObservation {
                    kind: DriftKind::BrokenLink,
                    entity_id: None,
                    doc_id: Some(doc.id.clone()),
                    anchor: Some(link.url.clone()),
                    evidence,
                });
            }
        }
    }

    observations
}

/// Probe every external link with bounded concurrency and a per-check
/// timeout. Returns broken-link observations; Unknown results produce
/// nothing and are retried on the next run.
pub async fn check_external(
    docs: &[DocPage],
    prober: Arc<dyn LinkProber>,
    concurrency: usize,
    timeout: Duration,
) -> Vec<DriftObservation> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::new();

    for doc in docs {
        for link in &doc.links {
            if !link.external {
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let prober = Arc::clone(&prober);
            let url = link.url.clone();
            let doc_id = doc.id.clone();
            let line = link.line;

            tasks.push(tokio::spawn(async move {
                // Closed only on shutdown; treat as inconclusive
                let Ok(_permit) = semaphore.acquire().await else {
                    return (doc_id, url, line, LinkStatus::Unknown);
                };
                let status = match tokio::time::timeout(timeout, prober.probe(&url)).await {
                    Ok(status) => status,
                    Err(_) => LinkStatus::Unknown,
                };
                (doc_id, url, line, status)
            }));
        }
    }

    let mut observations = Vec::new();
    for task in tasks {
        let Ok((doc_id, url, line, status)) = task.await else {
            continue;
        };
        if status == LinkStatus::Broken {
            observations.push(DriftObservation {
                kind: DriftKind::BrokenLink,
                entity_id: None,
                doc_id: Some(doc_id),
                anchor: Some(url.clone()),
                evidence: format!("external link at line {line} targets '{url}' which is gone"),
            });
        }
    }

    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocLink, Heading, HeadingLevel};
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn page(id: &str, path: &str, headings: &[(&str, &str)], links: Vec<DocLink>) -> DocPage {
        DocPage {
            id: id.to_string(),
            project_id: "p1".to_string(),
            path: path.to_string(),
            title: "Doc".to_string(),
            headings: headings
                .iter()
                .map(|(text, anchor)| Heading {
                    level: HeadingLevel::H2,
                    text: text.to_string(),
                    anchor: anchor.to_string(),
                    line: 1,
                    embedding: None,
                })
                .collect(),
            links,
            code_blocks: Vec::new(),
            commit: None,
            last_updated: Utc::now(),
            frontmatter: Map::new(),
            version: 1,
            embedding: None,
        }
    }

    fn internal(url: &str) -> DocLink {
        DocLink {
            url: url.to_string(),
            line: 7,
            external: false,
        }
    }

    #[test]
    fn test_missing_anchor_is_broken() {
        let docs = vec![
            page("d1", "guide.md", &[], vec![internal("api.md#get-user")]),
            page("d2", "api.md", &[("Delete User", "delete-user")], vec![]),
        ];

        let observations = check_internal(&docs);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, DriftKind::BrokenLink);
        assert_eq!(observations[0].doc_id.as_deref(), Some("d1"));
        assert_eq!(observations[0].anchor.as_deref(), Some("api.md#get-user"));
    }

    #[test]
    fn test_valid_links_pass() {
        let docs = vec![
            page(
                "d1",
                "guide.md",
                &[("Intro", "intro")],
                vec![
                    internal("api.md#get-user"),
                    internal("api.md"),
                    internal("#intro"),
                ],
            ),
            page("d2", "api.md", &[("Get User", "get-user")], vec![]),
        ];

        assert!(check_internal(&docs).is_empty());
    }

    #[test]
    fn test_missing_page_is_broken() {
        let docs = vec![page("d1", "guide.md", &[], vec![internal("gone.md")])];
        let observations = check_internal(&docs);
        assert_eq!(observations.len(), 1);
    }

    struct FixedProber(LinkStatus);

    #[async_trait::async_trait]
    impl LinkProber for FixedProber {
        async fn probe(&self, _url: &str) -> LinkStatus {
            self.0
        }
    }

    struct SlowProber;

    #[async_trait::async_trait]
    impl LinkProber for SlowProber {
        async fn probe(&self, _url: &str) -> LinkStatus {
            tokio::time::sleep(Duration::from_secs(60)).await;
            LinkStatus::Broken
        }
    }

    fn external(url: &str) -> DocLink {
        DocLink {
            url: url.to_string(),
            line: 3,
            external: true,
        }
    }

    #[tokio::test]
    async fn test_broken_external_link_reported() {
        let docs = vec![page(
            "d1",
            "guide.md",
            &[],
            vec![external("https://example.com/gone")],
        )];

        let observations = check_external(
            &docs,
            Arc::new(FixedProber(LinkStatus::Broken)),
            4,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, DriftKind::BrokenLink);
    }

    #[tokio::test]
    async fn test_timeout_is_unknown_not_broken() {
        let docs = vec![page(
            "d1",
            "guide.md",
            &[],
            vec![external("https://example.com/slow")],
        )];

        let observations = check_external(
            &docs,
            Arc::new(SlowProber),
            4,
            Duration::from_millis(10),
        )
        .await;

        // Timed-out check yields Unknown, which produces no observation
        assert!(observations.is_empty());
    }

    #[tokio::test]
    async fn test_valid_external_links_pass() {
        let docs = vec![page(
            "d1",
            "guide.md",
            &[],
            vec![external("https://example.com/ok")],
        )];

        let observations = check_external(
            &docs,
            Arc::new(FixedProber(LinkStatus::Valid)),
            4,
            Duration::from_secs(5),
        )
        .await;

        assert!(observations.is_empty());
    }
}
