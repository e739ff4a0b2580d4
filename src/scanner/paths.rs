//! Hidden path discovery.
//!
//! A fixed pool of workers pulls wordlist indices from a shared cursor, so
//! at most `concurrency` requests are in flight no matter how long the
//! wordlist is. Results flow back over a bounded channel and are re-ordered
//! by wordlist index once every worker has finished.

use crate::error::{ModuleError, ModuleResult, ScanError};
use crate::scanner::{CancelToken, RateLimiter, ScanConfig};
use crate::types::{PathFinding, Target};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{redirect, Client};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Findings of one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// One finding per probed entry, in wordlist order.
    pub findings: Vec<PathFinding>,
    /// False when cancellation stopped the run before the wordlist was exhausted.
    pub complete: bool,
}

/// Concurrent wordlist prober.
#[derive(Debug, Clone)]
pub struct PathProber {
    client: Client,
    concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    show_progress: bool,
}

impl PathProber {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(config.path_timeout)
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ScanError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            concurrency: config.path_concurrency.max(1),
            rate_limiter: RateLimiter::per_second(config.path_rate_limit),
            show_progress: config.verbose,
        })
    }

    pub async fn probe(
        &self,
        target: &Target,
        wordlist: Arc<[String]>,
        cancel: &CancelToken,
    ) -> ModuleResult<ProbeOutcome> {
        let base = target
            .base_url()
            .map_err(|e| ModuleError::Unreachable(format!("{}: {}", target, e)))?;

        let total = wordlist.len();
        let workers = self.concurrency.min(total);
        info!(%base, entries = total, workers, "probing paths");

        let progress = self.progress_bar(total);
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<(usize, PathFinding)>(self.concurrency * 2);

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let client = self.client.clone();
                let limiter = self.rate_limiter.clone();
                let base = base.clone();
                let wordlist = Arc::clone(&wordlist);
                let cursor = Arc::clone(&cursor);
                let cancel = cancel.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(entry) = wordlist.get(index) else {
                            break;
                        };
                        if let Some(limiter) = &limiter {
                            limiter.wait().await;
                        }
                        let finding = probe_one(&client, &base, entry).await;
                        if tx.send((index, finding)).await.is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        drop(tx);

        let mut collected = Vec::with_capacity(total);
        while let Some((index, finding)) = rx.recv().await {
            if let Some(pb) = &progress {
                pb.inc(1);
                if finding.is_hit() {
                    pb.set_message(format!("found /{} ({})", finding.path, finding.status_code));
                }
            }
            collected.push((index, finding));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!(error = %e, "path worker terminated abnormally");
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        collected.sort_by_key(|(index, _)| *index);
        let findings: Vec<PathFinding> = collected.into_iter().map(|(_, f)| f).collect();
        let complete = findings.len() == total;
        let hits = findings.iter().filter(|f| f.is_hit()).count();

        if complete {
            info!(probed = findings.len(), hits, "path probing complete");
        } else {
            warn!(probed = findings.len(), total, hits, "path probing cancelled");
        }

        Ok(ProbeOutcome { findings, complete })
    }

    fn progress_bar(&self, total: usize) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        pb.set_style(style);
        Some(pb)
    }
}

/// Request one entry. Never fails: no response becomes the sentinel status.
async fn probe_one(client: &Client, base: &Url, entry: &str) -> PathFinding {
    let started = Instant::now();

    let url = match base.join(entry.trim_start_matches('/')) {
        Ok(url) => url,
        Err(e) => {
            debug!(entry, error = %e, "cannot build url");
            return PathFinding::no_response(entry, 0);
        }
    };

    match client.get(url.clone()).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let declared = response.content_length();
            let content_length = match response.bytes().await {
                Ok(body) => body.len() as u64,
                Err(_) => declared.unwrap_or(0),
            };
            debug!(%url, status, content_length, "probed");
            PathFinding::new(entry, status, content_length, elapsed_ms(started))
        }
        Err(e) => {
            debug!(%url, error = %e, "no response");
            PathFinding::no_response(entry, elapsed_ms(started))
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::test_support::{http_response, serve};
    use crate::types::Severity;
    use std::time::Duration;

    fn wordlist(entries: &[&str]) -> Arc<[String]> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_statuses_and_sentinel() {
        let addr = serve(|path| match path {
            "/admin" => Some(http_response(302, &[("Location", "/login")], "")),
            "/login" => Some(http_response(200, &[], "<form>login</form>")),
            _ => None,
        })
        .await;

        let target = Target::resolve(&format!("http://{}", addr)).unwrap();
        let prober = PathProber::new(&ScanConfig::default()).unwrap();
        let outcome = prober
            .probe(&target, wordlist(&["admin", "login", "backup"]), &CancelToken::new())
            .await
            .unwrap();

        assert!(outcome.complete);
        let statuses: Vec<u16> = outcome.findings.iter().map(|f| f.status_code).collect();
        assert_eq!(statuses, vec![302, 200, PathFinding::NO_RESPONSE]);
        let paths: Vec<&str> = outcome.findings.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["admin", "login", "backup"]);
        assert_eq!(outcome.findings[1].content_length, 18);
        assert_eq!(outcome.findings[1].severity, Severity::Low);
    }

    #[tokio::test]
    async fn test_one_finding_per_entry_in_wordlist_order() {
        let addr = serve(|path| {
            let n: usize = path.trim_start_matches("/p").parse().unwrap_or(0);
            match n % 3 {
                0 => Some(http_response(200, &[], "hit")),
                1 => Some(http_response(404, &[], "")),
                _ => None,
            }
        })
        .await;

        let entries: Vec<String> = (0..57).map(|i| format!("p{}", i)).collect();
        let config = ScanConfig::default()
            .with_path_concurrency(4)
            .with_path_timeout(Duration::from_secs(2));
        let target = Target::resolve(&format!("http://{}", addr)).unwrap();
        let outcome = PathProber::new(&config)
            .unwrap()
            .probe(&target, entries.clone().into(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.findings.len(), entries.len());
        for (i, finding) in outcome.findings.iter().enumerate() {
            assert_eq!(finding.path, entries[i]);
            let expected = match i % 3 {
                0 => 200,
                1 => 404,
                _ => PathFinding::NO_RESPONSE,
            };
            assert_eq!(finding.status_code, expected);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_issues_no_requests() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let target = Target::resolve("http://127.0.0.1:9").unwrap();
        let outcome = PathProber::new(&ScanConfig::default())
            .unwrap()
            .probe(&target, wordlist(&["admin", "login"]), &cancel)
            .await
            .unwrap();

        assert!(!outcome.complete);
        assert!(outcome.findings.is_empty());
    }

    #[tokio::test]
    async fn test_empty_wordlist() {
        let target = Target::resolve("http://127.0.0.1:9").unwrap();
        let outcome = PathProber::new(&ScanConfig::default())
            .unwrap()
            .probe(&target, wordlist(&[]), &CancelToken::new())
            .await
            .unwrap();
        assert!(outcome.complete);
        assert!(outcome.findings.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_entry_times_out_as_sentinel() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    if request.starts_with("GET /slow ") {
                        tokio::time::sleep(Duration::from_secs(3)).await;
                    }
                    let _ = socket
                        .write_all(http_response(200, &[], "ok").as_bytes())
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        let config = ScanConfig::default().with_path_timeout(Duration::from_millis(500));
        let target = Target::resolve(&format!("http://{}", addr)).unwrap();
        let outcome = PathProber::new(&config)
            .unwrap()
            .probe(&target, wordlist(&["slow", "fast"]), &CancelToken::new())
            .await
            .unwrap();

        assert!(outcome.complete);
        assert_eq!(outcome.findings[0].path, "slow");
        assert_eq!(outcome.findings[0].status_code, PathFinding::NO_RESPONSE);
        assert!(outcome.findings[0].elapsed_ms < 3_000);
        assert_eq!(outcome.findings[1].status_code, 200);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_keeps_completed_findings() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let addr = serve(move |path| {
            if path == "/p2" {
                trigger.cancel();
            }
            Some(http_response(200, &[], "ok"))
        })
        .await;

        let entries: Vec<String> = (0..6).map(|i| format!("p{}", i)).collect();
        let config = ScanConfig::default().with_path_concurrency(1);
        let target = Target::resolve(&format!("http://{}", addr)).unwrap();
        let outcome = PathProber::new(&config)
            .unwrap()
            .probe(&target, entries.into(), &cancel)
            .await
            .unwrap();

        assert!(!outcome.complete);
        let paths: Vec<&str> = outcome.findings.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["p0", "p1", "p2"]);
        assert!(outcome.findings.iter().all(|f| f.status_code == 200));
    }
}
