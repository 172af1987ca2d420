//! Mirror definitions, URL rewriting and latency ranking.

use crate::game::installer::config::{
    BMCLAPI_BASE_URL, FORGE_MAVEN_URL, LAUNCHER_META_URL, LAUNCHER_URL, LIBRARIES_URL,
    MCBBS_BASE_URL, PISTON_DATA_URL, PISTON_META_URL, PROBE_TIMEOUT, RESOURCES_URL,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// How the mirror list is ordered before a batch starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorSelection {
    /// Keep the configured order
    Ordered,
    /// Probe every mirror and prefer the fastest
    #[default]
    Latency,
}

/// Prefix substitution applied to origin URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub from: String,
    pub to: String,
}

impl RewriteRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// An alternate endpoint serving the same artifacts as the origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    /// Probed for latency ranking
    pub base_domain: String,
    pub rules: Vec<RewriteRule>,
}

impl Mirror {
    pub fn new(name: impl Into<String>, base_domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_domain: base_domain.into(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rules.push(RewriteRule::new(from, to));
        self
    }

    /// Rewrite an origin URL onto this mirror. `None` when no rule covers it.
    pub fn rewrite(&self, url: &str) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| url.starts_with(&rule.from))
            .map(|rule| format!("{}{}", rule.to, &url[rule.from.len()..]))
    }

    /// Preset for BMCLAPI
    pub fn bmclapi() -> Self {
        Self::vanilla_preset("BMCLAPI", BMCLAPI_BASE_URL)
    }

    /// Preset for the MCBBS mirror
    pub fn mcbbs() -> Self {
        Self::vanilla_preset("MCBBS", MCBBS_BASE_URL)
    }

    fn vanilla_preset(name: &str, base: &str) -> Self {
        let root = format!("{}/", base);
        let maven = format!("{}/maven/", base);
        Self::new(name, base)
            .with_rule(LAUNCHER_META_URL, root.clone())
            .with_rule(LAUNCHER_URL, root.clone())
            .with_rule(PISTON_META_URL, root.clone())
            .with_rule(PISTON_DATA_URL, root)
            .with_rule(RESOURCES_URL, format!("{}/assets/", base))
            .with_rule(LIBRARIES_URL, maven.clone())
            .with_rule(FORGE_MAVEN_URL, maven)
    }
}

/// Ordered list of URLs to try for one artifact: ranked mirrors first, the
/// origin last. Duplicates are dropped.
pub fn candidate_urls(origin: &str, mirrors: &[Mirror]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(mirrors.len() + 1);
    for mirror in mirrors {
        if let Some(url) = mirror.rewrite(origin) {
            if url != origin && !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls.push(origin.to_string());
    urls
}

/// Time a TCP connect to the mirror's base domain.
/// Returns `None` when the address is unusable or the connect fails or times out.
pub async fn probe_latency(base_domain: &str, timeout: Duration) -> Option<Duration> {
    let with_scheme = if base_domain.contains("://") {
        base_domain.to_string()
    } else {
        format!("https://{}", base_domain)
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;

    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await {
        Ok(Ok(_stream)) => Some(start.elapsed()),
        Ok(Err(e)) => {
            log::debug!("Mirror probe to {}:{} failed: {}", host, port, e);
            None
        }
        Err(_) => {
            log::debug!("Mirror probe to {}:{} timed out", host, port);
            None
        }
    }
}

/// Order mirrors for a batch. With `Latency` and more than one mirror every
/// mirror is probed once; unreachable mirrors keep their relative order at the end.
pub async fn rank_mirrors(mirrors: &[Mirror], selection: MirrorSelection) -> Vec<Mirror> {
    if selection == MirrorSelection::Ordered || mirrors.len() <= 1 {
        return mirrors.to_vec();
    }

    let probes = join_all(
        mirrors
            .iter()
            .map(|m| probe_latency(&m.base_domain, PROBE_TIMEOUT)),
    )
    .await;

    let mut ranked: Vec<(Option<Duration>, Mirror)> =
        probes.into_iter().zip(mirrors.iter().cloned()).collect();
    ranked.sort_by_key(|(latency, _)| latency.unwrap_or(Duration::MAX));

    for (latency, mirror) in &ranked {
        log::debug!("Mirror {} latency: {:?}", mirror.name, latency);
    }

    ranked.into_iter().map(|(_, m)| m).collect()
}
