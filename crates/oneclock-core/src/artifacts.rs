//! Failure artifacts: screenshot, page snapshot and URL for a moment the
//! flow went wrong. Dumping is strictly best-effort and never fails the run.

use std::path::Path;

use chrono::Local;
use tracing::debug;

use crate::driver::Driver;

/// Write `<timestamp>_<tag>.png/.html/.url.txt` into `dump_dir`.
/// No-op when `dump_dir` is `None`; every individual write failure is
/// swallowed after a debug log.
pub async fn dump<D: Driver + ?Sized>(driver: &mut D, dump_dir: Option<&Path>, tag: &str) {
    let Some(dir) = dump_dir else { return };

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        debug!(error = %e, "could not create dump dir");
        return;
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = format!("{ts}_{}", sanitize_tag(tag));

    if let Ok(png) = driver.screenshot().await {
        let _ = tokio::fs::write(dir.join(format!("{stem}.png")), png).await;
    }
    if let Ok(html) = driver.page_source().await {
        let _ = tokio::fs::write(dir.join(format!("{stem}.html")), html).await;
    }
    if let Ok(url) = driver.current_url().await {
        let _ = tokio::fs::write(dir.join(format!("{stem}.url.txt")), url).await;
    }
    debug!(base = %dir.join(&stem).display(), "wrote artifacts");
}

fn sanitize_tag(tag: &str) -> String {
    let tag = if tag.is_empty() { "debug" } else { tag };
    tag.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_awkward_characters() {
        assert_eq!(sanitize_tag("duo timeout!"), "duo_timeout_");
        assert_eq!(sanitize_tag("idpproxy_400"), "idpproxy_400");
        assert_eq!(sanitize_tag(""), "debug");
    }
}
