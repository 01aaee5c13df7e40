//! Operator notifications. A blocking modal on macOS when acknowledgement
//! matters, a desktop toast elsewhere, stdout as the floor. Never fails.

use tracing::debug;

/// Tell the operator something happened. With `require_ack` on macOS this
/// blocks on a modal alert until dismissed.
pub async fn notify(title: &str, message: &str, require_ack: bool) {
    if require_ack && cfg!(target_os = "macos") {
        if modal_alert(title, message).await {
            return;
        }
    }
    if toast(title, message).await {
        return;
    }
    println!("{message}");
}

#[cfg(target_os = "macos")]
async fn modal_alert(title: &str, message: &str) -> bool {
    let script = format!(
        "display alert \"{}\" message \"{}\" buttons {{\"OK\"}} default button \"OK\"",
        escape(title),
        escape(message)
    );
    match tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .status()
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "osascript alert failed");
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
async fn modal_alert(_title: &str, _message: &str) -> bool {
    false
}

#[cfg(target_os = "macos")]
async fn toast(title: &str, message: &str) -> bool {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape(message),
        escape(title)
    );
    tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .status()
        .await
        .is_ok()
}

#[cfg(all(unix, not(target_os = "macos")))]
async fn toast(title: &str, message: &str) -> bool {
    tokio::process::Command::new("notify-send")
        .arg(title)
        .arg(message)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
async fn toast(_title: &str, _message: &str) -> bool {
    false
}

#[cfg(target_os = "macos")]
fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
