//! Best-effort hosting sync after content changes.
//!
//! Each notification is an unsupervised task on the runtime. Nothing waits for
//! it, failures are logged and dropped, and overlapping runs are not
//! serialized.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::run_tool;

/// Fires the configured hosting-sync command in the background.
#[derive(Debug, Clone, Default)]
pub struct DeployNotifier {
    command: Option<Arc<[String]>>,
}

impl DeployNotifier {
    /// `command` is program followed by arguments; `None` disables syncing.
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self {
            command: command.filter(|argv| !argv.is_empty()).map(Arc::from),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.command.is_some()
    }

    /// Spawns one sync run. The handle is only awaited by tests.
    pub fn notify(&self, reason: &'static str) -> Option<JoinHandle<()>> {
        let argv = self.command.clone()?;
        Some(tokio::spawn(async move {
            let Some((program, args)) = argv.split_first() else {
                return;
            };
            info!(reason, program = %program, "syncing hosting");
            match run_tool(program, args).await {
                Ok(output) if output.success => info!(reason, "hosting sync complete"),
                Ok(output) => warn!(
                    reason,
                    status = %output.status,
                    error = %output.diagnostics(),
                    "hosting sync failed"
                ),
                Err(err) => warn!(reason, error = %err, "hosting sync could not start"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_disables_notifier() {
        assert!(!DeployNotifier::new(Some(Vec::new())).is_enabled());
        assert!(!DeployNotifier::new(None).is_enabled());
        assert!(DeployNotifier::default().notify("test").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_command_in_background() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("deployed");
        let notifier = DeployNotifier::new(Some(vec![
            "touch".to_string(),
            marker.to_string_lossy().into_owned(),
        ]));

        notifier
            .notify("test")
            .expect("enabled")
            .await
            .expect("task");
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failures_are_swallowed() {
        let failing = DeployNotifier::new(Some(vec!["false".to_string()]));
        failing.notify("test").expect("enabled").await.expect("task");

        let missing = DeployNotifier::new(Some(vec!["no-such-deploy-tool-xyz".to_string()]));
        missing.notify("test").expect("enabled").await.expect("task");
    }
}
