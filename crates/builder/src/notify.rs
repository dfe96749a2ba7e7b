//! Maintainer notification
//!
//! Every external-operation failure after configuration resolution is
//! reported by mail to the docset's maintainer contacts, with the failed
//! command and its captured output.

use async_trait::async_trait;
use docbuild_errors::NotifyError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Plaintext failure notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub product: String,
    pub docset: String,
    pub lang: String,
    pub target: String,
    pub remote: String,
    pub branch: String,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub recipients: Vec<String>,
}

impl Notification {
    #[must_use]
    pub fn subject(&self) -> String {
        format!(
            "[docbuild] Failed to execute command ({}/{}, {})",
            self.product, self.docset, self.lang
        )
    }

    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Cheerio!\n\n\
             docbuild failed to execute a command during the following build instruction:\n\n\
             Product:        {}\n\
             Docset:         {}\n\
             Language:       {}\n\
             Target Server:  {}\n\n\
             Repository:     {}\n\
             Branch:         {}\n\n\n\
             These are the details:\n\n\
             === Failed Command ===\n\n{}\n\n\n\
             === stdout ===\n\n{}\n\n\n\
             === stderr ===\n\n{}\n",
            self.product,
            self.docset,
            self.lang,
            self.target,
            self.remote,
            self.branch,
            self.command,
            self.stdout,
            self.stderr,
        )
    }
}

/// Delivery seam for failure notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Production notifier: pipes the message to a sendmail-style command
#[derive(Debug, Clone)]
pub struct CommandMailer {
    command: String,
}

impl CommandMailer {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Notifier for CommandMailer {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if notification.recipients.is_empty() {
            return Err(NotifyError::NoRecipients {
                product: notification.product.clone(),
                docset: notification.docset.clone(),
            });
        }

        let message = format!(
            "To: {}\nSubject: {}\n\n{}",
            notification.recipients.join(", "),
            notification.subject(),
            notification.body(),
        );

        let failed = |message: String| NotifyError::MailerFailed {
            command: self.command.clone(),
            message,
        };

        let mut child = Command::new(&self.command)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .await
                .map_err(|e| failed(e.to_string()))?;
        }

        let status = child.wait().await.map_err(|e| failed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(failed(format!("exit code {:?}", status.code())))
        }
    }
}

/// Test notifier that records every notification it is handed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            product: "sles".into(),
            docset: "15ga".into(),
            lang: "en".into(),
            target: "external".into(),
            remote: "https://github.com/SUSE/doc-sle.git".into(),
            branch: "main".into(),
            command: "rsync -lr /a/ /b".into(),
            stdout: String::new(),
            stderr: "rsync: connection refused".into(),
            recipients: vec!["docs@example.com".into()],
        }
    }

    #[test]
    fn subject_names_the_tuple() {
        assert_eq!(
            notification().subject(),
            "[docbuild] Failed to execute command (sles/15ga, en)"
        );
    }

    #[test]
    fn body_carries_command_and_output() {
        let body = notification().body();
        assert!(body.contains("Product:        sles"));
        assert!(body.contains("Branch:         main"));
        assert!(body.contains("rsync -lr /a/ /b"));
        assert!(body.contains("rsync: connection refused"));
    }

    #[tokio::test]
    async fn mailer_requires_recipients() {
        let mut n = notification();
        n.recipients.clear();
        let err = CommandMailer::new("sendmail").send(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::NoRecipients { .. }));
    }

    #[tokio::test]
    async fn recording_notifier_records() {
        let recorder = RecordingNotifier::new();
        recorder.send(&notification()).await.unwrap();
        assert_eq!(recorder.sent().len(), 1);
        assert_eq!(recorder.sent()[0].docset, "15ga");
    }
}
