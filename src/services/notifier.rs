// src/services/notifier.rs

//! Change notification service.
//!
//! Builds one plain-text mail per recipient and hands a resource's mails to
//! a [`Notifier`] as a single batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::client::SmtpConnection;
use lettre::transport::smtp::extension::ClientId;
use lettre::{Address, Message};

use crate::error::{AppError, Result};
use crate::models::{MailAddress, MailConfig, TrackedResource};
use crate::utils::strip_html;

/// A single mail to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub from: MailAddress,
    pub to: MailAddress,
    pub subject: String,
    pub body: String,
}

/// Mail delivery capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver all messages in one session.
    ///
    /// The outer `Err` means the session itself failed and nothing was sent.
    /// Otherwise there is one result per message, in order.
    async fn send_batch(&self, messages: &[NotificationMessage]) -> Result<Vec<Result<()>>>;
}

/// Plain SMTP delivery without TLS or authentication.
///
/// A batch shares one SMTP session. The relay closes the session when it
/// rejects a message, so the remaining messages go out over a fresh one.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig, timeout: Duration) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open a session: greeting plus `EHLO`.
    fn connect(&self) -> Result<SmtpConnection> {
        SmtpConnection::connect(
            (self.host.as_str(), self.port),
            Some(self.timeout),
            &ClientId::default(),
            None,
            None,
        )
        .map_err(|e| {
            AppError::mail(format!(
                "Cannot send mails via SMTP to {}: {}",
                self.endpoint(),
                e
            ))
        })
    }

    /// Deliver every message, reusing `connection` while it stays usable.
    fn deliver(
        &self,
        connection: SmtpConnection,
        messages: &[NotificationMessage],
    ) -> Vec<Result<()>> {
        let mut session = Some(connection);
        let mut results = Vec::with_capacity(messages.len());

        for message in messages {
            let email = match build_message(message) {
                Ok(email) => email,
                Err(e) => {
                    results.push(Err(e));
                    continue;
                }
            };

            let mut conn = match session.take() {
                Some(conn) => conn,
                None => match self.connect() {
                    Ok(conn) => conn,
                    Err(e) => {
                        results.push(Err(e));
                        continue;
                    }
                },
            };

            let sent = conn
                .send(email.envelope(), &email.formatted())
                .map(|_| ())
                .map_err(AppError::mail);
            if !conn.has_broken() {
                session = Some(conn);
            }
            results.push(sent);
        }

        if let Some(mut conn) = session {
            if let Err(e) = conn.quit() {
                log::debug!("SMTP session to {} not closed cleanly: {}", self.endpoint(), e);
            }
        }

        results
    }
}

fn mailbox(address: &MailAddress) -> Result<Mailbox> {
    let parsed: Address = address.address().parse().map_err(AppError::mail)?;
    let name = address
        .has_display_name()
        .then(|| address.name().to_string());
    Ok(Mailbox::new(name, parsed))
}

fn build_message(message: &NotificationMessage) -> Result<Message> {
    Message::builder()
        .from(mailbox(&message.from)?)
        .to(mailbox(&message.to)?)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(AppError::mail)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_batch(&self, messages: &[NotificationMessage]) -> Result<Vec<Result<()>>> {
        let notifier = self.clone();
        let messages = messages.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Vec<Result<()>>> {
            let connection = notifier.connect()?;
            Ok(notifier.deliver(connection, &messages))
        })
        .await
        .map_err(AppError::mail)?
    }
}

/// Outcome of notifying all recipients of one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub sent: Vec<MailAddress>,
    pub failed: Vec<(MailAddress, String)>,
    /// Set when the notifier could not open a session at all
    pub session_error: Option<String>,
}

impl DispatchResult {
    /// Whether every recipient was reached.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.session_error.is_none()
    }
}

/// Service turning a detected change into mails.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    from: MailAddress,
    tag: String,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, from: MailAddress, tag: impl Into<String>) -> Self {
        Self {
            notifier,
            from,
            tag: tag.into(),
        }
    }

    /// `[<tag>] <host> changed`
    pub fn subject(&self, resource: &TrackedResource) -> String {
        format!("[{}] {} changed", self.tag, resource.host())
    }

    /// Lead line naming the resource, followed by the diff.
    pub fn body(&self, resource: &TrackedResource, diff: &str) -> String {
        let diff = if resource.strip_html {
            strip_html(diff)
        } else {
            diff.to_string()
        };
        format!("Change at {} - diff follows:\n\n{}", resource.url, diff)
    }

    /// One message per recipient, in recipient order.
    pub fn messages(&self, resource: &TrackedResource, diff: &str) -> Vec<NotificationMessage> {
        let subject = self.subject(resource);
        let body = self.body(resource, diff);

        resource
            .recipients
            .iter()
            .map(|to| NotificationMessage {
                from: self.from.clone(),
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
            })
            .collect()
    }

    /// Send the change to every recipient of the resource.
    ///
    /// Failures are logged and reported, never returned as errors.
    pub async fn notify(&self, resource: &TrackedResource, diff: &str) -> DispatchResult {
        let messages = self.messages(resource, diff);
        let mut result = DispatchResult::default();

        let outcomes = match self.notifier.send_batch(&messages).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                log::error!("{}", e);
                result.session_error = Some(e.to_string());
                return result;
            }
        };

        let mut outcomes = outcomes.into_iter();
        for message in messages {
            match outcomes.next() {
                Some(Ok(())) => {
                    log::debug!("Mail sent to {}", message.to);
                    result.sent.push(message.to);
                }
                Some(Err(e)) => {
                    log::error!("Cannot send mail to {}: {}", message.to, e);
                    result.failed.push((message.to, e.to_string()));
                }
                None => {
                    log::error!("No delivery result for {}", message.to);
                    result
                        .failed
                        .push((message.to, "no delivery result".to_string()));
                }
            }
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Records every batch; can be told to fail sessions or single recipients.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) batches: Mutex<Vec<Vec<NotificationMessage>>>,
        pub(crate) fail_session: bool,
        pub(crate) reject: Vec<String>,
    }

    impl RecordingNotifier {
        pub(crate) fn sent(&self) -> Vec<NotificationMessage> {
            self.batches.lock().unwrap().iter().flatten().cloned().collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_batch(&self, messages: &[NotificationMessage]) -> Result<Vec<Result<()>>> {
            if self.fail_session {
                return Err(AppError::mail("connection refused"));
            }
            self.batches.lock().unwrap().push(messages.to_vec());
            Ok(messages
                .iter()
                .map(|m| {
                    if self.reject.iter().any(|r| r == m.to.address()) {
                        Err(AppError::mail("mailbox unavailable"))
                    } else {
                        Ok(())
                    }
                })
                .collect())
        }
    }

    fn resource(strip_html: bool) -> TrackedResource {
        TrackedResource::new(
            "http://example.org/page",
            strip_html,
            vec![
                MailAddress::parse("alerts@example.org"),
                MailAddress::parse("Ops Team <ops@example.org>"),
            ],
        )
        .unwrap()
    }

    fn dispatcher(notifier: Arc<dyn Notifier>) -> NotificationDispatcher {
        NotificationDispatcher::new(notifier, MailAddress::parse("wcc@example.org"), "wcc")
    }

    #[test]
    fn test_subject_and_body() {
        let dispatcher = dispatcher(Arc::new(RecordingNotifier::default()));
        let resource = resource(false);

        assert_eq!(dispatcher.subject(&resource), "[wcc] example.org changed");
        assert_eq!(
            dispatcher.body(&resource, "+<b>new</b>\n"),
            "Change at http://example.org/page - diff follows:\n\n+<b>new</b>\n"
        );
    }

    #[test]
    fn test_body_strips_markup_when_flagged() {
        let dispatcher = dispatcher(Arc::new(RecordingNotifier::default()));
        let body = dispatcher.body(&resource(true), "+<b>new</b>\n");
        assert!(body.ends_with("+ new \n"));
    }

    #[test]
    fn test_mail_building() {
        let message = NotificationMessage {
            from: MailAddress::parse("Checker <wcc@example.org>"),
            to: MailAddress::parse("alerts@example.org"),
            subject: "[wcc] example.org changed".to_string(),
            body: "diff".to_string(),
        };
        assert!(build_message(&message).is_ok());

        let bad = NotificationMessage {
            to: MailAddress::parse("not-an-address"),
            ..message
        };
        assert!(build_message(&bad).is_err());
    }

    #[tokio::test]
    async fn test_one_message_per_recipient() {
        let notifier = Arc::new(RecordingNotifier::default());
        let result = dispatcher(notifier.clone())
            .notify(&resource(false), "+new\n")
            .await;

        assert!(result.is_complete());
        assert_eq!(result.sent.len(), 2);

        let batches = notifier.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let to: Vec<&str> = batches[0].iter().map(|m| m.to.address()).collect();
        assert_eq!(to, vec!["alerts@example.org", "ops@example.org"]);
        assert!(batches[0].iter().all(|m| m.from.address() == "wcc@example.org"));
    }

    #[tokio::test]
    async fn test_recipient_failure_does_not_stop_others() {
        let notifier = Arc::new(RecordingNotifier {
            reject: vec!["alerts@example.org".to_string()],
            ..RecordingNotifier::default()
        });
        let result = dispatcher(notifier).notify(&resource(false), "+new\n").await;

        assert!(!result.is_complete());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0.address(), "alerts@example.org");
        assert_eq!(result.sent.len(), 1);
        assert_eq!(result.sent[0].address(), "ops@example.org");
    }

    #[tokio::test]
    async fn test_session_failure_is_reported() {
        let notifier = Arc::new(RecordingNotifier {
            fail_session: true,
            ..RecordingNotifier::default()
        });
        let result = dispatcher(notifier).notify(&resource(false), "+new\n").await;

        assert!(result.session_error.is_some());
        assert!(result.sent.is_empty());
        assert!(!result.is_complete());
    }

    /// Minimal SMTP relay on localhost that counts accepted connections.
    struct FakeRelay {
        port: u16,
        connections: Arc<AtomicUsize>,
    }

    impl FakeRelay {
        fn start(reject: &'static [&'static str]) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            let connections = Arc::new(AtomicUsize::new(0));
            let counter = connections.clone();
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    counter.fetch_add(1, Ordering::SeqCst);
                    std::thread::spawn(move || serve_smtp(stream, reject));
                }
            });
            Self { port, connections }
        }

        fn notifier(&self) -> SmtpNotifier {
            smtp_notifier(self.port)
        }

        fn connections(&self) -> usize {
            self.connections.load(Ordering::SeqCst)
        }
    }

    fn smtp_notifier(port: u16) -> SmtpNotifier {
        let config = MailConfig {
            host: "127.0.0.1".to_string(),
            port,
        };
        SmtpNotifier::new(&config, Duration::from_secs(5))
    }

    fn serve_smtp(stream: TcpStream, reject: &[&str]) {
        let mut writer = stream.try_clone().unwrap();
        let mut reader = BufReader::new(stream);
        let mut reply = |line: &str| writer.write_all(format!("{line}\r\n").as_bytes());

        if reply("220 relay.test ESMTP").is_err() {
            return;
        }
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                return;
            }
            let command = line.trim_end().to_ascii_lowercase();

            let response = if command.starts_with("ehlo") || command.starts_with("helo") {
                "250 relay.test"
            } else if command.starts_with("rcpt") {
                if reject.iter().any(|r| command.contains(*r)) {
                    "550 mailbox unavailable"
                } else {
                    "250 ok"
                }
            } else if command.starts_with("data") {
                if reply("354 end with .").is_err() {
                    return;
                }
                loop {
                    line.clear();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        return;
                    }
                    if line.trim_end() == "." {
                        break;
                    }
                }
                "250 queued"
            } else if command.starts_with("quit") {
                let _ = reply("221 bye");
                return;
            } else {
                "250 ok"
            };

            if reply(response).is_err() {
                return;
            }
        }
    }

    fn three_recipients() -> TrackedResource {
        TrackedResource::new(
            "http://example.org/page",
            false,
            vec![
                MailAddress::parse("one@example.org"),
                MailAddress::parse("two@example.org"),
                MailAddress::parse("three@example.org"),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_smtp_batch_shares_one_connection() {
        let relay = FakeRelay::start(&[]);
        let messages = dispatcher(Arc::new(RecordingNotifier::default()))
            .messages(&three_recipients(), "+new\n");

        let results = relay.notifier().send_batch(&messages).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(relay.connections(), 1);
    }

    #[tokio::test]
    async fn test_smtp_rejected_recipient_does_not_stop_batch() {
        let relay = FakeRelay::start(&["two@example.org"]);
        let messages = dispatcher(Arc::new(RecordingNotifier::default()))
            .messages(&three_recipients(), "+new\n");

        let results = relay.notifier().send_batch(&messages).await.unwrap();

        let delivered: Vec<bool> = results.iter().map(|r| r.is_ok()).collect();
        assert_eq!(delivered, vec![true, false, true]);
        // The relay drops the session after the rejection.
        assert_eq!(relay.connections(), 2);
    }

    #[tokio::test]
    async fn test_smtp_unreachable_relay_is_session_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = dispatcher(Arc::new(smtp_notifier(port)))
            .notify(&three_recipients(), "+new\n")
            .await;

        assert!(result.session_error.is_some());
        assert!(result.sent.is_empty());
        assert!(result.failed.is_empty());
    }
}
