//! Outgoing mail: the message shape and the transports that deliver it.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use serde::Serialize;
use slug::slugify;
use tracing::info;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{InvoiceError, Result};
use crate::model::Attachment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Delivers a message or fails; there is no retry.
pub trait MailTransport {
    fn send(&self, message: &Message) -> Result<()>;
}

#[derive(Serialize)]
struct Envelope<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<&'a str>,
    subject: &'a str,
    body: &'a str,
    attachments: Vec<&'a str>,
}

impl<'a> From<&'a Message> for Envelope<'a> {
    fn from(message: &'a Message) -> Self {
        Envelope {
            to: &message.to,
            cc: message.cc.as_deref(),
            subject: &message.subject,
            body: &message.body,
            attachments: message.attachments.iter().map(|a| a.name.as_str()).collect(),
        }
    }
}

/// Drops each message into a folder as a zip bundle: `message.toml` plus the
/// attachments, for a separate mailer (or a human) to pick up.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        OutboxMailer { dir: dir.into() }
    }

    fn bundle_path(&self, message: &Message) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d%H%M%S");
        let base = format!("{}-{}", stamp, slugify(&message.subject));
        let mut path = self.dir.join(format!("{}.zip", base));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{}-{}.zip", base, n));
            n += 1;
        }
        path
    }
}

impl MailTransport for OutboxMailer {
    fn send(&self, message: &Message) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.bundle_path(message);
        let mut zip = ZipWriter::new(File::create(&path)?);
        zip.start_file("message.toml", SimpleFileOptions::default())?;
        zip.write_all(toml::to_string_pretty(&Envelope::from(message))?.as_bytes())?;
        for attachment in &message.attachments {
            zip.start_file(attachment.name.as_str(), SimpleFileOptions::default())?;
            zip.write_all(&attachment.bytes)?;
        }
        zip.finish()?;

        info!(path = %path.display(), to = %message.to, "message written to outbox");
        Ok(())
    }
}

#[derive(Serialize)]
struct HttpAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content: String,
}

#[derive(Serialize)]
struct HttpMessage<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<&'a str>,
    subject: &'a str,
    text: &'a str,
    attachments: Vec<HttpAttachment<'a>>,
}

/// Posts messages as JSON to a mail API endpoint with a bearer token.
pub struct HttpMailer {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("invoice-mailer/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(HttpMailer {
            http,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    /// Reads the token from the environment variable `token_env`.
    pub fn from_env(endpoint: &str, token_env: &str) -> Result<Self> {
        let token = std::env::var(token_env)
            .map_err(|_| InvoiceError::Mail(format!("environment variable {} is not set", token_env)))?;
        Self::new(endpoint, token)
    }
}

impl MailTransport for HttpMailer {
    fn send(&self, message: &Message) -> Result<()> {
        let payload = HttpMessage {
            to: &message.to,
            cc: message.cc.as_deref(),
            subject: &message.subject,
            text: &message.body,
            attachments: message
                .attachments
                .iter()
                .map(|a| HttpAttachment {
                    filename: &a.name,
                    content_type: &a.mime,
                    content: STANDARD.encode(&a.bytes),
                })
                .collect(),
        };

        let response = self.http.post(&self.endpoint).bearer_auth(&self.token).json(&payload).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(InvoiceError::Mail(format!("HTTP {}: {}", status.as_u16(), text)));
        }
        info!(to = %message.to, endpoint = %self.endpoint, "message sent");
        Ok(())
    }
}

/// Lists bundle files in an outbox folder, oldest first.
pub fn outbox_bundles(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut bundles: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "zip"))
        .collect();
    bundles.sort();
    Ok(bundles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn message(cc: Option<&str>) -> Message {
        Message {
            to: "billing@example.com".to_string(),
            cc: cc.map(str::to_string),
            subject: "Consulting - March 2024".to_string(),
            body: "Hi,".to_string(),
            attachments: vec![Attachment {
                name: "Invoice 4.txt".to_string(),
                mime: "text/plain".to_string(),
                bytes: b"== 4 ==".to_vec(),
            }],
        }
    }

    #[test]
    fn outbox_bundle_holds_headers_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxMailer::new(dir.path());
        outbox.send(&message(None)).unwrap();

        let bundles = outbox_bundles(dir.path()).unwrap();
        assert_eq!(bundles.len(), 1);
        let name = bundles[0].file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-consulting-march-2024.zip"));

        let mut archive = zip::ZipArchive::new(File::open(&bundles[0]).unwrap()).unwrap();
        let mut headers = String::new();
        archive.by_name("message.toml").unwrap().read_to_string(&mut headers).unwrap();
        assert!(headers.contains("to = \"billing@example.com\""));
        assert!(!headers.contains("cc ="));

        let mut attached = Vec::new();
        archive.by_name("Invoice 4.txt").unwrap().read_to_end(&mut attached).unwrap();
        assert_eq!(attached, b"== 4 ==");
    }

    #[test]
    fn outbox_never_overwrites_a_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxMailer::new(dir.path());
        outbox.send(&message(None)).unwrap();
        outbox.send(&message(Some("boss@example.com"))).unwrap();
        assert_eq!(outbox_bundles(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn http_payload_omits_missing_cc() {
        let msg = message(None);
        let payload = HttpMessage {
            to: &msg.to,
            cc: msg.cc.as_deref(),
            subject: &msg.subject,
            text: &msg.body,
            attachments: vec![],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("cc").is_none());
        assert_eq!(json["to"], "billing@example.com");
    }

    /// Answers one request with `status` and `body`, returning the request it read.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/send", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
            head + &String::from_utf8_lossy(&request_body)
        });
        (endpoint, handle)
    }

    #[test]
    fn http_error_status_becomes_mail_error() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "busy");
        let mailer = HttpMailer::new(endpoint, "secret").unwrap();

        let err = mailer.send(&message(None)).unwrap_err();
        server.join().unwrap();
        match err {
            InvoiceError::Mail(text) => {
                assert!(text.contains("503"), "{text}");
                assert!(text.contains("busy"), "{text}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn http_success_posts_json_with_bearer_token() {
        let (endpoint, server) = serve_once("200 OK", "{}");
        let mailer = HttpMailer::new(endpoint, "secret").unwrap();

        mailer.send(&message(Some("boss@example.com"))).unwrap();
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /send "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains("\"cc\":\"boss@example.com\""));
        assert!(request.contains(&STANDARD.encode(b"== 4 ==")));
    }
}
