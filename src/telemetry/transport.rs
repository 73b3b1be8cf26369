use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;

use crate::error::{Result, TattleError};
use crate::event::Payload;

/// Delivers assembled batches to the collector.
///
/// Delivery is best effort: callers log failures and move on.
pub trait Transport: Send + Sync {
    fn deliver(&self, session: &str, payload: Payload) -> Result<()>;

    /// Announce a new session. No-op unless the transport tracks sessions.
    fn open_session(&self, _session: &str) -> Result<()> {
        Ok(())
    }

    fn close_session(&self, _session: &str) -> Result<()> {
        Ok(())
    }
}

/// Posts each batch as a multipart form: one `content[]` part per output
/// fragment and parallel `cols[]` / `rows[]` fields per resize.
pub struct HttpTransport {
    client: Client,
    collector_url: String,
    session_url: Option<String>,
}

impl HttpTransport {
    pub fn new(
        collector_url: impl Into<String>,
        session_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let collector_url = collector_url.into();
        if collector_url.trim().is_empty() {
            return Err(TattleError::Config("collector_url is empty".into()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tattle/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            collector_url,
            session_url,
        })
    }

    fn post(&self, url: &str, form: Form) -> Result<()> {
        let resp = self.client.post(url).multipart(form).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TattleError::Collector {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn announce(&self, session: &str, state: &'static str) -> Result<()> {
        let Some(url) = self.session_url.as_deref() else {
            return Ok(());
        };
        let form = Form::new()
            .text("session", session.to_string())
            .text("state", state);
        self.post(url, form)
    }
}

/// Build the multipart body for one batch.
pub fn batch_form(session: &str, payload: Payload) -> Form {
    let mut form = Form::new().text("session", session.to_string());
    for fragment in payload.content {
        form = form.part("content[]", Part::bytes(fragment));
    }
    for (cols, rows) in payload.cols.into_iter().zip(payload.rows) {
        form = form
            .text("cols[]", cols.to_string())
            .text("rows[]", rows.to_string());
    }
    form
}

impl Transport for HttpTransport {
    fn deliver(&self, session: &str, payload: Payload) -> Result<()> {
        self.post(&self.collector_url, batch_form(session, payload))
    }

    fn open_session(&self, session: &str) -> Result<()> {
        self.announce(session, "open")
    }

    fn close_session(&self, session: &str) -> Result<()> {
        self.announce(session, "closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves one request with `status_line` and hands back the request's
    /// content type and body.
    fn one_shot_collector(status_line: &'static str) -> (String, JoinHandle<(String, Vec<u8>)>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/collect", listener.local_addr().expect("addr"));
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            let header_end = loop {
                let n = stream.read(&mut buf).expect("read");
                assert!(n > 0, "connection closed before headers");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = find(&request, b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_type = header_value(&headers, "content-type").expect("content-type");
            let length: usize = header_value(&headers, "content-length")
                .expect("content-length")
                .parse()
                .expect("numeric length");
            while request.len() < header_end + length {
                let n = stream.read(&mut buf).expect("read");
                assert!(n > 0, "connection closed before body");
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!("{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
            stream.write_all(response.as_bytes()).expect("respond");
            (content_type, request[header_end..header_end + length].to_vec())
        });
        (url, handle)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn header_value(headers: &str, name: &str) -> Option<String> {
        headers.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    /// Split a multipart body into (field name, data) in wire order.
    fn form_fields(content_type: &str, body: &[u8]) -> Vec<(String, Vec<u8>)> {
        let boundary = content_type
            .split(';')
            .find_map(|p| p.trim().strip_prefix("boundary="))
            .expect("boundary");
        let delimiter = format!("--{}", boundary).into_bytes();

        let mut fields = Vec::new();
        let mut rest = body;
        let start = find(rest, &delimiter).expect("opening delimiter");
        rest = &rest[start + delimiter.len()..];
        while !rest.starts_with(b"--") {
            let end = find(rest, &delimiter).expect("closing delimiter");
            let part = &rest[..end];
            let part = part.strip_prefix(b"\r\n").unwrap_or(part);
            let part = part.strip_suffix(b"\r\n").unwrap_or(part);
            let split = find(part, b"\r\n\r\n").expect("part headers");
            let headers = String::from_utf8_lossy(&part[..split]);
            let name = headers
                .split("name=\"")
                .nth(1)
                .and_then(|s| s.split('"').next())
                .expect("field name")
                .to_string();
            fields.push((name, part[split + 4..].to_vec()));
            rest = &rest[end + delimiter.len()..];
        }
        fields
    }

    #[test]
    fn batch_is_posted_as_ordered_multipart_fields() {
        let (url, server) = one_shot_collector("HTTP/1.1 200 OK");
        let transport = HttpTransport::new(url, None, Duration::from_secs(5)).expect("transport");

        let binary = vec![0xff, 0xfe, 0x00, 0x80];
        let payload = Payload {
            content: vec![b"$ ls\r\n".to_vec(), binary.clone(), b"README.md\r\n".to_vec()],
            cols: vec![100, 132],
            rows: vec![30, 43],
        };
        transport.deliver("session-1", payload).expect("deliver");

        let (content_type, body) = server.join().expect("server panicked");
        assert!(content_type.starts_with("multipart/form-data"), "{}", content_type);

        let fields = form_fields(&content_type, &body);
        let expected: Vec<(String, Vec<u8>)> = vec![
            ("session".into(), b"session-1".to_vec()),
            ("content[]".into(), b"$ ls\r\n".to_vec()),
            ("content[]".into(), binary),
            ("content[]".into(), b"README.md\r\n".to_vec()),
            ("cols[]".into(), b"100".to_vec()),
            ("rows[]".into(), b"30".to_vec()),
            ("cols[]".into(), b"132".to_vec()),
            ("rows[]".into(), b"43".to_vec()),
        ];
        assert_eq!(fields, expected);
    }

    #[test]
    fn collector_rejection_reports_status() {
        let (url, server) = one_shot_collector("HTTP/1.1 503 Service Unavailable");
        let transport = HttpTransport::new(url, None, Duration::from_secs(5)).expect("transport");

        let payload = Payload {
            content: vec![b"x".to_vec()],
            ..Payload::default()
        };
        let err = transport.deliver("session-1", payload).expect_err("503 should fail");
        assert!(matches!(err, TattleError::Collector { status: 503 }));
        server.join().expect("server panicked");
    }

    #[test]
    fn session_announcement_carries_state() {
        let (url, server) = one_shot_collector("HTTP/1.1 200 OK");
        let transport =
            HttpTransport::new("http://127.0.0.1:9/", Some(url), Duration::from_secs(5))
                .expect("transport");

        transport.open_session("session-1").expect("announce");

        let (content_type, body) = server.join().expect("server panicked");
        assert_eq!(
            form_fields(&content_type, &body),
            vec![
                ("session".to_string(), b"session-1".to_vec()),
                ("state".to_string(), b"open".to_vec()),
            ]
        );
    }

    #[test]
    fn rejects_empty_collector_url() {
        let err = HttpTransport::new("  ", None, Duration::from_secs(1))
            .err()
            .expect("empty url should fail");
        assert!(matches!(err, TattleError::Config(_)));
    }

    #[test]
    fn unreachable_collector_is_an_error_not_a_panic() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let transport =
            HttpTransport::new("http://127.0.0.1:9/", None, Duration::from_millis(500))
                .expect("transport");
        let result = transport.deliver("session-1", Payload::default());
        assert!(result.is_err());
    }

    #[test]
    fn session_announcements_are_skipped_without_session_url() {
        let transport =
            HttpTransport::new("http://127.0.0.1:9/", None, Duration::from_millis(500))
                .expect("transport");
        assert!(transport.open_session("session-1").is_ok());
        assert!(transport.close_session("session-1").is_ok());
    }
}
