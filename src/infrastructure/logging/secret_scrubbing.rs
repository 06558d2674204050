use regex::{Captures, Regex};
use std::io::{self, Write};
use std::sync::LazyLock;
use tracing_subscriber::fmt::MakeWriter;

/// `name = value` / `"name": "value"` pairs carrying secret material.
static SECRET_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(aws_secret_access_key|aws_session_token|secret_access_key|secretaccesskey|session_token|sessiontoken)(["']?\s*[:=]\s*["']?)([^\s"',}]+)"#,
    )
    .expect("secret field pattern is valid")
});

/// `Authorization: AWS4-HMAC-SHA256 Credential=..., Signature=...` headers.
static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Signature=)[0-9a-f]{16,}").expect("signature pattern is valid")
});

/// Redacts secret access keys, session tokens and request signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretScrubber;

impl SecretScrubber {
    pub fn new() -> Self {
        Self
    }

    /// Scrub a message of sensitive data
    pub fn scrub_message(&self, message: &str) -> String {
        let scrubbed = SECRET_FIELD.replace_all(message, |caps: &Captures| {
            format!("{}{}[REDACTED]", &caps[1], &caps[2])
        });
        SIGNATURE
            .replace_all(&scrubbed, "${1}[REDACTED]")
            .into_owned()
    }
}

/// `MakeWriter` wrapper that scrubs every formatted event before it reaches
/// the underlying writer.
#[derive(Debug, Clone)]
pub struct ScrubbingMakeWriter<M> {
    inner: M,
    scrubber: SecretScrubber,
}

impl<M> ScrubbingMakeWriter<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            scrubber: SecretScrubber::new(),
        }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for ScrubbingMakeWriter<M> {
    type Writer = ScrubbingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        ScrubbingWriter {
            inner: self.inner.make_writer(),
            scrubber: self.scrubber,
        }
    }
}

#[derive(Debug)]
pub struct ScrubbingWriter<W> {
    inner: W,
    scrubber: SecretScrubber,
}

impl<W: Write> Write for ScrubbingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        self.inner
            .write_all(self.scrubber.scrub_message(&text).as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
