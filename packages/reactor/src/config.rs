//! Configuration for a reactor instance.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// Program name used when no arguments are configured.
pub const DEFAULT_PROGRAM_NAME: &str = "reactor";

/// An output stream the guest writes into.
pub type Sink = Box<dyn Write + Send>;

/// An input stream the guest reads from.
pub type Source = Box<dyn Read + Send>;

/// Configuration for a reactor instance.
///
/// Every field has a host default: arguments fall back to a single
/// placeholder program name, stdout and stderr inherit the host's streams,
/// and stdin is absent (reads report end of file).
pub struct ReactorConfig {
    /// Command-line arguments, including the program name.
    pub args: Vec<String>,

    /// Environment variables, in the order the guest sees them.
    pub env: Vec<(String, String)>,

    /// Standard output sink.
    pub stdout: Sink,

    /// Standard error sink.
    pub stderr: Sink,

    /// Optional standard input source.
    pub stdin: Option<Source>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            args: vec![DEFAULT_PROGRAM_NAME.to_string()],
            env: Vec::new(),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            stdin: None,
        }
    }
}

impl fmt::Debug for ReactorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorConfig")
            .field("args", &self.args)
            .field("env", &self.env)
            .field("stdin", &self.stdin.is_some())
            .finish_non_exhaustive()
    }
}

impl ReactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the argument vector. An empty vector keeps the default.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if !args.is_empty() {
            self.args = args;
        }
        self
    }

    /// Append an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Append a `KEY=VALUE` entry. Entries without `=` are ignored.
    pub fn with_env_entry(self, entry: &str) -> Self {
        match entry.split_once('=') {
            Some((key, value)) => self.with_env(key, value),
            None => self,
        }
    }

    pub fn with_stdout(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stdout = Box::new(sink);
        self
    }

    pub fn with_stderr(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stderr = Box::new(sink);
        self
    }

    pub fn with_stdin(mut self, source: impl Read + Send + 'static) -> Self {
        self.stdin = Some(Box::new(source));
        self
    }
}

/// A cloneable in-memory sink, useful for capturing guest output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.inner.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("shared buffer poisoned"))?;
        inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
