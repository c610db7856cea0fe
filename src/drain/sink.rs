//! Output sink for drained messages: a file or standard output.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::debug;

use crate::utils::Result;

/// Where the drained message bodies go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Stdout,
    File(PathBuf),
}

impl std::fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkTarget::Stdout => write!(f, "<stdout>"),
            SinkTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Buffered writer over the selected target.
///
/// Files are created, or truncated when they already exist.
pub struct Sink {
    inner: BufWriter<Box<dyn AsyncWrite + Send + Unpin>>,
    target: SinkTarget,
}

impl Sink {
    /// Opens `path`, or standard output when it is `None` or empty.
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        let (writer, target): (Box<dyn AsyncWrite + Send + Unpin>, _) = match path {
            Some(path) if !path.as_os_str().is_empty() => {
                let file = File::create(path).await?;
                (Box::new(file), SinkTarget::File(path.to_path_buf()))
            }
            _ => (Box::new(tokio::io::stdout()), SinkTarget::Stdout),
        };
        debug!(target = %target, "Opened output sink");
        Ok(Self {
            inner: BufWriter::new(writer),
            target,
        })
    }

    pub fn target(&self) -> &SinkTarget {
        &self.target
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").field("target", &self.target).finish()
    }
}

impl AsyncWrite for Sink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
