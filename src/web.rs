use std::io::{Read, Write};
use std::time::Duration;
use reqwest::blocking::Client;
use tracing::debug;
use crate::error::WebError;
use crate::util::CHUNK_SIZE;

const USER_AGENT: &str = concat!("relaunch/", env!("CARGO_PKG_VERSION"));

/// Observer of a single transfer. Purely informational.
///
/// `total` is `None` when the size of the transfer is unknown.
pub trait TransferListener {
    fn start(&self, _total: Option<u64>) {}
    fn progress(&self, _current: u64, _total: Option<u64>) {}
    fn end(&self, _current: u64, _total: Option<u64>) {}
}

/// Listener that ignores every notification.
pub struct NoProgress;

impl TransferListener for NoProgress {}

/// Where remote metadata and artifacts come from.
pub trait RemoteSource {
    /// Fetches the body at `url` as text.
    fn get_text(&self, url: &str) -> Result<String, WebError>;

    /// Streams the body at `url` into `sink`, returning the number of bytes written.
    ///
    /// `declared_size` is used for progress reporting when the server does not send a length.
    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        declared_size: Option<u64>,
        listener: &dyn TransferListener,
    ) -> Result<u64, WebError>;
}

/// [`RemoteSource`] backed by a blocking `reqwest` client.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Creates a client with explicit connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, WebError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, WebError> {
        debug!("GET {}", url);
        let response = self.client.get(url).header("Accept", "*/*").send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(WebError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

impl RemoteSource for HttpSource {
    fn get_text(&self, url: &str) -> Result<String, WebError> {
        Ok(self.get(url)?.text()?)
    }

    fn download(
        &self,
        url: &str,
        sink: &mut dyn Write,
        declared_size: Option<u64>,
        listener: &dyn TransferListener,
    ) -> Result<u64, WebError> {
        let mut response = self.get(url)?;
        let total = response.content_length().or(declared_size);
        copy_with_progress(&mut response, sink, total, listener)
    }
}

/// Copies `reader` into `sink` chunk by chunk, reporting progress along the way.
pub fn copy_with_progress(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    total: Option<u64>,
    listener: &dyn TransferListener,
) -> Result<u64, WebError> {
    listener.start(total);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut current = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])?;
        current += read as u64;
        listener.progress(current, total);
    }
    sink.flush()?;
    listener.end(current, total);
    Ok(current)
}
