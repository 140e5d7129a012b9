//! HTTP/1.1 transport for the relational endpoint.
//!
//! This module provides [`HttpQueryClient`], a small HTTP/1.1 client on top
//! of tokio TCP streams, and [`serve`], which exposes any [`QueryServer`]
//! on a listener. One request is sent per connection (`Connection: close`),
//! which keeps framing trivial: bodies are delimited by `Content-Length`,
//! chunked encoding, or end of stream.

use crate::client::{ClientConfig, QueryClient};
use crate::error::{WireError, WireResult};
use crate::loopback::QueryServer;
use crate::messages::{ErrorBody, QueryRequest, QueryResponse, HEALTH_PATH, QUERY_PATH};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

const MAX_HEAD_BYTES: usize = 16 * 1024;
const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// Host, port and path prefix parsed from an `http://` base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
    prefix: String,
}

impl Endpoint {
    /// Parses a base URL such as `http://127.0.0.1:8080/app`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidUrl`] for non-`http` schemes, an empty
    /// host, or an unparsable port.
    pub fn parse(url: &str) -> WireResult<Self> {
        let rest = url
            .strip_prefix("http://")
            .ok_or_else(|| WireError::InvalidUrl(format!("{url}: only http:// is supported")))?;

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| WireError::InvalidUrl(format!("{url}: bad port {port:?}")))?;
                (host, port)
            }
            None => (authority, 80),
        };

        if host.is_empty() {
            return Err(WireError::InvalidUrl(format!("{url}: missing host")));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            prefix: path.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the `host:port` socket address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the full request target for `path`.
    pub fn target(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

/// HTTP client for a relational endpoint.
///
/// Every call opens a fresh connection and is bounded by
/// [`ClientConfig::request_timeout`].
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    endpoint: Endpoint,
    config: ClientConfig,
}

impl HttpQueryClient {
    /// Creates a client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidUrl`] if the base URL cannot be parsed.
    pub fn new(config: ClientConfig) -> WireResult<Self> {
        let endpoint = Endpoint::parse(&config.base_url)?;
        Ok(Self { endpoint, config })
    }

    /// Returns the parsed endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send(&self, method: &str, path: &str, body: Option<&[u8]>) -> WireResult<(u16, Vec<u8>)> {
        tokio::time::timeout(self.config.request_timeout, self.exchange(method, path, body))
            .await
            .map_err(|_| WireError::Timeout)?
    }

    async fn exchange(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
    ) -> WireResult<(u16, Vec<u8>)> {
        let address = self.endpoint.address();
        let mut stream = TcpStream::connect(&address)
            .await
            .map_err(|e| WireError::transport_retryable(format!("connect {address}: {e}")))?;

        let mut head = format!(
            "{method} {} HTTP/1.1\r\nHost: {address}\r\nAccept: application/json\r\nConnection: close\r\n",
            self.endpoint.target(path)
        );
        if let Some(body) = body {
            head.push_str("Content-Type: application/json\r\n");
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes()).await?;
        if let Some(body) = body {
            stream.write_all(body).await?;
        }
        stream.flush().await?;

        let mut reader = BufReader::new(stream);
        let message = read_message(&mut reader, self.config.max_response_bytes, true).await?;
        let status = parse_status_line(&message.start_line)?;
        Ok((status, message.body))
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn health(&self) -> WireResult<()> {
        let (status, body) = self.send("GET", HEALTH_PATH, None).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(status_error(status, &body))
        }
    }

    async fn execute(&self, request: &QueryRequest) -> WireResult<QueryResponse> {
        let body = request.encode()?;
        let (status, body) = self.send("POST", QUERY_PATH, Some(&body)).await?;
        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }
        QueryResponse::decode(&body)
    }
}

fn status_error(status: u16, body: &[u8]) -> WireError {
    if (400..500).contains(&status) {
        if let Ok(error) = serde_json::from_slice::<ErrorBody>(body) {
            return WireError::Query(error.error);
        }
    }
    let mut text = String::from_utf8_lossy(body).into_owned();
    text.truncate(512);
    WireError::Status { status, body: text }
}

/// A parsed HTTP message: start line, headers and body.
#[derive(Debug)]
struct HttpMessage {
    start_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpMessage {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

async fn read_message<R>(
    reader: &mut BufReader<R>,
    max_body: usize,
    read_to_eof: bool,
) -> WireResult<HttpMessage>
where
    R: AsyncRead + Unpin,
{
    let mut head_bytes = 0usize;
    let mut start_line = String::new();
    head_bytes += reader.read_line(&mut start_line).await?;
    if start_line.is_empty() {
        return Err(WireError::transport_retryable("connection closed before response"));
    }
    let start_line = start_line.trim_end().to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        head_bytes += n;
        if head_bytes > MAX_HEAD_BYTES {
            return Err(WireError::Protocol("message head too large".into()));
        }
        let line = line.trim_end();
        if n == 0 || line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WireError::Protocol(format!("malformed header line {line:?}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let mut message = HttpMessage {
        start_line,
        headers,
        body: Vec::new(),
    };

    let chunked = message
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    let content_length = message
        .header("content-length")
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| WireError::Protocol(format!("bad content-length {v:?}")))
        })
        .transpose()?;

    message.body = if chunked {
        read_chunked(reader, max_body).await?
    } else if let Some(len) = content_length {
        if len > max_body {
            return Err(WireError::Protocol(format!(
                "body of {len} bytes exceeds limit of {max_body}"
            )));
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        body
    } else if read_to_eof {
        let mut body = Vec::new();
        reader.take(max_body as u64 + 1).read_to_end(&mut body).await?;
        if body.len() > max_body {
            return Err(WireError::Protocol(format!(
                "body exceeds limit of {max_body} bytes"
            )));
        }
        body
    } else {
        Vec::new()
    };

    Ok(message)
}

async fn read_chunked<R>(reader: &mut BufReader<R>, max_body: usize) -> WireResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).await?;
        let size_text = size_line.trim().split(';').next().unwrap_or("");
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| WireError::Protocol(format!("bad chunk size {size_text:?}")))?;

        if size == 0 {
            // Trailer section ends with an empty line.
            loop {
                let mut trailer = String::new();
                let n = reader.read_line(&mut trailer).await?;
                if n == 0 || trailer.trim().is_empty() {
                    break;
                }
            }
            return Ok(body);
        }

        let Some(end) = body.len().checked_add(size).filter(|n| *n <= max_body) else {
            return Err(WireError::Protocol(format!(
                "body exceeds limit of {max_body} bytes"
            )));
        };
        let start = body.len();
        body.resize(end, 0);
        reader.read_exact(&mut body[start..]).await?;

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf).await?;
    }
}

fn parse_status_line(line: &str) -> WireResult<u16> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return Err(WireError::Protocol(format!("bad status line {line:?}")));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| WireError::Protocol(format!("bad status line {line:?}")))
}

/// Serves `server` over HTTP on `listener` until the task is dropped.
///
/// Routes `GET /api/health` and `POST /api/query`; everything else is 404.
/// Query failures are answered with status 400 and an [`ErrorBody`].
///
/// # Errors
///
/// Returns an error only if accepting connections fails.
pub async fn serve<S>(listener: TcpListener, server: Arc<S>) -> WireResult<()>
where
    S: QueryServer + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, server.as_ref()).await {
                warn!(%peer, error = %e, "relational endpoint connection failed");
            }
        });
    }
}

async fn handle_connection<S: QueryServer + ?Sized>(stream: TcpStream, server: &S) -> WireResult<()> {
    let mut reader = BufReader::new(stream);
    let request = read_message(&mut reader, MAX_REQUEST_BYTES, false).await?;

    let mut parts = request.start_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    debug!(method, path, "relational endpoint request");

    let (status, body) = match (method, path) {
        ("GET", HEALTH_PATH) => match server.health() {
            Ok(()) => (200, br#"{"status":"ok"}"#.to_vec()),
            Err(e) => (503, error_body(&e)),
        },
        ("POST", QUERY_PATH) => match QueryRequest::decode(&request.body) {
            Ok(query) => match server.handle_query(&query) {
                Ok(response) => (200, response.encode()?),
                Err(e) => (400, error_body(&e)),
            },
            Err(e) => (400, error_body(&e.to_string())),
        },
        _ => (404, error_body("not found")),
    };

    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Service Unavailable",
    };
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let stream = reader.get_mut();
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(())
}

fn error_body(message: &str) -> Vec<u8> {
    serde_json::to_vec(&ErrorBody {
        error: message.to_string(),
    })
    .unwrap_or_else(|_| br#"{"error":"internal error"}"#.to_vec())
}
