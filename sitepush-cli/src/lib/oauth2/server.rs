//! Just enough HTTP/1.1 to receive the authorization redirect on the loopback interface.

use std::str;

use anyhow::Context;
use chrono::Utc;
use http::{HeaderValue, Method, Request, Uri};
use tokio::io;

/// Maximum size of the request head, the redirect only carries a short query
const MAX_HEAD_SZ: usize = 16 * 1024;

/// Reads the request line and headers.
/// The body, if any, is not read.
pub async fn read_request_head<R>(reader: R) -> anyhow::Result<Request<()>>
where
    R: io::AsyncBufRead,
{
    use io::AsyncBufReadExt;

    tokio::pin!(reader);

    let mut line = String::new();
    let mut head_sz = reader.read_line(&mut line).await?;
    if line.is_empty() {
        anyhow::bail!("Empty HTTP request");
    }
    let (method, uri) = parse_request_line(&line)?;
    let mut req = Request::builder().method(method).uri(uri);

    loop {
        line.clear();
        let sz = reader.read_line(&mut line).await?;
        head_sz += sz;
        if head_sz > MAX_HEAD_SZ {
            anyhow::bail!("HTTP request head too large");
        }
        if sz == 0 || line.trim_end().is_empty() {
            break;
        }
        let (name, value) = parse_header(&line)?;
        req = req.header(name, value.parse::<HeaderValue>()?);
    }
    Ok(req.body(())?)
}

fn parse_request_line(line: &str) -> anyhow::Result<(Method, Uri)> {
    let mut parts = line.trim_end().split(' ');

    let method = parts
        .next()
        .filter(|m| !m.is_empty())
        .with_context(|| format!("no method in request line {line}"))?;
    let method = Method::from_bytes(method.as_bytes())
        .with_context(|| format!("Unrecognized method: {method}"))?;

    let uri = parts
        .next()
        .with_context(|| format!("no path in request line {line}"))?;
    let uri: Uri = uri.parse()?;

    let protocol = parts
        .next()
        .with_context(|| format!("no protocol in request line {line}"))?;
    if !protocol.starts_with("HTTP/1.") {
        anyhow::bail!("unsupported HTTP protocol in request line {line}");
    }
    Ok((method, uri))
}

fn parse_header(line: &str) -> anyhow::Result<(&str, &str)> {
    let (name, value) = line
        .split_once(':')
        .with_context(|| format!("Invalid header: {line}"))?;
    Ok((name.trim(), value.trim()))
}

/// Builds a small plain text response that closes the connection
pub fn text_response(status: u16, text: &'static str) -> anyhow::Result<http::Response<&'static str>> {
    Ok(http::Response::builder()
        .status(status)
        .header("Date", Utc::now().to_rfc2822())
        .header("Server", "sitepush")
        .header("Connection", "close")
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(text)?)
}

pub async fn write_response<W, B>(resp: http::Response<B>, writer: W) -> anyhow::Result<()>
where
    W: io::AsyncWrite,
    B: AsRef<[u8]>,
{
    use io::AsyncWriteExt;

    let (parts, body) = resp.into_parts();
    let body = body.as_ref();

    let mut head = format!("{:?} {}\r\n", parts.version, parts.status);
    if !parts.headers.contains_key("content-length") {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    for (name, value) in parts.headers.iter() {
        let value = value.to_str().unwrap_or_default();
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    tokio::pin!(writer);
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
