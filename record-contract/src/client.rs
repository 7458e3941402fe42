use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::debug;

use crate::message::{Response, read_message};

/// Sends one raw input line to a host and waits for its response.
///
/// The line is forwarded as-is so that malformed inputs can be exercised too.
pub async fn send_input(server: SocketAddr, line: &str) -> Result<Response> {
    let stream = TcpStream::connect(server)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(line.trim_end().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    debug!(%server, "input sent, waiting for the next round");

    // The write half stays open until the response arrives; closing it
    // earlier would disconnect the user and drop the pending input.
    match read_message::<_, Response>(&mut reader).await? {
        Some(response) => Ok(response),
        None => bail!("host closed the connection before responding"),
    }
}
