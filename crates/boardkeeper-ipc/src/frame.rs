//! NDJSON framing shared by the server and the gateway client

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::IpcResult;

/// Encode one message as a single newline-terminated line
pub(crate) fn encode<T: Serialize>(message: &T) -> IpcResult<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub(crate) async fn write_frame<W, T>(writer: &mut W, message: &T) -> IpcResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    writer.write_all(encode(message)?.as_bytes()).await?;
    Ok(())
}

/// Read and decode the next non-blank line. `Ok(None)` means the peer hung up.
pub(crate) async fn read_frame<R, T>(reader: &mut R, buf: &mut String) -> IpcResult<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        buf.clear();
        if reader.read_line(buf).await? == 0 {
            return Ok(None);
        }

        let line = buf.trim();
        if line.is_empty() {
            continue;
        }

        return Ok(Some(serde_json::from_str(line)?));
    }
}
