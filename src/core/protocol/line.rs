//! CRLF line reader

use super::{AtError, ModemError};
use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Line terminator sent by the modem
pub const CRLF: &[u8] = b"\r\n";

/// Read one line from `reader`
///
/// Bytes are read one at a time, each under `timeout`. The line is returned
/// with surrounding whitespace (including the CRLF) removed, so a bare
/// `\r\n` yields an empty string. A late byte fails the whole read with
/// [`AtError::Timeout`].
pub async fn read_line<R>(reader: &mut R, timeout: Duration) -> Result<String, ModemError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_line_from(reader, BytesMut::with_capacity(64), timeout).await
}

/// Continue reading a line whose first bytes are already in `buf`
pub(crate) async fn read_line_from<R>(
    reader: &mut R,
    mut buf: BytesMut,
    timeout: Duration,
) -> Result<String, ModemError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    while !buf.ends_with(CRLF) {
        let byte = read_byte(reader, timeout).await?;
        buf.put_u8(byte);
    }

    let line = String::from_utf8_lossy(&buf).trim().to_string();
    if !line.is_empty() {
        tracing::debug!("recv : {:?}", line);
    }
    Ok(line)
}

/// Read a single byte under `timeout`
pub(crate) async fn read_byte<R>(reader: &mut R, timeout: Duration) -> Result<u8, ModemError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match tokio::time::timeout(timeout, reader.read_u8()).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::debug!("modem timeout");
            Err(AtError::Timeout.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_reads_until_crlf() {
        let mut mock = Builder::new().read(b"+CFUN: 1\r\nOK\r\n").build();
        assert_eq!(read_line(&mut mock, TIMEOUT).await.unwrap(), "+CFUN: 1");
        assert_eq!(read_line(&mut mock, TIMEOUT).await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_bare_terminator_is_empty_line() {
        let mut mock = Builder::new().read(b"\r\n").build();
        assert_eq!(read_line(&mut mock, TIMEOUT).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_lone_cr_does_not_end_line() {
        let mut mock = Builder::new().read(b"AB\rCD\r\n").build();
        assert_eq!(read_line(&mut mock, TIMEOUT).await.unwrap(), "AB\rCD");
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mut mock = Builder::new().read(b"+CG").read(b"MR: 1.0\r").read(b"\n").build();
        assert_eq!(read_line(&mut mock, TIMEOUT).await.unwrap(), "+CGMR: 1.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_data() {
        let mut mock = Builder::new().wait(Duration::from_secs(60)).build();
        let err = read_line(&mut mock, TIMEOUT).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_discards_partial_line() {
        let mut mock = Builder::new()
            .read(b"+CREG: 0,")
            .wait(Duration::from_secs(60))
            .build();
        let err = read_line(&mut mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ModemError::At(AtError::Timeout)));
    }

    #[tokio::test]
    async fn test_eof_is_disconnect() {
        let mut mock = Builder::new().read(b"OK").build();
        let err = read_line(&mut mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ModemError::Disconnected));
    }
}
