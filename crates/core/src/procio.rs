//! Child-process stdout plumbing.
//!
//! The external tool rewrites its progress display in place with `\r`
//! instead of `\n`, so `BufReader::lines()` never sees those ticks. Streams
//! are read as raw byte chunks and split on either terminator.

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

/// Spawn a task that splits `reader` into lines on `\r` or `\n` and sends
/// each non-empty trimmed line over the returned channel. The channel
/// closes when the stream ends.
pub fn spawn_line_reader(
    reader: impl tokio::io::AsyncRead + Send + Unpin + 'static,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut reader = reader;
        let mut chunk = vec![0u8; 4096];
        let mut buf: Vec<u8> = Vec::with_capacity(256);
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    for &b in &chunk[..n] {
                        if b == b'\r' || b == b'\n' {
                            flush(&tx, &mut buf);
                        } else {
                            buf.push(b);
                        }
                    }
                }
                Err(_) => break,
            }
        }
        flush(&tx, &mut buf);
    });
    rx
}

fn flush(tx: &mpsc::UnboundedSender<String>, buf: &mut Vec<u8>) {
    if !buf.is_empty() {
        let s = String::from_utf8_lossy(buf).trim().to_string();
        if !s.is_empty() {
            let _ = tx.send(s);
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_splits_on_carriage_return_and_newline() {
        let data: &[u8] = b"first line\rsecond line\nthird";
        let mut rx = spawn_line_reader(data);
        assert_eq!(rx.recv().await.unwrap(), "first line");
        assert_eq!(rx.recv().await.unwrap(), "second line");
        assert_eq!(rx.recv().await.unwrap(), "third");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_skips_blank_lines() {
        let data: &[u8] = b"\r\n\r\na\n\n";
        let mut rx = spawn_line_reader(data);
        assert_eq!(rx.recv().await.unwrap(), "a");
        assert!(rx.recv().await.is_none());
    }
}
