//! Minimal anonymous FTP retrieval.
//!
//! Speaks just enough of the control protocol to log in anonymously, change
//! directory, open a passive data connection and download one file:
//! `USER` / `PASS` / `CWD` / `PASV` / `RETR`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::debug;

pub const DEFAULT_FTP_PORT: u16 = 21;
pub const DEFAULT_FTP_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSFER_CHUNK: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum FtpError {
    #[error("ftp i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ftp {stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    #[error("unexpected ftp reply to {command}: {code} {text}")]
    UnexpectedReply {
        command: &'static str,
        code: u16,
        text: String,
    },

    #[error("malformed ftp reply line '{0}'")]
    MalformedReply(String),

    #[error("malformed passive-mode reply '{0}'")]
    MalformedPasv(String),

    #[error("ftp control connection closed mid-reply")]
    ConnectionClosed,
}

/// Control-channel reply: status code plus the text of the final line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    pub code: u16,
    pub text: String,
}

impl FtpReply {
    fn is_class(&self, class: u16) -> bool {
        self.code / 100 == class
    }
}

/// Downloads one file from a remote directory.
pub trait FileRetriever: Send + Sync {
    fn retrieve<'a>(
        &'a self,
        directory: &'a str,
        file: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FtpError>> + Send + 'a>>;
}

/// Anonymous FTP client over tokio TCP streams.
#[derive(Debug, Clone)]
pub struct AnonymousFtp {
    host: String,
    port: u16,
    timeout: Duration,
}

impl AnonymousFtp {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_FTP_TIMEOUT,
        }
    }

    /// Bound applied to each connect and reply, and to every idle period of
    /// the data transfer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn within<T, F>(&self, stage: &'static str, future: F) -> Result<T, FtpError>
    where
        F: Future<Output = Result<T, FtpError>>,
    {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| FtpError::Timeout {
                stage,
                timeout: self.timeout,
            })?
    }

    async fn exchange(&self, directory: &str, file: &str) -> Result<Vec<u8>, FtpError> {
        let stream = self
            .within("connect", async {
                Ok(TcpStream::connect((self.host.as_str(), self.port)).await?)
            })
            .await?;
        let (read_half, mut control) = stream.into_split();
        let mut replies = BufReader::new(read_half);

        let greeting = self.within("greeting", read_reply(&mut replies)).await?;
        expect_class(&greeting, 2, "greeting")?;

        let user = self
            .command(&mut control, &mut replies, "USER anonymous", "USER")
            .await?;
        if user.code != 230 {
            expect_class(&user, 3, "USER")?;
            let pass = self
                .command(&mut control, &mut replies, "PASS anonymous", "PASS")
                .await?;
            expect_class(&pass, 2, "PASS")?;
        }

        let cwd = self
            .command(&mut control, &mut replies, &format!("CWD {directory}"), "CWD")
            .await?;
        expect_class(&cwd, 2, "CWD")?;

        let pasv = self.command(&mut control, &mut replies, "PASV", "PASV").await?;
        if pasv.code != 227 {
            return Err(unexpected("PASV", &pasv));
        }
        let data_port = parse_pasv_reply(&pasv.text)?;
        debug!(host = %self.host, data_port, "opening passive data connection");

        let mut data = self
            .within("data connect", async {
                Ok(TcpStream::connect((self.host.as_str(), data_port)).await?)
            })
            .await?;

        let retr = self
            .command(&mut control, &mut replies, &format!("RETR {file}"), "RETR")
            .await?;
        expect_class(&retr, 1, "RETR")?;

        let body = self.read_transfer(&mut data).await?;
        drop(data);

        let done = self.within("transfer reply", read_reply(&mut replies)).await?;
        expect_class(&done, 2, "RETR")?;

        // The server may already have closed; the file is complete either way.
        let _ = control.write_all(b"QUIT\r\n").await;

        debug!(bytes = body.len(), file, "ftp transfer complete");
        Ok(body)
    }

    /// Reads the data connection to EOF. Only a stall longer than the
    /// timeout fails; a slow transfer that keeps delivering bytes does not.
    async fn read_transfer<R>(&self, data: &mut R) -> Result<Vec<u8>, FtpError>
    where
        R: AsyncRead + Unpin,
    {
        let mut body = Vec::new();
        let mut chunk = vec![0_u8; TRANSFER_CHUNK];
        loop {
            let read = self
                .within("transfer", async { Ok(data.read(&mut chunk).await?) })
                .await?;
            if read == 0 {
                return Ok(body);
            }
            body.extend_from_slice(&chunk[..read]);
        }
    }

    async fn command<W, R>(
        &self,
        control: &mut W,
        replies: &mut R,
        line: &str,
        name: &'static str,
    ) -> Result<FtpReply, FtpError>
    where
        W: AsyncWrite + Unpin,
        R: AsyncBufRead + Unpin,
    {
        control.write_all(format!("{line}\r\n").as_bytes()).await?;
        control.flush().await?;
        self.within(name, read_reply(replies)).await
    }
}

impl FileRetriever for AnonymousFtp {
    fn retrieve<'a>(
        &'a self,
        directory: &'a str,
        file: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FtpError>> + Send + 'a>> {
        Box::pin(self.exchange(directory, file))
    }
}

/// Reads one possibly multi-line reply (`123-...` continued until `123 ...`).
pub async fn read_reply<R>(reader: &mut R) -> Result<FtpReply, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let first = read_line(reader).await?;
    let (code, separator, text) = split_reply_line(&first)?;
    if separator != '-' {
        return Ok(FtpReply { code, text });
    }

    let terminator = format!("{code} ");
    loop {
        let line = read_line(reader).await?;
        if let Some(rest) = line.strip_prefix(&terminator) {
            return Ok(FtpReply {
                code,
                text: rest.to_owned(),
            });
        }
    }
}

async fn read_line<R>(reader: &mut R) -> Result<String, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(FtpError::ConnectionClosed);
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn split_reply_line(line: &str) -> Result<(u16, char, String), FtpError> {
    let malformed = || FtpError::MalformedReply(line.to_owned());
    let code = line
        .get(..3)
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(malformed)?;
    let separator = line[3..].chars().next().unwrap_or(' ');
    if separator != ' ' && separator != '-' {
        return Err(malformed());
    }
    let text = line.get(4..).unwrap_or_default().to_owned();
    Ok((code, separator, text))
}

/// Data port from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply:
/// `p1 * 256 + p2`. Accepts the reply with or without its status code.
pub fn parse_pasv_reply(reply: &str) -> Result<u16, FtpError> {
    let malformed = || FtpError::MalformedPasv(reply.to_owned());

    let inner = match (reply.find('('), reply.rfind(')')) {
        (Some(open), Some(close)) if open < close => &reply[open + 1..close],
        _ => {
            // Some servers omit the parentheses.
            let body = reply.trim_start_matches(|c: char| c.is_ascii_digit()).trim();
            let start = body.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
            body[start..].trim_end_matches('.')
        }
    };

    let parts = inner
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    if parts.len() != 6 {
        return Err(malformed());
    }
    Ok(u16::from(parts[4]) * 256 + u16::from(parts[5]))
}

fn expect_class(reply: &FtpReply, class: u16, command: &'static str) -> Result<(), FtpError> {
    if reply.is_class(class) {
        Ok(())
    } else {
        Err(unexpected(command, reply))
    }
}

fn unexpected(command: &'static str, reply: &FtpReply) -> FtpError {
    FtpError::UnexpectedReply {
        command,
        code: reply.code,
        text: reply.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_port_is_high_byte_times_256_plus_low() {
        let port = parse_pasv_reply("227 Entering Passive Mode (127,0,0,1,195,80).")
            .expect("valid reply");
        assert_eq!(port, 50_000);
    }

    #[test]
    fn pasv_without_parentheses() {
        let port = parse_pasv_reply("227 Entering Passive Mode 10,0,0,5,4,1").expect("valid");
        assert_eq!(port, 1_025);
    }

    #[test]
    fn pasv_rejects_short_tuple() {
        let err = parse_pasv_reply("227 Entering Passive Mode (127,0,0,1,195)").expect_err("five");
        assert!(matches!(err, FtpError::MalformedPasv(_)));
        assert!(parse_pasv_reply("227 (a,b,c,d,e,f)").is_err());
    }

    #[tokio::test]
    async fn reads_multi_line_reply() {
        let raw: &[u8] = b"230-Welcome\r\n230-Rules apply\r\n230 Login successful.\r\n220 next\r\n";
        let mut reader = BufReader::new(raw);

        let reply = read_reply(&mut reader).await.expect("reply");
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "Login successful.");

        let next = read_reply(&mut reader).await.expect("second reply");
        assert_eq!(next.code, 220);
    }

    #[tokio::test]
    async fn eof_mid_reply_is_connection_closed() {
        let raw: &[u8] = b"150-Opening\r\n";
        let mut reader = BufReader::new(raw);
        let err = read_reply(&mut reader).await.expect_err("truncated");
        assert!(matches!(err, FtpError::ConnectionClosed));
    }

    #[tokio::test]
    async fn slow_transfer_outlasting_timeout_completes() {
        let ftp = AnonymousFtp::new("127.0.0.1", 0).with_timeout(Duration::from_millis(200));
        let (mut writer, mut reader) = tokio::io::duplex(64);
        let sender = tokio::spawn(async move {
            for line in ["Symbol|ETF\n", "GLD|Y\n", "SPY|Y\n", "IBM|N\n", "QQQ|Y\n"] {
                tokio::time::sleep(Duration::from_millis(80)).await;
                writer.write_all(line.as_bytes()).await.expect("write chunk");
            }
        });

        let body = ftp.read_transfer(&mut reader).await.expect("slow transfer");
        sender.await.expect("sender");
        assert_eq!(body, b"Symbol|ETF\nGLD|Y\nSPY|Y\nIBM|N\nQQQ|Y\n");
    }

    #[tokio::test]
    async fn stalled_transfer_times_out() {
        let ftp = AnonymousFtp::new("127.0.0.1", 0).with_timeout(Duration::from_millis(50));
        let (mut writer, mut reader) = tokio::io::duplex(64);
        writer.write_all(b"Symbol|ETF\n").await.expect("write");

        let err = ftp.read_transfer(&mut reader).await.expect_err("stalled");
        assert!(matches!(err, FtpError::Timeout { stage: "transfer", .. }));
        drop(writer);
    }

    #[test]
    fn rejects_garbage_reply_line() {
        assert!(matches!(
            split_reply_line("hello"),
            Err(FtpError::MalformedReply(_))
        ));
    }
}
