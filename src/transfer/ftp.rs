//! FTP implementation of [`RemoteStorage`]
//!
//! Plain FTP over tokio: the control channel is framed with
//! [`LinesCodec`], file content goes over a passive-mode data connection.
//! Only the commands the pipeline needs are spoken: `USER`, `PASS`,
//! `TYPE I`, `PASV`, `STOR`, `DELE` and `QUIT`.

use super::storage::{RemoteStorage, StoreSession};
use crate::config::StorageConfig;
use crate::error::TransferError;
use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Longest control-channel line accepted from the server
const MAX_REPLY_LINE: usize = 8 * 1024;

/// Remote storage on an FTP server
#[derive(Clone, Debug)]
pub struct FtpStorage {
    address: String,
    username: String,
    password: String,
    timeout: Duration,
}

impl FtpStorage {
    /// Create a client for the configured server
    ///
    /// `timeout` bounds every individual network operation.
    pub fn new(config: &StorageConfig, timeout: Duration) -> Self {
        Self {
            address: config.address(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
        }
    }

    async fn login(&self) -> Result<ControlChannel, TransferError> {
        let mut control = ControlChannel::open(&self.address, self.timeout).await?;
        control.login(&self.username, &self.password).await?;
        Ok(control)
    }
}

#[async_trait]
impl RemoteStorage for FtpStorage {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, TransferError> {
        let control = self.login().await?;
        tracing::debug!(address = %self.address, user = %self.username, "FTP session opened");
        Ok(Box::new(FtpSession {
            control,
            data: None,
        }))
    }

    async fn delete(&self, remote_path: &str) -> Result<(), TransferError> {
        let mut control = self.login().await?;
        control
            .expect(&format!("DELE {remote_path}"), &[250])
            .await?;
        tracing::debug!(remote_path, "deleted remote file");
        control.quit().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ftp"
    }
}

/// A reply read from the control channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Reply {
    pub(crate) code: u16,
    pub(crate) text: String,
}

impl Reply {
    fn into_error(self) -> TransferError {
        TransferError::Protocol {
            code: self.code,
            message: self.text,
        }
    }
}

/// Split a reply line into its code, whether more lines follow, and its text
///
/// Returns `None` for lines that do not start with a three-digit code
/// (continuation lines inside a multi-line reply).
pub(crate) fn parse_reply_line(line: &str) -> Option<(u16, bool, &str)> {
    let code_part = line.get(..3)?;
    if !code_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = code_part.parse().ok()?;
    match line.as_bytes().get(3) {
        None => Some((code, false, "")),
        Some(b' ') => Some((code, false, &line[4..])),
        Some(b'-') => Some((code, true, &line[4..])),
        Some(_) => None,
    }
}

/// Extract the data-connection address from a `227` reply text
///
/// Accepts `Entering Passive Mode (h1,h2,h3,h4,p1,p2)` with or without the
/// parentheses.
pub(crate) fn parse_passive_address(text: &str) -> Option<SocketAddr> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let numbers: Vec<u8> = text[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .take(6)
        .map(|part| part.parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if numbers.len() != 6 {
        return None;
    }
    let ip = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = (u16::from(numbers[4]) << 8) | u16::from(numbers[5]);
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}

async fn bounded<T, F>(operation: &str, after: Duration, future: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| TransferError::Timeout {
            operation: operation.to_string(),
            after,
        })?
}

fn codec_error(error: LinesCodecError) -> TransferError {
    match error {
        LinesCodecError::Io(e) => TransferError::Io(e),
        LinesCodecError::MaxLineLengthExceeded => TransferError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "control reply line too long",
        )),
    }
}

/// Command/reply half of an FTP connection
struct ControlChannel {
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    timeout: Duration,
}

impl ControlChannel {
    /// Dial the server and consume its greeting
    async fn open(address: &str, timeout: Duration) -> Result<Self, TransferError> {
        let stream = bounded("connect", timeout, async {
            TcpStream::connect(address)
                .await
                .map_err(|e| TransferError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
        })
        .await?;
        let peer = stream.peer_addr()?;
        let (read, writer) = stream.into_split();

        let mut control = Self {
            reader: FramedRead::new(read, LinesCodec::new_with_max_length(MAX_REPLY_LINE)),
            writer,
            peer,
            timeout,
        };

        let mut greeting = control.read_reply("greeting").await?;
        // 120: service ready in nnn minutes, a final reply follows
        while greeting.code == 120 {
            greeting = control.read_reply("greeting").await?;
        }
        if greeting.code != 220 {
            return Err(greeting.into_error());
        }
        Ok(control)
    }

    async fn read_reply(&mut self, operation: &str) -> Result<Reply, TransferError> {
        let timeout = self.timeout;
        bounded(operation, timeout, async {
            let first = self.next_line().await?;
            let Some((code, mut more, text)) = parse_reply_line(&first) else {
                return Err(TransferError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed reply: {first}"),
                )));
            };
            let mut text = text.to_string();

            while more {
                let line = self.next_line().await?;
                match parse_reply_line(&line) {
                    Some((last, false, rest)) if last == code => {
                        more = false;
                        text.push('\n');
                        text.push_str(rest);
                    }
                    _ => {
                        text.push('\n');
                        text.push_str(line.trim_start());
                    }
                }
            }

            Ok(Reply { code, text })
        })
        .await
    }

    async fn next_line(&mut self) -> Result<String, TransferError> {
        match self.reader.next().await {
            Some(line) => line.map_err(codec_error),
            None => Err(TransferError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ))),
        }
    }

    async fn send(&mut self, command: &str) -> Result<(), TransferError> {
        if command.starts_with("PASS ") {
            tracing::trace!(command = "PASS ****", "FTP command");
        } else {
            tracing::trace!(command, "FTP command");
        }

        let timeout = self.timeout;
        let verb = command.split(' ').next().unwrap_or(command);
        let line = format!("{command}\r\n");
        bounded(verb, timeout, async {
            self.writer.write_all(line.as_bytes()).await?;
            Ok(())
        })
        .await
    }

    /// Send `command` and read its reply without checking the code
    async fn command(&mut self, command: &str) -> Result<Reply, TransferError> {
        self.send(command).await?;
        let verb = command.split(' ').next().unwrap_or(command);
        self.read_reply(verb).await
    }

    /// Send `command` and require one of `codes` in the reply
    async fn expect(&mut self, command: &str, codes: &[u16]) -> Result<Reply, TransferError> {
        let reply = self.command(command).await?;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<(), TransferError> {
        let reply = self.command(&format!("USER {username}")).await?;
        match reply.code {
            230 => Ok(()),
            331 => {
                self.expect(&format!("PASS {password}"), &[230, 202])
                    .await?;
                Ok(())
            }
            _ => Err(reply.into_error()),
        }
    }

    /// Enter passive mode and open the data connection
    async fn passive(&mut self) -> Result<TcpStream, TransferError> {
        let reply = self.expect("PASV", &[227]).await?;
        let mut address = parse_passive_address(&reply.text).ok_or_else(|| {
            TransferError::Protocol {
                code: reply.code,
                message: format!("unparseable passive address: {}", reply.text),
            }
        })?;
        if address.ip().is_unspecified() {
            address.set_ip(self.peer.ip());
        }

        let target = address.to_string();
        bounded("data connect", self.timeout, async {
            TcpStream::connect(address)
                .await
                .map_err(|e| TransferError::Connect {
                    address: target.clone(),
                    reason: e.to_string(),
                })
        })
        .await
    }

    /// Say goodbye; failures only get logged
    async fn quit(mut self) {
        if let Err(e) = self.expect("QUIT", &[221]).await {
            tracing::debug!(error = %e, "FTP QUIT failed");
        }
    }
}

/// An in-progress `STOR`
struct FtpSession {
    control: ControlChannel,
    data: Option<TcpStream>,
}

#[async_trait]
impl StoreSession for FtpSession {
    async fn begin(&mut self, remote_path: &str) -> Result<(), TransferError> {
        self.control.expect("TYPE I", &[200]).await?;
        let data = self.control.passive().await?;
        self.control
            .expect(&format!("STOR {remote_path}"), &[125, 150])
            .await?;
        self.data = Some(data);
        Ok(())
    }

    async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        let timeout = self.control.timeout;
        let data = self.data.as_mut().ok_or_else(|| {
            TransferError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "no store in progress",
            ))
        })?;
        bounded("data transfer", timeout, async {
            data.write_all(chunk).await?;
            Ok(())
        })
        .await
    }

    async fn finish(mut self: Box<Self>) -> Result<(), TransferError> {
        if let Some(mut data) = self.data.take() {
            let timeout = self.control.timeout;
            bounded("data close", timeout, async {
                data.shutdown().await?;
                Ok(())
            })
            .await?;
        }

        let reply = self.control.read_reply("STOR").await?;
        if reply.code != 226 && reply.code != 250 {
            return Err(reply.into_error());
        }
        self.control.quit().await;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) {
        let had_data = self.data.take().is_some();
        if had_data && let Err(e) = self.control.read_reply("STOR").await {
            tracing::debug!(error = %e, "no reply after aborted store");
        }
        self.control.quit().await;
    }
}
