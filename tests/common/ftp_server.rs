//! In-process fake FTP server for transport tests
//!
//! Speaks just enough of RFC 959 for the client: USER/PASS, TYPE, PASV,
//! STOR, DELE and QUIT. Stored files live in memory.

use ar_courier::config::StorageConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the server greets new connections
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Greeting {
    /// `220 ready`
    Normal,
    /// A three-line `220-` banner
    Multiline,
    /// Accept the connection and never answer
    Silent,
}

/// Fake server behavior
#[derive(Clone, Debug)]
pub struct FakeFtpOptions {
    pub username: String,
    pub password: String,
    pub greeting: Greeting,
    /// Answer every STOR with `553 Permission denied.`
    pub reject_stor: bool,
}

impl Default for FakeFtpOptions {
    fn default() -> Self {
        Self {
            username: "courier".to_string(),
            password: "secret".to_string(),
            greeting: Greeting::Normal,
            reject_stor: false,
        }
    }
}

#[derive(Default)]
struct ServerState {
    files: HashMap<String, Vec<u8>>,
    commands: Vec<String>,
}

/// A running fake server; stops when dropped
pub struct FakeFtpServer {
    pub addr: SocketAddr,
    options: Arc<FakeFtpOptions>,
    state: Arc<Mutex<ServerState>>,
    task: JoinHandle<()>,
}

impl FakeFtpServer {
    pub async fn start(options: FakeFtpOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let options = Arc::new(options);
        let state = Arc::new(Mutex::new(ServerState::default()));

        let task = {
            let options = Arc::clone(&options);
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let options = Arc::clone(&options);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let _ = serve(stream, options, state).await;
                    });
                }
            })
        };

        Self {
            addr,
            options,
            state,
            task,
        }
    }

    /// Storage settings pointing at this server
    pub fn storage_config(&self, directory: &str) -> StorageConfig {
        StorageConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            username: self.options.username.clone(),
            password: self.options.password.clone(),
            directory: directory.to_string(),
        }
    }

    /// Put a file on the server directly
    pub fn put(&self, path: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_vec());
    }

    /// Content of a stored file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    /// Every command line received, in order, across all connections
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }
}

impl Drop for FakeFtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reply(writer: &mut OwnedWriteHalf, text: &str) -> std::io::Result<()> {
    writer.write_all(format!("{text}\r\n").as_bytes()).await
}

async fn serve(
    stream: TcpStream,
    options: Arc<FakeFtpOptions>,
    state: Arc<Mutex<ServerState>>,
) -> std::io::Result<()> {
    let (read, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    match options.greeting {
        Greeting::Silent => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return Ok(());
        }
        Greeting::Multiline => {
            reply(&mut writer, "220-Welcome to the fake drop").await?;
            reply(&mut writer, "   uploads are logged").await?;
            reply(&mut writer, "220 Ready").await?;
        }
        Greeting::Normal => reply(&mut writer, "220 Ready").await?,
    }

    let mut user_ok = false;
    let mut logged_in = false;
    let mut passive: Option<TcpListener> = None;

    while let Some(line) = lines.next_line().await? {
        state.lock().unwrap().commands.push(line.clone());
        let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        match verb.to_ascii_uppercase().as_str() {
            "USER" => {
                user_ok = arg == options.username;
                reply(&mut writer, "331 Password required").await?;
            }
            "PASS" => {
                if user_ok && arg == options.password {
                    logged_in = true;
                    reply(&mut writer, "230 Logged in").await?;
                } else {
                    reply(&mut writer, "530 Login incorrect.").await?;
                }
            }
            "QUIT" => {
                reply(&mut writer, "221 Bye").await?;
                return Ok(());
            }
            _ if !logged_in => reply(&mut writer, "530 Please login with USER and PASS.").await?,
            "TYPE" => reply(&mut writer, "200 Type set to I").await?,
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                passive = Some(listener);
                reply(
                    &mut writer,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{}).",
                        port >> 8,
                        port & 0xff
                    ),
                )
                .await?;
            }
            "STOR" => {
                if options.reject_stor {
                    reply(&mut writer, "553 Permission denied.").await?;
                    continue;
                }
                let Some(listener) = passive.take() else {
                    reply(&mut writer, "425 Use PASV first.").await?;
                    continue;
                };
                reply(&mut writer, "150 Opening BINARY mode data connection").await?;
                let (mut data, _) = listener.accept().await?;
                let mut content = Vec::new();
                data.read_to_end(&mut content).await?;
                state
                    .lock()
                    .unwrap()
                    .files
                    .insert(arg.to_string(), content);
                reply(&mut writer, "226 Transfer complete").await?;
            }
            "DELE" => {
                let removed = state.lock().unwrap().files.remove(arg).is_some();
                if removed {
                    reply(&mut writer, "250 File deleted").await?;
                } else {
                    reply(&mut writer, "550 No such file.").await?;
                }
            }
            _ => reply(&mut writer, "502 Command not implemented").await?,
        }
    }
    Ok(())
}
