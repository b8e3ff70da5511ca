//! russh implementation of the shell transport.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys;
use russh::{ChannelMsg, Disconnect, Pty};
use tracing::{debug, info};

use super::{
    LOGIN_USER, PtyRequest, RemoteError, SSH_PORT, SecureTransport, SessionEvent, ShellExit,
    ShellSession, TerminalMode, open_interactive_shell,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Trusts whatever host key the server presents.
struct SshHandler;

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct SshTransport {
    handle: client::Handle<SshHandler>,
}

pub struct SshSession {
    channel: russh::Channel<client::Msg>,
}

fn session_err(context: &str, e: russh::Error) -> RemoteError {
    RemoteError::Session(format!("{context}: {e}"))
}

fn pty_mode(mode: TerminalMode) -> Pty {
    match mode {
        TerminalMode::InputSpeed => Pty::TTY_OP_ISPEED,
        TerminalMode::OutputSpeed => Pty::TTY_OP_OSPEED,
    }
}

/// Connect to `addr` (`host:port`) and authenticate with a password.
pub async fn dial(addr: &str, user: &str, password: &str) -> Result<SshTransport, RemoteError> {
    let config = Arc::new(client::Config::default());
    info!(addr, user, "connecting over SSH");

    let dial_err = |message: String| RemoteError::Dial {
        addr: addr.to_string(),
        message,
    };

    let mut handle = tokio::time::timeout(CONNECT_TIMEOUT, client::connect(config, addr, SshHandler))
        .await
        .map_err(|_| dial_err(format!("no answer within {}s", CONNECT_TIMEOUT.as_secs())))?
        .map_err(|e| dial_err(e.to_string()))?;

    let auth = handle
        .authenticate_password(user, password)
        .await
        .map_err(|e| dial_err(format!("authentication exchange failed: {e}")))?;
    if !auth.success() {
        return Err(RemoteError::Auth {
            user: user.to_string(),
        });
    }

    debug!(addr, "SSH authenticated");
    Ok(SshTransport { handle })
}

/// Log in as root on `address` and bridge the process stdio to `bash`.
pub async fn open_shell(address: &str, password: &str) -> Result<ShellExit, RemoteError> {
    let addr = format!("{address}:{SSH_PORT}");
    let transport = dial(&addr, LOGIN_USER, password).await?;
    open_interactive_shell(
        transport,
        tokio::io::stdin(),
        tokio::io::stdout(),
        tokio::io::stderr(),
    )
    .await
}

impl SecureTransport for SshTransport {
    type Session = SshSession;

    async fn open_session(&mut self) -> Result<SshSession, RemoteError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| session_err("opening session", e))?;
        Ok(SshSession { channel })
    }

    async fn close(self) -> Result<(), RemoteError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| session_err("disconnecting", e))
    }
}

impl ShellSession for SshSession {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), RemoteError> {
        let modes: Vec<(Pty, u32)> = pty
            .modes
            .iter()
            .map(|&(mode, value)| (pty_mode(mode), value))
            .collect();
        self.channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &modes)
            .await
            .map_err(|e| session_err("requesting pty", e))?;

        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Ok(()),
                Some(ChannelMsg::Failure) => return Err(RemoteError::PtyRejected),
                Some(other) => debug!(?other, "ignoring message while waiting for pty reply"),
                None => {
                    return Err(RemoteError::Session(
                        "channel closed during pty negotiation".into(),
                    ));
                }
            }
        }
    }

    async fn start(&mut self, command: &str) -> Result<(), RemoteError> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| session_err("starting shell", e))
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RemoteError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| session_err("sending input", e))
    }

    async fn send_eof(&mut self) -> Result<(), RemoteError> {
        self.channel
            .eof()
            .await
            .map_err(|e| session_err("sending EOF", e))
    }

    async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => return Some(SessionEvent::Stdout(data.to_vec())),
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    return Some(SessionEvent::Stderr(data.to_vec()));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    return Some(SessionEvent::Exit(exit_status));
                }
                ChannelMsg::Eof => return Some(SessionEvent::Eof),
                ChannelMsg::Close => return None,
                other => debug!(?other, "ignoring channel message"),
            }
        }
    }

    async fn close(self) -> Result<(), RemoteError> {
        self.channel
            .close()
            .await
            .map_err(|e| session_err("closing session", e))
    }
}
