//! Interactive shell over a secure transport.
//!
//! The bridge is generic over [`SecureTransport`]; `ssh` provides the
//! russh-backed implementation.

pub mod ssh;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub const LOGIN_USER: &str = "root";
pub const SSH_PORT: u16 = 22;
pub const SHELL_COMMAND: &str = "bash";

const STDIN_BUF: usize = 8192;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to connect to {addr}: {message}")]
    Dial { addr: String, message: String },

    #[error("authentication failed for user '{user}'")]
    Auth { user: String },

    #[error("session error: {0}")]
    Session(String),

    #[error("the server refused to allocate a pseudo-terminal")]
    PtyRejected,

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Connection and authentication failures abort the process. Anything
    /// that goes wrong once a connection exists only ends the shell.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteError::Dial { .. } | RemoteError::Auth { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    InputSpeed,
    OutputSpeed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
    pub modes: Vec<(TerminalMode, u32)>,
}

impl PtyRequest {
    /// `xterm`, 80x40, 14400 baud both ways.
    pub fn standard() -> Self {
        Self {
            term: "xterm".into(),
            cols: 80,
            rows: 40,
            modes: vec![
                (TerminalMode::InputSpeed, 14400),
                (TerminalMode::OutputSpeed, 14400),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(u32),
    /// Remote closed its output; more events may still follow.
    Eof,
}

/// A connected, authenticated transport.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait SecureTransport {
    type Session: ShellSession;

    async fn open_session(&mut self) -> Result<Self::Session, RemoteError>;

    async fn close(self) -> Result<(), RemoteError>;
}

/// One logical channel on a transport.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait ShellSession {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), RemoteError>;

    async fn start(&mut self, command: &str) -> Result<(), RemoteError>;

    async fn send(&mut self, data: &[u8]) -> Result<(), RemoteError>;

    async fn send_eof(&mut self) -> Result<(), RemoteError>;

    /// `None` once the channel is closed or the transport is gone.
    async fn next_event(&mut self) -> Option<SessionEvent>;

    async fn close(self) -> Result<(), RemoteError>;
}

/// How the remote shell ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellExit {
    /// `None` when the channel closed without reporting a status.
    pub status: Option<u32>,
}

/// Run `bash` under a pty on `transport`, bridged to the given streams.
///
/// The session and the transport are closed on every path out, including
/// a refused pty.
pub async fn open_interactive_shell<T, I, O, E>(
    mut transport: T,
    stdin: I,
    stdout: O,
    stderr: E,
) -> Result<ShellExit, RemoteError>
where
    T: SecureTransport,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut session = match transport.open_session().await {
        Ok(session) => session,
        Err(e) => {
            release_transport(transport).await;
            return Err(e);
        }
    };

    let result = run_session(&mut session, stdin, stdout, stderr).await;

    if let Err(e) = session.close().await {
        debug!(error = %e, "closing session");
    }
    release_transport(transport).await;

    result.map(|status| ShellExit { status })
}

async fn release_transport<T: SecureTransport>(transport: T) {
    if let Err(e) = transport.close().await {
        debug!(error = %e, "closing transport");
    }
}

async fn run_session<S, I, O, E>(
    session: &mut S,
    stdin: I,
    stdout: O,
    stderr: E,
) -> Result<Option<u32>, RemoteError>
where
    S: ShellSession,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    session.request_pty(&PtyRequest::standard()).await?;
    session.start(SHELL_COMMAND).await?;
    pump(session, stdin, stdout, stderr).await
}

/// Copy local input to the session and session output back, concurrently,
/// until the session ends.
async fn pump<S, I, O, E>(
    session: &mut S,
    mut stdin: I,
    mut stdout: O,
    mut stderr: E,
) -> Result<Option<u32>, RemoteError>
where
    S: ShellSession,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; STDIN_BUF];
    let mut stdin_open = true;
    let mut status = None;

    loop {
        tokio::select! {
            read = stdin.read(&mut buf), if stdin_open => {
                match read {
                    Ok(0) => {
                        stdin_open = false;
                        session.send_eof().await?;
                    }
                    Ok(n) => session.send(&buf[..n]).await?,
                    Err(e) => {
                        warn!(error = %e, "local input failed, closing remote input");
                        stdin_open = false;
                        session.send_eof().await?;
                    }
                }
            }
            event = session.next_event() => {
                match event {
                    Some(SessionEvent::Stdout(data)) => {
                        stdout.write_all(&data).await?;
                        stdout.flush().await?;
                    }
                    Some(SessionEvent::Stderr(data)) => {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                    Some(SessionEvent::Exit(code)) => {
                        debug!(code, "remote shell exited");
                        status = Some(code);
                    }
                    Some(SessionEvent::Eof) => {}
                    None => break,
                }
            }
        }
    }

    Ok(status)
}
