//! Engine adapter that drives an external reconstruction program.
//!
//! One session is one child process. Requests are written to its stdin and
//! its stdout is pumped into the session's event stream; see [`crate::wire`]
//! for the line format.

use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Mutex, PoisonError},
};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use shared::{
    domain::{ReconstructionConfiguration, ReconstructionRequest},
    protocol::EngineEvent,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    wire::{encode_request, parse_event_line},
    EngineSession, EventStream, ReconstructionEngine,
};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

const DEFAULT_EVENT_BUFFER: usize = 256;

type EventSender = mpsc::Sender<anyhow::Result<EngineEvent>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEngineOptions {
    pub program: PathBuf,
    /// Passed before the generated `--input`/configuration flags.
    pub args: Vec<String>,
    pub event_buffer: usize,
}

impl CommandEngineOptions {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

pub struct CommandEngine {
    options: CommandEngineOptions,
}

impl CommandEngine {
    pub fn new(options: CommandEngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CommandEngineOptions {
        &self.options
    }

    fn command(&self, input_dir: &Path, configuration: &ReconstructionConfiguration) -> Command {
        let mut command = Command::new(&self.options.program);
        command
            .args(&self.options.args)
            .arg("--input")
            .arg(input_dir);
        if let Some(ordering) = configuration.sample_ordering {
            command.arg("--sample-ordering").arg(ordering.as_str());
        }
        if let Some(sensitivity) = configuration.feature_sensitivity {
            command.arg("--feature-sensitivity").arg(sensitivity.as_str());
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        command
    }
}

async fn check_input_dir(input_dir: &Path) -> anyhow::Result<()> {
    let metadata = tokio::fs::metadata(input_dir)
        .await
        .with_context(|| format!("input folder '{}' is not accessible", input_dir.display()))?;
    if !metadata.is_dir() {
        bail!("input path '{}' is not a folder", input_dir.display());
    }
    tokio::fs::read_dir(input_dir)
        .await
        .with_context(|| format!("input folder '{}' cannot be read", input_dir.display()))?;
    Ok(())
}

#[async_trait]
impl ReconstructionEngine for CommandEngine {
    async fn create_session(
        &self,
        input_dir: &Path,
        configuration: &ReconstructionConfiguration,
    ) -> anyhow::Result<Box<dyn EngineSession>> {
        check_input_dir(input_dir).await?;

        let mut child = self.command(input_dir, configuration).spawn().with_context(|| {
            format!(
                "failed to launch engine program '{}'",
                self.options.program.display()
            )
        })?;
        let stdin = child.stdin.take().context("engine stdin was not captured")?;
        let stdout = child
            .stdout
            .take()
            .context("engine stdout was not captured")?;
        let stderr = child.stderr.take();
        info!(
            program = %self.options.program.display(),
            pid = ?child.id(),
            input = %input_dir.display(),
            "engine process started"
        );

        let (event_tx, event_rx) = mpsc::channel(self.options.event_buffer.max(1));
        let pump = tokio::spawn(pump_events(child, stdout, stderr, event_tx));

        Ok(Box::new(CommandSession {
            stdin: AsyncMutex::new(Some(stdin)),
            events: Mutex::new(Some(event_rx)),
            pump,
        }))
    }
}

/// Session over one engine process. Dropping it kills the process.
pub struct CommandSession {
    stdin: AsyncMutex<Option<ChildStdin>>,
    events: Mutex<Option<mpsc::Receiver<anyhow::Result<EngineEvent>>>>,
    pump: JoinHandle<()>,
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl EngineSession for CommandSession {
    async fn process(&self, requests: &[ReconstructionRequest]) -> anyhow::Result<()> {
        let mut stdin = self
            .stdin
            .lock()
            .await
            .take()
            .context("requests were already submitted to this session")?;
        for request in requests {
            let line = encode_request(request)?;
            stdin
                .write_all(line.as_bytes())
                .await
                .context("failed to send request to engine")?;
        }
        stdin
            .shutdown()
            .await
            .context("failed to close engine input")?;
        Ok(())
    }

    fn outputs(&self) -> anyhow::Result<EventStream> {
        let receiver = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .context("event stream was already taken for this session")?;
        Ok(ReceiverStream::new(receiver).boxed())
    }
}

async fn pump_events(
    mut child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
    event_tx: EventSender,
) {
    let pid = child.id();
    if let Some(stderr) = stderr {
        tokio::spawn(forward_stderr(stderr));
    }

    let mut stdout = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        match next_line(&mut stdout, &mut buf).await {
            Ok(Some(line)) => match parse_event_line(&line) {
                Ok(Some(event)) => {
                    if event_tx.send(Ok(event)).await.is_err() {
                        debug!(?pid, "event receiver dropped; stopping engine");
                        return;
                    }
                }
                Ok(None) => debug!(?pid, "engine: {line}"),
                Err(err) => {
                    let _ = event_tx.send(Err(err.into())).await;
                    return;
                }
            },
            Ok(None) => break,
            Err(err) => {
                let _ = event_tx
                    .send(Err(anyhow!(err).context("failed to read engine output")))
                    .await;
                return;
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => debug!(?pid, "engine process exited"),
        Ok(status) => {
            let _ = event_tx
                .send(Err(anyhow!("engine exited unsuccessfully ({status})")))
                .await;
        }
        Err(err) => {
            let _ = event_tx
                .send(Err(anyhow!(err).context("failed to wait for engine process")))
                .await;
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut stderr = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_line(&mut stderr, &mut buf).await {
        debug!(target: "engine_stderr", "{line}");
    }
}

/// Reads one line without its terminator. Engines may print text in any
/// encoding, so invalid UTF-8 is replaced rather than treated as an error.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

#[cfg(all(test, unix))]
#[path = "tests/command_tests.rs"]
mod tests;
