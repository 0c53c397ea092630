use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::warn;

/// Bytes of stderr retained for diagnostics; older output is dropped so
/// a chatty encoder can never grow this past a fixed footprint.
const STDERR_TAIL_CAP: usize = 4096;

/// An owned encoder child process scoped to the track it was spawned
/// for. Reads stdout in fixed-size blocks; stderr is drained
/// continuously on a background task (never left for the OS pipe
/// buffer to fill, which would otherwise make the child block on its
/// own stderr write and stall stdout with it) and only the most recent
/// bytes are logged, and only if the process exits nonzero. Dropping
/// the handle before the child has exited kills it, so a broadcaster
/// that moves on to the next track (or shuts down) never leaves an
/// orphaned encoder behind.
pub struct EncoderHandle {
    child: Child,
    stdout: ChildStdout,
    stderr_tail: Arc<Mutex<Vec<u8>>>,
}

impl EncoderHandle {
    /// Spawns the encoder on `input_path`, producing 192kbps CBR stereo
    /// 44.1kHz MP3 on stdout, paced in real time by the `-re`-equivalent
    /// flag. Without that pacing the child would drain the input file in
    /// milliseconds and the dispatch loop would blow through every
    /// listener queue at memory speed.
    pub fn spawn(encoder_bin: &str, input_path: &Path) -> std::io::Result<Self> {
        let mut child = Command::new(encoder_bin)
            .arg("-re")
            .arg("-i")
            .arg(input_path)
            .arg("-f")
            .arg("mp3")
            .arg("-b:a")
            .arg("192k")
            .arg("-ac")
            .arg("2")
            .arg("-ar")
            .arg("44100")
            .arg("-loglevel")
            .arg("error")
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let stderr_tail = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(drain_stderr(stderr, stderr_tail.clone()));

        Ok(EncoderHandle {
            child,
            stdout,
            stderr_tail,
        })
    }

    /// Reads up to `chunk_size` bytes, returning `None` on EOF. Returns a
    /// shorter slice only for the final chunk of the track.
    pub async fn read_chunk(&mut self, chunk_size: usize) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; chunk_size];
        let mut filled = 0;

        while filled < chunk_size {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            Ok(None)
        } else {
            buf.truncate(filled);
            Ok(Some(buf))
        }
    }

    /// Waits for the child to exit and logs stderr if it failed.
    pub async fn reap(mut self) {
        match self.child.wait().await {
            Ok(status) if !status.success() => {
                let tail = self.stderr_tail.lock().await;
                warn!(
                    ?status,
                    stderr = %String::from_utf8_lossy(&tail),
                    "encoder exited with a nonzero status"
                );
            }
            Err(e) => warn!(error = %e, "failed to wait on encoder process"),
            _ => {}
        }
    }

    pub async fn kill(mut self) {
        let _ = self.child.kill().await;
    }
}

/// Continuously reads `stderr` to EOF so the child never blocks on a
/// full pipe buffer, keeping only the most recent `STDERR_TAIL_CAP`
/// bytes for `reap` to log on failure.
async fn drain_stderr(mut stderr: tokio::process::ChildStderr, tail: Arc<Mutex<Vec<u8>>>) {
    let mut buf = [0u8; 1024];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                let mut tail = tail.lock().await;
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_CAP {
                    let excess = tail.len() - STDERR_TAIL_CAP;
                    tail.drain(..excess);
                }
            }
        }
    }
}
