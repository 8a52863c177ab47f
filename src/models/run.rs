//! Run identity: the PID that namespaces every artifact of a run, the
//! recovery flag, and the run-wide cancellation signal.

use rand::{RngCore, rngs::OsRng};
use std::{env, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::errors::{RecorderError, RecorderResult};

/// Setting this variable resumes a run under the given PID.
pub const PROCESS_ID_ENV: &str = "rdsrecorder_PROCESS_ID";

const PID_BYTES: usize = 12;

/// Handle threaded through every component of a run.
///
/// Cloning is cheap; all clones share the PID and the cancellation token.
#[derive(Clone, Debug)]
pub struct RunHandle {
    pid: Arc<str>,
    recovery: bool,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Inherit the PID from [`PROCESS_ID_ENV`] (recovery) or generate a new one.
    pub fn from_env() -> RecorderResult<Self> {
        match env::var(PROCESS_ID_ENV) {
            Ok(pid) => Ok(Self::with_pid(pid, true)),
            Err(_) => Ok(Self::with_pid(generate_pid()?, false)),
        }
    }

    pub fn with_pid(pid: impl Into<String>, recovery: bool) -> Self {
        Self {
            pid: Arc::from(pid.into()),
            recovery,
            cancel: CancellationToken::new(),
        }
    }

    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// True when the PID was inherited from a previous process.
    pub fn is_recovery(&self) -> bool {
        self.recovery
    }

    pub fn cancel_signal(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// 12 bytes from the OS CSPRNG, hex encoded (24 characters).
pub fn generate_pid() -> RecorderResult<String> {
    let mut bytes = [0u8; PID_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| RecorderError::Io(std::io::Error::other(err)))?;
    Ok(hex::encode(bytes))
}
