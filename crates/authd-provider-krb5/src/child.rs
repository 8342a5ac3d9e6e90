//! Helper-child supervision.
//!
//! One invocation per authentication attempt: spawn the helper with piped
//! stdio, drop privileges to the requesting identity between fork and
//! exec, deliver the framed request, read the framed reply, reap.
//!
//! The child is always reaped, and both pipe ends are closed on every
//! exit path: stdin is dropped right after the write (the child sees EOF
//! and proceeds to respond), stdout when the bounded read finishes, and
//! error paths hand the child to a detached reaper task.

use std::io;
use std::path::Path;
use std::process::Stdio;

use nix::unistd::{chdir, setegid, seteuid, setgid, setuid, Gid, Uid};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::error::{AuthError, AuthResult};
use crate::protocol::MAX_CHILD_MSG_SIZE;

/// Runs one helper invocation as `(uid, gid)` and returns the raw reply.
///
/// The reply is capped at [`MAX_CHILD_MSG_SIZE`] bytes. A non-zero exit
/// status is logged but does not fail the invocation; whether the reply
/// is well-formed governs success.
pub async fn run_helper(
    helper: &Path,
    request: &[u8],
    uid: u32,
    gid: u32,
) -> AuthResult<Vec<u8>> {
    let uid = Uid::from_raw(uid);
    let gid = Gid::from_raw(gid);

    let mut command = Command::new(helper);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    // SAFETY: the hook runs in the forked child before exec and performs
    // only async-signal-safe syscalls. Real ids are set before effective
    // ids; both must change for a correct privilege drop.
    unsafe {
        command.pre_exec(move || {
            chdir("/tmp").map_err(io::Error::from)?;
            setgid(gid).map_err(io::Error::from)?;
            setuid(uid).map_err(io::Error::from)?;
            setegid(gid).map_err(io::Error::from)?;
            seteuid(uid).map_err(io::Error::from)?;
            Ok(())
        });
    }

    let mut child = command
        .spawn()
        .map_err(|e| AuthError::child(format!("helper spawn failed: {e}")))?;

    let Some(mut stdin) = child.stdin.take() else {
        reap_detached(child);
        return Err(AuthError::child("helper stdin unavailable"));
    };
    let Some(stdout) = child.stdout.take() else {
        reap_detached(child);
        return Err(AuthError::child("helper stdout unavailable"));
    };

    // Whole-frame delivery before the read phase; short writes are
    // retried by write_all.
    if let Err(e) = stdin.write_all(request).await {
        reap_detached(child);
        return Err(AuthError::child(format!("request write failed: {e}")));
    }
    drop(stdin);

    let mut reply = Vec::new();
    let mut bounded = stdout.take(MAX_CHILD_MSG_SIZE as u64);
    if let Err(e) = bounded.read_to_end(&mut reply).await {
        reap_detached(child);
        return Err(AuthError::child(format!("reply read failed: {e}")));
    }
    drop(bounded);

    match child.wait().await {
        Ok(status) if !status.success() => {
            tracing::warn!(%status, "credential helper exited with failure");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to reap credential helper");
        }
    }

    Ok(reply)
}

/// Reaps the child from a detached task so no zombie outlives an error
/// path.
fn reap_detached(mut child: Child) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                tracing::debug!(%status, "credential helper reaped after error");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to reap credential helper");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use nix::unistd::{getgid, getuid};

    use super::*;
    use crate::protocol::decode_reply;

    fn write_helper(dir: &tempfile::TempDir, script: &str) -> PathBuf {
        let path = dir.path().join("helper.sh");
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    async fn run(script: &str, request: &[u8]) -> AuthResult<Vec<u8>> {
        let dir = tempfile::tempdir().unwrap();
        let helper = write_helper(&dir, script);
        run_helper(&helper, request, getuid().as_raw(), getgid().as_raw()).await
    }

    #[tokio::test]
    async fn helper_reply_is_read_to_eof() {
        // Drain the request, then emit a 12-zero-byte reply:
        // pam_status=0, msg_type=0, msg_len=0.
        let reply = run(
            "#!/bin/sh\ncat > /dev/null\nhead -c 12 /dev/zero\n",
            b"framed request",
        )
        .await
        .unwrap();

        let decoded = decode_reply(&reply).unwrap();
        assert_eq!(decoded.pam_status, 0);
        assert!(decoded.message.is_empty());
    }

    #[tokio::test]
    async fn nonzero_exit_does_not_fail_a_wellformed_reply() {
        let reply = run(
            "#!/bin/sh\ncat > /dev/null\nhead -c 12 /dev/zero\nexit 3\n",
            b"framed request",
        )
        .await
        .unwrap();

        assert!(decode_reply(&reply).is_ok());
    }

    #[tokio::test]
    async fn oversized_reply_is_capped() {
        let reply = run(
            "#!/bin/sh\ncat > /dev/null\nhead -c 8000 /dev/zero\n",
            b"framed request",
        )
        .await
        .unwrap();

        assert_eq!(reply.len(), MAX_CHILD_MSG_SIZE);
    }

    #[tokio::test]
    async fn missing_helper_fails_spawn() {
        let err = run_helper(
            Path::new("/nonexistent/authd-krb5-helper"),
            b"framed request",
            getuid().as_raw(),
            getgid().as_raw(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::Child(_)));
    }
}
