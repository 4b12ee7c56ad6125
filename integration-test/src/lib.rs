//! Test driver for envopt integration tests.
//!
//! Spawns `optdump` with:
//! - an explicit argument list (argv[1..]),
//! - a cleared environment plus the variables the test names,
//! - an optional working directory,
//!
//! and captures stdout/stderr for assertions.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;

/// A running optdump process.
pub struct TestSession {
    child: Child,
    /// Join handle for the stdout drain thread.
    stdout_thread: thread::JoinHandle<Vec<u8>>,
    /// Join handle for the stderr drain thread.
    stderr_thread: thread::JoinHandle<Vec<u8>>,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            eprintln!("drain error: {e}");
        }
        buf
    })
}

impl TestSession {
    /// Spawn `binary` with the given arguments.
    ///
    /// The child starts from an empty environment; `env` lists every
    /// variable it will see.
    pub fn spawn(
        binary: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> std::io::Result<TestSession> {
        Self::spawn_in(binary, args, env, None)
    }

    /// Like `spawn`, but with an optional working directory.
    pub fn spawn_in(
        binary: &str,
        args: &[&str],
        env: &[(&str, &str)],
        cwd: Option<&str>,
    ) -> std::io::Result<TestSession> {
        let mut cmd = Command::new(binary);
        cmd.args(args);
        cmd.env_clear();
        for (k, v) in env {
            cmd.env(k, v);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");

        Ok(TestSession {
            child,
            stdout_thread: drain(stdout),
            stderr_thread: drain(stderr),
        })
    }

    /// Wait for the child to exit and assert the exit code.
    pub fn wait_exit(mut self, expected_code: i32) -> SessionOutput {
        let status = self.child.wait().expect("failed to wait for child");
        let code = status.code().unwrap_or(-1);

        let stdout = self.stdout_thread.join().unwrap_or_default();
        let stderr = self.stderr_thread.join().unwrap_or_default();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        assert_eq!(
            code, expected_code,
            "expected exit code {expected_code}, got {code}\nstdout:\n{stdout}\nstderr:\n{stderr}"
        );

        SessionOutput { stdout, stderr }
    }
}

/// Output captured from a completed session.
pub struct SessionOutput {
    pub stdout: String,
    pub stderr: String,
}

impl SessionOutput {
    /// Report lines, i.e. everything before the `--` separator.
    fn report(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().take_while(|l| *l != "--")
    }

    /// Value of the first `label: value` report line.
    pub fn field(&self, label: &str) -> Option<&str> {
        let prefix = format!("{label}: ");
        self.report()
            .find_map(|l| l.strip_prefix(prefix.as_str()))
    }

    /// Values of every `label: value` report line, in order.
    pub fn fields(&self, label: &str) -> Vec<&str> {
        let prefix = format!("{label}: ");
        self.report()
            .filter_map(|l| l.strip_prefix(prefix.as_str()))
            .collect()
    }

    /// The registry document printed after the `--` separator.
    pub fn document(&self) -> &str {
        match self.stdout.find("\n--\n") {
            Some(at) => &self.stdout[at + "\n--\n".len()..],
            None => "",
        }
    }
}
