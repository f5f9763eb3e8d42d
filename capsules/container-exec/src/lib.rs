use invocation::{PathMapping, WrapperError, CONTAINER_INPUT_ROOT, CONTAINER_OUTPUT_ROOT};
use std::env;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

mod signals;

/// Environment variable naming the container runtime binary.
pub const RUNTIME_ENV_VAR: &str = "MGWRAP_CONTAINER_RUNTIME";
const DEFAULT_RUNTIME: &str = "apptainer";
/// Conda installation root inside the images.
pub const DEFAULT_CONDA_HOME: &str = "/opt/conda";

/// Exit status of the in-container script when the activation script is absent.
pub const ACTIVATION_MISSING_EXIT: i32 = 199;
const ACTIVATION_MARKER: &str = "mgwrap: environment activation script not found:";
const SCRIPT_NAME: &str = "mgwrap";
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long stderr may stay open after the runtime exits, e.g. held by a
/// detached grandchild, before the wrapper stops relaying it.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A host directory bound to a fixed mount point inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: &'static str,
    pub read_only: bool,
}

impl BindMount {
    pub fn bind_arg(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.source.display(), self.target, mode)
    }
}

/// Input root read-only, output root read-write. Always exactly these two.
pub fn bind_mounts(mapping: &PathMapping) -> Vec<BindMount> {
    vec![
        BindMount {
            source: mapping.input_root.clone(),
            target: CONTAINER_INPUT_ROOT,
            read_only: true,
        },
        BindMount {
            source: mapping.output_root.clone(),
            target: CONTAINER_OUTPUT_ROOT,
            read_only: false,
        },
    ]
}

/// Named conda environment enabled inside the image before the tool runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentActivation {
    pub conda_home: PathBuf,
    pub env_name: String,
}

impl EnvironmentActivation {
    pub fn new(conda_home: impl Into<PathBuf>, env_name: impl Into<String>) -> Self {
        Self {
            conda_home: conda_home.into(),
            env_name: env_name.into(),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.conda_home.join("etc/profile.d/conda.sh")
    }
}

/// Everything needed to run one tool inside one container.
#[derive(Debug, Clone)]
pub struct ContainerInvocation {
    pub tool: String,
    pub image: String,
    pub mounts: Vec<BindMount>,
    pub activation: EnvironmentActivation,
    /// Tool binary followed by its arguments, one token each.
    pub command: Vec<String>,
}

/// Outcome of a single child run. Consumed right away by [`ExecutionResult::check`].
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: ExitStatus,
    pub activation_missing: bool,
    pub forwarded_signal: Option<i32>,
}

impl ExecutionResult {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Map the child's termination to the wrapper's outcome.
    pub fn check(&self, invocation: &ContainerInvocation) -> Result<(), WrapperError> {
        match self.status.code() {
            Some(0) => Ok(()),
            Some(ACTIVATION_MISSING_EXIT) if self.activation_missing => {
                Err(WrapperError::EnvironmentActivation {
                    script: invocation.activation.script_path().display().to_string(),
                })
            }
            Some(code) => Err(WrapperError::ToolExecution {
                tool: invocation.tool.clone(),
                code,
            }),
            None => Err(WrapperError::ToolTerminated {
                tool: invocation.tool.clone(),
                signal: terminating_signal(&self.status)
                    .or(self.forwarded_signal)
                    .unwrap_or(0),
            }),
        }
    }
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Runtime binary from `MGWRAP_CONTAINER_RUNTIME`, falling back to apptainer.
pub fn detect_runtime() -> String {
    runtime_from(env::var(RUNTIME_ENV_VAR).ok())
}

fn runtime_from(configured: Option<String>) -> String {
    match configured {
        Some(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => DEFAULT_RUNTIME.to_string(),
    }
}

pub fn execute(invocation: &ContainerInvocation) -> Result<ExecutionResult, WrapperError> {
    execute_with_runtime(invocation, &detect_runtime())
}

/// Launch the runtime, forward stderr and signals, and block until it exits.
pub fn execute_with_runtime(
    invocation: &ContainerInvocation,
    runtime: &str,
) -> Result<ExecutionResult, WrapperError> {
    let mut command = Command::new(runtime);
    configure_command(&mut command, invocation);
    info!(
        tool = %invocation.tool,
        command = %command_line_string(&command),
        "launching container"
    );

    let guard = signals::ForwardingGuard::install();
    let mut child = command
        .spawn()
        .map_err(|source| WrapperError::RuntimeSpawn {
            runtime: runtime.to_string(),
            source,
        })?;

    let marker_seen = Arc::new(AtomicBool::new(false));
    let scanner = child.stderr.take().map(|stderr| {
        let marker_seen = Arc::clone(&marker_seen);
        thread::spawn(move || forward_stderr(stderr, &marker_seen))
    });

    let waited = wait_forwarding_signals(&mut child);
    drop(guard);
    let (status, forwarded_signal) = waited?;

    if let Some(handle) = scanner {
        drain_stderr(handle, STDERR_DRAIN_TIMEOUT);
    }
    let activation_missing = marker_seen.load(Ordering::SeqCst);

    match status.code() {
        Some(0) => info!(tool = %invocation.tool, "container exited successfully"),
        Some(code) => warn!(tool = %invocation.tool, code, "container exited with failure"),
        None => warn!(tool = %invocation.tool, "container terminated by signal"),
    }

    Ok(ExecutionResult {
        status,
        activation_missing,
        forwarded_signal,
    })
}

pub fn configure_command(command: &mut Command, invocation: &ContainerInvocation) {
    command.arg("exec");
    for mount in &invocation.mounts {
        command.arg("--bind").arg(mount.bind_arg());
    }
    command.arg(&invocation.image);

    // Tool tokens travel as positional parameters and are never re-parsed by the shell.
    command.arg("/bin/bash").arg("-c").arg(activation_script());
    command.arg(SCRIPT_NAME);
    command.arg(invocation.activation.script_path());
    command.arg(&invocation.activation.env_name);
    command.args(&invocation.command);

    // stdout of the wrapper carries only the completion summary.
    command.stdin(Stdio::null());
    command.stdout(io::stderr());
    command.stderr(Stdio::piped());
}

fn activation_script() -> String {
    format!(
        "if [ ! -f \"$1\" ]; then echo \"{marker} $1\" >&2; exit {code}; fi\n\
         source \"$1\" || exit $?\n\
         conda activate \"$2\" || exit $?\n\
         shift 2\n\
         exec \"$@\"",
        marker = ACTIVATION_MARKER,
        code = ACTIVATION_MISSING_EXIT,
    )
}

fn wait_forwarding_signals(child: &mut Child) -> Result<(ExitStatus, Option<i32>), WrapperError> {
    let mut forwarded = None;
    loop {
        if let Some(signal) = signals::take_pending() {
            warn!(signal, pid = child.id(), "forwarding signal to container runtime");
            signals::forward(child.id(), signal);
            forwarded = Some(signal);
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok((status, forwarded)),
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(WrapperError::ChildWait { source }),
        }
    }
}

/// Relay child stderr line by line, flagging `marker_seen` once the activation
/// marker appears.
fn forward_stderr<R: Read>(stream: R, marker_seen: &AtomicBool) {
    let reader = BufReader::new(stream);
    for line in reader.split(b'\n') {
        let Ok(line) = line else { break };
        if line.starts_with(ACTIVATION_MARKER.as_bytes()) {
            marker_seen.store(true, Ordering::SeqCst);
        }
        let mut sink = io::stderr().lock();
        let _ = sink.write_all(&line);
        let _ = sink.write_all(b"\n");
    }
    debug!(
        marker_seen = marker_seen.load(Ordering::SeqCst),
        "child stderr closed"
    );
}

/// Wait for the relay thread to see end of stream, but no longer than
/// `timeout` once the runtime itself has exited. A thread still running past
/// the deadline is detached.
fn drain_stderr(handle: JoinHandle<()>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("child stderr still open after the runtime exited; no longer relaying it");
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
    let _ = handle.join();
}

fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let escaped = arg.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

/// Human-readable rendering of the runtime command line, for logs only.
pub fn command_line_string(cmd: &Command) -> String {
    let mut s = String::new();
    s.push_str(&cmd.get_program().to_string_lossy());
    for a in cmd.get_args() {
        s.push(' ');
        let a = a.to_string_lossy();
        if a.is_empty() || a.contains([' ', '"', '\'', '\n', '$']) {
            s.push_str(&shell_escape(&a));
        } else {
            s.push_str(&a);
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;

    fn sample_invocation() -> ContainerInvocation {
        ContainerInvocation {
            tool: "fastp".to_string(),
            image: "/img/fastp.sif".to_string(),
            mounts: bind_mounts(&PathMapping::new("/data/in", "/data/out")),
            activation: EnvironmentActivation::new("/opt/conda", "fastp"),
            command: vec![
                "fastp".to_string(),
                "--in1".to_string(),
                "/input/R1.fastq.gz".to_string(),
            ],
        }
    }

    fn args_of(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn bind_args_carry_mode() {
        let mounts = bind_mounts(&PathMapping::new("/data/in", "/data/out"));
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].bind_arg(), "/data/in:/input:ro");
        assert_eq!(mounts[1].bind_arg(), "/data/out:/output:rw");
    }

    #[test]
    fn configure_command_orders_mounts_image_and_tool_tokens() {
        let invocation = sample_invocation();
        let mut command = Command::new("apptainer");
        configure_command(&mut command, &invocation);
        let args = args_of(&command);

        assert_eq!(args[0], "exec");
        assert_eq!(&args[1..5], ["--bind", "/data/in:/input:ro", "--bind", "/data/out:/output:rw"]);
        assert_eq!(args[5], "/img/fastp.sif");
        assert_eq!(args[6], "/bin/bash");
        assert_eq!(args[7], "-c");
        assert_eq!(args[9], SCRIPT_NAME);
        assert_eq!(args[10], "/opt/conda/etc/profile.d/conda.sh");
        assert_eq!(args[11], "fastp");
        assert_eq!(&args[12..], ["fastp", "--in1", "/input/R1.fastq.gz"]);
    }

    #[test]
    fn activation_script_guards_missing_script() {
        let script = activation_script();
        assert!(script.starts_with("if [ ! -f \"$1\" ]"));
        assert!(script.contains(ACTIVATION_MARKER));
        assert!(script.contains(&format!("exit {}", ACTIVATION_MISSING_EXIT)));
        assert!(script.ends_with("exec \"$@\""));
    }

    #[test]
    fn stderr_scanner_detects_marker() {
        let stream = format!(
            "Detecting adapter sequence\n{} /opt/conda/etc/profile.d/conda.sh\n",
            ACTIVATION_MARKER
        );
        let seen = AtomicBool::new(false);
        forward_stderr(Cursor::new(stream.into_bytes()), &seen);
        assert!(seen.load(Ordering::SeqCst));

        let seen = AtomicBool::new(false);
        forward_stderr(Cursor::new(b"Read1 before filtering\n".to_vec()), &seen);
        assert!(!seen.load(Ordering::SeqCst));
    }

    #[test]
    fn drain_stderr_gives_up_on_a_stuck_reader() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let stuck = thread::spawn(move || {
            let _ = rx.recv();
        });

        let started = Instant::now();
        drain_stderr(stuck, Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(tx);

        let finished = thread::spawn(|| {});
        drain_stderr(finished, Duration::from_secs(5));
    }

    #[test]
    fn command_line_string_quotes_only_when_needed() {
        let mut command = Command::new("apptainer");
        command.arg("exec").arg("echo hi").arg("");
        assert_eq!(command_line_string(&command), "apptainer exec 'echo hi' ''");
    }

    #[test]
    fn runtime_defaults_to_apptainer() {
        assert_eq!(runtime_from(None), "apptainer");
        assert_eq!(runtime_from(Some(String::new())), "apptainer");
        assert_eq!(runtime_from(Some("   ".to_string())), "apptainer");
    }

    #[test]
    fn runtime_override_is_trimmed() {
        assert_eq!(runtime_from(Some(" singularity\n".to_string())), "singularity");
        assert_eq!(
            runtime_from(Some("/usr/local/bin/apptainer".to_string())),
            "/usr/local/bin/apptainer"
        );
    }

    #[test]
    fn missing_runtime_is_a_spawn_error() {
        let err = execute_with_runtime(&sample_invocation(), "/nonexistent/apptainer").unwrap_err();
        assert!(matches!(err, WrapperError::RuntimeSpawn { .. }));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;
        use std::os::unix::process::ExitStatusExt;

        fn write_script(path: &Path, body: &str) {
            fs::write(path, body).unwrap();
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
        }

        /// Stand-in runtime that drops `exec --bind A --bind B IMAGE` and runs the rest.
        fn passthrough_runtime(dir: &Path) -> PathBuf {
            let runtime = dir.join("runtime.sh");
            write_script(&runtime, "#!/bin/sh\nshift 6\nexec \"$@\"\n");
            runtime
        }

        fn conda_home_with_stub(dir: &Path) -> PathBuf {
            let conda_home = dir.join("conda");
            fs::create_dir_all(conda_home.join("etc/profile.d")).unwrap();
            fs::write(
                conda_home.join("etc/profile.d/conda.sh"),
                "conda() { return 0; }\n",
            )
            .unwrap();
            conda_home
        }

        #[test]
        fn check_passes_exit_code_through() {
            let invocation = sample_invocation();
            let result = ExecutionResult {
                status: ExitStatus::from_raw(3 << 8),
                activation_missing: false,
                forwarded_signal: None,
            };
            let err = result.check(&invocation).unwrap_err();
            assert_eq!(err.exit_code(), 3);
        }

        #[test]
        fn check_requires_marker_for_activation_error() {
            let invocation = sample_invocation();
            let without_marker = ExecutionResult {
                status: ExitStatus::from_raw(ACTIVATION_MISSING_EXIT << 8),
                activation_missing: false,
                forwarded_signal: None,
            };
            assert!(matches!(
                without_marker.check(&invocation),
                Err(WrapperError::ToolExecution { code: ACTIVATION_MISSING_EXIT, .. })
            ));

            let with_marker = ExecutionResult {
                activation_missing: true,
                ..without_marker
            };
            assert!(matches!(
                with_marker.check(&invocation),
                Err(WrapperError::EnvironmentActivation { .. })
            ));
        }

        #[test]
        fn check_reports_signal_termination() {
            let result = ExecutionResult {
                status: ExitStatus::from_raw(libc::SIGTERM),
                activation_missing: false,
                forwarded_signal: Some(libc::SIGTERM),
            };
            let err = result.check(&sample_invocation()).unwrap_err();
            assert_eq!(err.exit_code(), 128 + libc::SIGTERM);
        }

        #[test]
        fn execute_runs_tool_after_activation() {
            let dir = tempfile::tempdir().unwrap();
            let runtime = passthrough_runtime(dir.path());
            let conda_home = conda_home_with_stub(dir.path());
            let marker = dir.path().join("ran");

            let invocation = ContainerInvocation {
                activation: EnvironmentActivation::new(&conda_home, "fastp"),
                command: vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    format!("touch '{}'", marker.display()),
                ],
                ..sample_invocation()
            };

            let result = execute_with_runtime(&invocation, runtime.to_str().unwrap()).unwrap();
            assert_eq!(result.exit_code(), Some(0));
            result.check(&invocation).unwrap();
            assert!(marker.exists());
        }

        #[test]
        fn execute_propagates_tool_exit_code() {
            let dir = tempfile::tempdir().unwrap();
            let runtime = passthrough_runtime(dir.path());
            let conda_home = conda_home_with_stub(dir.path());

            let invocation = ContainerInvocation {
                activation: EnvironmentActivation::new(&conda_home, "fastp"),
                command: vec!["/bin/sh".to_string(), "-c".to_string(), "exit 3".to_string()],
                ..sample_invocation()
            };

            let result = execute_with_runtime(&invocation, runtime.to_str().unwrap()).unwrap();
            let err = result.check(&invocation).unwrap_err();
            assert!(matches!(err, WrapperError::ToolExecution { code: 3, .. }));
        }

        #[test]
        fn execute_detects_missing_activation_script() {
            let dir = tempfile::tempdir().unwrap();
            let runtime = passthrough_runtime(dir.path());
            let marker = dir.path().join("ran");

            let invocation = ContainerInvocation {
                activation: EnvironmentActivation::new(dir.path().join("no-conda"), "fastp"),
                command: vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    format!("touch '{}'", marker.display()),
                ],
                ..sample_invocation()
            };

            let result = execute_with_runtime(&invocation, runtime.to_str().unwrap()).unwrap();
            assert!(result.activation_missing);
            assert!(matches!(
                result.check(&invocation),
                Err(WrapperError::EnvironmentActivation { .. })
            ));
            assert!(!marker.exists());
        }

        #[test]
        fn execute_returns_when_grandchild_keeps_stderr_open() {
            let dir = tempfile::tempdir().unwrap();
            let runtime = dir.path().join("runtime.sh");
            write_script(&runtime, "#!/bin/sh\nsleep 30 &\nexit 0\n");

            let started = Instant::now();
            let result =
                execute_with_runtime(&sample_invocation(), runtime.to_str().unwrap()).unwrap();
            assert_eq!(result.exit_code(), Some(0));
            assert!(started.elapsed() < Duration::from_secs(15));
        }
    }
}
