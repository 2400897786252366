//! Language model adapters

use anyhow::{Context, bail};
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Anything that turns a prompt into a completion
pub trait LanguageModel {
    fn generate(&mut self, prompt: &str) -> anyhow::Result<String>;
}

impl<F> LanguageModel for F
where
    F: FnMut(&str) -> anyhow::Result<String>,
{
    fn generate(&mut self, prompt: &str) -> anyhow::Result<String> {
        self(prompt)
    }
}

/// Runs an external program per request: the prompt goes to stdin, the completion comes from stdout
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandModel {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Split a shell-like command line on whitespace
    pub fn from_command_line(command_line: &str) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().context("empty model command")?;
        Ok(Self {
            program: program.to_string(),
            args: parts.map(str::to_string).collect(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Builder method: append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder method: kill the command if it runs longer than this
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> anyhow::Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context("failed to poll model command")? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            // Already-exited races are fine here
            let _ = child.kill();
            let _ = child.wait();
            bail!("model command timed out after {} ms", timeout.as_millis());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn read_all(mut pipe: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

impl LanguageModel for CommandModel {
    fn generate(&mut self, prompt: &str) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start model command '{}'", self.program))?;

        let mut stdin = child.stdin.take().context("model command has no stdin")?;
        let stdout = child.stdout.take().context("model command has no stdout")?;
        let stderr = child.stderr.take().context("model command has no stderr")?;
        let timeout = self.timeout;

        // Write and drain at the same time; a full pipe would otherwise stall the child
        let (status, written, stdout, stderr) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(prompt.as_bytes()));
            let out = scope.spawn(move || read_all(stdout));
            let err = scope.spawn(move || read_all(stderr));

            let status = wait_with_timeout(&mut child, timeout);
            (status, writer.join(), out.join(), err.join())
        });

        let status = status?;
        let joined = "model command pipe thread panicked";
        match written.map_err(|_| anyhow::anyhow!(joined))? {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(e).context("failed to write prompt to model command");
            }
            _ => {}
        }
        let stdout = stdout
            .map_err(|_| anyhow::anyhow!(joined))?
            .context("failed to read model output")?;
        let stderr = stderr.map_err(|_| anyhow::anyhow!(joined))?.unwrap_or_default();

        if !status.success() {
            bail!(
                "model command exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            );
        }

        String::from_utf8(stdout).context("model output is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_model() {
        let mut calls = 0;
        let mut model = |prompt: &str| -> anyhow::Result<String> {
            calls += 1;
            Ok(format!("{} chars", prompt.len()))
        };
        assert_eq!(model.generate("hello").unwrap(), "5 chars");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_from_command_line() {
        let model = CommandModel::from_command_line("llm -m local  --json").unwrap();
        assert_eq!(model.program, "llm");
        assert_eq!(model.args, vec!["-m", "local", "--json"]);
        assert!(CommandModel::from_command_line("   ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_model_pipes_prompt() {
        let mut model = CommandModel::new("cat");
        assert_eq!(model.generate("{\"action\": []}").unwrap(), "{\"action\": []}");

        let mut failing = CommandModel::new("sh").arg("-c").arg("cat > /dev/null; echo boom >&2; exit 3");
        let err = failing.generate("ignored").unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn test_large_prompt_does_not_block() {
        let prompt = "x".repeat(2 * 1024 * 1024);
        let mut model = CommandModel::new("cat").timeout(Duration::from_secs(30));
        let output = model.generate(&prompt).unwrap();
        assert_eq!(output.len(), prompt.len());
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_command_times_out() {
        let mut model = CommandModel::new("sh")
            .arg("-c")
            .arg("exec sleep 5")
            .timeout(Duration::from_millis(200));

        let started = Instant::now();
        let err = model.generate("ignored").unwrap_err();
        assert!(err.to_string().contains("timed out after 200 ms"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
