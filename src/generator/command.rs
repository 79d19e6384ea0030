use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, instrument, warn};

use super::{GenerationError, InterpretationGenerator};
use crate::util::trunc_for_log;

/// Shim around an external program: image bytes on stdin, the author's text as
/// the last argument, the interpretation on stdout.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
  pub program: String,
  args: Vec<String>,
}

impl CommandGenerator {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self { program: program.into(), args }
  }

  /// `argv[0]` is the program; `None` for an empty argv.
  pub fn from_argv(argv: &[String]) -> Option<Self> {
    let (program, args) = argv.split_first()?;
    Some(Self::new(program.clone(), args.to_vec()))
  }
}

#[async_trait]
impl InterpretationGenerator for CommandGenerator {
  #[instrument(level = "info", skip(self, image, author_text), fields(program = %self.program, image_len = image.len()))]
  async fn interpret(&self, image: &[u8], author_text: &str) -> Result<String, GenerationError> {
    let mut child = Command::new(&self.program)
      .args(&self.args)
      .arg(author_text)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| GenerationError::Command(format!("spawn {}: {}", self.program, e)))?;

    // Feed stdin while draining stdout/stderr; a chatty child would otherwise
    // fill its pipe and block before it ever reads the image.
    let stdin = child.stdin.take();
    let feed = async move {
      if let Some(mut stdin) = stdin {
        // A program that ignores stdin may close it early; that is not our failure.
        if let Err(e) = stdin.write_all(image).await {
          debug!(target: "realpick", error = %e, "Generator command closed stdin early");
        }
      }
    };
    let ((), output) = tokio::join!(feed, child.wait_with_output());
    let output = output.map_err(|e| GenerationError::Command(e.to_string()))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      warn!(target: "realpick", status = %output.status, stderr = %trunc_for_log(&stderr, 200), "Generator command failed");
      return Err(GenerationError::Command(format!("exited with {}", output.status)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  fn name(&self) -> &'static str {
    "command"
  }
}
