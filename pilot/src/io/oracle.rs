//! Oracle abstraction for the language/vision model backend.
//!
//! The [`Oracle`] trait decouples classification and navigation from the
//! actual model. [`CommandOracle`] shells out to a configured wrapper
//! command; [`NoOracle`] always fails so callers take their degraded paths.
//! Tests use a scripted oracle that replays canned replies.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::observation::Frame;
use crate::io::config::OracleConfig;
use crate::io::process::run_with_timeout;

/// Free-form text model, optionally with vision.
///
/// Both calls may be slow or fail; callers must treat errors as an unusable
/// reply and fall back to a safe default.
pub trait Oracle {
    fn text_query(&self, prompt: &str, module: &str) -> Result<String>;
    fn image_query(&self, frame: &Frame, prompt: &str, module: &str) -> Result<String>;
}

impl<T: Oracle + ?Sized> Oracle for &T {
    fn text_query(&self, prompt: &str, module: &str) -> Result<String> {
        (**self).text_query(prompt, module)
    }

    fn image_query(&self, frame: &Frame, prompt: &str, module: &str) -> Result<String> {
        (**self).image_query(frame, prompt, module)
    }
}

/// Heuristics-only mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

impl Oracle for NoOracle {
    fn text_query(&self, _prompt: &str, _module: &str) -> Result<String> {
        Err(anyhow!("no oracle configured"))
    }

    fn image_query(&self, _frame: &Frame, _prompt: &str, _module: &str) -> Result<String> {
        Err(anyhow!("no oracle configured"))
    }
}

/// Oracle backed by an external command.
///
/// The prompt is written to stdin; the reply is the command's stdout.
/// `PILOT_MODULE` names the calling module. Vision queries additionally get
/// `PILOT_IMAGE`, the path of a binary PPM of the frame.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    image_dir: PathBuf,
}

impl CommandOracle {
    /// Returns `None` when no command is configured.
    pub fn from_config(config: &OracleConfig, image_dir: PathBuf) -> Option<Self> {
        let (program, args) = config.command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            image_dir,
        })
    }

    fn run(&self, prompt: &str, module: &str, image: Option<&PathBuf>) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).env("PILOT_MODULE", module);
        if let Some(path) = image {
            cmd.env("PILOT_IMAGE", path);
        }
        let output = run_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run oracle command {}", self.program))?;

        if output.timed_out {
            return Err(anyhow!(
                "oracle command timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "oracle command exited with {:?}: {}",
                output.status.code(),
                output.stderr_tail()
            ));
        }
        let reply = output.stdout_text();
        debug!(module, reply_len = reply.len(), "oracle replied");
        Ok(reply)
    }
}

impl Oracle for CommandOracle {
    #[instrument(skip_all, fields(module))]
    fn text_query(&self, prompt: &str, module: &str) -> Result<String> {
        info!(prompt_len = prompt.len(), "text query");
        self.run(prompt, module, None)
    }

    #[instrument(skip_all, fields(module, width = frame.width, height = frame.height))]
    fn image_query(&self, frame: &Frame, prompt: &str, module: &str) -> Result<String> {
        info!(prompt_len = prompt.len(), "image query");
        fs::create_dir_all(&self.image_dir)
            .with_context(|| format!("create image dir {}", self.image_dir.display()))?;
        let path = self.image_dir.join(format!("{module}.ppm"));
        fs::write(&path, frame.to_ppm())
            .with_context(|| format!("write frame {}", path.display()))?;
        let reply = self.run(prompt, module, Some(&path));
        if let Err(err) = fs::remove_file(&path) {
            warn!(err = %err, path = %path.display(), "failed to remove frame file");
        }
        reply
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn oracle(script: &str, dir: PathBuf) -> CommandOracle {
        let config = OracleConfig {
            command: vec!["sh".into(), "-c".into(), script.into()],
            timeout_secs: 5,
            output_limit_bytes: 4096,
        };
        CommandOracle::from_config(&config, dir).expect("configured")
    }

    #[test]
    fn empty_command_yields_no_oracle() {
        let config = OracleConfig::default();
        assert!(CommandOracle::from_config(&config, PathBuf::from("x")).is_none());
    }

    #[test]
    fn text_query_returns_stdout_and_sees_module() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle("cat >/dev/null; echo \"$PILOT_MODULE\"", temp.path().into());
        let reply = oracle.text_query("prompt", "navigation").expect("reply");
        assert_eq!(reply.trim(), "navigation");
    }

    #[test]
    fn image_query_passes_frame_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle(
            "cat >/dev/null; head -c 2 \"$PILOT_IMAGE\"",
            temp.path().join("frames"),
        );
        let frame = Frame::solid(2, 2, [1, 2, 3]);
        let reply = oracle
            .image_query(&frame, "prompt", "perception")
            .expect("reply");
        assert_eq!(reply, "P6");
        assert!(!temp.path().join("frames/perception.ppm").exists());
    }

    #[test]
    fn failing_command_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let oracle = oracle("echo boom >&2; exit 3", temp.path().into());
        let err = oracle.text_query("prompt", "navigation").expect_err("fails");
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn no_oracle_always_fails() {
        assert!(NoOracle.text_query("p", "m").is_err());
        assert!(NoOracle.image_query(&Frame::default(), "p", "m").is_err());
    }
}
