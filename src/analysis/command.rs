use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{AnalysisError, AnalyzerSettings, EmotionAnalyzer, RawValue};
use crate::utils::exec::exec_capture;

/// Exit status a wrapper uses to report that enforced detection found no face.
pub const NO_FACE_EXIT_CODE: i32 = 3;

/// Runs a local classifier wrapper as a subprocess.
///
/// The wrapper is invoked as
/// `<program> [base args] <image> --detector <backend> --actions <a,b> [--enforce]`
/// and prints the analysis as JSON on stdout.
pub struct CommandAnalyzer {
    program: String,
    base_args: Vec<String>,
    settings: AnalyzerSettings,
    timeout: Duration,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, settings: AnalyzerSettings, timeout: Duration) -> Self {
        Self { program: program.into(), base_args, settings, timeout }
    }

    /// Split a whitespace-separated command line such as `python3 /opt/analyze.py`.
    pub fn from_command_line(line: &str, settings: AnalyzerSettings, timeout: Duration) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or_else(|| anyhow::anyhow!("analyzer command is empty"))?;
        Ok(Self::new(program, parts.collect(), settings, timeout))
    }

    fn args(&self, image: &Path) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push(image.to_string_lossy().into_owned());
        args.push("--detector".to_string());
        args.push(self.settings.detector_backend.clone());
        args.push("--actions".to_string());
        args.push(self.settings.actions.join(","));
        if self.settings.enforce_detection {
            args.push("--enforce".to_string());
        }
        args
    }
}

#[async_trait]
impl EmotionAnalyzer for CommandAnalyzer {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn analyze(&self, image: &Path) -> Result<RawValue, AnalysisError> {
        let args = self.args(image);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!(program = %self.program, ?args, "running analyzer command");

        let (code, stdout, stderr) = exec_capture(&self.program, &arg_refs, self.timeout)
            .await
            .map_err(|e| AnalysisError::Failed(format!("{:#}", e)))?;

        match code {
            0 => serde_json::from_slice::<RawValue>(&stdout)
                .map(RawValue::into_results)
                .map_err(|e| AnalysisError::Failed(format!("analyzer printed invalid JSON: {}", e))),
            NO_FACE_EXIT_CODE => Err(AnalysisError::NoFaceDetected),
            _ => {
                let msg = String::from_utf8_lossy(&stderr).trim().to_string();
                if msg.is_empty() {
                    Err(AnalysisError::Failed(format!("{} exited with status {}", self.program, code)))
                } else {
                    Err(AnalysisError::from_backend_message(msg))
                }
            }
        }
    }
}
