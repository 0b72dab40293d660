use std::path::PathBuf;
use std::process::Command;

use super::{PolicyDocument, RenderError, Rasterizer};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Delegates rasterization to an external HTML→PDF program
/// (wkhtmltopdf, headless Chromium, WeasyPrint, ...).
///
/// The command line may reference `{input}` and `{output}`; without
/// placeholders the two paths are appended as trailing arguments. Each
/// call stages its files in a private temporary directory that is removed
/// when the call returns, whether or not rendering succeeded.
#[derive(Debug, Clone)]
pub struct CommandRasterizer {
    command_line: String,
    staging_root: Option<PathBuf>,
}

impl CommandRasterizer {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            staging_root: None,
        }
    }

    /// Create staging directories under `root` instead of the system temp dir.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    fn build_command(&self, input: &str, output: &str) -> Result<Command, RenderError> {
        let mut parts = self.command_line.split_whitespace();
        let program = parts.next().ok_or(RenderError::EmptyCommand)?;
        let mut args: Vec<String> = parts.map(str::to_string).collect();

        let templated = args
            .iter()
            .any(|a| a.contains(INPUT_PLACEHOLDER) || a.contains(OUTPUT_PLACEHOLDER));
        if templated {
            for arg in &mut args {
                *arg = arg
                    .replace(INPUT_PLACEHOLDER, input)
                    .replace(OUTPUT_PLACEHOLDER, output);
            }
        } else {
            args.push(input.to_string());
            args.push(output.to_string());
        }

        let mut command = Command::new(program);
        command.args(args);
        Ok(command)
    }
}

impl Rasterizer for CommandRasterizer {
    fn rasterize(&self, document: &PolicyDocument) -> Result<Vec<u8>, RenderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("proofhub-render-");
        let staging = match &self.staging_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let input = staging.path().join("policy.html");
        let output = staging.path().join("policy.pdf");
        std::fs::write(&input, document.html.as_bytes())?;

        let mut command = self.build_command(&input.to_string_lossy(), &output.to_string_lossy())?;
        tracing::debug!(command = %self.command_line, "Running external PDF renderer");
        let result = command.output().map_err(|source| RenderError::Spawn {
            command: self.command_line.clone(),
            source,
        })?;

        if !result.status.success() {
            return Err(RenderError::Command {
                command: self.command_line.clone(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let bytes = match std::fs::read(&output) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(RenderError::EmptyOutput),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::metadata::PolicyMeta;

    fn document() -> PolicyDocument {
        PolicyDocument::new(PolicyMeta::default(), "<p>Body</p>")
    }

    fn staging_is_empty(root: &std::path::Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    #[test]
    fn placeholders_are_substituted() {
        let r = CommandRasterizer::new("render --in={input} --out {output}");
        let cmd = r.build_command("/tmp/a.html", "/tmp/a.pdf").unwrap();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--in=/tmp/a.html", "--out", "/tmp/a.pdf"]);
    }

    #[test]
    fn paths_appended_without_placeholders() {
        let r = CommandRasterizer::new("wkhtmltopdf --quiet");
        let cmd = r.build_command("in.html", "out.pdf").unwrap();
        assert_eq!(cmd.get_program(), "wkhtmltopdf");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["--quiet", "in.html", "out.pdf"]);
    }

    #[test]
    fn empty_command_rejected() {
        let err = CommandRasterizer::new("   ").build_command("a", "b").unwrap_err();
        assert!(matches!(err, RenderError::EmptyCommand));
    }

    #[cfg(unix)]
    #[test]
    fn staging_removed_after_success() {
        let root = tempfile::tempdir().unwrap();
        let r = CommandRasterizer::new("cp {input} {output}").with_staging_root(root.path());
        let bytes = r.rasterize(&document()).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("<p>Body</p>"));
        assert!(staging_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[test]
    fn staging_removed_after_failure() {
        let root = tempfile::tempdir().unwrap();
        let r = CommandRasterizer::new("false").with_staging_root(root.path());
        let err = r.rasterize(&document()).unwrap_err();
        assert!(matches!(err, RenderError::Command { .. }));
        assert!(staging_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[test]
    fn missing_output_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let r = CommandRasterizer::new("true").with_staging_root(root.path());
        assert!(matches!(r.rasterize(&document()), Err(RenderError::EmptyOutput)));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let root = tempfile::tempdir().unwrap();
        let r = CommandRasterizer::new("proofhub-no-such-renderer-binary").with_staging_root(root.path());
        assert!(matches!(r.rasterize(&document()), Err(RenderError::Spawn { .. })));
    }
}
