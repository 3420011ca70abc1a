use crate::persist;
use crate::template::{self, Template, TemplateError};
use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A template that could not be set up at startup.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("template `{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("template name `{0}` is not a plain file name")]
    InvalidName(String),
}

/// Why one output file was not written during a render pass.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A template that failed during a render pass.
#[derive(Debug)]
pub struct RenderFailure {
    pub name: String,
    pub error: RenderError,
}

/// Result of one render pass over every template.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Output files written.
    pub written: Vec<PathBuf>,
    /// Templates that failed; the others were still written.
    pub failures: Vec<RenderFailure>,
}

impl RenderReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders every configured template into its own output file.
#[derive(Debug)]
pub struct Renderer {
    output_dir: PathBuf,
    templates: Vec<(String, Template)>,
}

impl Renderer {
    /// Compile `(name, source)` pairs that render into `output_dir/<name>`.
    ///
    /// # Errors
    ///
    /// Fails on the first template that does not compile or whose name is
    /// not a single path component.
    pub fn compile<I, N, S>(output_dir: impl AsRef<Path>, files: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let templates = files
            .into_iter()
            .map(|(name, source)| {
                let name = name.into();
                if !is_plain_file_name(&name) {
                    return Err(CompileError::InvalidName(name));
                }
                match Template::compile(source.as_ref()) {
                    Ok(template) => Ok((name, template)),
                    Err(source) => Err(CompileError::Template { name, source }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Renderer {
            output_dir: output_dir.as_ref().to_path_buf(),
            templates,
        })
    }

    /// Directory the output files are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of configured templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render every template against `state` and overwrite its output file.
    ///
    /// Failures are isolated: a template that fails to render or write is
    /// logged and reported, and the remaining templates are still written.
    pub fn render_all(&self, state: &Value) -> RenderReport {
        let mut report = RenderReport::default();

        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            warn!("cannot create output directory {}: {e}", self.output_dir.display());
        }

        for (name, template) in &self.templates {
            let target = self.output_dir.join(name);
            match self.render_one(template, state, &target) {
                Ok(()) => {
                    debug!("rendered {}", target.display());
                    report.written.push(target);
                }
                Err(error) => {
                    warn!("failed to render template `{name}`: {error}");
                    report.failures.push(RenderFailure {
                        name: name.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    fn render_one(
        &self,
        template: &Template,
        state: &Value,
        target: &Path,
    ) -> Result<(), RenderError> {
        let contents = template::strip_indent(&template.render(state)?);
        persist::write_atomic(target, contents.as_bytes())?;
        Ok(())
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}
