//! Splitting a flat argument vector into stage specifications.

use super::resolver::CommandResolver;
use super::spec::StageSpec;
use crate::config::{PipelineConfig, SplitMode};
use crate::errors::PipeError;
use std::ffi::{OsStr, OsString};
use tracing::debug;

/// Turns the tool's argument vector into an ordered list of stages.
///
/// Splitting never touches processes or descriptors. Only the inferred mode
/// consults the [`CommandResolver`].
#[derive(Debug, Clone, Copy)]
pub struct StageSplitter<'a> {
    config: &'a PipelineConfig,
    resolver: &'a dyn CommandResolver,
}

impl<'a> StageSplitter<'a> {
    /// Creates a splitter.
    #[must_use]
    pub fn new(config: &'a PipelineConfig, resolver: &'a dyn CommandResolver) -> Self {
        Self { config, resolver }
    }

    /// Returns the mode `split` would use for `args`.
    #[must_use]
    pub fn effective_mode(&self, args: &[OsString]) -> SplitMode {
        match self.config.split_mode {
            SplitMode::Auto if self.contains_delimiter(args) => SplitMode::Delimited,
            SplitMode::Auto => SplitMode::Inferred,
            mode => mode,
        }
    }

    /// Splits `args` into stages.
    ///
    /// # Errors
    ///
    /// - [`PipeError::InvalidArguments`] when `args` is empty, a stage would
    ///   be empty, or an argument has broken quoting.
    /// - [`PipeError::TooManyStages`] when the enforced ceiling is exceeded.
    pub fn split(&self, args: &[OsString]) -> Result<Vec<StageSpec>, PipeError> {
        self.config.validate()?;

        if args.is_empty() {
            return Err(PipeError::invalid_arguments("no program given"));
        }

        let mode = self.effective_mode(args);
        let stages = match mode {
            SplitMode::Delimited | SplitMode::Auto => self.split_delimited(args)?,
            SplitMode::PerArgument => split_per_argument(args)?,
            SplitMode::Inferred => self.split_inferred(args)?,
        };

        if self.config.exceeds_limit(stages.len()) {
            return Err(PipeError::too_many_stages(stages.len(), self.config.max_stages));
        }

        debug!(mode = %mode, stages = stages.len(), "Split arguments into stages");
        Ok(stages)
    }

    fn is_delimiter(&self, token: &OsStr) -> bool {
        token == OsStr::new(&self.config.delimiter)
    }

    fn contains_delimiter(&self, args: &[OsString]) -> bool {
        args.iter().any(|arg| self.is_delimiter(arg))
    }

    fn split_delimited(&self, args: &[OsString]) -> Result<Vec<StageSpec>, PipeError> {
        args.split(|token| self.is_delimiter(token))
            .enumerate()
            .map(|(index, run)| {
                StageSpec::from_tokens(run).ok_or_else(|| {
                    PipeError::invalid_arguments(format!(
                        "stage {} is empty (misplaced '{}')",
                        index + 1,
                        self.config.delimiter
                    ))
                })
            })
            .collect()
    }

    fn split_inferred(&self, args: &[OsString]) -> Result<Vec<StageSpec>, PipeError> {
        let mut stages = Vec::new();
        let mut current: Vec<OsString> = Vec::new();

        for (position, token) in args.iter().enumerate() {
            let starts_stage = position == 0 || self.starts_stage(token);
            if !starts_stage {
                current.push(token.clone());
                continue;
            }

            if let Some(stage) = StageSpec::from_tokens(&current) {
                stages.push(stage);
            }
            current = match token.to_str() {
                Some(text) if has_whitespace(text) => words_of(text, position)?,
                _ => vec![token.clone()],
            };
            if current.is_empty() {
                return Err(PipeError::invalid_arguments(format!(
                    "argument {} is blank",
                    position + 1
                )));
            }
        }

        if let Some(stage) = StageSpec::from_tokens(&current) {
            stages.push(stage);
        }
        Ok(stages)
    }

    /// A token opens a new stage when it is not an option and its first word
    /// resolves to a command.
    fn starts_stage(&self, token: &OsStr) -> bool {
        let Some(text) = token.to_str() else {
            return false;
        };
        if text.starts_with('-') {
            return false;
        }
        if has_whitespace(text) {
            return shell_words::split(text)
                .ok()
                .and_then(|words| words.into_iter().next())
                .is_some_and(|first| self.resolver.resolves(&first));
        }
        self.resolver.resolves(text)
    }
}

fn split_per_argument(args: &[OsString]) -> Result<Vec<StageSpec>, PipeError> {
    args.iter()
        .enumerate()
        .map(|(position, arg)| {
            let tokens = match arg.to_str() {
                Some(text) => words_of(text, position)?,
                None => vec![arg.clone()],
            };
            StageSpec::from_tokens(&tokens).ok_or_else(|| {
                PipeError::invalid_arguments(format!("argument {} is blank", position + 1))
            })
        })
        .collect()
}

/// Splits one argument into words with POSIX shell quoting rules. Nothing
/// is expanded.
fn words_of(text: &str, position: usize) -> Result<Vec<OsString>, PipeError> {
    shell_words::split(text)
        .map(|words| words.into_iter().map(OsString::from).collect())
        .map_err(|err| PipeError::invalid_arguments(format!("argument {}: {err}", position + 1)))
}

fn has_whitespace(text: &str) -> bool {
    text.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageLimit;
    use crate::stages::FixedResolver;
    use pretty_assertions::assert_eq;

    fn args(tokens: &[&str]) -> Vec<OsString> {
        tokens.iter().map(OsString::from).collect()
    }

    fn resolver() -> FixedResolver {
        FixedResolver::new(["cat", "echo", "grep", "ls", "sort", "uniq", "wc"])
    }

    fn split(config: &PipelineConfig, tokens: &[&str]) -> Result<Vec<StageSpec>, PipeError> {
        let resolver = resolver();
        StageSplitter::new(config, &resolver).split(&args(tokens))
    }

    #[test]
    fn test_empty_arguments() {
        let err = split(&PipelineConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, PipeError::InvalidArguments { .. }));
        assert_eq!(err.exit_code(), 22);
    }

    #[test]
    fn test_single_stage() {
        let stages = split(&PipelineConfig::default(), &["echo", "hello"]).unwrap();
        assert_eq!(stages, vec![StageSpec::new("echo").with_arg("hello")]);
    }

    #[test]
    fn test_delimited() {
        let stages = split(
            &PipelineConfig::default(),
            &["ls", "-l", "|", "grep", "x", "|", "wc", "-l"],
        )
        .unwrap();

        assert_eq!(
            stages,
            vec![
                StageSpec::new("ls").with_arg("-l"),
                StageSpec::new("grep").with_arg("x"),
                StageSpec::new("wc").with_arg("-l"),
            ]
        );
    }

    #[test]
    fn test_delimited_keeps_program_words_verbatim() {
        // "hello wc" is not split because the delimiter decides boundaries.
        let stages = split(&PipelineConfig::default(), &["echo", "hello wc", "|", "cat"]).unwrap();
        assert_eq!(stages[0], StageSpec::new("echo").with_arg("hello wc"));
    }

    #[test]
    fn test_adjacent_delimiters() {
        let err = split(&PipelineConfig::default(), &["ls", "|", "|", "wc"]).unwrap_err();
        assert!(matches!(err, PipeError::InvalidArguments { .. }));
        assert!(err.to_string().contains("stage 2 is empty"));
    }

    #[test]
    fn test_leading_and_trailing_delimiters() {
        assert!(split(&PipelineConfig::default(), &["|", "ls"]).is_err());
        assert!(split(&PipelineConfig::default(), &["ls", "|"]).is_err());
        assert!(split(&PipelineConfig::default(), &["|"]).is_err());
    }

    #[test]
    fn test_custom_delimiter() {
        let config = PipelineConfig::new().with_delimiter("::");
        let stages = split(&config, &["echo", "|", "::", "cat"]).unwrap();

        assert_eq!(
            stages,
            vec![StageSpec::new("echo").with_arg("|"), StageSpec::new("cat")]
        );
    }

    #[test]
    fn test_inferred_splits_on_known_commands() {
        let stages = split(&PipelineConfig::default(), &["echo", "hello", "wc", "-c"]).unwrap();

        assert_eq!(
            stages,
            vec![
                StageSpec::new("echo").with_arg("hello"),
                StageSpec::new("wc").with_arg("-c"),
            ]
        );
    }

    #[test]
    fn test_inferred_keeps_unknown_words_as_arguments() {
        let stages = split(&PipelineConfig::default(), &["ls", "nonexistent_folder"]).unwrap();
        assert_eq!(stages, vec![StageSpec::new("ls").with_arg("nonexistent_folder")]);
    }

    #[test]
    fn test_inferred_options_never_start_stages() {
        let resolver = FixedResolver::new(["cat", "-n"]);
        let config = PipelineConfig::default();
        let stages = StageSplitter::new(&config, &resolver)
            .split(&args(&["cat", "-n"]))
            .unwrap();

        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn test_inferred_word_splits_quoted_commands() {
        let stages = split(
            &PipelineConfig::default(),
            &["ls", "/tmp/dir", "grep 'file_'", "sort", "uniq", "wc", "-l"],
        )
        .unwrap();

        assert_eq!(
            stages,
            vec![
                StageSpec::new("ls").with_arg("/tmp/dir"),
                StageSpec::new("grep").with_arg("file_"),
                StageSpec::new("sort"),
                StageSpec::new("uniq"),
                StageSpec::new("wc").with_arg("-l"),
            ]
        );
    }

    #[test]
    fn test_inferred_first_token_always_starts() {
        let stages = split(&PipelineConfig::default(), &["nonexistent", "wc"]).unwrap();
        assert_eq!(stages, vec![StageSpec::new("nonexistent"), StageSpec::new("wc")]);
    }

    #[test]
    fn test_per_argument() {
        let config = PipelineConfig::new().with_split_mode(SplitMode::PerArgument);
        let stages = split(&config, &["cat", "grep 'a b'", "wc -l"]).unwrap();

        assert_eq!(
            stages,
            vec![
                StageSpec::new("cat"),
                StageSpec::new("grep").with_arg("a b"),
                StageSpec::new("wc").with_arg("-l"),
            ]
        );
    }

    #[test]
    fn test_per_argument_rejects_blank() {
        let config = PipelineConfig::new().with_split_mode(SplitMode::PerArgument);
        assert!(split(&config, &["cat", "  "]).is_err());
        assert!(split(&config, &["grep 'open"]).is_err());
    }

    #[test]
    fn test_per_argument_quoting() {
        let config = PipelineConfig::new().with_split_mode(SplitMode::PerArgument);
        let stages = split(
            &config,
            &[r#"echo "a \"b\"" 'c  d' e\ f"#, "grep ''", "wc \\\n-l"],
        )
        .unwrap();

        assert_eq!(
            stages,
            vec![
                StageSpec::new("echo").with_args([r#"a "b""#, "c  d", "e f"]),
                StageSpec::new("grep").with_arg(""),
                StageSpec::new("wc").with_arg("-l"),
            ]
        );
    }

    #[test]
    fn test_broken_quoting_is_invalid_arguments() {
        let config = PipelineConfig::new().with_split_mode(SplitMode::PerArgument);
        for broken in ["grep 'open", "echo \"open"] {
            let err = split(&config, &["cat", broken]).unwrap_err();
            assert!(matches!(err, PipeError::InvalidArguments { .. }), "{broken}");
            assert!(err.to_string().contains("argument 2"), "{err}");
        }
    }

    #[test]
    fn test_delimited_mode_without_delimiter_is_one_stage() {
        let config = PipelineConfig::new().with_split_mode(SplitMode::Delimited);
        let stages = split(&config, &["echo", "hello", "wc"]).unwrap();
        assert_eq!(stages.len(), 1);
    }

    #[test]
    fn test_eight_stages_allowed() {
        let mut tokens = vec!["cat"];
        for _ in 0..7 {
            tokens.extend(["|", "cat"]);
        }
        assert_eq!(split(&PipelineConfig::default(), &tokens).unwrap().len(), 8);
    }

    #[test]
    fn test_nine_stages_rejected() {
        let mut tokens = vec!["cat"];
        for _ in 0..8 {
            tokens.extend(["|", "cat"]);
        }
        let err = split(&PipelineConfig::default(), &tokens).unwrap_err();
        assert!(matches!(err, PipeError::TooManyStages { count: 9, max: 8 }));

        let lenient = PipelineConfig::new().with_stage_limit(StageLimit::Ignore);
        assert_eq!(split(&lenient, &tokens).unwrap().len(), 9);
    }

    #[test]
    fn test_effective_mode() {
        let config = PipelineConfig::default();
        let resolver = resolver();
        let splitter = StageSplitter::new(&config, &resolver);

        assert_eq!(splitter.effective_mode(&args(&["a", "|", "b"])), SplitMode::Delimited);
        assert_eq!(splitter.effective_mode(&args(&["a", "b"])), SplitMode::Inferred);
    }
}
