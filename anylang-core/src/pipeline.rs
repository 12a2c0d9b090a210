use std::path::PathBuf;

use tracing::info;

use crate::error::CoreError;
use crate::prompt::TranslationRequest;
use crate::sources::{SOURCE_EXTENSION, discover_sources};
use crate::toolchain::{Artifacts, Platform, ToolOutcome, ToolRunner, Toolchain, run_checked};
use crate::translate::{Translator, write_stream};

/// Last artifact to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Ir,
    Asm,
    Exe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovered { sources: usize },
    Thinking,
    Writing,
    Written { bytes: u64 },
    Assembling,
    Linking,
    Running,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub root: PathBuf,
    pub extension: String,
    pub platform: Platform,
    pub artifacts: Artifacts,
    pub toolchain: Toolchain,
    pub emit: Emit,
    pub run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let platform = Platform::current();
        Self {
            root: PathBuf::from("."),
            extension: SOURCE_EXTENSION.into(),
            platform,
            artifacts: Artifacts::new("", "out", platform),
            toolchain: Toolchain::default(),
            emit: Emit::Exe,
            run: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub sources: usize,
    pub ir_bytes: u64,
    pub artifacts: Artifacts,
    /// Outcome of the produced program, when it was run.
    pub exit: Option<ToolOutcome>,
}

pub struct Pipeline<T, R> {
    options: PipelineOptions,
    translator: T,
    runner: R,
}

impl<T: Translator, R: ToolRunner> Pipeline<T, R> {
    pub fn new(options: PipelineOptions, translator: T, runner: R) -> Self {
        Self {
            options,
            translator,
            runner,
        }
    }

    /// Discovers, translates, builds and optionally runs, stopping at the
    /// first failing step.
    pub fn run(&mut self, mut observer: impl FnMut(Stage)) -> Result<PipelineReport, CoreError> {
        let options = &self.options;
        let sources = discover_sources(&options.root, &options.extension)?;
        info!(count = sources.len(), root = %options.root.display(), "sources discovered");
        observer(Stage::Discovered {
            sources: sources.len(),
        });

        let request = TranslationRequest::for_sources(&sources);
        observer(Stage::Thinking);
        let stream = self.translator.translate(&request)?;
        observer(Stage::Writing);
        let ir_bytes = write_stream(stream, &options.artifacts.ir)?;
        info!(path = %options.artifacts.ir.display(), bytes = ir_bytes, "ir written");
        observer(Stage::Written { bytes: ir_bytes });

        let mut report = PipelineReport {
            sources: sources.len(),
            ir_bytes,
            artifacts: options.artifacts.clone(),
            exit: None,
        };
        if options.emit == Emit::Ir {
            return Ok(report);
        }

        observer(Stage::Assembling);
        run_checked(&mut self.runner, &options.toolchain.assemble(&options.artifacts))?;
        if options.emit == Emit::Asm {
            return Ok(report);
        }

        observer(Stage::Linking);
        run_checked(&mut self.runner, &options.toolchain.link(&options.artifacts))?;
        if !options.run {
            return Ok(report);
        }

        observer(Stage::Running);
        let invocation = options.platform.run_invocation(&options.artifacts.exe);
        let outcome = self.runner.run(&invocation)?;
        info!(code = ?outcome.code, "program finished");
        report.exit = Some(outcome);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::Invocation;
    use std::cell::RefCell;
    use std::fs;
    use std::vec::IntoIter;
    use tempfile::{TempDir, tempdir};

    struct FakeTranslator {
        fragments: Vec<&'static str>,
        seen: RefCell<Vec<TranslationRequest>>,
    }

    impl FakeTranslator {
        fn new(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Translator for &FakeTranslator {
        type Stream = IntoIter<Result<String, CoreError>>;

        fn translate(&self, request: &TranslationRequest) -> Result<Self::Stream, CoreError> {
            self.seen.borrow_mut().push(request.clone());
            let fragments: Vec<_> = self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(fragments.into_iter())
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on: Option<&'static str>,
        program_code: i32,
    }

    impl ToolRunner for &mut Recorder {
        fn run(&mut self, invocation: &Invocation) -> Result<ToolOutcome, CoreError> {
            let tool = invocation.tool();
            self.calls.push(invocation.command_line());
            let code = if self.fail_on == Some(tool.as_str()) {
                1
            } else if tool == "llc" || tool == "clang" {
                0
            } else {
                self.program_code
            };
            Ok(ToolOutcome { code: Some(code) })
        }
    }

    fn project() -> TempDir {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src")).expect("create src");
        fs::write(dir.path().join("src/main.any"), "print \"hi\"").expect("write");
        dir
    }

    fn options(dir: &TempDir, platform: Platform) -> PipelineOptions {
        PipelineOptions {
            root: dir.path().join("src"),
            platform,
            artifacts: Artifacts::new(dir.path(), "out", platform),
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn runs_every_step_in_order() {
        let dir = project();
        let translator = FakeTranslator::new(vec!["define i32 @main() {\n", "ret i32 0\n}\n"]);
        let mut recorder = Recorder {
            program_code: 7,
            ..Recorder::default()
        };
        let mut stages = Vec::new();

        let options = options(&dir, Platform::Unix);
        let artifacts = options.artifacts.clone();
        let report = Pipeline::new(options, &translator, &mut recorder)
            .run(|stage| stages.push(stage))
            .expect("pipeline succeeds");

        assert_eq!(report.sources, 1);
        assert_eq!(report.exit, Some(ToolOutcome { code: Some(7) }));
        assert_eq!(
            fs::read_to_string(&artifacts.ir).expect("read ir"),
            "define i32 @main() {\nret i32 0\n}\n"
        );
        assert_eq!(translator.seen.borrow()[0].payload, "# main.any\nprint \"hi\"");

        assert_eq!(recorder.calls.len(), 3);
        assert!(recorder.calls[0].starts_with("llc "));
        assert!(recorder.calls[1].starts_with("clang "));
        assert!(recorder.calls[1].ends_with("-O3"));
        assert_eq!(recorder.calls[2], artifacts.exe.display().to_string());

        assert_eq!(
            stages,
            [
                Stage::Discovered { sources: 1 },
                Stage::Thinking,
                Stage::Writing,
                Stage::Written {
                    bytes: report.ir_bytes
                },
                Stage::Assembling,
                Stage::Linking,
                Stage::Running,
            ]
        );
    }

    #[test]
    fn failing_llc_stops_before_linking() {
        let dir = project();
        let translator = FakeTranslator::new(vec!["garbage"]);
        let mut recorder = Recorder {
            fail_on: Some("llc"),
            ..Recorder::default()
        };

        let err = Pipeline::new(options(&dir, Platform::Unix), &translator, &mut recorder)
            .run(|_| {})
            .unwrap_err();

        assert!(matches!(err, CoreError::ToolFailed { code: Some(1), .. }));
        assert_eq!(recorder.calls.len(), 1);
    }

    #[test]
    fn emit_ir_skips_the_toolchain() {
        let dir = project();
        let translator = FakeTranslator::new(vec!["x"]);
        let mut recorder = Recorder::default();
        let options = PipelineOptions {
            emit: Emit::Ir,
            ..options(&dir, Platform::Unix)
        };

        let report = Pipeline::new(options, &translator, &mut recorder)
            .run(|_| {})
            .expect("pipeline succeeds");

        assert_eq!(report.ir_bytes, 1);
        assert!(report.exit.is_none());
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn creates_a_fresh_output_directory() {
        let dir = project();
        let translator = FakeTranslator::new(vec!["define ", "i32 @main"]);
        let mut recorder = Recorder::default();
        let out_dir = dir.path().join("build/debug");
        let options = PipelineOptions {
            emit: Emit::Ir,
            artifacts: Artifacts::new(&out_dir, "out", Platform::Unix),
            ..options(&dir, Platform::Unix)
        };

        Pipeline::new(options, &translator, &mut recorder)
            .run(|_| {})
            .expect("pipeline succeeds");

        assert_eq!(
            fs::read_to_string(out_dir.join("out.ll")).expect("read ir"),
            "define i32 @main"
        );
    }

    #[test]
    fn no_run_links_but_does_not_execute() {
        let dir = project();
        let translator = FakeTranslator::new(vec!["x"]);
        let mut recorder = Recorder::default();
        let options = PipelineOptions {
            run: false,
            ..options(&dir, Platform::Windows)
        };

        let report = Pipeline::new(options, &translator, &mut recorder)
            .run(|_| {})
            .expect("pipeline succeeds");

        assert!(report.exit.is_none());
        assert_eq!(recorder.calls.len(), 2);
        assert!(recorder.calls[1].contains("out.exe"));
    }

    #[test]
    fn missing_sources_stop_before_translation() {
        let dir = tempdir().expect("tempdir");
        let translator = FakeTranslator::new(vec!["x"]);
        let mut recorder = Recorder::default();
        let options = PipelineOptions {
            root: dir.path().to_path_buf(),
            artifacts: Artifacts::new(dir.path(), "out", Platform::Unix),
            ..PipelineOptions::default()
        };

        let err = Pipeline::new(options, &translator, &mut recorder)
            .run(|_| {})
            .unwrap_err();

        assert!(matches!(err, CoreError::NoSources { .. }));
        assert!(translator.seen.borrow().is_empty());
        assert!(!dir.path().join("out.ll").exists());
    }
}
