use std::sync::{Arc, Mutex};

use compliance::{Checkable, CommandRunner, EvalContext, Outcome, Requirements};
use tracing::debug;

/// Identity and titles of a built-in check.
#[derive(Debug, Clone, Copy)]
pub struct CheckText {
    pub id: &'static str,
    pub pass: &'static str,
    pub fail: &'static str,
}

pub(crate) fn run_program(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> std::io::Result<String> {
    let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    runner.output(program, &args)
}

/// A check that runs one program and judges its output.
pub struct CommandCheck {
    text: CheckText,
    runner: Arc<dyn CommandRunner>,
    program: &'static str,
    args: Vec<&'static str>,
    passes: fn(&str) -> bool,
    requirements: Requirements,
    last_output: Mutex<Option<String>>,
}

impl CommandCheck {
    pub fn new(
        text: CheckText,
        runner: Arc<dyn CommandRunner>,
        program: &'static str,
        args: &[&'static str],
        passes: fn(&str) -> bool,
    ) -> Self {
        Self {
            text,
            runner,
            program,
            args: args.to_vec(),
            passes,
            requirements: Requirements::default(),
            last_output: Mutex::new(None),
        }
    }

    pub fn with_requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = requirements;
        self
    }
}

impl Checkable for CommandCheck {
    fn id(&self) -> &str {
        self.text.id
    }

    fn title_pass(&self) -> String {
        self.text.pass.to_string()
    }

    fn title_fail(&self) -> String {
        self.text.fail.to_string()
    }

    fn evaluate(&self, _ctx: &EvalContext<'_>) -> Outcome {
        let output = match run_program(self.runner.as_ref(), self.program, &self.args) {
            Ok(output) => output,
            Err(err) => return Outcome::Error(format!("{} failed: {}", self.program, err)),
        };
        let passed = (self.passes)(&output);
        debug!(check_id = self.text.id, program = self.program, passed, "command check finished");
        *self
            .last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(output.trim().to_string());
        Outcome::from_bool(passed)
    }

    fn detail(&self) -> String {
        self.last_output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .filter(|out| !out.is_empty())
            .unwrap_or_else(|| "None".to_string())
    }

    fn requirements(&self) -> Requirements {
        self.requirements
    }
}
