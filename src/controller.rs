use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::Stmt,
    control::{ResumeToken, Suspension},
    diagnostics::{Diagnostic, SourceFile},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Suspended(ResumeToken),
    Errored,
    Completed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Errored | RunState::Completed)
    }
}

#[derive(Debug, Clone)]
struct PendingResume {
    suspension: Suspension,
    target: Option<String>,
}

#[derive(Debug)]
pub struct Continuation {
    program: Rc<[Stmt]>,
    index: usize,
    paused: bool,
    state: RunState,
    pending: Option<PendingResume>,
    source: Rc<SourceFile>,
}

impl Continuation {
    pub fn new(source: Rc<SourceFile>) -> Self {
        Self {
            program: Rc::from(Vec::<Stmt>::new()),
            index: 0,
            paused: false,
            state: RunState::Idle,
            pending: None,
            source,
        }
    }

    pub fn seed(&mut self, program: Vec<Stmt>, source: Rc<SourceFile>) {
        debug!(statements = program.len(), source = %source.name, "seeding program");
        self.program = Rc::from(program);
        self.index = 0;
        self.paused = false;
        self.state = RunState::Running;
        self.pending = None;
        self.source = source;
    }

    pub fn program(&self) -> Rc<[Stmt]> {
        Rc::clone(&self.program)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn source(&self) -> Rc<SourceFile> {
        Rc::clone(&self.source)
    }

    pub fn pending_suspension(&self) -> Option<&Suspension> {
        self.pending.as_ref().map(|pending| &pending.suspension)
    }

    pub fn suspend(&mut self, suspension: Suspension, target: Option<String>) {
        debug!(
            token = %suspension.token,
            label = %suspension.label,
            index = self.index,
            target = target.as_deref().unwrap_or("-"),
            "program suspended"
        );
        self.paused = true;
        self.state = RunState::Suspended(suspension.token);
        self.pending = Some(PendingResume { suspension, target });
    }

    /// Validates `token` and moves past the suspended statement. Returns the
    /// variable that should receive the resolved value.
    pub fn resume(&mut self, token: ResumeToken) -> Result<Option<String>, Diagnostic> {
        match self.state {
            RunState::Suspended(expected) if expected == token => {}
            RunState::Suspended(expected) => {
                return Err(Diagnostic::runtime(format!(
                    "resume token {token} does not match the pending operation {expected}"
                )));
            }
            other => {
                return Err(Diagnostic::runtime(format!(
                    "cannot resume with token {token}: program is {other:?}, not suspended"
                )));
            }
        }
        let target = self.pending.take().and_then(|pending| pending.target);
        debug!(%token, next = self.index + 1, "program resumed");
        self.index += 1;
        self.paused = false;
        self.state = RunState::Running;
        Ok(target)
    }

    pub fn complete(&mut self) {
        debug!(statements = self.program.len(), "program completed");
        self.state = RunState::Completed;
        self.pending = None;
    }

    pub fn fail(&mut self) {
        debug!(index = self.index, "program errored");
        self.program = Rc::from(Vec::<Stmt>::new());
        self.index = 0;
        self.paused = true;
        self.state = RunState::Errored;
        self.pending = None;
    }
}
