use serde::Serialize;

/// Opening delimiter of a bracket expression (nested step).
pub const OPEN_BRACKET: char = '‹';
/// Closing delimiter of a bracket expression (nested step).
pub const CLOSE_BRACKET: char = '›';

/// Keyword that starts a new repeat block (`While = <true|false|count>`).
pub const REPEAT_MARKER: &str = "While";

/// A parsed script: ordered blocks, immutable once produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Program {
    pub blocks: Vec<Block>,
}

impl Program {
    /// Total number of steps across all blocks.
    pub fn step_count(&self) -> usize {
        self.blocks.iter().map(|b| b.steps.len()).sum()
    }

    /// Whether any block repeats until cancelled.
    pub fn has_unbounded(&self) -> bool {
        self.blocks.iter().any(|b| b.unbounded)
    }
}

/// One repeat unit of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Runs until the run is cancelled; `repeat_count` is then ignored.
    pub unbounded: bool,
    pub repeat_count: u32,
    pub steps: Vec<Step>,
}

impl Block {
    pub fn bounded(repeat_count: u32) -> Self {
        Self {
            unbounded: false,
            repeat_count,
            steps: Vec::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            unbounded: true,
            repeat_count: 1,
            steps: Vec::new(),
        }
    }
}

/// One action invocation with its raw (pre-coercion) argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub action: String,
    pub args: Vec<Arg>,
}

impl Step {
    pub fn new(action: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }
}

/// A raw argument token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Arg {
    /// Plain text, coerced later against the selected operation's parameter type.
    Literal(String),
    /// A bracket expression whose result is substituted before the outer step runs.
    Nested(Step),
}

impl Arg {
    pub fn literal(s: impl Into<String>) -> Self {
        Arg::Literal(s.into())
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Arg::Literal(s) => Some(s),
            Arg::Nested(_) => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Literal(s.to_string())
    }
}

impl From<Step> for Arg {
    fn from(step: Step) -> Self {
        Arg::Nested(step)
    }
}
