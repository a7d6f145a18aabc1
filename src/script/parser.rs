//! Line-oriented script parser.
//!
//! The parser is total: any text produces a `Program`. Malformed lines are
//! interpreted best-effort and reported as [`ParseAnomaly`] values instead of
//! errors.
//!
//! Grammar (one statement per line):
//! - `# comment` and blank lines are skipped.
//! - `While = <true|false|count>` (keyword case-insensitive) starts a new block.
//! - `Action[=arguments]` is a step. Arguments are split on whitespace and
//!   commas; `Name‹inner›` or `‹Name inner›` is a nested step captured as one
//!   token, including any whitespace inside the brackets.

use thiserror::Error;
use tracing::{trace, warn};

use super::model::{Arg, Block, CLOSE_BRACKET, OPEN_BRACKET, Program, REPEAT_MARKER, Step};

/// A recoverable oddity found while parsing. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAnomaly {
    #[error("line {line}: missing action name")]
    MissingActionName { line: usize },

    #[error("line {line}: unbalanced bracket kept as literal text")]
    UnbalancedBracket { line: usize },

    #[error("line {line}: empty bracket expression")]
    EmptyBracket { line: usize },

    #[error("line {line}: repeat argument '{value}' is neither boolean nor integer; using count 1")]
    MarkerArgument { line: usize, value: String },

    #[error("line {line}: negative repeat count {value}; block will not run")]
    NegativeCount { line: usize, value: i64 },
}

/// Parse script text, logging and discarding any anomalies.
pub fn parse(text: &str) -> Program {
    let (program, anomalies) = parse_with_diagnostics(text);
    for anomaly in &anomalies {
        warn!(target: "scriptbot::parser", %anomaly, "Script anomaly");
    }
    program
}

/// Parse script text and return the anomalies alongside the program.
pub fn parse_with_diagnostics(text: &str) -> (Program, Vec<ParseAnomaly>) {
    let mut anomalies = Vec::new();
    let mut blocks = Vec::new();

    // The leading implicit block only survives if it holds steps or no marker ever appears.
    let mut current = Block::bounded(1);
    let mut current_explicit = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut ctx = LineContext {
            line: idx + 1,
            anomalies: &mut anomalies,
        };

        if let Some(argument) = marker_argument(line) {
            let next = ctx.parse_marker(argument);
            let finished = std::mem::replace(&mut current, next);
            if current_explicit || !finished.steps.is_empty() {
                blocks.push(finished);
            }
            current_explicit = true;
            continue;
        }

        if let Some(step) = ctx.parse_step(line) {
            current.steps.push(step);
        }
    }

    if current_explicit || !current.steps.is_empty() || blocks.is_empty() {
        blocks.push(current);
    }

    let program = Program { blocks };
    trace!(
        target: "scriptbot::parser",
        blocks = program.blocks.len(),
        steps = program.step_count(),
        anomalies = anomalies.len(),
        "Parsed script"
    );
    (program, anomalies)
}

/// Returns the marker argument if `line` is a `While = ...` line.
fn marker_argument(line: &str) -> Option<&str> {
    let (name, rest) = line.split_once('=')?;
    name.trim()
        .eq_ignore_ascii_case(REPEAT_MARKER)
        .then(|| rest.trim())
}

struct LineContext<'a> {
    line: usize,
    anomalies: &'a mut Vec<ParseAnomaly>,
}

impl LineContext<'_> {
    fn note(&mut self, anomaly: ParseAnomaly) {
        self.anomalies.push(anomaly);
    }

    /// boolean literal -> unbounded flag, else integer count, else count 1.
    fn parse_marker(&mut self, argument: &str) -> Block {
        if argument.eq_ignore_ascii_case("true") {
            return Block::unbounded();
        }
        if argument.eq_ignore_ascii_case("false") {
            return Block::bounded(1);
        }
        match argument.parse::<i64>() {
            Ok(n) if n < 0 => {
                self.note(ParseAnomaly::NegativeCount {
                    line: self.line,
                    value: n,
                });
                Block::bounded(0)
            }
            Ok(n) => Block::bounded(u32::try_from(n).unwrap_or(u32::MAX)),
            Err(_) => {
                self.note(ParseAnomaly::MarkerArgument {
                    line: self.line,
                    value: argument.to_string(),
                });
                Block::bounded(1)
            }
        }
    }

    /// Parse `Name[=args]`, `Name args` or `Name‹...›` into a step.
    fn parse_step(&mut self, text: &str) -> Option<Step> {
        let text = text.trim();
        let split = text
            .char_indices()
            .find(|&(_, c)| c == '=' || c == ',' || c == OPEN_BRACKET || c.is_whitespace());

        let (name, rest) = match split {
            // Keep the bracket: it belongs to the first argument token.
            Some((i, OPEN_BRACKET)) => (&text[..i], &text[i..]),
            Some((i, c)) => (&text[..i], &text[i + c.len_utf8()..]),
            None => (text, ""),
        };

        let name = name.trim();
        if name.is_empty() {
            self.note(ParseAnomaly::MissingActionName { line: self.line });
            return None;
        }

        let mut rest = rest.trim_start();
        if let Some(stripped) = rest.strip_prefix('=') {
            rest = stripped;
        }

        Some(Step::new(name, self.tokenize(rest)))
    }

    /// Split argument text on whitespace/commas, capturing bracket expressions whole.
    fn tokenize(&mut self, text: &str) -> Vec<Arg> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut buf = String::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() || c == ',' {
                flush(&mut buf, &mut out);
                i += 1;
                continue;
            }

            if c == OPEN_BRACKET {
                if let Some(close) = matching_close(&chars, i) {
                    let inner: String = chars[i + 1..close].iter().collect();
                    let prefix = std::mem::take(&mut buf);
                    out.push(self.nested(prefix, &inner));
                    i = close + 1;
                    continue;
                }
                self.note(ParseAnomaly::UnbalancedBracket { line: self.line });
            } else if c == CLOSE_BRACKET {
                self.note(ParseAnomaly::UnbalancedBracket { line: self.line });
            }

            buf.push(c);
            i += 1;
        }

        flush(&mut buf, &mut out);
        out
    }

    fn nested(&mut self, prefix: String, inner: &str) -> Arg {
        if !prefix.is_empty() {
            return Arg::Nested(Step::new(prefix, self.tokenize(inner)));
        }
        if inner.trim().is_empty() {
            self.note(ParseAnomaly::EmptyBracket { line: self.line });
            return Arg::Literal(String::new());
        }
        match self.parse_step(inner) {
            Some(step) => Arg::Nested(step),
            None => Arg::Literal(String::new()),
        }
    }
}

fn flush(buf: &mut String, out: &mut Vec<Arg>) {
    if !buf.is_empty() {
        out.push(Arg::Literal(std::mem::take(buf)));
    }
}

fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (j, &c) in chars.iter().enumerate().skip(open) {
        if c == OPEN_BRACKET {
            depth += 1;
        } else if c == CLOSE_BRACKET {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
        }
    }
    None
}
