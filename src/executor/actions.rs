use anyhow::{Context, Result, anyhow};
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Axis, Button as EButton, Coordinate, Direction, Enigo, Key, Settings};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, trace};

use super::types::KEY;

/// Mouse buttons, by `MOUSE_BUTTON` ordinal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(MouseButton::Left),
            1 => Some(MouseButton::Middle),
            2 => Some(MouseButton::Right),
            _ => None,
        }
    }
}

/// Click, press or release, by `KEY_DIRECTION` ordinal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Press {
    Click,
    Down,
    Up,
}

impl Press {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Press::Click),
            1 => Some(Press::Down),
            2 => Some(Press::Up),
            _ => None,
        }
    }
}

/// A piece of a key sequence such as `Hello{ENTER}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChunk {
    Text(String),
    /// `KEY` ordinal.
    Named(i64),
}

/// Split `{NAME}` key tokens out of literal text. Unknown names stay literal.
pub fn parse_key_sequence(text: &str) -> Vec<KeyChunk> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let named = after
            .find('}')
            .and_then(|close| KEY.by_name(&after[..close]).map(|ord| (ord, close)));
        match named {
            Some((ordinal, close)) => {
                literal.push_str(&rest[..open]);
                if !literal.is_empty() {
                    out.push(KeyChunk::Text(std::mem::take(&mut literal)));
                }
                out.push(KeyChunk::Named(ordinal));
                rest = &after[close + 1..];
            }
            None => {
                literal.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        out.push(KeyChunk::Text(literal));
    }
    out
}

/// Executes low-level input actions with optional dry-run mode.
/// In dry-run mode, actions are only logged and no real input is simulated.
///
/// Lives on the actuator thread; see [`InputActuator`].
pub struct ActionExecutor {
    dry_run: bool,
    enigo: Option<Enigo>,
}

impl ActionExecutor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            enigo: None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Move mouse cursor to absolute screen coordinates.
    pub fn mouse_move_to(&mut self, x: i32, y: i32) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", x, y, "DRY-RUN mouse_move_to");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", x, y, "mouse_move_to");
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        Ok(())
    }

    /// Move mouse cursor relative to its current position.
    pub fn mouse_move_by(&mut self, dx: i32, dy: i32) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", dx, dy, "DRY-RUN mouse_move_by");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", dx, dy, "mouse_move_by");
        enigo.move_mouse(dx, dy, Coordinate::Rel)?;
        Ok(())
    }

    /// Click a mouse button one or more times.
    pub fn mouse_click(&mut self, button: MouseButton, count: u32) -> Result<()> {
        let count = count.max(1);
        if self.dry_run {
            info!(target: "scriptbot::actions", ?button, count, "DRY-RUN mouse_click");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", ?button, count, "mouse_click");
        for _ in 0..count {
            enigo.button(map_mouse_button(button), Direction::Click)?;
        }
        Ok(())
    }

    /// Press or release a mouse button.
    pub fn mouse_button(&mut self, button: MouseButton, press: Press) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", ?button, ?press, "DRY-RUN mouse_button");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", ?button, ?press, "mouse_button");
        enigo.button(map_mouse_button(button), map_press(press))?;
        Ok(())
    }

    /// Scroll the mouse wheel. Positive values scroll down/right.
    pub fn mouse_scroll(&mut self, delta_x: i32, delta_y: i32) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", delta_x, delta_y, "DRY-RUN mouse_scroll");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", delta_x, delta_y, "mouse_scroll");
        if delta_x != 0 {
            enigo.scroll(delta_x, Axis::Horizontal)?;
        }
        if delta_y != 0 {
            enigo.scroll(delta_y, Axis::Vertical)?;
        }
        Ok(())
    }

    /// Current cursor position. `(0, 0)` in dry-run mode.
    pub fn cursor_location(&mut self) -> Result<(i32, i32)> {
        if self.dry_run {
            return Ok((0, 0));
        }
        let enigo = self.ensure_enigo()?;
        Ok(enigo.location()?)
    }

    /// Click, press or release a named key (`KEY` ordinal).
    pub fn named_key(&mut self, ordinal: i64, press: Press) -> Result<()> {
        let key = map_named_key(ordinal).ok_or_else(|| anyhow!("unknown key ordinal {ordinal}"))?;
        self.key(key, press)
    }

    /// Click, press or release the key producing `ch`.
    pub fn char_key(&mut self, ch: char, press: Press) -> Result<()> {
        self.key(Key::Unicode(ch), press)
    }

    /// Send a key sequence such as `Hello{ENTER}`.
    pub fn key_sequence(&mut self, text: &str) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", %text, "DRY-RUN key_sequence");
            return Ok(());
        }
        trace!(target: "scriptbot::actions", %text, "key_sequence");
        for chunk in parse_key_sequence(text) {
            match chunk {
                KeyChunk::Text(s) => self.ensure_enigo()?.text(&s)?,
                KeyChunk::Named(ordinal) => self.named_key(ordinal, Press::Click)?,
            }
        }
        Ok(())
    }

    /// Type literal text (unicode).
    pub fn type_text(&mut self, text: &str) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", %text, "DRY-RUN type_text");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", %text, "type_text");
        enigo.text(text)?;
        Ok(())
    }

    fn key(&mut self, key: Key, press: Press) -> Result<()> {
        if self.dry_run {
            info!(target: "scriptbot::actions", ?key, ?press, "DRY-RUN key");
            return Ok(());
        }
        let enigo = self.ensure_enigo()?;
        trace!(target: "scriptbot::actions", ?key, ?press, "key");
        enigo.key(key, map_press(press))?;
        Ok(())
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "scriptbot::actions", "Initializing Enigo");
            self.enigo =
                Some(Enigo::new(&Settings::default()).context("Failed to initialize Enigo")?);
        }
        self.enigo.as_mut().context("Enigo is not initialized")
    }
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Middle => EButton::Middle,
        MouseButton::Right => EButton::Right,
    }
}

fn map_press(press: Press) -> Direction {
    match press {
        Press::Click => Direction::Click,
        Press::Down => Direction::Press,
        Press::Up => Direction::Release,
    }
}

fn map_named_key(ordinal: i64) -> Option<Key> {
    let key = match KEY.by_ordinal(ordinal)? {
        "Enter" => Key::Return,
        "Tab" => Key::Tab,
        "Escape" => Key::Escape,
        "Space" => Key::Space,
        "Backspace" => Key::Backspace,
        "Delete" => Key::Delete,
        "Up" => Key::UpArrow,
        "Down" => Key::DownArrow,
        "Left" => Key::LeftArrow,
        "Right" => Key::RightArrow,
        "Home" => Key::Home,
        "End" => Key::End,
        "PageUp" => Key::PageUp,
        "PageDown" => Key::PageDown,
        "Control" => Key::Control,
        "Shift" => Key::Shift,
        "Alt" => Key::Alt,
        "Meta" => Key::Meta,
        _ => return None,
    };
    Some(key)
}

type Job = Box<dyn FnOnce(&mut ActionExecutor) + Send>;

/// Handle to the thread that owns the [`ActionExecutor`].
///
/// Input injection blocks, so it runs on a dedicated OS thread instead of a
/// runtime worker. Jobs run one at a time in submission order.
#[derive(Clone)]
pub struct InputActuator {
    jobs: mpsc::UnboundedSender<Job>,
    dry_run: bool,
}

impl InputActuator {
    /// Start the actuator thread.
    pub fn spawn(dry_run: bool) -> Result<Self> {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        thread::Builder::new()
            .name("scriptbot-input".into())
            .spawn(move || {
                let mut executor = ActionExecutor::new(dry_run);
                while let Some(job) = rx.blocking_recv() {
                    job(&mut executor);
                }
                trace!(target: "scriptbot::actions", "Input thread exiting");
            })
            .context("Failed to spawn input thread")?;
        Ok(Self { jobs, dry_run })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run `f` on the actuator thread and await its result.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ActionExecutor) -> Result<T> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(Box::new(move |executor| {
                let _ = reply.send(f(executor));
            }))
            .map_err(|_| anyhow!("input thread has stopped"))?;
        response.await.context("input thread dropped the request")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_sequence() {
        assert_eq!(
            parse_key_sequence("Hi{ENTER}there{tab}"),
            vec![
                KeyChunk::Text("Hi".into()),
                KeyChunk::Named(0),
                KeyChunk::Text("there".into()),
                KeyChunk::Named(1),
            ]
        );
        assert_eq!(
            parse_key_sequence("{nope} {"),
            vec![KeyChunk::Text("{nope} {".into())]
        );
        assert!(parse_key_sequence("").is_empty());
    }

    #[test]
    fn test_every_key_variant_maps() {
        for &(name, ordinal) in KEY.variants {
            assert!(map_named_key(ordinal).is_some(), "{name} has no enigo key");
        }
    }

    #[tokio::test]
    async fn test_dry_run_actuator_round_trip() {
        let actuator = InputActuator::spawn(true).unwrap();
        actuator.run(|e| e.mouse_move_to(10, 20)).await.unwrap();
        actuator.run(|e| e.key_sequence("a{ENTER}")).await.unwrap();
        let loc = actuator.run(|e| e.cursor_location()).await.unwrap();
        assert_eq!(loc, (0, 0));
        assert!(actuator.run(|e| Ok(e.is_dry_run())).await.unwrap());
    }
}
