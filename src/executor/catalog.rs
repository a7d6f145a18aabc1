//! Built-in action catalog: keyboard, mouse, timing and window operations.
//!
//! Input operations are forwarded to the [`InputActuator`]; timing operations
//! suspend on the runtime and honor the run's cancellation signal.

use rand::random_range;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::actions::{InputActuator, MouseButton, Press};
use super::error::ActionError;
use super::registry::{ActionCall, ActionResult, ActionSurface, ActionTable};
use super::types::{KEY, KEY_DIRECTION, MOUSE_BUTTON, SemanticType, Value};
use crate::utils::window;

use SemanticType::{Handle, Int32, Text, UInt32};

const LEFT: Value = Value::Enum {
    ordinal: 0,
    variant: Some("Left"),
};
const CLICK: Value = Value::Enum {
    ordinal: 0,
    variant: Some("Click"),
};

/// The default collaborator: real (or dry-run) input plus window queries.
pub struct InputCatalog {
    actuator: InputActuator,
}

impl InputCatalog {
    pub fn new(actuator: InputActuator) -> Self {
        Self { actuator }
    }

    /// Adapt `f` into a handler that receives a clone of `self`.
    fn bind<F, Fut>(self: &Arc<Self>, f: F) -> impl Fn(ActionCall) -> Fut + Send + Sync + 'static
    where
        F: Fn(Arc<Self>, ActionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let this = self.clone();
        move |call| f(this.clone(), call)
    }
}

fn button(call: &ActionCall, index: usize) -> Result<MouseButton, ActionError> {
    MouseButton::from_ordinal(call.ordinal(index)?).ok_or(ActionError::BadArgument {
        index,
        expected: "MouseButton",
    })
}

fn press(call: &ActionCall, index: usize) -> Result<Press, ActionError> {
    Press::from_ordinal(call.ordinal(index)?).ok_or(ActionError::BadArgument {
        index,
        expected: "KeyDirection",
    })
}

/// Sleep for `ms`, returning early with `Cancelled` if the run stops.
async fn cancellable_sleep(call: &ActionCall, ms: u64) -> ActionResult {
    let token = call.cancel_token();
    tokio::select! {
        _ = token.cancelled() => Err(ActionError::Cancelled),
        _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(None),
    }
}

impl ActionSurface for InputCatalog {
    fn expose(self: Arc<Self>, t: &mut ActionTable) {
        // --- Mouse ---
        t.add("MouseMove")
            .param("x", Int32)
            .param("y", Int32)
            .handler(self.bind(|this, call| async move {
                let (x, y) = (call.i32(0)?, call.i32(1)?);
                this.actuator.run(move |e| e.mouse_move_to(x, y)).await?;
                Ok(None)
            }));

        t.add("MouseMoveRelative")
            .param("dx", Int32)
            .param("dy", Int32)
            .handler(self.bind(|this, call| async move {
                let (dx, dy) = (call.i32(0)?, call.i32(1)?);
                this.actuator.run(move |e| e.mouse_move_by(dx, dy)).await?;
                Ok(None)
            }));

        t.add("Click")
            .optional("button", SemanticType::Enum(&MOUSE_BUTTON), LEFT)
            .optional("count", UInt32, Value::UInt32(1))
            .handler(self.bind(|this, call| async move {
                let (btn, count) = (button(&call, 0)?, call.u32(1)?);
                this.actuator.run(move |e| e.mouse_click(btn, count)).await?;
                Ok(None)
            }));

        t.add("Click")
            .param("handle", Handle)
            .handler(self.bind(|this, call| async move {
                let handle = call.handle(0)?;
                if !window::focus_handle(handle)? {
                    warn!(target: "scriptbot::actions", handle, "Click: window could not be focused");
                }
                this.actuator
                    .run(|e| e.mouse_click(MouseButton::Left, 1))
                    .await?;
                Ok(None)
            }));

        for (name, state) in [("MouseDown", Press::Down), ("MouseUp", Press::Up)] {
            t.add(name)
                .optional("button", SemanticType::Enum(&MOUSE_BUTTON), LEFT)
                .handler(self.bind(move |this, call| async move {
                    let btn = button(&call, 0)?;
                    this.actuator.run(move |e| e.mouse_button(btn, state)).await?;
                    Ok(None)
                }));
        }

        t.add("Scroll")
            .param("dy", Int32)
            .optional("dx", Int32, Value::Int32(0))
            .handler(self.bind(|this, call| async move {
                let (dy, dx) = (call.i32(0)?, call.i32(1)?);
                this.actuator.run(move |e| e.mouse_scroll(dx, dy)).await?;
                Ok(None)
            }));

        t.add("CursorX").handler(self.bind(|this, _| async move {
            let (x, _) = this.actuator.run(|e| e.cursor_location()).await?;
            Ok(Some(Value::Int32(x)))
        }));

        t.add("CursorY").handler(self.bind(|this, _| async move {
            let (_, y) = this.actuator.run(|e| e.cursor_location()).await?;
            Ok(Some(Value::Int32(y)))
        }));

        // --- Keyboard ---
        t.add("Press")
            .param("key", SemanticType::Enum(&KEY))
            .optional("direction", SemanticType::Enum(&KEY_DIRECTION), CLICK)
            .handler(self.bind(|this, call| async move {
                let (key, dir) = (call.ordinal(0)?, press(&call, 1)?);
                this.actuator.run(move |e| e.named_key(key, dir)).await?;
                Ok(None)
            }));

        t.add("PressChar")
            .param("character", Text)
            .optional("direction", SemanticType::Enum(&KEY_DIRECTION), CLICK)
            .handler(self.bind(|this, call| async move {
                let mut chars = call.text(0).chars();
                let ch = match (chars.next(), chars.next()) {
                    (Some(ch), None) => ch,
                    _ => {
                        return Err(ActionError::BadArgument {
                            index: 0,
                            expected: "a single character",
                        });
                    }
                };
                let dir = press(&call, 1)?;
                this.actuator.run(move |e| e.char_key(ch, dir)).await?;
                Ok(None)
            }));

        t.add("KeySeq")
            .param("keys", Text)
            .handler(self.bind(|this, call| async move {
                let keys = call.text(0).to_string();
                this.actuator.run(move |e| e.key_sequence(&keys)).await?;
                Ok(None)
            }));

        t.add("TypeText")
            .param("text", Text)
            .handler(self.bind(|this, call| async move {
                let text = call.text(0).to_string();
                this.actuator.run(move |e| e.type_text(&text)).await?;
                Ok(None)
            }));

        // --- Timing ---
        t.add("Sleep")
            .param("ms", UInt32)
            .cancellable()
            .handler(|call| async move {
                let ms = call.u32(0)?;
                cancellable_sleep(&call, ms.into()).await
            });

        t.add("SleepRandom")
            .param("min", UInt32)
            .param("max", UInt32)
            .cancellable()
            .handler(|call| async move {
                let (a, b) = (call.u32(0)?, call.u32(1)?);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let delay = if lo == hi { lo } else { random_range(lo..=hi) };
                debug!(target: "scriptbot::actions", min = lo, max = hi, delay, "SleepRandom");
                cancellable_sleep(&call, delay.into()).await
            });

        // --- Window ---
        t.add("GetHandle")
            .param("title", Text)
            .handler(|call| async move {
                let found = window::find_window(call.text(0))?;
                Ok(found.map(Value::Handle))
            });

        t.add("Focus")
            .param("handle", Handle)
            .handler(|call| async move {
                let focused = window::focus_handle(call.handle(0)?)?;
                Ok(Some(Value::Bool(focused)))
            });

        t.add("Focus")
            .param("title", Text)
            .handler(|call| async move {
                let focused = window::focus_window(call.text(0))?;
                Ok(Some(Value::Bool(focused)))
            });

        // --- Values & logging ---
        t.add("Random")
            .param("min", Int32)
            .param("max", Int32)
            .handler(|call| async move {
                let (a, b) = (call.i32(0)?, call.i32(1)?);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                Ok(Some(Value::Int32(random_range(lo..=hi))))
            });

        t.add("Log")
            .variadic(Text)
            .handler(|call| async move {
                let message = Value::List(call.rest).to_token();
                info!(target: "scriptbot", "{message}");
                Ok(None)
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Registry, Resolver};
    use crate::script::parse;
    use tokio_util::sync::CancellationToken;

    fn resolver() -> Resolver {
        let actuator = InputActuator::spawn(true).unwrap();
        let catalog = Arc::new(InputCatalog::new(actuator));
        Resolver::new(Arc::new(Registry::build(catalog)))
    }

    async fn run(r: &Resolver, line: &str) -> Option<Value> {
        let program = parse(line);
        let token = CancellationToken::new();
        r.invoke(&program.blocks[0].steps[0], &token).await.unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_catalog_actions_resolve() {
        let r = resolver();
        for line in [
            "MouseMove=10,20",
            "MouseMoveRelative=-5 5",
            "Click",
            "Click=right 2",
            "MouseDown",
            "MouseUp=middle",
            "Scroll=3",
            "Press=Enter",
            "Press=tab release",
            "PressChar=a",
            "KeySeq=hello{ENTER}",
            "TypeText=hello there world",
            "Sleep=1",
            "SleepRandom=2 1",
            "Log=all done",
        ] {
            assert_eq!(run(&r, line).await, None, "{line}");
        }
    }

    #[tokio::test]
    async fn test_value_producing_actions() {
        let r = resolver();
        assert_eq!(run(&r, "CursorX").await, Some(Value::Int32(0)));
        assert_eq!(run(&r, "MouseMove=CursorX CursorY").await, None);
        match run(&r, "Random=5 5").await {
            Some(Value::Int32(5)) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(run(&r, "GetHandle=Untitled").await, None);
        assert_eq!(run(&r, "Focus=Untitled").await, Some(Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_sleep_observes_cancellation() {
        let r = resolver();
        let program = parse("Sleep=60000");
        let token = CancellationToken::new();
        let step = program.blocks[0].steps[0].clone();
        let task = {
            let r = r.clone();
            let token = token.clone();
            tokio::spawn(async move { r.invoke(&step, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_press_char_rejects_words() {
        let r = resolver();
        let program = parse("PressChar=ab");
        let token = CancellationToken::new();
        let err = r
            .invoke(&program.blocks[0].steps[0], &token)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::executor::InvocationError::Fault { .. }));
    }
}
