// Desktop inside a running container, driven with xdotool over `docker exec`.
use async_trait::async_trait;

use crate::config::ContainerConfig;
use crate::errors::{ScreenLoopError, ScreenLoopResult};
use crate::planner::types::DisplaySpec;
use crate::surface::docker::docker_exec;
use crate::surface::{MouseButton, Observation, Surface};

/// Pixels of scroll delta per wheel click.
const SCROLL_STEP_PX: u32 = 100;

pub struct ContainerSurface {
    container: String,
    x_display: String,
    display: DisplaySpec,
}

impl ContainerSurface {
    pub fn new(cfg: &ContainerConfig, width: u32, height: u32) -> Self {
        Self {
            container: cfg.name.clone(),
            x_display: cfg.display.clone(),
            display: DisplaySpec {
                width,
                height,
                environment: cfg.environment,
            },
        }
    }

    /// Checks the container answers and the X display is reachable.
    pub async fn attach(cfg: &ContainerConfig, width: u32, height: u32) -> ScreenLoopResult<Self> {
        let surface = Self::new(cfg, width, height);
        surface
            .run("xdotool getmouselocation")
            .await
            .map_err(|e| ScreenLoopError::SurfaceUnavailable(format!("attach failed: {e}")))?;
        tracing::info!(
            container = %surface.container,
            display = %surface.x_display,
            "attached to container desktop"
        );
        Ok(surface)
    }

    fn command(&self, body: &str) -> String {
        format!("export DISPLAY={} && {body}", self.x_display)
    }

    async fn run(&self, body: &str) -> ScreenLoopResult<String> {
        docker_exec(&self.command(body), &self.container, true)
            .await
            .map(|out| out.into_text())
            .map_err(into_action_error)
    }
}

/// Command failures are scoped to the action; a vanished container is not.
fn into_action_error(err: ScreenLoopError) -> ScreenLoopError {
    match err {
        ScreenLoopError::Container(msg) => ScreenLoopError::ActionExecution(msg),
        other => other,
    }
}

/// Single-quotes `text` for `sh`, closing and reopening around embedded quotes.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

fn xdotool_button(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Right => 3,
    }
}

fn xdotool_key(key: &str) -> String {
    let mapped = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => "Return",
        " " | "space" => "space",
        "/" => "slash",
        "\\" => "backslash",
        "alt" | "option" => "Alt_L",
        "arrowdown" => "Down",
        "arrowleft" => "Left",
        "arrowright" => "Right",
        "arrowup" => "Up",
        "backspace" => "BackSpace",
        "capslock" => "Caps_Lock",
        "cmd" | "super" | "win" | "meta" => "Super_L",
        "ctrl" | "control" => "Control_L",
        "delete" => "Delete",
        "end" => "End",
        "esc" | "escape" => "Escape",
        "home" => "Home",
        "insert" => "Insert",
        "pagedown" => "Page_Down",
        "pageup" => "Page_Up",
        "shift" => "Shift_L",
        "tab" => "Tab",
        _ => return key.to_string(),
    };
    mapped.to_string()
}

/// The xdotool wheel clicks equivalent to a pixel scroll delta.
fn scroll_commands(dx: i32, dy: i32) -> Vec<String> {
    let mut cmds = Vec::new();
    for (delta, negative, positive) in [(dy, 4, 5), (dx, 6, 7)] {
        if delta == 0 {
            continue;
        }
        let button = if delta < 0 { negative } else { positive };
        let clicks = (delta.unsigned_abs() / SCROLL_STEP_PX).max(1);
        cmds.push(format!("xdotool click --repeat {clicks} {button}"));
    }
    cmds
}

fn click_command(x: i32, y: i32, button: MouseButton) -> String {
    format!("xdotool mousemove {x} {y} click {}", xdotool_button(button))
}

fn scroll_command(x: i32, y: i32, dx: i32, dy: i32) -> String {
    let mut cmds = vec![format!("xdotool mousemove {x} {y}")];
    cmds.extend(scroll_commands(dx, dy));
    cmds.join(" && ")
}

fn key_command(key: &str) -> String {
    format!("xdotool key {}", shell_quote(&xdotool_key(key)))
}

fn type_command(text: &str) -> String {
    format!("xdotool type --delay 50 -- {}", shell_quote(text))
}

fn screenshot_observation(bytes: Vec<u8>) -> ScreenLoopResult<Observation> {
    let observation = Observation::new(bytes);
    if observation.is_empty() {
        return Err(ScreenLoopError::Container("screenshot produced no data".into()));
    }
    Ok(observation)
}

#[async_trait]
impl Surface for ContainerSurface {
    fn display(&self) -> DisplaySpec {
        self.display
    }

    async fn click(&mut self, x: i32, y: i32, button: MouseButton) -> ScreenLoopResult<()> {
        self.run(&click_command(x, y, button)).await?;
        Ok(())
    }

    async fn move_and_scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenLoopResult<()> {
        self.run(&scroll_command(x, y, dx, dy)).await?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> ScreenLoopResult<()> {
        self.run(&key_command(key)).await?;
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> ScreenLoopResult<()> {
        self.run(&type_command(text)).await?;
        Ok(())
    }

    async fn capture_image(&mut self) -> ScreenLoopResult<Observation> {
        let bytes = docker_exec(
            &self.command("import -window root png:-"),
            &self.container,
            false,
        )
        .await?
        .into_bytes();
        screenshot_observation(bytes)
    }
}
