use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{AppConfig, SafetyPolicy, SurfaceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SurfaceArg {
    Browser,
    Container,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Task for the model, in plain language
    pub task: String,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Surface to operate
    #[arg(short, long, value_enum)]
    pub surface: Option<SurfaceArg>,

    /// Start page for the browser surface
    #[arg(long)]
    pub url: Option<String>,

    /// Container name for the container surface
    #[arg(long)]
    pub container: Option<String>,

    /// X display inside the container
    #[arg(long)]
    pub display: Option<String>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Ask on the console before acknowledging safety checks
    #[arg(long)]
    pub prompt_safety: bool,
}

impl Cli {
    /// Flags win over the loaded config.
    pub fn apply_to(&self, cfg: &mut AppConfig) {
        if let Some(surface) = self.surface {
            cfg.surface.kind = match surface {
                SurfaceArg::Browser => SurfaceKind::Browser,
                SurfaceArg::Container => SurfaceKind::Container,
            };
        }
        if let Some(url) = &self.url {
            cfg.surface.browser.start_url = url.clone();
        }
        if let Some(name) = &self.container {
            cfg.surface.container.name = name.clone();
        }
        if let Some(display) = &self.display {
            cfg.surface.container.display = display.clone();
        }
        if let Some(width) = self.width {
            cfg.display.width = width;
        }
        if let Some(height) = self.height {
            cfg.display.height = height;
        }
        if self.headless {
            cfg.surface.browser.headless = true;
        }
        if self.prompt_safety {
            cfg.safety.policy = SafetyPolicy::Prompt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "screenloop",
            "open the news",
            "--surface",
            "container",
            "--container",
            "desk",
            "--width",
            "1280",
            "--prompt-safety",
        ]);
        let mut cfg = AppConfig::default();
        cli.apply_to(&mut cfg);

        assert_eq!(cli.task, "open the news");
        assert_eq!(cfg.surface.kind, SurfaceKind::Container);
        assert_eq!(cfg.surface.container.name, "desk");
        assert_eq!(cfg.display.width, 1280);
        assert_eq!(cfg.display.height, 768);
        assert_eq!(cfg.safety.policy, SafetyPolicy::Prompt);
    }

    #[test]
    fn no_flags_leave_config_alone() {
        let cli = Cli::parse_from(["screenloop", "task"]);
        let mut cfg = AppConfig::default();
        cli.apply_to(&mut cfg);
        assert_eq!(cfg.surface.kind, SurfaceKind::Browser);
        assert!(!cfg.surface.browser.headless);
        assert_eq!(cfg.safety.policy, SafetyPolicy::Auto);
    }
}
