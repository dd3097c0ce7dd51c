//! Boot configuration, parsed once from CLI flags and shared for the life of
//! the process.

use argh::FromArgs;
use std::sync::LazyLock;

/// Physics settings from the boot config. `{ step_frequency: u32 (Hz),
/// max_substeps: u32 }`, default 60 Hz / 4.
#[derive(Copy, Clone, Debug)]
pub struct PhysicsSettings {
    pub step_frequency: u32,
    pub max_substeps: u32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        PhysicsSettings {
            step_frequency: 60,
            max_substeps: 4,
        }
    }
}

/// Boot-time engine flags, parsed from `argv`.
#[derive(Default, FromArgs)]
pub struct EngineArgs {
    #[argh(option, hidden_help)]
    pub step_frequency: Option<u32>,
    #[argh(option, hidden_help)]
    pub max_substeps: Option<u32>,

    /// disable script callbacks at boot; used in headless test harnesses
    #[argh(switch, hidden_help)]
    pub disable_script_callbacks: bool,

    /// cap the per-frame delta handed to `World::update`, dropping any
    /// excess rather than banking it for the next frame
    #[argh(option, hidden_help)]
    pub max_frame_delta_secs: Option<f32>,
}

impl EngineArgs {
    fn init() -> Option<EngineArgs> {
        let mut args = std::env::args();
        let cmd_name = args.next()?;
        let args: Vec<String> = args.collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        EngineArgs::from_args(&[&cmd_name], &args).ok()
    }

    pub fn get() -> &'static EngineArgs {
        static INSTANCE: LazyLock<EngineArgs> = LazyLock::new(|| EngineArgs::init().unwrap_or_default());
        &INSTANCE
    }
}

/// Fully resolved boot configuration: `EngineArgs` overlaid on defaults.
#[derive(Copy, Clone, Debug)]
pub struct BootConfig {
    pub physics: PhysicsSettings,
    pub disable_script_callbacks: bool,
    pub max_frame_delta_secs: f32,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            physics: PhysicsSettings::default(),
            disable_script_callbacks: false,
            max_frame_delta_secs: 0.25,
        }
    }
}

impl BootConfig {
    pub fn from_args(args: &EngineArgs) -> Self {
        let defaults = PhysicsSettings::default();
        BootConfig {
            physics: PhysicsSettings {
                step_frequency: args.step_frequency.unwrap_or(defaults.step_frequency),
                max_substeps: args.max_substeps.unwrap_or(defaults.max_substeps),
            },
            disable_script_callbacks: args.disable_script_callbacks,
            max_frame_delta_secs: args.max_frame_delta_secs.unwrap_or(0.25),
        }
    }

    pub fn from_env() -> Self {
        BootConfig::from_args(EngineArgs::get())
    }
}

/// Smooths the raw wall-clock delta fed to `World::update`: clamps spikes
/// (e.g. a breakpoint or window-drag stall) to `max_frame_delta_secs` so
/// physics never takes an enormous single step.
pub struct DeltaTimeFilter {
    last_instant: web_time::Instant,
    max_delta_secs: f32,
}

impl DeltaTimeFilter {
    pub fn new(max_delta_secs: f32) -> Self {
        DeltaTimeFilter {
            last_instant: web_time::Instant::now(),
            max_delta_secs,
        }
    }

    /// Returns the clamped delta since the last call (or since construction,
    /// on the first call) and resets the internal clock.
    pub fn tick(&mut self) -> f32 {
        let now = web_time::Instant::now();
        let dt = now.duration_since(self.last_instant).as_secs_f32();
        self.last_instant = now;
        dt.min(self.max_delta_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_config_falls_back_to_defaults() {
        let args = EngineArgs::default();
        let config = BootConfig::from_args(&args);
        assert_eq!(config.physics.step_frequency, 60);
        assert_eq!(config.physics.max_substeps, 4);
    }

    #[test]
    fn boot_config_honors_overrides() {
        let args = EngineArgs {
            step_frequency: Some(120),
            max_substeps: Some(8),
            disable_script_callbacks: true,
            max_frame_delta_secs: None,
        };
        let config = BootConfig::from_args(&args);
        assert_eq!(config.physics.step_frequency, 120);
        assert_eq!(config.physics.max_substeps, 8);
        assert!(config.disable_script_callbacks);
    }

    #[test]
    fn delta_time_filter_clamps_spikes() {
        let mut filter = DeltaTimeFilter::new(0.1);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let dt = filter.tick();
        assert!(dt <= 0.1);
    }
}
