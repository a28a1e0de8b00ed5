//! Inbound console commands.
//!
//! Every stdin line is either a `!`-prefixed operator command or a free-text
//! reply routed to the health-check orchestrator.

/// Commands that the console adapter can send into the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Free-text answer to an open check-in.
    Reply(String),

    /// Inject an impact profile on the simulated accelerometer.
    SimulateFall,

    /// Move the simulated light level below / above the dark threshold.
    Dark,
    Bright,

    /// Recalibrate the accelerometer axes (device held still).
    Calibrate,

    /// Foreground "favorite song" playback; `None` plays the first track.
    PlayFavorite(Option<String>),
    StopFavorite,
}

impl AppCommand {
    /// Parse one console line. Blank lines and unknown `!` commands yield
    /// `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(cmd) = line.strip_prefix('!') else {
            return Some(Self::Reply(line.to_string()));
        };

        let mut parts = cmd.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
        match name.as_str() {
            "fall" => Some(Self::SimulateFall),
            "dark" => Some(Self::Dark),
            "bright" => Some(Self::Bright),
            "calibrate" => Some(Self::Calibrate),
            "play" => Some(Self::PlayFavorite(arg.map(str::to_string))),
            "stop" => Some(Self::StopFavorite),
            _ => None,
        }
    }
}
