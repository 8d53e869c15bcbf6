//! Status light directives.

use super::Status;
use log::{info, warn};
use std::fmt;
use std::path::PathBuf;

/// Pattern the status light should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedPattern {
    Solid,
    SlowBlink,
    SlowBlinkAlternate,
    HeartbeatPulse,
}

impl LedPattern {
    pub fn for_status(status: Status) -> Self {
        match status {
            Status::Static | Status::Bound => LedPattern::Solid,
            Status::Ip4ll => LedPattern::SlowBlinkAlternate,
            Status::Request => LedPattern::HeartbeatPulse,
            _ => LedPattern::SlowBlink,
        }
    }
}

impl fmt::Display for LedPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedPattern::Solid => "solid",
            LedPattern::SlowBlink => "slow-blink",
            LedPattern::SlowBlinkAlternate => "slow-blink-alternate",
            LedPattern::HeartbeatPulse => "heartbeat-pulse",
        };
        f.write_str(s)
    }
}

/// Receives a directive whenever the interface status changes.
pub trait StatusIndicator: Send + Sync {
    fn show(&self, pattern: LedPattern);
}

/// Indicator for boards without a light.
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn show(&self, pattern: LedPattern) {
        info!("Indicator: {}", pattern);
    }
}

/// Drives a Linux LED class device (`/sys/class/leds/<name>`).
pub struct SysfsLed {
    dir: PathBuf,
}

impl SysfsLed {
    pub fn new(name: &str) -> Self {
        Self {
            dir: PathBuf::from("/sys/class/leds").join(name),
        }
    }

    fn write(&self, attr: &str, value: &str) -> std::io::Result<()> {
        std::fs::write(self.dir.join(attr), value)
    }

    fn timer(&self, on_ms: u32, off_ms: u32) -> std::io::Result<()> {
        self.write("trigger", "timer")?;
        self.write("delay_on", &on_ms.to_string())?;
        self.write("delay_off", &off_ms.to_string())
    }

    fn apply(&self, pattern: LedPattern) -> std::io::Result<()> {
        match pattern {
            LedPattern::Solid => self.write("trigger", "default-on"),
            LedPattern::SlowBlink => self.timer(1000, 1000),
            // Single LED: short flash with a long gap instead of two lights
            LedPattern::SlowBlinkAlternate => self.timer(250, 1750),
            LedPattern::HeartbeatPulse => self.write("trigger", "heartbeat"),
        }
    }
}

impl StatusIndicator for SysfsLed {
    fn show(&self, pattern: LedPattern) {
        if let Err(e) = self.apply(pattern) {
            warn!(
                "Indicator: failed to set {} on {}: {}",
                pattern,
                self.dir.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_mapping() {
        assert_eq!(LedPattern::for_status(Status::Static), LedPattern::Solid);
        assert_eq!(LedPattern::for_status(Status::Bound), LedPattern::Solid);
        assert_eq!(
            LedPattern::for_status(Status::Ip4ll),
            LedPattern::SlowBlinkAlternate
        );
        assert_eq!(
            LedPattern::for_status(Status::Request),
            LedPattern::HeartbeatPulse
        );
        assert_eq!(LedPattern::for_status(Status::Renew), LedPattern::SlowBlink);
        assert_eq!(LedPattern::for_status(Status::Init), LedPattern::SlowBlink);
    }

    #[test]
    fn test_sysfs_led_writes_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let led = SysfsLed {
            dir: dir.path().to_path_buf(),
        };

        led.show(LedPattern::Solid);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("trigger")).unwrap(),
            "default-on"
        );

        led.show(LedPattern::SlowBlink);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("trigger")).unwrap(),
            "timer"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("delay_on")).unwrap(),
            "1000"
        );
    }
}
