use std::mem::size_of;

use anyhow::{anyhow, Result};
use tracing::error;
use windows::Win32::{
    System::SystemInformation::GetTickCount64,
    UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
};

use super::IdleMonitor;

/// Milliseconds since the last keyboard/mouse input.
///
/// `GetLastInputInfo` reports the tick count at the last input event, so idle
/// time is the distance to the current tick count. `dwTime` is 32-bit and
/// wraps after ~49 days of uptime, which is accepted the same way the OS API
/// accepts it.
pub fn get_idle_time() -> Result<u32> {
    let mut last: LASTINPUTINFO = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let is_success = unsafe { GetLastInputInfo(&mut last) };
    if !is_success.as_bool() {
        error!("Failed to retrieve user idle time");
        return Err(anyhow!("Failed to retrieve user idle time"));
    }

    let tick_count = unsafe { GetTickCount64() };
    let duration = tick_count - last.dwTime as u64;
    if duration > u32::MAX as u64 {
        Ok(u32::MAX)
    } else {
        Ok(duration as u32)
    }
}

pub struct WindowsIdleMonitor {}

impl WindowsIdleMonitor {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsIdleMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleMonitor for WindowsIdleMonitor {
    fn idle_time_ms(&mut self) -> Result<u32> {
        get_idle_time().inspect_err(|e| error!("Failed to get idle time {e:?}"))
    }
}
