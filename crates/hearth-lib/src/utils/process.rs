//! Spawn flags for the child processes the launcher starts: the `java
//! -version` probe and the game itself.

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// `CREATE_NO_WINDOW` from the Win32 process creation flags
#[cfg(windows)]
const NO_WINDOW: u32 = 0x0800_0000;

pub trait HearthCommandExt {
    /// Stop Windows from opening a console for the child; no-op elsewhere
    fn hide_console(&mut self) -> &mut Self;
}

macro_rules! impl_hide_console {
    ($($command:ty),+) => {$(
        impl HearthCommandExt for $command {
            fn hide_console(&mut self) -> &mut Self {
                #[cfg(windows)]
                self.creation_flags(NO_WINDOW);
                self
            }
        }
    )+};
}

impl_hide_console!(std::process::Command, tokio::process::Command);
