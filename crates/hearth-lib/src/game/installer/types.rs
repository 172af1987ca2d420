use tokio::sync::watch;

/// Observer for a running download batch. Called from worker tasks, so
/// implementations should hand the numbers off rather than block.
pub trait ProgressReporter: Send + Sync {
    /// Bytes received for the file currently streaming
    fn bytes(&self, received: u64, expected: Option<u64>);

    /// `finished` of `total` tasks have settled, successfully or not
    fn tasks(&self, finished: usize, total: usize);
}

/// Discards every update
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn bytes(&self, _received: u64, _expected: Option<u64>) {}
    fn tasks(&self, _finished: usize, _total: usize) {}
}

/// Read side of a cancellation flag shared between the caller and workers.
/// Once raised the flag never goes back down.
#[derive(Clone)]
pub struct CancelToken {
    flag: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new(flag: watch::Receiver<bool>) -> Self {
        Self { flag }
    }

    pub fn never() -> Self {
        // The sender is dropped here; the receiver keeps reporting `false`
        watch::channel(false).1.into()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }
}

impl From<watch::Receiver<bool>> for CancelToken {
    fn from(flag: watch::Receiver<bool>) -> Self {
        Self::new(flag)
    }
}

/// Write side of a [`CancelToken`]. Dropping it leaves the flag untouched.
pub struct CancelHandle {
    flag: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (flag, observer) = watch::channel(false);
    (CancelHandle { flag }, observer.into())
}

/// Host family as manifests name it. Architecture is tracked separately in
/// [`Arch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    MacOS,
    Linux,
}

impl OsType {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => OsType::Windows,
            "macos" => OsType::MacOS,
            // BSDs and friends resolve linux natives
            _ => OsType::Linux,
        }
    }

    /// `os.name` value in manifest rules and `natives` keys
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::MacOS => "osx",
            OsType::Linux => "linux",
        }
    }

    pub fn classpath_separator(&self) -> &'static str {
        if self.is_windows() {
            ";"
        } else {
            ":"
        }
    }

    pub fn is_windows(&self) -> bool {
        *self == OsType::Windows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X64,
    X86,
    Arm64,
    Arm32,
}

impl Arch {
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Arm32,
            _ => Arch::X64,
        }
    }

    /// Bit width substituted for `${arch}` in native classifiers
    pub fn bits(&self) -> &'static str {
        match self {
            Arch::X64 | Arch::Arm64 => "64",
            Arch::X86 | Arch::Arm32 => "32",
        }
    }

    /// Matches the `os.arch` value used in manifest rules
    pub fn rule_name(&self) -> &'static str {
        match self {
            Arch::X64 => "x86_64",
            Arch::X86 => "x86",
            Arch::Arm64 => "arm64",
            Arch::Arm32 => "arm32",
        }
    }
}

/// The host an artifact or argument is being resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: OsType,
    pub arch: Arch,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: OsType::current(),
            arch: Arch::current(),
        }
    }
}
