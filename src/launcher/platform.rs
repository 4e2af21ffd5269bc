//! Host platform detection.

/// Operating system family the server runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    #[must_use]
    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    /// Name of the server executable inside an install directory.
    #[must_use]
    pub fn server_executable(self) -> &'static str {
        match self {
            Self::Windows => "OmniSharp.exe",
            Self::MacOs | Self::Linux => "run",
        }
    }
}
