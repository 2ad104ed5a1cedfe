//! Application-wide constants
//!
//! File names, remote endpoints and timing values used throughout the
//! application, kept in one place.

/// Application directory and file names
pub mod config {
    /// Directory name under the user config/data/runtime dirs
    pub const APP_DIR: &str = "steam-animation-manager";

    /// Selection store file name
    pub const FILENAME: &str = "config.json";

    /// Per-set marker file inside an animation set directory
    pub const SET_CONFIG_FILENAME: &str = "config.json";

    /// Subdirectory holding user animation sets
    pub const ANIMATIONS_DIR: &str = "animations";

    /// Subdirectory holding downloaded catalog animations
    pub const DOWNLOADS_DIR: &str = "downloads";

    /// Socket file name inside the runtime dir
    pub const SOCKET_FILENAME: &str = "daemon.sock";
}

/// Video file naming
pub mod video {
    /// Extension used for downloaded animations
    pub const EXTENSION: &str = "webm";

    /// Suffix appended to a target file to hold the vendor original
    pub const BACKUP_SUFFIX: &str = ".backup";

    /// Suffix for in-progress writes that are renamed into place
    pub const PARTIAL_SUFFIX: &str = ".part";

    /// SteamOS / Linux deck animations
    pub mod deck {
        pub const BOOT: &str = "deck_startup.webm";
        pub const SUSPEND: &str = "steam_os_suspend.webm";
        pub const THROBBER: &str = "steam_os_suspend_from_throbber.webm";
    }

    /// Windows Big Picture animations
    pub mod big_picture {
        pub const BOOT: &str = "bigpicture_startup.webm";
        pub const SUSPEND: &str = "bigpicture_suspend.webm";
        pub const THROBBER: &str = "bigpicture_suspend_from_throbber.webm";
    }
}

/// Steam install layout
pub mod steam {
    /// Relative to the Steam root
    pub const OVERRIDE_MOVIES: [&str; 3] = ["config", "uioverrides", "movies"];

    /// Relative to the Steam root
    pub const UI_MOVIES: [&str; 2] = ["steamui", "movies"];

    /// Linux Steam root, relative to home
    pub const LINUX_ROOT: &str = ".steam/root";

    /// macOS Steam root, relative to home
    pub const MACOS_ROOT: &str = "Library/Application Support/Steam";

    /// Windows install locations probed in order
    pub const WINDOWS_ROOTS: [&str; 2] = ["C:\\Program Files (x86)\\Steam", "C:\\Program Files\\Steam"];
}

/// Remote catalog (steamdeckrepo)
pub mod catalog {
    use std::time::Duration;

    pub const POSTS_URL: &str = "https://steamdeckrepo.com/api/posts/all";

    /// Prefix joined with the post id to form the download URL
    pub const DOWNLOAD_URL_PREFIX: &str = "https://steamdeckrepo.com/post/download/";

    /// Total fetch attempts before giving up
    pub const REQUEST_RETRIES: usize = 5;

    pub const BOOT_KIND: &str = "boot_video";
    pub const SUSPEND_KIND: &str = "suspend_video";

    pub const MANIFEST_VERSION: u32 = 1;

    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub const USER_AGENT: &str = concat!("steam-animation-manager/", env!("CARGO_PKG_VERSION"));
}

/// HTTP status codes the engine branches on
pub mod http {
    pub const OK: u16 = 200;
    pub const TOO_MANY_REQUESTS: u16 = 429;
}

/// Daemon timing
pub mod daemon {
    use std::time::Duration;

    /// Delay between startup activation and the first catalog refresh
    pub const STARTUP_REFRESH_DELAY: Duration = Duration::from_secs(5);

    /// How often the accept loop checks the shutdown flag
    pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(250);
}

/// Legacy (pre-migration) locations, relative to home
pub mod legacy {
    pub const CONFIG: &str = ".config/AnimationChanger/config.json";
    pub const ANIMATIONS: &str = "homebrew/animations";
    pub const DOWNLOADS: &str = ".config/AnimationChanger/downloads";
}

/// IPC limits and Windows pipe naming
pub mod ipc {
    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Default named pipe the daemon listens on
    #[cfg(windows)]
    pub const PIPE_NAME: &str = r"\\.\pipe\steam-animation-manager";

    /// Connect attempts while every pipe instance is busy
    #[cfg(windows)]
    pub const PIPE_BUSY_RETRIES: u32 = 20;

    #[cfg(windows)]
    pub const PIPE_BUSY_WAIT: std::time::Duration = std::time::Duration::from_millis(50);
}
