/// Config file looked up in the working directory when `--config` is not given.
pub const CONFIG_FILENAME: &str = "xcforge.toml";

/// Environment variable overriding the build root.
pub const ROOT_ENV: &str = "XCFORGE_ROOT";

/// Shared append-only log, relative to the build root.
pub const LOG_FILENAME: &str = "build.log";

/// Build-root lock file, relative to the build root.
pub const LOCK_FILENAME: &str = ".lock";

/// Stamp written once a dependency has been configured for a platform.
pub const CONFIGURED_STAMP: &str = ".xcforge-configured";

/// Stamp written once a dependency has been compiled for a platform.
pub const COMPILED_STAMP: &str = ".xcforge-compiled";

/// Stamp written into an install prefix once its install task completed.
pub const INSTALLED_STAMP: &str = ".xcforge-installed";

/// 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch)
pub const SOURCE_DATE_EPOCH: &str = "315532800";
