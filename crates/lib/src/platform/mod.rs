//! Target platform records.
//!
//! Each supported platform is a fixed configuration record looked up by
//! identifier. Everything platform specific (SDK, architecture, deployment
//! target, compiler flags) is read from the record instead of branching on the
//! identifier string.

pub mod arch;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use arch::Arch;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform '{0}' (expected one of: {list})", list = PlatformId::names().join(", "))]
pub struct UnknownPlatform(pub String);

/// Identifier of one of the six supported platform/architecture combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlatformId {
  IPhoneOs,
  IPhoneSimulator,
  MacCatalyst,
  MacCatalystArm64,
  MacOsx,
  MacOsxArm64,
}

impl PlatformId {
  pub const ALL: [PlatformId; 6] = [
    PlatformId::IPhoneOs,
    PlatformId::IPhoneSimulator,
    PlatformId::MacCatalyst,
    PlatformId::MacCatalystArm64,
    PlatformId::MacOsx,
    PlatformId::MacOsxArm64,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::IPhoneOs => "iphoneos",
      Self::IPhoneSimulator => "iphonesimulator",
      Self::MacCatalyst => "maccatalyst",
      Self::MacCatalystArm64 => "maccatalyst-arm64",
      Self::MacOsx => "macosx",
      Self::MacOsxArm64 => "macosx-arm64",
    }
  }

  pub fn names() -> Vec<&'static str> {
    Self::ALL.iter().map(|p| p.as_str()).collect()
  }

  /// The configuration record for this platform.
  pub fn platform(&self) -> &'static Platform {
    &PLATFORMS[*self as usize]
  }
}

impl fmt::Display for PlatformId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for PlatformId {
  type Err = UnknownPlatform;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|p| p.as_str() == s)
      .ok_or_else(|| UnknownPlatform(s.to_string()))
  }
}

impl TryFrom<String> for PlatformId {
  type Error = UnknownPlatform;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PlatformId> for String {
  fn from(value: PlatformId) -> Self {
    value.as_str().to_string()
  }
}

/// Apple SDK a platform compiles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sdk {
  IPhoneOs,
  IPhoneSimulator,
  MacOsx,
}

impl Sdk {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::IPhoneOs => "iphoneos",
      Self::IPhoneSimulator => "iphonesimulator",
      Self::MacOsx => "macosx",
    }
  }

  /// Shell expression that resolves the SDK path when the command runs.
  pub fn path_expr(&self) -> String {
    format!("$(xcrun --sdk {} --show-sdk-path)", self.as_str())
  }
}

/// One slice of the final bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Slice {
  Ios,
  IosSimulator,
  MacCatalyst,
  MacOs,
}

impl Slice {
  pub const ALL: [Slice; 4] = [Slice::Ios, Slice::IosSimulator, Slice::MacCatalyst, Slice::MacOs];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Ios => "ios",
      Self::IosSimulator => "ios-simulator",
      Self::MacCatalyst => "maccatalyst",
      Self::MacOs => "macos",
    }
  }

  /// Platforms whose combined libraries make up this slice.
  pub fn platforms(&self) -> &'static [PlatformId] {
    match self {
      Self::Ios => &[PlatformId::IPhoneOs],
      Self::IosSimulator => &[PlatformId::IPhoneSimulator],
      Self::MacCatalyst => &[PlatformId::MacCatalyst, PlatformId::MacCatalystArm64],
      Self::MacOs => &[PlatformId::MacOsx, PlatformId::MacOsxArm64],
    }
  }

  /// Whether the slice ships more than one architecture and needs a fat merge.
  pub fn is_fat(&self) -> bool {
    self.platforms().len() > 1
  }
}

impl fmt::Display for Slice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Static configuration record for a target platform.
#[derive(Debug, PartialEq, Eq)]
pub struct Platform {
  pub id: PlatformId,
  pub arch: Arch,
  pub sdk: Sdk,
  pub slice: Slice,
  pub min_os_version: &'static str,
  /// clang `-target` triple, including the deployment target.
  pub target_triple: &'static str,
  /// Host triple passed to autotools `--host`.
  pub host_triple: &'static str,
  /// Target name understood by OpenSSL's `Configure`.
  pub openssl_target: &'static str,
  /// `CMAKE_SYSTEM_NAME` for CMake based dependencies.
  pub cmake_system_name: &'static str,
  /// Extra compiler flags; `$SDKROOT` is expanded by the shell.
  pub extra_cflags: &'static [&'static str],
}

const CATALYST_CFLAGS: &[&str] = &[
  "-isystem $SDKROOT/System/iOSSupport/usr/include",
  "-iframework $SDKROOT/System/iOSSupport/System/Library/Frameworks",
];

/// Indexed by `PlatformId as usize`.
static PLATFORMS: [Platform; 6] = [
  Platform {
    id: PlatformId::IPhoneOs,
    arch: Arch::Arm64,
    sdk: Sdk::IPhoneOs,
    slice: Slice::Ios,
    min_os_version: "13.0",
    target_triple: "arm64-apple-ios13.0",
    host_triple: "aarch64-apple-darwin",
    openssl_target: "ios64-xcrun",
    cmake_system_name: "iOS",
    extra_cflags: &[],
  },
  Platform {
    id: PlatformId::IPhoneSimulator,
    arch: Arch::X86_64,
    sdk: Sdk::IPhoneSimulator,
    slice: Slice::IosSimulator,
    min_os_version: "13.0",
    target_triple: "x86_64-apple-ios13.0-simulator",
    host_triple: "x86_64-apple-darwin",
    openssl_target: "iossimulator-xcrun",
    cmake_system_name: "iOS",
    extra_cflags: &[],
  },
  Platform {
    id: PlatformId::MacCatalyst,
    arch: Arch::X86_64,
    sdk: Sdk::MacOsx,
    slice: Slice::MacCatalyst,
    min_os_version: "14.0",
    target_triple: "x86_64-apple-ios14.0-macabi",
    host_triple: "x86_64-apple-darwin",
    openssl_target: "darwin64-x86_64-cc",
    cmake_system_name: "Darwin",
    extra_cflags: CATALYST_CFLAGS,
  },
  Platform {
    id: PlatformId::MacCatalystArm64,
    arch: Arch::Arm64,
    sdk: Sdk::MacOsx,
    slice: Slice::MacCatalyst,
    min_os_version: "14.0",
    target_triple: "arm64-apple-ios14.0-macabi",
    host_triple: "aarch64-apple-darwin",
    openssl_target: "darwin64-arm64-cc",
    cmake_system_name: "Darwin",
    extra_cflags: CATALYST_CFLAGS,
  },
  Platform {
    id: PlatformId::MacOsx,
    arch: Arch::X86_64,
    sdk: Sdk::MacOsx,
    slice: Slice::MacOs,
    min_os_version: "10.15",
    target_triple: "x86_64-apple-macos10.15",
    host_triple: "x86_64-apple-darwin",
    openssl_target: "darwin64-x86_64-cc",
    cmake_system_name: "Darwin",
    extra_cflags: &[],
  },
  Platform {
    id: PlatformId::MacOsxArm64,
    arch: Arch::Arm64,
    sdk: Sdk::MacOsx,
    slice: Slice::MacOs,
    min_os_version: "11.0",
    target_triple: "arm64-apple-macos11.0",
    host_triple: "aarch64-apple-darwin",
    openssl_target: "darwin64-arm64-cc",
    cmake_system_name: "Darwin",
    extra_cflags: &[],
  },
];

impl Platform {
  /// Compiler flags shared by every dependency built for this platform.
  pub fn cflags(&self) -> String {
    let mut flags = vec![format!("-target {}", self.target_triple), "-isysroot $SDKROOT".to_string()];
    flags.extend(self.extra_cflags.iter().map(|f| f.to_string()));
    flags.push("-O2".to_string());
    flags.join(" ")
  }
}
