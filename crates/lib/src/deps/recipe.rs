//! Shell commands that drive each wrapped library's own build system.
//!
//! The commands are opaque to the scheduler. Each stage script starts with
//! the same prelude resolving the SDK and compiler for the platform, so
//! scripts stay runnable on their own when copied out of the log.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Dependency, DependencySpec};
use crate::platform::Platform;

/// Out-of-source build directory used by CMake based dependencies.
const CMAKE_BUILD_DIR: &str = "build";

/// Commands for configuring, compiling and installing one dependency on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
  pub configure: String,
  pub compile: String,
  pub install: String,
}

/// Paths a recipe needs, all resolved from the build layout.
#[derive(Debug, Clone)]
pub struct RecipePaths<'a> {
  pub source_dir: &'a Path,
  pub prefix: &'a Path,
  /// Install prefixes of upstream dependencies for the same platform.
  pub upstream: &'a BTreeMap<Dependency, PathBuf>,
}

impl Recipe {
  pub fn for_platform(spec: &DependencySpec, platform: &Platform, paths: &RecipePaths<'_>, make_jobs: usize) -> Self {
    let prelude = prelude(platform);
    let jobs = make_jobs.max(1);
    let prefix = quote(paths.prefix);

    let (configure, compile, install) = match spec.dependency {
      Dependency::OpenSsl => (
        format!(
          "./Configure {target} no-shared no-tests no-dso no-engine no-async --prefix={prefix} --openssldir={prefix}/ssl",
          target = platform.openssl_target,
        ),
        format!("make -j{jobs} build_libs"),
        "make install_dev".to_string(),
      ),
      Dependency::Libssh2 => {
        let openssl = upstream_prefix(paths, Dependency::OpenSsl);
        (
          format!(
            "export CPPFLAGS=\"-I{openssl}/include\"\n\
             export LDFLAGS=\"-L{openssl}/lib\"\n\
             ./configure --host={host} --prefix={prefix} --disable-shared --enable-static \
             --disable-examples-build --disable-tests --with-crypto=openssl --with-libssl-prefix={openssl}",
            host = platform.host_triple,
          ),
          format!("make -j{jobs}"),
          "make install".to_string(),
        )
      }
      Dependency::Libgit2 => {
        let openssl = upstream_prefix(paths, Dependency::OpenSsl);
        let libssh2 = upstream_prefix(paths, Dependency::Libssh2);
        (
          format!(
            "cmake -S . -B {CMAKE_BUILD_DIR} -DCMAKE_BUILD_TYPE=Release -DBUILD_SHARED_LIBS=OFF \
             -DBUILD_TESTS=OFF -DBUILD_CLI=OFF -DUSE_SSH=ON -DUSE_HTTPS=OpenSSL -DUSE_BUNDLED_ZLIB=ON \
             -DCMAKE_SYSTEM_NAME={system} -DCMAKE_OSX_SYSROOT=\"$SDKROOT\" -DCMAKE_OSX_ARCHITECTURES={arch} \
             -DCMAKE_OSX_DEPLOYMENT_TARGET={min_os} -DCMAKE_C_FLAGS=\"$CFLAGS\" \
             -DCMAKE_PREFIX_PATH=\"{openssl};{libssh2}\" -DOPENSSL_ROOT_DIR={openssl} \
             -DCMAKE_INSTALL_PREFIX={prefix}",
            system = platform.cmake_system_name,
            arch = platform.arch,
            min_os = platform.min_os_version,
          ),
          format!("cmake --build {CMAKE_BUILD_DIR} --config Release -j {jobs}"),
          format!("cmake --install {CMAKE_BUILD_DIR} --config Release"),
        )
      }
    };

    Self {
      configure: format!("{prelude}\n{configure}"),
      compile: format!("{prelude}\n{compile}"),
      install: format!("{prelude}\n{install}"),
    }
  }
}

/// Directory holding the raw compiled archive when the install step did not
/// place it in the prefix. Only CMake builds use a separate build directory.
pub fn raw_build_dir(dependency: Dependency, source_dir: &Path) -> PathBuf {
  match dependency {
    Dependency::Libgit2 => source_dir.join(CMAKE_BUILD_DIR),
    Dependency::OpenSsl | Dependency::Libssh2 => source_dir.to_path_buf(),
  }
}

fn prelude(platform: &Platform) -> String {
  format!(
    "set -e\n\
     export SDKROOT=\"{sdk_path}\"\n\
     export CC=\"$(xcrun --sdk {sdk} -f clang)\"\n\
     export CFLAGS=\"{cflags}\"",
    sdk_path = platform.sdk.path_expr(),
    sdk = platform.sdk.as_str(),
    cflags = platform.cflags(),
  )
}

fn upstream_prefix(paths: &RecipePaths<'_>, dependency: Dependency) -> String {
  paths
    .upstream
    .get(&dependency)
    .map(|p| quote(p))
    .unwrap_or_default()
}

/// Single-quote a path for `/bin/sh`.
pub fn quote(path: &Path) -> String {
  let s = path.to_string_lossy();
  if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || "/._-+=:".contains(c)) {
    return s.into_owned();
  }
  format!("'{}'", s.replace('\'', r"'\''"))
}
