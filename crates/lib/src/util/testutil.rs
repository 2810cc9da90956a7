//! Test utilities for xcforge-lib.
//!
//! Stand-ins for the Apple-only tools so merge and packaging logic can be
//! exercised on any Unix host.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Archiver, Tools};

/// Write an executable shell script.
pub fn write_script(path: &Path, body: &str) -> PathBuf {
  fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
  fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
  path.to_path_buf()
}

/// A fake `lipo`: `-create` concatenates its inputs, `-archs` prints `archs`.
pub fn fake_lipo(dir: &Path, archs: &str) -> PathBuf {
  write_script(
    &dir.join("lipo"),
    &format!(
      r#"set -e
case "$1" in
  -create)
    shift
    files=""
    while [ "$#" -gt 0 ]; do
      case "$1" in
        -output) out="$2"; shift 2 ;;
        *) files="$files $1"; shift ;;
      esac
    done
    cat $files > "$out"
    ;;
  -archs)
    echo "{archs}"
    ;;
  *)
    exit 1
    ;;
esac
"#
    ),
  )
}

/// A fake `xcodebuild -create-xcframework`: one `slice<N>` directory per
/// `-library`/`-headers` pair plus an `Info.plist`.
pub fn fake_xcodebuild(dir: &Path) -> PathBuf {
  write_script(
    &dir.join("xcodebuild"),
    r#"set -e
[ "$1" = "-create-xcframework" ] || exit 1
shift
n=0
libs=""
heads=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    -library) libs="$libs $2"; shift 2 ;;
    -headers) heads="$heads $2"; shift 2 ;;
    -output) out="$2"; shift 2 ;;
    *) exit 1 ;;
  esac
done
[ -e "$out" ] && { echo "error: $out already exists" >&2; exit 1; }
mkdir -p "$out"
set -- $heads
for lib in $libs; do
  mkdir -p "$out/slice$n"
  cp "$lib" "$out/slice$n/"
  cp -R "$1" "$out/slice$n/Headers"
  shift
  n=$((n + 1))
done
echo "<plist/>" > "$out/Info.plist"
"#,
  )
}

/// Tools pointing at fakes in `dir`, archiving with whatever the host has.
pub fn fake_tools(dir: &Path, archs: &str) -> Tools {
  Tools {
    archiver: host_archiver().unwrap_or(Archiver::Ar),
    ar: "ar".to_string(),
    libtool: "libtool".to_string(),
    lipo: fake_lipo(dir, archs).to_string_lossy().into_owned(),
    xcodebuild: fake_xcodebuild(dir).to_string_lossy().into_owned(),
  }
}

/// The archiver this host can merge with: GNU `ar` with MRI scripts, or
/// Apple's `libtool`.
pub fn host_archiver() -> Option<Archiver> {
  let reports = |program: &str, flag: &str, marker: &str| {
    Command::new(program)
      .arg(flag)
      .output()
      .map(|o| {
        let text = format!("{}{}", String::from_utf8_lossy(&o.stdout), String::from_utf8_lossy(&o.stderr));
        text.contains(marker)
      })
      .unwrap_or(false)
  };

  if reports("ar", "--version", "GNU") {
    Some(Archiver::Ar)
  } else if reports("libtool", "-V", "Apple") {
    Some(Archiver::Libtool)
  } else {
    None
  }
}

/// Fail the calling test unless the host can merge archives.
pub fn require_archiver() {
  assert!(
    host_archiver().is_some(),
    "archive tests need GNU ar (binutils) or Apple libtool (Xcode command line tools) on PATH"
  );
}

/// Create a static archive at `path` containing one small member per name.
///
/// Apple's `libtool` only accepts real objects, so on macOS each member is
/// compiled from a one-function C file.
pub fn make_archive(path: &Path, members: &[&str]) -> PathBuf {
  let work = path.with_extension("members");
  fs::create_dir_all(&work).unwrap();
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).unwrap();
  }
  let archive_stem = symbol_part(&path.file_stem().unwrap().to_string_lossy());
  let mut cmd = Command::new("ar");
  cmd.arg("rc").arg(path);
  for name in members {
    let member = work.join(name);
    if cfg!(target_os = "macos") {
      let source = member.with_extension("c");
      let symbol = format!("{archive_stem}_{}", symbol_part(name));
      fs::write(&source, format!("int {symbol}(void) {{ return 0; }}\n")).unwrap();
      let status = Command::new("cc").arg("-c").arg(&source).arg("-o").arg(&member).status().unwrap();
      assert!(status.success(), "cc failed for {}", source.display());
    } else {
      fs::write(&member, format!("object {name}\n")).unwrap();
    }
    cmd.arg(&member);
  }
  let status = cmd.status().unwrap();
  assert!(status.success(), "ar rc failed for {}", path.display());
  path.to_path_buf()
}

fn symbol_part(name: &str) -> String {
  name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Set a file's modification time to `secs` after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
  let time = std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs);
  fs::File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(time)
    .unwrap();
}
