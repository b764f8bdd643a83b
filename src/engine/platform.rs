//! Engine build selection.
//!
//! Pure functions of an [`Environment`] and a file-existence predicate, so the
//! OS/CPU dispatch can be exercised without the real host or file system.

use crate::error::ConfigError;
use crate::model::{CpuArch, EnginePaths, Environment, OsFamily, PlatformProfile};
use std::path::Path;

const WINDOWS_EXECUTABLE: &str = "lisp.exe";
const UNIX_EXECUTABLE: &str = "lisp.run";

fn engine_dir_name(profile: &str) -> String {
    format!("clisp-{profile}")
}

/// Pick the engine build for `env` under `root`.
pub fn resolve_profile(
    env: &Environment,
    root: &Path,
    exists: impl Fn(&Path) -> bool,
) -> Result<PlatformProfile, ConfigError> {
    let (mut name, executable) = match (&env.os, &env.arch) {
        (OsFamily::Windows, _) => ("win", WINDOWS_EXECUTABLE),
        (OsFamily::MacOs, CpuArch::AppleSilicon) => ("mac-arm64", UNIX_EXECUTABLE),
        (OsFamily::MacOs, CpuArch::Intel) => ("mac-intel", UNIX_EXECUTABLE),
        (OsFamily::MacOs, CpuArch::Other(arch)) => {
            return Err(ConfigError::UnsupportedArch { arch: arch.clone() })
        }
        (OsFamily::Linux | OsFamily::Other, _) => ("linux", UNIX_EXECUTABLE),
    };

    let mut engine_dir = root.join(engine_dir_name(name));
    let mut fell_back = false;

    // Apple silicon runs the Intel build under binary translation.
    if env.os == OsFamily::MacOs && env.arch == CpuArch::AppleSilicon && !exists(&engine_dir) {
        name = "mac-intel";
        engine_dir = root.join(engine_dir_name(name));
        fell_back = true;
    }

    if !exists(&engine_dir) {
        return Err(ConfigError::EngineDirMissing {
            profile: name.to_string(),
            path: engine_dir,
        });
    }

    Ok(PlatformProfile {
        os: env.os,
        arch: env.arch.clone(),
        name,
        executable,
        engine_dir,
        fell_back,
    })
}

/// Check that the executable and memory image are present in the engine directory.
pub fn locate_artifacts(
    profile: &PlatformProfile,
    memory_image: &str,
    exists: impl Fn(&Path) -> bool,
) -> Result<EnginePaths, ConfigError> {
    let executable = profile.engine_dir.join(profile.executable);
    if !exists(&executable) {
        return Err(ConfigError::ExecutableMissing { path: executable });
    }
    let memory_image = profile.engine_dir.join(memory_image);
    if !exists(&memory_image) {
        return Err(ConfigError::MemoryImageMissing { path: memory_image });
    }
    Ok(EnginePaths {
        executable,
        memory_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn fs(paths: &[&str]) -> impl Fn(&Path) -> bool {
        let set: HashSet<PathBuf> = paths.iter().map(PathBuf::from).collect();
        move |p: &Path| set.contains(p)
    }

    fn env(os: OsFamily, arch: CpuArch) -> Environment {
        Environment { os, arch }
    }

    #[test]
    fn windows_uses_lisp_exe() {
        let p = resolve_profile(
            &env(OsFamily::Windows, CpuArch::Intel),
            Path::new("/app"),
            fs(&["/app/clisp-win"]),
        )
        .unwrap();
        assert_eq!(p.name, "win");
        assert_eq!(p.executable, "lisp.exe");
        assert!(p.is_windows());
    }

    #[test]
    fn linux_and_unknown_os_use_linux_build() {
        for os in [OsFamily::Linux, OsFamily::Other] {
            let p = resolve_profile(
                &env(os, CpuArch::Other("riscv64".into())),
                Path::new("/app"),
                fs(&["/app/clisp-linux"]),
            )
            .unwrap();
            assert_eq!(p.name, "linux");
            assert_eq!(p.executable, "lisp.run");
            assert_eq!(p.engine_dir, PathBuf::from("/app/clisp-linux"));
        }
    }

    #[test]
    fn apple_silicon_prefers_native_build() {
        let p = resolve_profile(
            &env(OsFamily::MacOs, CpuArch::AppleSilicon),
            Path::new("/app"),
            fs(&["/app/clisp-mac-arm64", "/app/clisp-mac-intel"]),
        )
        .unwrap();
        assert_eq!(p.name, "mac-arm64");
        assert!(!p.fell_back);
    }

    #[test]
    fn apple_silicon_falls_back_to_intel() {
        let p = resolve_profile(
            &env(OsFamily::MacOs, CpuArch::AppleSilicon),
            Path::new("/app"),
            fs(&["/app/clisp-mac-intel"]),
        )
        .unwrap();
        assert_eq!(p.name, "mac-intel");
        assert_eq!(p.executable, "lisp.run");
        assert_eq!(p.engine_dir, PathBuf::from("/app/clisp-mac-intel"));
        assert!(p.fell_back);
    }

    #[test]
    fn intel_mac_never_falls_back() {
        let err = resolve_profile(
            &env(OsFamily::MacOs, CpuArch::Intel),
            Path::new("/app"),
            fs(&["/app/clisp-mac-arm64"]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EngineDirMissing { ref profile, .. } if profile == "mac-intel"));
    }

    #[test]
    fn unknown_mac_cpu_is_fatal() {
        let err = resolve_profile(
            &env(OsFamily::MacOs, CpuArch::Other("powerpc".into())),
            Path::new("/app"),
            |_: &Path| true,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedArch { ref arch } if arch == "powerpc"));
    }

    #[test]
    fn missing_everything_after_fallback() {
        let err = resolve_profile(
            &env(OsFamily::MacOs, CpuArch::AppleSilicon),
            Path::new("/app"),
            fs(&[]),
        )
        .unwrap_err();
        match err {
            ConfigError::EngineDirMissing { profile, path } => {
                assert_eq!(profile, "mac-intel");
                assert_eq!(path, PathBuf::from("/app/clisp-mac-intel"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn artifacts_checked_in_order() {
        let profile = resolve_profile(
            &env(OsFamily::Linux, CpuArch::Intel),
            Path::new("/app"),
            fs(&["/app/clisp-linux"]),
        )
        .unwrap();

        let err = locate_artifacts(&profile, "actr6.mem", fs(&["/app/clisp-linux"])).unwrap_err();
        assert!(matches!(err, ConfigError::ExecutableMissing { .. }));

        let err = locate_artifacts(
            &profile,
            "actr6.mem",
            fs(&["/app/clisp-linux/lisp.run"]),
        )
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::MemoryImageMissing { ref path } if path == Path::new("/app/clisp-linux/actr6.mem"))
        );

        let paths = locate_artifacts(
            &profile,
            "actr6.mem",
            fs(&["/app/clisp-linux/lisp.run", "/app/clisp-linux/actr6.mem"]),
        )
        .unwrap();
        assert_eq!(paths.executable, PathBuf::from("/app/clisp-linux/lisp.run"));
        assert_eq!(paths.memory_image, PathBuf::from("/app/clisp-linux/actr6.mem"));
    }
}
