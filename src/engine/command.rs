use crate::error::ConfigError;
use crate::model::EnginePaths;
use std::path::{Path, PathBuf};

const QUIET_FLAG: &str = "-q";
const ENCODING_FLAG: &str = "-E";
// Some machines fail to start CLISP with its default UTF-8 encoding.
const ENGINE_ENCODING: &str = "ISO-8859-1";
const MEMORY_IMAGE_FLAG: &str = "-M";
const LOAD_FLAG: &str = "-i";
const EXECUTE_FLAG: &str = "-x";

/// Build the engine argument vector, executable first.
///
/// The order is fixed by the engine's argument parser. Paths must be valid
/// UTF-8; a lossy conversion would hand the engine a path it cannot open.
pub fn build_command(
    paths: &EnginePaths,
    files_to_load: &[PathBuf],
    initial_command: &str,
    quote_for_windows: bool,
) -> Result<Vec<String>, ConfigError> {
    let mut argv = Vec::with_capacity(7 + files_to_load.len() * 2);
    argv.push(path_arg(&paths.executable)?);
    argv.push(QUIET_FLAG.to_string());
    argv.push(ENCODING_FLAG.to_string());
    argv.push(ENGINE_ENCODING.to_string());
    argv.push(MEMORY_IMAGE_FLAG.to_string());
    argv.push(path_arg(&paths.memory_image)?);
    for file in files_to_load {
        argv.push(LOAD_FLAG.to_string());
        argv.push(path_arg(file)?);
    }
    argv.push(EXECUTE_FLAG.to_string());
    argv.push(initial_command.to_string());

    if quote_for_windows {
        argv.iter_mut().for_each(|arg| *arg = quote_windows_arg(arg));
    }
    Ok(argv)
}

fn path_arg(path: &Path) -> Result<String, ConfigError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::NonUtf8Path {
            path: path.to_path_buf(),
        })
}

/// Wrap `arg` in double quotes if it contains a space.
pub fn quote_windows_arg(arg: &str) -> String {
    if arg.contains(' ') {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}
