//! External tool invocation: `mp4decrypt` for decryption, `ffmpeg` for muxing.
//!
//! Processes are started through [`CommandRunner`] so tests can record the
//! command lines instead of spawning binaries.
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::license::LicenseKey;

/// Runs a program to completion and reports its exit code.
pub trait CommandRunner {
    /// `Ok(None)` means the process ended without an exit code (e.g. killed
    /// by a signal).
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>> {
        (**self).run(program, args)
    }
}

/// [`CommandRunner`] that spawns real processes and waits for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>> {
        let status = Command::new(program).args(args).status()?;
        Ok(status.code())
    }
}

fn spawn_error(tool: &str, path: &Path, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => Error::ToolNotFound {
            tool: tool.to_string(),
            path: path.display().to_string(),
        },
        _ => Error::IoError(err),
    }
}

/// Wrapper around the `mp4decrypt` executable.
#[derive(Debug, Clone)]
pub struct Decryptor<R> {
    runner: R,
    executable: PathBuf,
}

impl<R: CommandRunner> Decryptor<R> {
    pub fn new(runner: R, executable: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            executable: executable.into(),
        }
    }

    /// Decrypt track 1 of `input` into `output`.
    ///
    /// Runs `mp4decrypt --key 1:<hex key> <input> <output>`.
    pub fn decrypt(&self, input: &Path, output: &Path, key: &LicenseKey) -> Result<()> {
        let args = vec![
            OsString::from("--key"),
            OsString::from(format!("1:{}", key.as_hex())),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ];
        debug!("Decrypting {} -> {}", input.display(), output.display());

        let code = self
            .runner
            .run(&self.executable, &args)
            .map_err(|e| spawn_error("mp4decrypt", &self.executable, e))?;
        if code != Some(0) {
            return Err(Error::DecryptionFailed { code });
        }
        Ok(())
    }
}

/// Wrapper around the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct Muxer<R> {
    runner: R,
    executable: PathBuf,
}

impl<R: CommandRunner> Muxer<R> {
    pub fn new(runner: R, executable: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            executable: executable.into(),
        }
    }

    /// Stream-copy all `inputs` into one container at `output`.
    ///
    /// Runs `ffmpeg -i <in1> [-i <in2> ...] -c copy <output> -y -loglevel error`,
    /// overwriting `output` if it exists.
    pub fn mux(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        let mut args: Vec<OsString> = Vec::with_capacity(inputs.len() * 2 + 6);
        for input in inputs {
            args.push(OsString::from("-i"));
            args.push(input.as_os_str().to_owned());
        }
        args.push(OsString::from("-c"));
        args.push(OsString::from("copy"));
        args.push(output.as_os_str().to_owned());
        args.extend(["-y", "-loglevel", "error"].into_iter().map(OsString::from));
        debug!("Merging {} tracks into {}", inputs.len(), output.display());

        let code = self
            .runner
            .run(&self.executable, &args)
            .map_err(|e| spawn_error("ffmpeg", &self.executable, e))?;
        if code != Some(0) {
            return Err(Error::MuxFailed { code });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Recorder {
        result: fn() -> io::Result<Option<i32>>,
        calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
    }

    impl Recorder {
        fn new(result: fn() -> io::Result<Option<i32>>) -> Self {
            Self {
                result,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for Recorder {
        fn run(&self, program: &Path, args: &[OsString]) -> io::Result<Option<i32>> {
            self.calls.borrow_mut().push((
                program.to_path_buf(),
                args.iter().map(|a| a.to_string_lossy().into_owned()).collect(),
            ));
            (self.result)()
        }
    }

    #[test]
    fn decrypt_command_line() {
        let runner = Recorder::new(|| Ok(Some(0)));
        let key = LicenseKey::from_bytes(&[0xab, 0xcd]);
        Decryptor::new(&runner, "/opt/mp4decrypt")
            .decrypt(Path::new("in.mp4.enc"), Path::new("in.mp4"), &key)
            .expect("decrypt");

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].0, PathBuf::from("/opt/mp4decrypt"));
        assert_eq!(calls[0].1, ["--key", "1:abcd", "in.mp4.enc", "in.mp4"]);
    }

    #[test]
    fn mux_command_line() {
        let runner = Recorder::new(|| Ok(Some(0)));
        Muxer::new(&runner, "ffmpeg")
            .mux(
                &[PathBuf::from("a.aac"), PathBuf::from("v.mp4")],
                Path::new("out.mp4"),
            )
            .expect("mux");

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].1,
            ["-i", "a.aac", "-i", "v.mp4", "-c", "copy", "out.mp4", "-y", "-loglevel", "error"]
        );
    }

    #[test]
    fn missing_executable_is_tool_not_found() {
        let runner = Recorder::new(|| Err(io::Error::from(io::ErrorKind::NotFound)));
        let key = LicenseKey::from_bytes(&[1]);
        let err = Decryptor::new(&runner, "./mp4decrypt")
            .decrypt(Path::new("a"), Path::new("b"), &key)
            .expect_err("not found");
        assert!(matches!(err, Error::ToolNotFound { ref tool, .. } if tool == "mp4decrypt"));
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let runner = Recorder::new(|| Ok(Some(1)));
        let err = Muxer::new(&runner, "ffmpeg")
            .mux(&[PathBuf::from("a")], Path::new("b"))
            .expect_err("ffmpeg failed");
        assert!(matches!(err, Error::MuxFailed { code: Some(1) }));
    }

    #[test]
    fn system_runner_reports_missing_binary() {
        let err = SystemRunner
            .run(Path::new("./definitely-not-a-real-tool"), &[])
            .expect_err("spawn fails");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
