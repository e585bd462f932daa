use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use serde::Serialize;

use crate::domain::OutputTarget;
use crate::error::EnaError;

/// Writes each line verbatim plus a `\n` terminator and returns how many were written.
pub fn write_lines<I, L, W>(lines: I, out: &mut W) -> Result<usize, EnaError>
where
    I: IntoIterator<Item = Result<L, EnaError>>,
    L: AsRef<[u8]>,
    W: Write + ?Sized,
{
    let mut count = 0usize;
    for line in lines {
        let line = line?;
        out.write_all(line.as_ref())
            .and_then(|_| out.write_all(b"\n"))
            .map_err(|err| EnaError::Filesystem(err.to_string()))?;
        count += 1;
    }
    out.flush()
        .map_err(|err| EnaError::Filesystem(err.to_string()))?;
    Ok(count)
}

/// Streams lines to stdout or a file. A file is closed on every exit path; stdout never is.
pub fn write_to_target<I, L>(lines: I, target: &OutputTarget) -> Result<usize, EnaError>
where
    I: IntoIterator<Item = Result<L, EnaError>>,
    L: AsRef<[u8]>,
{
    match target {
        OutputTarget::Stdout => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_lines(lines, &mut handle)
        }
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|err| EnaError::Filesystem(format!("create {parent}: {err}")))?;
            }
            let file = File::create(path)
                .map_err(|err| EnaError::Filesystem(format!("create {path}: {err}")))?;
            let mut writer = BufWriter::new(file);
            write_lines(lines, &mut writer)
        }
    }
}

/// Pretty-printed JSON followed by a newline.
pub fn write_json<T, W>(value: &T, out: &mut W) -> Result<(), EnaError>
where
    T: Serialize + ?Sized,
    W: Write + ?Sized,
{
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| EnaError::Filesystem(err.to_string()))?;
    out.write_all(json.as_bytes())
        .and_then(|_| out.write_all(b"\n"))
        .and_then(|_| out.flush())
        .map_err(|err| EnaError::Filesystem(err.to_string()))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), EnaError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(value, &mut handle)
}
