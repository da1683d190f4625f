// Checker subprocess plumbing
//
// Checkers read their input line by line and choke on very long lines, so
// every line is cut into chunks of at most MAX_CHUNK_LEN bytes before it is
// written to the child's stdin.

use crate::encoding;
use crate::error::SpellError;
use serde_yaml::{Mapping, Value};
use std::io::{self, Write};
use std::process::{Command, Stdio};

/// Longest line handed to a checker, in bytes
pub const MAX_CHUNK_LEN: usize = 4095;

fn is_space(byte: u8) -> bool {
    byte.is_ascii_whitespace()
}

/// Cut one line into chunks no longer than `max` bytes.
///
/// Cuts land on whitespace when the window has any; a word longer than the
/// window is hard split on a UTF-8 boundary. Whitespace-only chunks are
/// dropped.
pub fn chunk_line(line: &[u8], max: usize) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut rest = line;

    while rest.len() > max {
        let split = (1..=max)
            .rev()
            .find(|&i| is_space(rest[i]))
            .unwrap_or_else(|| char_boundary(rest, max));
        let (chunk, tail) = rest.split_at(split);
        if !chunk.iter().all(|&b| is_space(b)) {
            chunks.push(chunk);
        }
        rest = tail;
    }

    if !rest.is_empty() && !rest.iter().all(|&b| is_space(b)) {
        chunks.push(rest);
    }
    chunks
}

fn char_boundary(bytes: &[u8], max: usize) -> usize {
    let mut split = max;
    while split > 0 && bytes[split] & 0b1100_0000 == 0b1000_0000 {
        split -= 1;
    }
    if split == 0 {
        max
    } else {
        split
    }
}

/// Write `payload` as checker input: chunked lines, each ending in `\n`
pub fn write_chunked<W: Write>(mut writer: W, payload: &[u8]) -> io::Result<()> {
    for line in payload.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        for chunk in chunk_line(line, MAX_CHUNK_LEN) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()
}

/// Run `program` with `args`, feed it `payload` and return its stdout
pub fn run_checker(program: &str, args: &[String], payload: &[u8]) -> Result<Vec<u8>, SpellError> {
    tracing::debug!("running {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SpellError::CheckerProcess(format!("could not start '{program}': {e}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| SpellError::CheckerProcess(format!("'{program}' has no stdin")))?;

    // stdin is fed from its own thread while stdout drains
    let (written, output) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || write_chunked(stdin, payload));
        let output = child.wait_with_output();
        (writer.join(), output)
    });

    let output = output
        .map_err(|e| SpellError::CheckerProcess(format!("'{program}' did not finish: {e}")))?;

    match written {
        Ok(Ok(())) => {}
        // early exit; the exit status below decides
        Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => {
            return Err(SpellError::CheckerProcess(format!(
                "could not write to '{program}': {e}"
            )))
        }
        Err(_) => {
            return Err(SpellError::CheckerProcess(format!(
                "input writer for '{program}' panicked"
            )))
        }
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpellError::CheckerProcess(format!(
            "'{program}' exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Render a checker option mapping into command line arguments.
///
/// With `negate_false`, `false` on a long flag renders as `--dont-<key>`;
/// otherwise it is left out.
pub fn render_options(
    checker: &str,
    options: &Mapping,
    allowed: &[&str],
    flag: fn(&str) -> String,
    negate_false: bool,
) -> Result<Vec<String>, SpellError> {
    let mut args = Vec::new();
    for (key, value) in options {
        let key = key.as_str().ok_or_else(|| {
            SpellError::config(format!("{checker}: option names must be strings, found {key:?}"))
        })?;
        if !allowed.contains(&key) {
            return Err(SpellError::config(format!("'{key}' is not a valid {checker} option")));
        }

        let values: Vec<&Value> = match value {
            Value::Sequence(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values {
            push_option(checker, &mut args, key, value, flag, negate_false)?;
        }
    }
    Ok(args)
}

fn push_option(
    checker: &str,
    args: &mut Vec<String>,
    key: &str,
    value: &Value,
    flag: fn(&str) -> String,
    negate_false: bool,
) -> Result<(), SpellError> {
    let rendered = match value {
        Value::Bool(true) => {
            args.push(flag(key));
            return Ok(());
        }
        Value::Bool(false) => {
            if negate_false && key.chars().count() > 1 {
                args.push(format!("--dont-{key}"));
            }
            return Ok(());
        }
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(SpellError::config(format!(
                "{checker}: option '{key}' must be a string, number, bool or list of them, found {other:?}"
            )))
        }
    };

    let flag = flag(key);
    if flag.starts_with("--") {
        args.push(format!("{flag}={rendered}"));
    } else {
        args.push(flag);
        args.push(rendered);
    }
    Ok(())
}

/// Checker output comes back in the encoding it was fed
pub fn decode_output(stdout: &[u8], encoding: Option<&str>) -> String {
    encoding
        .and_then(|label| encoding::decode(stdout, label).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(stdout).into_owned())
}

pub fn encode_words(words: &[String], encoding: &str) -> Result<Vec<u8>, SpellError> {
    let mut text = words.join("\n");
    text.push('\n');
    encoding::encode(&text, encoding)
        .map_err(|e| SpellError::config(format!("cannot encode dictionary words as {encoding}: {e:#}")))
}
