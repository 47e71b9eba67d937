//! Purpose: Hold top-level CLI command execution for `tabchannel`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `cat` and `write` report open failures; `copy` keeps the masking contract.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Cat { path, json } => cat(&path, json),
        Command::Write { path } => write_from_reader(&path, io::stdin().lock()),
        Command::Copy { src, dst } => copy(&src, &dst),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "tabchannel", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn cat(path: &Path, json: bool) -> Result<RunOutcome, Error> {
    let mut channel = notice_channel();
    channel.try_open(path, Mode::Read)?;
    let mut out = io::stdout().lock();
    for record in channel.records() {
        let record = record?;
        if json {
            serde_json::to_writer(&mut out, &record).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode record")
                    .with_source(err)
            })?;
            writeln!(out).map_err(stdout_error)?;
        } else {
            let line = record.fields().collect::<Vec<_>>().join("\t");
            writeln!(out, "{line}").map_err(stdout_error)?;
        }
    }
    channel.close()?;
    Ok(RunOutcome::ok())
}

fn write_from_reader<R: BufRead>(path: &Path, input: R) -> Result<RunOutcome, Error> {
    let mut channel = notice_channel();
    channel.try_open(path, Mode::Write)?;
    let mut written = 0u64;
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read stdin")
                .with_source(err)
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_fields_line(&line, index + 1)?;
        channel.write(&fields)?;
        written += 1;
    }
    channel.close()?;
    emit_json(json!({ "written": written, "path": path.to_string_lossy() }))?;
    Ok(RunOutcome::ok())
}

fn parse_fields_line(line: &str, line_no: usize) -> Result<Vec<String>, Error> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("line {line_no}: invalid JSON"))
            .with_hint("Each stdin line must be a JSON array of strings, e.g. [\"a\",\"b\"].")
            .with_source(err)
    })?;
    if value.is_object() {
        let record = serde_json::from_value::<Record>(value).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("line {line_no}: invalid record object"))
                .with_source(err)
        })?;
        return Ok(record.fields().map(str::to_string).collect());
    }
    serde_json::from_value::<Vec<String>>(value).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("line {line_no}: expected an array of strings"))
            .with_hint("Each stdin line must be a JSON array of strings, e.g. [\"a\",\"b\"].")
            .with_source(err)
    })
}

fn copy(src: &Path, dst: &Path) -> Result<RunOutcome, Error> {
    let mut reader = notice_channel();
    let mut writer = notice_channel();
    reader.open(src, Mode::Read);
    writer.open(dst, Mode::Write);

    let mut copied = 0u64;
    let mut column1 = None;
    let mut column2 = None;
    while reader.read_into(&mut column1, &mut column2)? {
        writer.write(column1.iter().chain(column2.iter()))?;
        copied += 1;
    }
    writer.close()?;
    reader.close()?;
    emit_json(json!({ "copied": copied }))?;
    Ok(RunOutcome::ok())
}
