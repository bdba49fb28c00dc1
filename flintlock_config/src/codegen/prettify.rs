use std::{io, path::Path, process::Command};

/// Runs `rustfmt` over a generated file.
pub fn prettify_file<P: AsRef<Path>>(path: P) -> io::Result<()> {
    Command::new("rustfmt").arg(path.as_ref()).spawn()?.wait()?;
    Ok(())
}
