use std::{fs::OpenOptions, io::Write, path::Path};

use crate::Configuration;
use anyhow::Result;

/// Generates the linker script `memory.x`, which confines the loader to the
/// configured bootloader region and the RAM of the target.
pub fn generate_linker_script(out_dir: &Path, configuration: &Configuration) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(out_dir.join("memory.x"))?;

    let flash = configuration.memory_map.bootloader;
    let ram = configuration.port.ram();

    write!(
        file,
        "MEMORY\n\
         {{\n\
             FLASH : ORIGIN = 0x{:08X}, LENGTH = {}K\n\
             RAM : ORIGIN = 0x{:08X}, LENGTH = {}K\n\
         }}\n",
        flash.start,
        flash.size / 1024,
        ram.origin,
        ram.size / 1024,
    )?;

    Ok(())
}
