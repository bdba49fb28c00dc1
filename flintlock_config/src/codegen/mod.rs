//! Code generation for the build script. Everything written here is
//! `include!`d by the loader, so every path is fully qualified.
use std::{fs::File, io::Write, path::Path};

use anyhow::{anyhow, Result};
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use crate::{
    boot::Dfu,
    erase::{EraseStep, EraseTarget},
    memory::{MemoryMap, Partition},
    Configuration,
};

mod linker_script;
mod prettify;
pub use linker_script::generate_linker_script;

/// Generates `layout.rs`, holding the memory map, boot policy and erase
/// plan constants the loader is built around.
pub fn generate_layout(out_dir: &Path, configuration: &Configuration) -> Result<()> {
    let problems = configuration.problems();
    if !problems.is_empty() {
        let report = problems.iter().map(|p| p.to_string()).collect::<Vec<_>>().join("\n");
        return Err(anyhow!("Configuration is incomplete:\n{}", report));
    }

    let code = layout_tokens(configuration)?;
    let path = out_dir.join("layout.rs");
    let mut file = File::create(&path)?;
    file.write_all(format!("// Generated by flintlock_config. Do not edit.\n{}", code).as_bytes())?;
    drop(file);

    // Formatting only helps whoever reads the generated file.
    let _ = prettify::prettify_file(&path);
    Ok(())
}

fn layout_tokens(configuration: &Configuration) -> Result<TokenStream> {
    let map = &configuration.memory_map;
    let record_sector_size = Literal::usize_unsuffixed(map.record_sector_size as usize);
    let bootloader_start = Literal::u32_unsuffixed(map.bootloader.start);
    let bootloader_size = Literal::usize_unsuffixed(map.bootloader.size as usize);
    let flip = partition_tokens("Flip", map, &map.flip)?;
    let flop = partition_tokens("Flop", map, &map.flop)?;
    let steps = configuration.erase_plan.iter().map(step_tokens).collect::<Result<Vec<_>>>()?;
    let policy = policy_tokens(configuration);

    Ok(quote! {
        pub const RECORD_SECTOR_SIZE: usize = #record_sector_size;
        pub const MEMORY_MAP: crate::devices::memory_map::MemoryMap =
            crate::devices::memory_map::MemoryMap {
                bootloader: crate::utilities::memory::Region {
                    start: crate::utilities::memory::Address(#bootloader_start),
                    size: #bootloader_size,
                },
                flip: #flip,
                flop: #flop,
                erase_plan: &[#(#steps),*],
            };
        pub const BOOT_POLICY: crate::devices::memory_map::BootPolicy = #policy;
    })
}

fn partition_tokens(bank: &str, map: &MemoryMap, partition: &Partition) -> Result<TokenStream> {
    let bank = format_ident!("{}", bank);
    let header = Literal::u32_unsuffixed(partition.header);
    let base = Literal::u32_unsuffixed(partition.base);
    let size = Literal::usize_unsuffixed(partition.size as usize);
    let firmware_entry = Literal::u32_unsuffixed(map.entry_point(partition.firmware_kernel));
    let dfu_entry = Literal::u32_unsuffixed(map.entry_point(partition.dfu_kernel));
    let flash_bank = flash_bank(partition.flash_bank)?;

    Ok(quote! {
        crate::devices::memory_map::PartitionLayout {
            bank: crate::devices::firmware::Bank::#bank,
            header: crate::utilities::memory::Address(#header),
            base: crate::utilities::memory::Address(#base),
            size: #size,
            firmware_entry: crate::utilities::memory::EntryPoint(#firmware_entry),
            dfu_entry: crate::utilities::memory::EntryPoint(#dfu_entry),
            flash_bank: #flash_bank,
        }
    })
}

fn step_tokens(step: &EraseStep) -> Result<TokenStream> {
    let label = Literal::string(&step.label);
    let marker = Literal::u8_unsuffixed(step.marker);
    let targets = step
        .targets
        .iter()
        .map(|target| match target {
            EraseTarget::Sector(address) => {
                let address = Literal::u32_unsuffixed(*address);
                Ok(quote! {
                    crate::devices::memory_map::EraseTarget::Sector(
                        crate::utilities::memory::Address(#address)
                    )
                })
            }
            EraseTarget::Bank(bank) => {
                let bank = flash_bank(*bank)?;
                Ok(quote! { crate::devices::memory_map::EraseTarget::Bank(#bank) })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(quote! {
        crate::devices::memory_map::EraseStep {
            label: #label,
            targets: &[#(#targets),*],
            marker: crate::hal::otp::OtpBlock(#marker),
        }
    })
}

fn policy_tokens(configuration: &Configuration) -> TokenStream {
    let boot = &configuration.boot;
    let rdp_check = boot.rdp_check;
    let dfu_wait = match boot.dfu {
        Dfu::Enabled { windows, window_ms } => {
            let windows = Literal::u32_unsuffixed(windows);
            let window_ms = Literal::u32_unsuffixed(window_ms);
            quote! {
                Some(crate::devices::memory_map::DfuWait {
                    windows: #windows,
                    window: crate::hal::time::Milliseconds(#window_ms),
                })
            }
        }
        Dfu::Disabled => quote! { None },
    };
    let retained_keys = match boot.retained_keys {
        Some(keys) => {
            let source = Literal::u32_unsuffixed(keys.source);
            let length = Literal::usize_unsuffixed(keys.length as usize);
            quote! {
                Some(crate::utilities::memory::KeyRegion {
                    source: crate::utilities::memory::Address(#source),
                    length: #length,
                })
            }
        }
        None => quote! { None },
    };

    quote! {
        crate::devices::memory_map::BootPolicy {
            rdp_check: #rdp_check,
            dfu_wait: #dfu_wait,
            retained_keys: #retained_keys,
        }
    }
}

fn flash_bank(index: u8) -> Result<TokenStream> {
    match index {
        1 => Ok(quote! { crate::hal::flash::FlashBank::One }),
        2 => Ok(quote! { crate::hal::flash::FlashBank::Two }),
        other => Err(anyhow!("Flash bank {} does not exist", other)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Configuration {
        ron::from_str(include_str!("../../sample_configurations/stm32f429_dual_bank.ron"))
            .expect("sample configuration parses")
    }

    #[test]
    fn layout_names_every_generated_constant() {
        let code = layout_tokens(&sample()).unwrap().to_string();
        assert!(code.contains("pub const MEMORY_MAP"));
        assert!(code.contains("pub const BOOT_POLICY"));
        assert!(code.contains("pub const RECORD_SECTOR_SIZE"));
        assert!(code.contains("EraseStep"));
    }

    #[test]
    fn unknown_flash_bank_is_rejected() {
        assert!(flash_bank(3).is_err());
        assert!(flash_bank(1).is_ok());
    }
}
