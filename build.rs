use anyhow::{anyhow, Result};
use flintlock_config::{
    codegen::{generate_layout, generate_linker_script},
    Configuration,
};
use std::{env, fs, path::PathBuf};

const DEFAULT_CONFIG_FILENAME: &str = "stm32f429_dual_bank.ron";

fn main() -> Result<()> {
    let configuration = process_configuration_file()?;
    validate_feature_flags_against_configuration(&configuration)?;

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    generate_layout(&out_dir, &configuration)?;

    if env::var("CARGO_CFG_TARGET_ARCH").as_deref() == Ok("arm") {
        generate_linker_script(&out_dir, &configuration)?;
        println!("cargo:rustc-link-search={}", out_dir.display());
    }

    Ok(())
}

fn process_configuration_file() -> Result<Configuration> {
    println!("cargo:rerun-if-env-changed=FLINTLOCK_CONFIG");
    println!(
        "cargo:rerun-if-changed=./flintlock_config/sample_configurations/{}",
        DEFAULT_CONFIG_FILENAME
    );

    let filename = env::var("FLINTLOCK_CONFIG").unwrap_or_else(|_| {
        format!("./flintlock_config/sample_configurations/{}", DEFAULT_CONFIG_FILENAME)
    });
    println!("cargo:rerun-if-changed={}", filename);

    let contents = fs::read_to_string(&filename)?;
    let configuration: Configuration = ron::from_str(&contents)?;
    Ok(configuration)
}

fn validate_feature_flags_against_configuration(configuration: &Configuration) -> Result<()> {
    let port_feature = format!("CARGO_FEATURE_{}", configuration.port.feature_name().to_uppercase());
    let any_port_selected = env::vars().any(|(key, _)| key == "CARGO_FEATURE_CORTEX_M_ANY");

    if any_port_selected && env::var(&port_feature).is_err() {
        return Err(anyhow!(
            "Mismatching port in configuration file. Configuration requires feature `{}`",
            configuration.port.feature_name()
        ));
    }
    Ok(())
}
