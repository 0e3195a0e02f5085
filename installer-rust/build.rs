use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};
use serde::Deserialize;

fn main() {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let manifest_dir = PathBuf::from(manifest_dir);
    let config = load_config(&manifest_dir).unwrap_or_else(|err| {
        panic!("failed to load installer.toml: {err}");
    });

    if let Err(err) = validate(&config) {
        panic!("invalid installer.toml: {err}");
    }

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "windows" {
        if let Err(err) = embed_resources(&manifest_dir, &config) {
            panic!("failed to embed resources: {err}");
        }
    }

    if let Err(err) = write_config_rs(&PathBuf::from(&out_dir), &config) {
        panic!("failed to write config: {err}");
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    name: String,
    display_name: String,
    version: String,
    executable: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    version_banner: String,
    association: Association,
    candidates: Candidates,
}

#[derive(Debug, Deserialize)]
struct Association {
    extension: String,
    type_tag: String,
    description: String,
    open_subcommand: String,
}

#[derive(Debug, Deserialize)]
struct Candidates {
    executable: Vec<String>,
    #[serde(default)]
    icon: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
}

fn load_config(manifest_dir: &Path) -> io::Result<Config> {
    let config_path = manifest_dir.join("installer.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    let cfg: Config = toml::from_str(&contents)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(cfg)
}

fn validate(config: &Config) -> Result<(), String> {
    if config.name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if config.executable.trim().is_empty() {
        return Err("executable is empty".to_string());
    }
    if config.candidates.executable.is_empty() {
        return Err("candidates.executable is empty".to_string());
    }
    if !config.association.extension.starts_with('.') {
        return Err(format!(
            "association.extension must start with '.': {}",
            config.association.extension
        ));
    }
    Ok(())
}

fn embed_resources(manifest_dir: &Path, config: &Config) -> io::Result<()> {
    let mut res = winres::WindowsResource::new();
    if let Some(icon_path) = resolve_icon_path(manifest_dir, config) {
        println!("cargo:rerun-if-changed={}", icon_path.display());
        res.set_icon(icon_path.to_string_lossy().as_ref());
    }
    res.set("ProductName", &config.display_name);
    res.set("FileDescription", &format!("{} installer", config.display_name));
    res.set("FileVersion", &config.version);
    res.set("ProductVersion", &config.version);
    res.compile()?;
    Ok(())
}

fn resolve_icon_path(manifest_dir: &Path, config: &Config) -> Option<PathBuf> {
    if config.icon.is_empty() {
        return None;
    }
    [manifest_dir.join(&config.icon), manifest_dir.join("..").join(&config.icon)]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

fn write_list(file: &mut File, name: &str, items: &[String]) -> io::Result<()> {
    writeln!(file, "pub const {name}: &[&str] = &{items:?};")
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let out_path = out_dir.join("installer_config.rs");
    let mut file = File::create(&out_path)?;
    writeln!(file, "pub const PRODUCT_NAME: &str = {:?};", config.name)?;
    writeln!(file, "pub const DISPLAY_NAME: &str = {:?};", config.display_name)?;
    writeln!(file, "pub const VERSION: &str = {:?};", config.version)?;
    writeln!(file, "pub const EXECUTABLE: &str = {:?};", config.executable)?;
    writeln!(file, "pub const ICON: &str = {:?};", config.icon)?;
    writeln!(file, "pub const VERSION_BANNER: &str = {:?};", config.version_banner)?;
    writeln!(file, "pub const EXTENSION: &str = {:?};", config.association.extension)?;
    writeln!(file, "pub const TYPE_TAG: &str = {:?};", config.association.type_tag)?;
    writeln!(
        file,
        "pub const TYPE_DESCRIPTION: &str = {:?};",
        config.association.description
    )?;
    writeln!(
        file,
        "pub const OPEN_SUBCOMMAND: &str = {:?};",
        config.association.open_subcommand
    )?;
    write_list(&mut file, "EXECUTABLE_CANDIDATES", &config.candidates.executable)?;
    write_list(&mut file, "ICON_CANDIDATES", &config.candidates.icon)?;
    write_list(&mut file, "EXAMPLES_CANDIDATES", &config.candidates.examples)?;
    Ok(())
}
