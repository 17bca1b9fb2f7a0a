//! Build tooling for Twinlet externals.
//!
//! Usage:
//!   cargo xtask new <name> [--out <dir>]
//!   cargo xtask bundle <package> [--pd] [--max] [--release] [--install]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use twinlet_utils::{is_signal_name, tildefy, untildefy};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let result = match args.get(1).map(String::as_str) {
        Some("new") if args.len() >= 3 => {
            let out = option_value(&args, "--out").map(PathBuf::from);
            new_external(&args[2], out)
        }
        Some("bundle") if args.len() >= 3 => {
            let release = args.iter().any(|a| a == "--release");
            let install = args.iter().any(|a| a == "--install");
            let build_pd = args.iter().any(|a| a == "--pd");
            let build_max = args.iter().any(|a| a == "--max");

            // Default to Pd if no host specified
            let (build_pd, build_max) = if !build_pd && !build_max {
                (true, false)
            } else {
                (build_pd, build_max)
            };

            bundle(&args[2], release, install, build_pd, build_max)
        }
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: cargo xtask new <name> [--out <dir>]");
    eprintln!("       cargo xtask bundle <package> [--pd] [--max] [--release] [--install]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  new       Create a new external crate");
    eprintln!("  bundle    Build an external and package it for a host");
    eprintln!();
    eprintln!("Hosts:");
    eprintln!("  --pd      Pure Data external (default if no host specified)");
    eprintln!("  --max     Max external (.mxo on macOS, .mxe64 on Windows)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --out <dir>  Parent directory for `new` (default: current directory)");
    eprintln!("  --release    Build in release mode");
    eprintln!("  --install    Install to the host's user externals directory");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  cargo xtask new 'gain~' --out demos");
    eprintln!("  cargo xtask bundle balance_tilde --pd --max --release --install");
}

fn option_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

// =============================================================================
// new
// =============================================================================

fn new_external(name: &str, out: Option<PathBuf>) -> Result<(), String> {
    let crate_name = untildefy(name);
    if crate_name.is_empty()
        || !crate_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("Invalid external name: {}", name));
    }

    let parent = match out {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| format!("No current directory: {}", e))?,
    };
    let crate_dir = parent.join(crate_name.replace('_', "-"));
    if crate_dir.exists() {
        return Err(format!("{} already exists", crate_dir.display()));
    }

    println!("Creating {} at {}...", tildefy(&crate_name), crate_dir.display());

    let in_workspace = get_workspace_root()
        .ok()
        .and_then(|root| fs::canonicalize(root).ok())
        .zip(fs::canonicalize(&parent).ok())
        .is_some_and(|(root, parent)| parent.starts_with(root));

    fs::create_dir_all(crate_dir.join("src"))
        .map_err(|e| format!("Failed to create crate dir: {}", e))?;
    fs::write(
        crate_dir.join("Cargo.toml"),
        cargo_toml_template(&crate_name, in_workspace),
    )
    .map_err(|e| format!("Failed to write Cargo.toml: {}", e))?;
    fs::write(crate_dir.join("src").join("lib.rs"), lib_template(&crate_name))
        .map_err(|e| format!("Failed to write lib.rs: {}", e))?;

    if in_workspace {
        println!("Add the crate to the workspace members to build it.");
    }
    println!("Created {}", crate_dir.display());
    Ok(())
}

fn cargo_toml_template(crate_name: &str, in_workspace: bool) -> String {
    let (package, twinlet) = if in_workspace {
        (
            "version.workspace = true\nedition.workspace = true\nlicense.workspace = true",
            "twinlet = { workspace = true }",
        )
    } else {
        ("version = \"0.1.0\"\nedition = \"2021\"", "twinlet = \"0.1\"")
    };

    format!(
        r#"[package]
name = "{crate_name}"
description = "{display} external"
{package}

[lib]
crate-type = ["cdylib", "rlib"]

[dependencies]
{twinlet}
"#,
        crate_name = crate_name,
        display = tildefy(crate_name),
        package = package,
        twinlet = twinlet,
    )
}

fn lib_template(crate_name: &str) -> String {
    let type_name = to_type_name(crate_name);
    let signal = is_signal_name(crate_name);

    let io = if signal {
        "        ports.setup_io(1, 1)?;\n"
    } else {
        ""
    };
    let outlet = if signal {
        ""
    } else {
        "        ports.add_outlet(\"out\")?;\n"
    };
    let process = if signal {
        r#"
    fn process<S: Sample>(&mut self, buffer: &mut Buffer<'_, S>) {
        let gain = S::from_f64(self.value);
        for (input, output) in buffer.zip_channels() {
            for (i, o) in input.iter().zip(output.iter_mut()) {
                *o = *i * gain;
            }
        }
    }
"#
    } else {
        r#"
    fn bang_received(&mut self, _inlet: &Inlet, outlets: &[Outlet]) {
        if let Some(out) = outlets.first() {
            out.send_float(self.value);
        }
    }
"#
    };

    format!(
        r#"use twinlet::prelude::*;

pub static CONFIG: ClassConfig = ClassConfig::new("{crate_name}");

#[derive(Default)]
pub struct {type_name} {{
    value: f64,
}}

impl External for {type_name} {{
    fn setup(&mut self, ports: &mut PortRegistry, args: &[Atom]) -> ExternalResult<()> {{
        self.value = args.first().map(Atom::float).unwrap_or(1.0);
{io}        ports.add_inlet_float("value")?;
{outlet}        Ok(())
    }}

    fn float_received(&mut self, _inlet: &Inlet, value: f64, _outlets: &[Outlet]) {{
        self.value = value;
    }}
{process}}}

twinlet::export_pd!(CONFIG, {type_name}, {crate_name}_setup);
twinlet::export_max!(CONFIG, {type_name});
"#,
        crate_name = crate_name,
        type_name = type_name,
        io = io,
        outlet = outlet,
        process = process,
    )
}

/// `gain_tilde` -> `GainTilde`
fn to_type_name(crate_name: &str) -> String {
    crate_name
        .split(['_', '-'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

// =============================================================================
// bundle
// =============================================================================

fn bundle(
    package: &str,
    release: bool,
    install: bool,
    build_pd: bool,
    build_max: bool,
) -> Result<(), String> {
    println!("Bundling {} (release: {})...", package, release);

    let workspace_root = get_workspace_root()?;

    println!("Building...");
    let mut cmd = Command::new("cargo");
    cmd.arg("build")
        .arg("-p")
        .arg(package)
        .current_dir(&workspace_root);

    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().map_err(|e| format!("Failed to run cargo: {}", e))?;
    if !status.success() {
        return Err("Build failed".to_string());
    }

    let profile = if release { "release" } else { "debug" };
    let target_dir = workspace_root.join("target").join(profile);

    // Convert package name to library name (replace hyphens with underscores)
    let lib_name = package.replace('-', "_");
    let library_path = target_dir.join(library_file_name(&lib_name));

    if !library_path.exists() {
        return Err(format!("Built library not found: {}", library_path.display()));
    }

    let display_name = tildefy(&lib_name);

    if build_pd {
        bundle_pd(&display_name, &target_dir, &library_path, install)?;
    }

    if build_max {
        bundle_max(&display_name, &target_dir, &library_path, install)?;
    }

    Ok(())
}

fn library_file_name(lib_name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.dll", lib_name)
    } else if cfg!(target_os = "macos") {
        format!("lib{}.dylib", lib_name)
    } else {
        format!("lib{}.so", lib_name)
    }
}

/// File extension Pd looks for on this platform.
fn pd_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "pd_darwin"
    } else {
        "pd_linux"
    }
}

fn bundle_pd(
    display_name: &str,
    target_dir: &Path,
    library_path: &Path,
    install: bool,
) -> Result<(), String> {
    let pd_dir = target_dir.join("pd");
    fs::create_dir_all(&pd_dir).map_err(|e| format!("Failed to create pd dir: {}", e))?;

    let file_name = format!("{}.{}", display_name, pd_extension());
    let dest = pd_dir.join(&file_name);
    fs::copy(library_path, &dest).map_err(|e| format!("Failed to copy library: {}", e))?;

    println!("Pd external created: {}", dest.display());

    if install {
        let externals = pd_user_dir()?;
        fs::create_dir_all(&externals)
            .map_err(|e| format!("Failed to create Pd externals dir: {}", e))?;
        let installed = externals.join(&file_name);
        fs::copy(&dest, &installed)
            .map_err(|e| format!("Failed to install Pd external: {}", e))?;
        println!("Pd external installed to: {}", installed.display());
    }

    Ok(())
}

fn bundle_max(
    display_name: &str,
    target_dir: &Path,
    library_path: &Path,
    install: bool,
) -> Result<(), String> {
    let max_dir = target_dir.join("max");
    fs::create_dir_all(&max_dir).map_err(|e| format!("Failed to create max dir: {}", e))?;

    let bundle_path = if cfg!(target_os = "macos") {
        create_mxo(display_name, &max_dir, library_path)?
    } else if cfg!(target_os = "windows") {
        let dest = max_dir.join(format!("{}.mxe64", display_name));
        fs::copy(library_path, &dest).map_err(|e| format!("Failed to copy library: {}", e))?;
        dest
    } else {
        return Err("Max externals can only be built on macOS or Windows".to_string());
    };

    println!("Max external created: {}", bundle_path.display());

    if install {
        let library = max_user_dir()?;
        fs::create_dir_all(&library)
            .map_err(|e| format!("Failed to create Max library dir: {}", e))?;
        let name = bundle_path
            .file_name()
            .ok_or_else(|| "Invalid bundle path".to_string())?;
        let dest = library.join(name);
        if dest.is_dir() {
            fs::remove_dir_all(&dest)
                .map_err(|e| format!("Failed to remove old installation: {}", e))?;
        }
        if bundle_path.is_dir() {
            copy_dir_all(&bundle_path, &dest)?;
        } else {
            fs::copy(&bundle_path, &dest)
                .map_err(|e| format!("Failed to install Max external: {}", e))?;
        }
        println!("Max external installed to: {}", dest.display());
    }

    Ok(())
}

fn create_mxo(display_name: &str, max_dir: &Path, library_path: &Path) -> Result<PathBuf, String> {
    let bundle_dir = max_dir.join(format!("{}.mxo", display_name));
    let contents_dir = bundle_dir.join("Contents");
    let macos_dir = contents_dir.join("MacOS");

    println!("Creating Max bundle at {}...", bundle_dir.display());

    // Clean up existing bundle
    if bundle_dir.exists() {
        fs::remove_dir_all(&bundle_dir)
            .map_err(|e| format!("Failed to remove old bundle: {}", e))?;
    }

    fs::create_dir_all(&macos_dir).map_err(|e| format!("Failed to create MacOS dir: {}", e))?;

    fs::copy(library_path, macos_dir.join(display_name))
        .map_err(|e| format!("Failed to copy library: {}", e))?;

    fs::write(contents_dir.join("Info.plist"), create_mxo_info_plist(display_name))
        .map_err(|e| format!("Failed to write Info.plist: {}", e))?;

    fs::write(contents_dir.join("PkgInfo"), "iLaX????")
        .map_err(|e| format!("Failed to write PkgInfo: {}", e))?;

    Ok(bundle_dir)
}

fn create_mxo_info_plist(display_name: &str) -> String {
    let identifier: String = untildefy(display_name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleDevelopmentRegion</key>
    <string>English</string>
    <key>CFBundleExecutable</key>
    <string>{executable}</string>
    <key>CFBundleIdentifier</key>
    <string>com.twinlet.{identifier}</string>
    <key>CFBundleInfoDictionaryVersion</key>
    <string>6.0</string>
    <key>CFBundlePackageType</key>
    <string>iLaX</string>
    <key>CFBundleSignature</key>
    <string>max2</string>
    <key>CFBundleVersion</key>
    <string>0.1.0</string>
</dict>
</plist>
"#,
        executable = display_name,
        identifier = identifier,
    )
}

fn pd_user_dir() -> Result<PathBuf, String> {
    if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").map_err(|_| "APPDATA not set")?;
        return Ok(PathBuf::from(appdata).join("Pd"));
    }
    let home = std::env::var("HOME").map_err(|_| "HOME not set")?;
    let home = PathBuf::from(home);
    if cfg!(target_os = "macos") {
        Ok(home.join("Documents").join("Pd").join("externals"))
    } else {
        Ok(home.join(".local").join("lib").join("pd").join("extra"))
    }
}

fn max_user_dir() -> Result<PathBuf, String> {
    let home = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE").map_err(|_| "USERPROFILE not set")?
    } else {
        std::env::var("HOME").map_err(|_| "HOME not set")?
    };
    Ok(PathBuf::from(home)
        .join("Documents")
        .join("Max 8")
        .join("Library"))
}

fn get_workspace_root() -> Result<PathBuf, String> {
    let output = Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .map_err(|e| format!("Failed to locate workspace: {}", e))?;

    if !output.status.success() {
        return Err("Failed to locate workspace".to_string());
    }

    let cargo_toml = String::from_utf8_lossy(&output.stdout);
    let path = PathBuf::from(cargo_toml.trim());
    path.parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| "Invalid workspace path".to_string())
}

fn copy_dir_all(src: &Path, dst: &Path) -> Result<(), String> {
    fs::create_dir_all(dst).map_err(|e| format!("Failed to create dir: {}", e))?;

    for entry in fs::read_dir(src).map_err(|e| format!("Failed to read dir: {}", e))? {
        let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
        let ty = entry
            .file_type()
            .map_err(|e| format!("Failed to get file type: {}", e))?;

        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(|e| format!("Failed to copy file: {}", e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name() {
        assert_eq!(to_type_name("gain_tilde"), "GainTilde");
        assert_eq!(to_type_name("counter"), "Counter");
    }

    #[test]
    fn test_signal_template() {
        let lib = lib_template("gain_tilde");
        assert!(lib.contains("ports.setup_io(1, 1)?;"));
        assert!(lib.contains("fn process<S: Sample>"));
        assert!(lib.contains("export_pd!(CONFIG, GainTilde, gain_tilde_setup);"));
        assert!(!lib.contains("add_outlet"));
    }

    #[test]
    fn test_control_template() {
        let lib = lib_template("counter");
        assert!(!lib.contains("setup_io"));
        assert!(lib.contains("ports.add_outlet(\"out\")?;"));
        assert!(lib.contains("fn bang_received"));
    }

    #[test]
    fn test_cargo_toml_template() {
        let standalone = cargo_toml_template("gain_tilde", false);
        assert!(standalone.contains("name = \"gain_tilde\""));
        assert!(standalone.contains("description = \"gain~ external\""));
        assert!(standalone.contains("twinlet = \"0.1\""));

        let member = cargo_toml_template("gain_tilde", true);
        assert!(member.contains("twinlet = { workspace = true }"));
    }

    #[test]
    fn test_file_names() {
        let library = library_file_name("balance_tilde");
        assert!(library.contains("balance_tilde"));
        assert!(["dll", "pd_darwin", "pd_linux"].contains(&pd_extension()));
        assert!(create_mxo_info_plist("balance~").contains("com.twinlet.balance-tilde"));
    }
}
