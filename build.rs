// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: debug logging
fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .global(true)
        .help("Enable debug logging")
}

fn build_cli() -> Command {
    Command::new("tpexport")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Export Eclipse target platforms into p2 repositories")
        .subcommand_required(true)
        .arg(verbose_arg())
        .subcommand(
            Command::new("mirror")
                .about("Mirror units and their artifacts into a destination repository")
                .arg(
                    Arg::new("source")
                        .short('s')
                        .long("source")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Source repository (path or URI); repeat for several sources"),
                )
                .arg(
                    Arg::new("units")
                        .short('u')
                        .long("units")
                        .help("JSON file with the installable units to mirror"),
                )
                .arg(
                    Arg::new("dest")
                        .short('d')
                        .long("dest")
                        .required(true)
                        .help("Destination folder or URI"),
                )
                .arg(
                    Arg::new("options")
                        .short('o')
                        .long("options")
                        .help("TOML file with mirror options"),
                )
                .arg(
                    Arg::new("no_append")
                        .long("no-append")
                        .action(ArgAction::SetTrue)
                        .help("Empty an existing destination before mirroring"),
                )
                .arg(
                    Arg::new("validate")
                        .long("validate")
                        .action(ArgAction::SetTrue)
                        .help("Re-read every copied artifact from the destination"),
                ),
        )
        .subcommand(
            Command::new("export").about("Run an export batch").arg(
                Arg::new("batch")
                    .short('b')
                    .long("batch")
                    .required(true)
                    .help("Batch file (TOML)"),
            ),
        )
        .subcommand(
            Command::new("platform").about("Show the configuration (os/ws/arch) of this platform"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=OUT_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = out_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("tpexport.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
