// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("pkgcatalog")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pkgcatalog Contributors")
        .about("Content-addressed package catalog with repository sync")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Settings file (TOML); PKGCATALOG__* environment variables override it"),
        )
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .help("Database path (default: settings, then /var/lib/pkgcatalog/catalog.db)"),
        )
        .subcommand(Command::new("init").about("Initialize the catalog database"))
        .subcommand(
            Command::new("add-repo")
                .about("Register a repository, optionally with a configuration owned by an organization")
                .arg(Arg::new("url").required(true).help("Repository URL"))
                .arg(
                    Arg::new("public")
                        .long("public")
                        .action(ArgAction::SetTrue)
                        .help("Make the repository's packages searchable by every organization"),
                )
                .arg(Arg::new("org").long("org").help("Organization that owns the new configuration"))
                .arg(Arg::new("name").long("name").help("Configuration name")),
        )
        .subcommand(
            Command::new("remove-repo")
                .about("Delete a repository and collect the packages only it referenced")
                .arg(Arg::new("repository_id").required(true).help("Repository ID")),
        )
        .subcommand(
            Command::new("sync")
                .about("Reconcile a repository against a manifest (JSON or primary.xml[.gz|.xz|.zst])")
                .arg(Arg::new("repository_id").required(true).help("Repository ID"))
                .arg(Arg::new("manifest").required(true).help("Manifest file"))
                .arg(
                    Arg::new("batch_size")
                        .long("batch-size")
                        .value_name("N")
                        .help("Rows per batched statement (overrides settings)"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List the packages of an organization's repository configuration")
                .arg(Arg::new("config_id").required(true).help("Repository configuration ID"))
                .arg(Arg::new("org").long("org").required(true))
                .arg(Arg::new("limit").long("limit").default_value("100"))
                .arg(Arg::new("offset").long("offset").default_value("0")),
        )
        .subcommand(
            Command::new("search")
                .about("Search package names by prefix across repositories")
                .arg(Arg::new("prefix").required(true).help("Package name prefix"))
                .arg(Arg::new("org").long("org").required(true))
                .arg(
                    Arg::new("url")
                        .long("url")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Repository URL to search (repeatable)"),
                )
                .arg(Arg::new("limit").long("limit").default_value("20")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("pkgcatalog.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
