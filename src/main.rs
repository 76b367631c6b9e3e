// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use pkgcatalog::catalog::{self, PackageStore, SearchRequest, StoreOptions};
use pkgcatalog::config::Settings;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "pkgcatalog")]
#[command(author, version, about = "Content-addressed package catalog with repository sync", long_about = None)]
struct Cli {
    /// Settings file (TOML); PKGCATALOG__* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (default: settings, then /var/lib/pkgcatalog/catalog.db)
    #[arg(short, long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog database
    Init,
    /// Register a repository, optionally with a configuration owned by an organization
    AddRepo {
        /// Repository URL
        url: String,
        /// Make the repository's packages searchable by every organization
        #[arg(long)]
        public: bool,
        /// Organization that owns the new configuration
        #[arg(long, requires = "name")]
        org: Option<String>,
        /// Configuration name
        #[arg(long, requires = "org")]
        name: Option<String>,
    },
    /// Delete a repository and collect the packages only it referenced
    RemoveRepo {
        /// Repository ID
        repository_id: i64,
    },
    /// Reconcile a repository against a manifest (JSON or primary.xml[.gz|.xz|.zst])
    Sync {
        /// Repository ID
        repository_id: i64,
        /// Manifest file
        manifest: PathBuf,
        /// Rows per batched statement (overrides settings)
        #[arg(long)]
        batch_size: Option<i64>,
    },
    /// List the packages of an organization's repository configuration
    List {
        /// Repository configuration ID
        config_id: i64,
        #[arg(long)]
        org: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Search package names by prefix across repositories
    Search {
        /// Package name prefix
        prefix: String,
        #[arg(long)]
        org: String,
        /// Repository URL to search (repeatable)
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    let db_path = cli
        .db_path
        .clone()
        .unwrap_or_else(|| settings.db_path().to_string());

    match cli.command {
        Some(Commands::Init) => {
            info!("Initializing catalog database at: {}", db_path);
            pkgcatalog::db::init(&db_path)?;
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }
        Some(Commands::AddRepo {
            url,
            public,
            org,
            name,
        }) => {
            let conn = pkgcatalog::db::open(&db_path)?;
            let repo = catalog::add_repository(&conn, url, public)?;
            let repo_id = repo.id.unwrap_or_default();
            println!("Added repository {} ({})", repo_id, repo.url);

            if let (Some(org), Some(name)) = (org, name) {
                let config = catalog::add_repository_config(&conn, org, name, repo_id)?;
                println!(
                    "Added configuration {} '{}' for {}",
                    config.id.unwrap_or_default(),
                    config.name,
                    config.org_id
                );
            }
            Ok(())
        }
        Some(Commands::RemoveRepo { repository_id }) => {
            let store = PackageStore::new(&settings, None);
            let mut conn = pkgcatalog::db::open(&db_path)?;
            let orphans = catalog::remove_repository(&mut conn, &store, repository_id)?;
            println!(
                "Removed repository {} ({} orphaned package(s) deleted)",
                repository_id, orphans
            );
            Ok(())
        }
        Some(Commands::Sync {
            repository_id,
            manifest,
            batch_size,
        }) => {
            let packages = pkgcatalog::manifest::load(&manifest)?;
            let options = StoreOptions {
                paged_insert_limit: batch_size,
            };
            let store = PackageStore::new(&settings, Some(&options));

            let mut conn = pkgcatalog::db::open(&db_path)?;
            let report = catalog::reconcile(&mut conn, &store, repository_id, &packages)?;

            println!("Synchronized repository {}", repository_id);
            println!("  Manifest entries: {}", packages.len());
            println!("  New packages: {}", report.new_packages);
            println!("  Memberships added: {}", report.memberships_added);
            println!("  Memberships removed: {}", report.memberships_removed);
            println!("  Orphans removed: {}", report.orphans_removed);
            Ok(())
        }
        Some(Commands::List {
            config_id,
            org,
            limit,
            offset,
        }) => {
            let conn = pkgcatalog::db::open(&db_path)?;
            let page = catalog::list(&conn, &org, config_id, limit, offset)?;

            if page.packages.is_empty() {
                println!("No packages found.");
            } else {
                for package in &page.packages {
                    println!("  {}  {}", package, package.summary);
                }
            }
            println!(
                "\nShowing {} of {} package(s) (offset {})",
                page.packages.len(),
                page.total,
                page.offset
            );
            Ok(())
        }
        Some(Commands::Search {
            prefix,
            org,
            urls,
            limit,
        }) => {
            let conn = pkgcatalog::db::open(&db_path)?;
            let request = SearchRequest {
                urls,
                search: prefix,
            };
            let hits = catalog::search(&conn, &org, &request, limit)?;

            if hits.is_empty() {
                println!("No packages found.");
            } else {
                for hit in &hits {
                    println!("  {} - {}", hit.name, hit.summary);
                }
            }
            Ok(())
        }
        None => {
            println!("pkgcatalog v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgcatalog --help' for usage information");
            Ok(())
        }
    }
}
