// src/catalog/query.rs

//! Read side of the catalog: per-repository listings and name search

use crate::db::models::{Package, RepositoryConfig};
use crate::error::{Error, Result};
use rusqlite::Connection;
use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

/// One window of a repository's packages
#[derive(Debug, Clone, Serialize)]
pub struct PackagePage {
    pub packages: Vec<Package>,
    /// Matching packages regardless of the window
    pub total: i64,
    pub limit: usize,
    pub offset: usize,
}

/// Packages of the repository behind an organization's configuration
///
/// Fails with `NotOwned` when `org_id` does not own `config_id`, whether or
/// not the configuration exists.
pub fn list(
    conn: &Connection,
    org_id: &str,
    config_id: i64,
    limit: usize,
    offset: usize,
) -> Result<PackagePage> {
    if org_id.is_empty() {
        return Err(Error::InvalidArgument("org_id can not be empty".to_string()));
    }

    if !RepositoryConfig::is_owned(conn, org_id, config_id)? {
        return Err(Error::NotOwned(config_id));
    }

    let config = RepositoryConfig::find_by_id(conn, config_id)?.ok_or_else(|| {
        Error::NotFound(format!("Repository configuration {} not found", config_id))
    })?;

    let total = Package::count_by_repository(conn, config.repository_id)?;
    let packages = Package::find_by_repository(conn, config.repository_id, limit, offset)?;

    Ok(PackagePage {
        packages,
        total,
        limit,
        offset,
    })
}

/// Search request across repositories identified by URL
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub urls: Vec<String>,
    /// Package name prefix, case-sensitive
    pub search: String,
}

/// One package name matched by a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub name: String,
    pub summary: String,
}

/// Distinct package names starting with `request.search`
///
/// Only repositories listed in `request.urls` are considered, and of those
/// only public ones or ones configured by `org_id`. Each name appears once;
/// its summary comes from the highest epoch, ties going to the smallest
/// checksum. Results are ordered by name and capped at `limit`.
pub fn search(
    conn: &Connection,
    org_id: &str,
    request: &SearchRequest,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    if org_id.is_empty() {
        return Err(Error::InvalidArgument("org_id can not be empty".to_string()));
    }
    if request.urls.is_empty() {
        return Err(Error::InvalidArgument(
            "request must contain at least 1 URL".to_string(),
        ));
    }

    let urls = url_variants(&request.urls);
    let limit = limit as i64;

    // ?1 org, ?2 prefix, then the URLs, then the limit
    let url_params: Vec<String> = (0..urls.len()).map(|i| format!("?{}", i + 3)).collect();
    let limit_param = urls.len() + 3;

    let sql = format!(
        "SELECT name, summary FROM (
             SELECT packages.name AS name,
                    packages.summary AS summary,
                    ROW_NUMBER() OVER (
                        PARTITION BY packages.name
                        ORDER BY packages.epoch DESC, packages.checksum ASC
                    ) AS name_rank
             FROM packages
             INNER JOIN repositories_packages ON repositories_packages.package_id = packages.id
             INNER JOIN repositories ON repositories.id = repositories_packages.repository_id
             LEFT JOIN repository_configurations
                    ON repository_configurations.repository_id = repositories.id
             WHERE (repository_configurations.org_id = ?1 OR repositories.public = 1)
               AND substr(packages.name, 1, length(?2)) = ?2
               AND repositories.url IN ({})
         )
         WHERE name_rank = 1
         ORDER BY name ASC
         LIMIT ?{}",
        url_params.join(", "),
        limit_param
    );

    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(urls.len() + 3);
    values.push(&org_id);
    values.push(&request.search);
    values.extend(urls.iter().map(|url| url as &dyn ToSql));
    values.push(&limit);

    let step = "search packages";
    let mut stmt = conn.prepare(&sql).map_err(Error::query(step))?;
    let hits = stmt
        .query_map(&*values, |row| {
            Ok(SearchHit {
                name: row.get(0)?,
                summary: row.get(1)?,
            })
        })
        .map_err(Error::query(step))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::query(step))?;

    Ok(hits)
}

/// Every URL with and without a trailing slash
///
/// Stored repository URLs are not normalized, so `http://x` and `http://x/`
/// must both match either spelling.
fn url_variants(urls: &[String]) -> Vec<String> {
    let mut variants = Vec::with_capacity(urls.len() * 2);
    for url in urls {
        let trimmed = url.trim_end_matches('/');
        for candidate in [url.clone(), trimmed.to_string(), format!("{}/", trimmed)] {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}
