//! Search commands.

use tokio::runtime::Runtime;

use super::download::run_jobs;
use crate::config::Settings;
use crate::download::{DownloadJob, ModuleOverrides};
use crate::model::{MediaIdentification, MediaKind, SearchResult};
use crate::module::ModuleRegistry;

/// One line per result: `[id] name - artists (year) [E] extras`
fn format_result(result: &SearchResult) -> String {
    let mut line = format!("[{}]", result.result_id);
    if let Some(name) = &result.name {
        line.push(' ');
        line.push_str(name);
    }
    if !result.artists.is_empty() {
        line.push_str(" - ");
        line.push_str(&result.artists.join(", "));
    }
    if let Some(year) = result.year {
        line.push_str(&format!(" ({})", year));
    }
    if result.explicit {
        line.push_str(" [E]");
    }
    for extra in &result.additional {
        line.push_str(&format!(" | {}", extra));
    }
    line
}

/// Search a module and print the results
pub fn cmd_search(
    rt: &Runtime,
    registry: &ModuleRegistry,
    module: &str,
    kind: MediaKind,
    query: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let service = registry.get(module)?;
    let results = rt.block_on(service.search(kind, query, None, limit))?;

    if results.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        println!("{:>3}. {}", i + 1, format_result(result));
    }
    Ok(())
}

/// Search a module and download the first result
pub fn cmd_lucky_search(
    rt: &Runtime,
    registry: &ModuleRegistry,
    settings: Settings,
    overrides: ModuleOverrides,
    module: &str,
    kind: MediaKind,
    query: &str,
) -> anyhow::Result<()> {
    let service = registry.get(module)?;
    let results = rt.block_on(service.search(kind, query, None, 1))?;
    let Some(first) = results.into_iter().next() else {
        anyhow::bail!("No results for {:?}", query);
    };

    println!("Found {}", format_result(&first));
    let job = DownloadJob::new(
        service.name(),
        MediaIdentification {
            kind,
            id: first.result_id,
            extra: first.extra,
        },
    );
    run_jobs(rt, registry, settings, overrides, &[job])
}
