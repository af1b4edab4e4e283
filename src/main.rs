mod db;
mod extract;
mod input;
mod normalize;
mod pipeline;
mod probe;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use extract::{BlockKind, Count, NormalizedRow};
use probe::render::{HttpRenderer, SpiderRenderer};
use probe::DocumentProbe;
use settings::Backend;

#[derive(Parser)]
#[command(name = "artist_insights", about = "Per-artist insights extractor (views over time, top cities, top songs)")]
struct Cli {
    /// Settings file (default: ./insights.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every listed entity and write one artifact
    Run {
        /// CSV with a name column and a URL column
        #[arg(short, long)]
        input: PathBuf,
        /// SQLite artifact to write (replaced on success)
        #[arg(short, long, default_value = "insights.sqlite")]
        output: PathBuf,
        /// Only the first N entities of the list
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// List the sheets of an artifact
    Sheets {
        #[arg(short, long, default_value = "insights.sqlite")]
        output: PathBuf,
    },
    /// Per-entity overview of an artifact
    Summary {
        #[arg(short, long, default_value = "insights.sqlite")]
        output: PathBuf,
        /// Max entities to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { input, output, limit } => {
            let settings = settings::load(cli.config.as_deref())?;
            let mut entities = input::load_entities(&input, &settings.input)?;
            if let Some(n) = limit {
                entities.truncate(n);
            }
            if entities.is_empty() {
                // Still replace the artifact so readers never see a previous run.
                db::AggregateWriter::new(settings.output.sheet_prefix_len).persist(&output)?;
                println!("No entities to process in {}; wrote empty {}.", input.display(), output.display());
                return Ok(());
            }

            println!("Extracting {} entities ({:?} backend)...", entities.len(), settings.render.backend);
            let stats = match settings.render.backend {
                Backend::Http => {
                    let mut probe = DocumentProbe::new(HttpRenderer::new(&settings.render)?);
                    pipeline::run(&mut probe, &entities, &settings, &output)?
                }
                Backend::Spider => {
                    let mut probe = DocumentProbe::new(SpiderRenderer::from_env()?);
                    pipeline::run(&mut probe, &entities, &settings, &output)?
                }
            };

            println!(
                "Done: {} entities ({} reached, {} unreachable), {} blocks populated, {} empty.",
                stats.entities,
                stats.navigated,
                stats.entities - stats.navigated,
                stats.blocks_populated,
                stats.blocks_empty,
            );
            if !stats.failures.is_empty() {
                println!("\n--- Empty blocks ---");
                for (entity, kind, reason) in &stats.failures {
                    println!("  {} / {}: {}", truncate(entity, 24), kind, reason);
                }
            }
            if stats.collisions > 0 {
                println!(
                    "Warning: {} sheets overwritten by entities whose names collide after truncation.",
                    stats.collisions
                );
            }
            println!("Wrote {}", output.display());
            Ok(())
        }
        Commands::Sheets { output } => print_sheets(&output),
        Commands::Summary { output, limit } => print_summary(&output, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_sheets(path: &Path) -> anyhow::Result<()> {
    let conn = db::open(path)?;
    let run = db::fetch_run(&conn)?;
    let sheets = db::fetch_sheets(&conn)?;

    println!("Run:        {} → {}", run.started_at, run.finished_at);
    println!("Entities:   {}", run.entities);
    println!("Sheets:     {}", run.sheets);
    println!("Collisions: {}\n", run.collisions);

    println!("{:>3} | {:<32} | {:<24} | {:>4}", "#", "Sheet", "Entity", "Rows");
    println!("{}", "-".repeat(72));
    for (i, s) in sheets.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {:<24} | {:>4}",
            i + 1,
            s.sheet,
            truncate(&s.entity, 24),
            s.row_count
        );
    }
    Ok(())
}

struct EntityOverview {
    name: String,
    points: usize,
    total: u64,
    top_city: Option<NormalizedRow>,
    top_item: Option<NormalizedRow>,
}

fn print_summary(path: &Path, limit: usize) -> anyhow::Result<()> {
    let conn = db::open(path)?;
    let sheets = db::fetch_sheets(&conn)?;

    let mut overviews: Vec<EntityOverview> = Vec::new();
    for sheet in &sheets {
        let rows = db::fetch_rows(&conn, sheet)?;
        let idx = match overviews.iter().position(|o| o.name == sheet.entity) {
            Some(i) => i,
            None => {
                overviews.push(EntityOverview {
                    name: sheet.entity.clone(),
                    points: 0,
                    total: 0,
                    top_city: None,
                    top_item: None,
                });
                overviews.len() - 1
            }
        };
        let o = &mut overviews[idx];
        match sheet.kind {
            BlockKind::Series => {
                o.points = rows.len();
                o.total = rows
                    .iter()
                    .filter_map(|r| match r.count {
                        Count::Number(n) => Some(n),
                        Count::Text(_) => None,
                    })
                    .sum();
            }
            BlockKind::Geography => o.top_city = rows.into_iter().next(),
            BlockKind::RankedItems => o.top_item = rows.into_iter().next(),
        }
    }

    if overviews.is_empty() {
        println!("No entities in {}.", path.display());
        return Ok(());
    }

    println!(
        "{:>3} | {:<20} | {:>6} | {:>12} | {:<26} | {:<30}",
        "#", "Entity", "Days", "Views", "Top city", "Top item"
    );
    println!("{}", "-".repeat(112));
    for (i, o) in overviews.iter().take(limit).enumerate() {
        println!(
            "{:>3} | {:<20} | {:>6} | {:>12} | {:<26} | {:<30}",
            i + 1,
            truncate(&o.name, 20),
            o.points,
            o.total,
            describe(o.top_city.as_ref(), 14),
            describe(o.top_item.as_ref(), 18),
        );
    }

    println!("\n{} entities", overviews.len());
    Ok(())
}

/// "Bogotá (1,200,000)"; counts the page printed with K/M are scaled here.
fn describe(row: Option<&NormalizedRow>, label_width: usize) -> String {
    let Some(row) = row else {
        return "-".into();
    };
    let count = match &row.count {
        Count::Number(n) => Some(*n as f64),
        Count::Text(t) => normalize::expand_scale_suffix(t).ok(),
    };
    match count {
        Some(c) => format!("{} ({})", truncate(&row.label, label_width), group_thousands(c.round() as u64)),
        None => truncate(&row.label, label_width),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_scales_text_counts() {
        let city = NormalizedRow::text("Bogotá", "1.2M");
        assert_eq!(describe(Some(&city), 14), "Bogotá (1,200,000)");
        let odd = NormalizedRow::text("Somewhere", "n/a");
        assert_eq!(describe(Some(&odd), 14), "Somewhere");
        assert_eq!(describe(None, 14), "-");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn truncates_on_chars() {
        assert_eq!(truncate("Medellín", 20), "Medellín");
        assert_eq!(truncate("Los Ángeles Azules", 6), "Los Án...");
    }
}
