use std::path::Path;
use std::thread;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::db::AggregateWriter;
use crate::extract::{self, BlockKind, ExtractedBlocks};
use crate::input::Entity;
use crate::probe::PageProbe;
use crate::settings::Settings;

/// One entity's three blocks, each possibly empty but always present.
pub struct EntityResult {
    pub entity: Entity,
    pub navigated: bool,
    pub blocks: ExtractedBlocks,
}

impl EntityResult {
    pub fn populated_blocks(&self) -> usize {
        self.blocks.iter().filter(|b| !b.rows.is_empty()).count()
    }
}

/// Navigate to the entity's page and run the block extractors.
///
/// Never fails: a navigation fault yields three empty blocks.
pub fn process_entity<P: PageProbe>(probe: &mut P, entity: &Entity, settings: &Settings) -> EntityResult {
    let timings = &settings.timings;

    if let Err(e) = probe.navigate(&entity.source_url, timings.navigation()) {
        warn!("{}: navigation failed: {}", entity.name, e);
        return EntityResult {
            entity: entity.clone(),
            navigated: false,
            blocks: ExtractedBlocks::empty(&e.to_string()),
        };
    }

    if let Err(e) = probe.wait_for_network_idle(timings.network_idle()) {
        info!("{}: network not idle ({}), continuing", entity.name, e);
    }
    // Client-rendered widgets have no ready signal; give them a fixed head start.
    thread::sleep(timings.settle());

    let blocks = extract::extract_all(probe, &entity.name, settings);

    EntityResult {
        entity: entity.clone(),
        navigated: true,
        blocks,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub entities: usize,
    pub navigated: usize,
    pub blocks_populated: usize,
    pub blocks_empty: usize,
    pub collisions: usize,
    /// (entity, block, reason) for every block that hit a fault.
    pub failures: Vec<(String, BlockKind, String)>,
}

/// Process every entity in order, feeding results to a fresh aggregate.
pub fn collect<P: PageProbe>(
    probe: &mut P,
    entities: &[Entity],
    settings: &Settings,
) -> (AggregateWriter, RunStats) {
    let mut writer = AggregateWriter::new(settings.output.sheet_prefix_len);
    let mut stats = RunStats::default();

    let pb = ProgressBar::new(entities.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    for (i, entity) in entities.iter().enumerate() {
        if i > 0 {
            thread::sleep(settings.timings.politeness());
        }
        pb.set_message(entity.name.clone());
        info!("Extracting {}", entity.name);

        let result = process_entity(probe, entity, settings);
        let populated = result.populated_blocks();
        stats.entities += 1;
        stats.navigated += usize::from(result.navigated);
        stats.blocks_populated += populated;
        stats.blocks_empty += 3 - populated;
        for block in result.blocks.iter().filter(|b| !b.ok) {
            let reason = block.warning.clone().unwrap_or_default();
            stats.failures.push((entity.name.clone(), block.kind, reason));
        }

        info!("{}: {}/3 blocks populated", entity.name, populated);
        writer.add(&result);
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Aggregated {} sheets for {} entities", writer.sheets().len(), stats.entities);
    stats.collisions = writer.collisions();
    (writer, stats)
}

/// Full run: every entity, then a single write of the artifact.
pub fn run<P: PageProbe>(
    probe: &mut P,
    entities: &[Entity],
    settings: &Settings,
    output: &Path,
) -> Result<RunStats> {
    let (writer, stats) = collect(probe, entities, settings);
    writer.persist(output)?;
    Ok(stats)
}
