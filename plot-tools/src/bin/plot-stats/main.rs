use log::info;
use rayon::prelude::*;

use plot_tools::indices::{band_names, resolve};
use plot_tools::{utils::*, *};
use plotgrid::prelude::*;

mod args;

// Main function
plot_tools::sync_main!(run());

fn run() -> Result<()> {
    // Parse command line
    let args = args::parse_cmd_line();

    // Open plots and rasters
    let tiles = read_tiles(&args.tiles, &args.id_field)?;
    let inputs: Vec<_> = args
        .rasters
        .iter()
        .map(|r| (r.name.clone(), r.path.clone()))
        .collect();
    let analyzer = MultiRasterAnalyzer::open(tiles, &inputs, |path| GdalRaster::open(path))?;

    // Resolve index formulas against the available bands
    let bands = band_names(
        &analyzer
            .raster_names()
            .map(|name| {
                let count = analyzer.raster(name).map_or(0, |r| r.meta().band_count);
                (name.to_string(), count)
            })
            .collect::<Vec<_>>(),
    );
    let indices = resolve(&args.indices, &bands)?;
    let aggregator =
        StatsAggregator::new(indices.iter().map(|i| i.name().to_string()).collect())?;

    let mut table = aggregator.table();
    {
        let tracker = Tracker::new("tiles", analyzer.len());
        let mut batch = Vec::with_capacity(args.batch_size);
        let mut flush = |batch: &mut Vec<(TileId, BandSet)>| {
            let arrays: Vec<_> = batch
                .par_iter()
                .map(|(id, bands)| (*id, compute_indices(&indices, bands)))
                .collect();
            for record in aggregator.par_aggregate(&arrays) {
                table.push(record);
            }
            batch.clear();
        };

        for item in analyzer.iter_tiles() {
            let (id, samples) = item?;
            if samples.values().all(|s| s.inside_count() == 0) {
                log::debug!("tile {}: no pixel inside the rasters", id);
                tracker.skip();
            } else {
                tracker.increment();
            }
            batch.push((id, BandSet::from_samples(&samples, args.outside)));
            if batch.len() >= args.batch_size {
                flush(&mut batch);
            }
        }
        flush(&mut batch);
    }

    // Merge into the plots and write out
    let mut tiles = analyzer.into_tiles();
    let report = tiles.merge_stats(&table);
    if report.has_conflicts() {
        info!(
            "{} columns overwritten, {} records without plot",
            report.overwritten_columns.len(),
            report.skipped_ids.len()
        );
    }

    if args.json {
        print_json(&table.to_json(tiles.id_field()))?;
    }
    if let Some(output) = &args.output {
        write_tiles(output, &tiles)?;
        info!(
            "wrote {} plots with {} statistics to {}",
            tiles.len(),
            table.schema().columns().len(),
            output.path.display()
        );
    }
    Ok(())
}
