use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use plate_warp::cli::{Cli, Command};
use plate_warp::convert::{convert_labels, relabel_labels, write_kpt_shape, LabelFormat};
use plate_warp::{check_dataset, crop_dataset, split_dataset};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Crop(args) => {
            let config = args.to_config();
            info!("Starting processing for images in: {:?}", config.images_dir);
            info!("Reading labels from: {:?}", config.labels_dir);
            info!("Saving crops to: {:?} ({:?})", config.output_dir, config.spec);

            let stats = crop_dataset(&config).context("Failed to crop dataset")?;
            stats.print_summary();
        }
        Command::Convert(args) => {
            let stats = convert_labels(&args.labels, &args.output, args.format)
                .with_context(|| format!("Failed to convert labels in {:?}", args.labels))?;
            stats.print_summary();

            if args.format == LabelFormat::Pose {
                if let Some(data_yaml) = &args.data_yaml {
                    write_kpt_shape(data_yaml)
                        .with_context(|| format!("Failed to update {:?}", data_yaml))?;
                }
            }
            info!("Converted labels saved to: {:?}", args.output);
        }
        Command::Relabel(args) => {
            info!("Changing class {} to {} in {:?}", args.from, args.to, args.labels);
            let stats = relabel_labels(&args.labels, args.from, args.to)
                .with_context(|| format!("Failed to relabel {:?}", args.labels))?;
            stats.print_summary();
        }
        Command::Split(args) => {
            let config = args.to_config();
            let stats = split_dataset(&config)
                .with_context(|| format!("Failed to split {:?}", config.source_dir))?;
            stats.print_summary();

            let missing = check_dataset(&config.dest_dir);
            if !missing.is_empty() {
                info!("{} images have no label file", missing.len());
            }
        }
        Command::Check(args) => {
            let missing = check_dataset(&args.dataset);
            if !missing.is_empty() {
                bail!("{} images in {:?} have no label file", missing.len(), args.dataset);
            }
            info!("Dataset is intact");
        }
    }

    Ok(())
}
