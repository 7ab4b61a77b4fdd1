use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use autocopy::{
    extract::{BatchReport, ImageResult, WriteOutcome},
    prelude::*,
    utils::hex_str_to_array,
};
use clap::{App, Arg, ArgMatches};

fn main() {
    let matches = App::new("autocopy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Dumps the BOSS database save (partitionA.bin) out of CTRNAND images.")
        .arg(
            Arg::with_name("images")
                .value_name("IMAGE")
                .help("CTRNAND image(s), already decrypted unless --key and --ctr are given")
                .required(true)
                .multiple(true),
        )
        .arg(
            Arg::with_name("key")
                .long("key")
                .value_name("HEX")
                .help("AES-CTR key of the images, 32 hex characters")
                .requires("ctr")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("ctr")
                .long("ctr")
                .value_name("HEX")
                .help("AES-CTR counter at the start of the images, 32 hex characters")
                .requires("key")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("id0")
                .short("0")
                .long("id0")
                .value_name("HEX")
                .help("Use this id0 instead of deriving it, only needed if detection fails")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("skip-duplicate-check")
                .short("n")
                .long("skip-duplicate-check")
                .help("Don't check if the file has been dumped already"),
        )
        .arg(
            Arg::with_name("force")
                .short("f")
                .long("force")
                .help("Extract even if the save has a wrong version or a bad partition table hash"),
        )
        .arg(
            Arg::with_name("partition-b")
                .short("b")
                .long("partition-b")
                .help("Also dump the second partition of dual partition saves"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("DIR")
                .help("Directory to write dumps to, defaults to the current directory")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Suppress output, except errors"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .help("Increases the log verbosity, can be used up to 3 times")
                .multiple(true),
        )
        .get_matches();

    init_logging(&matches);

    let opts = match extract_options(&matches) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    };

    let images: Vec<PathBuf> = matches
        .values_of("images")
        .map(|v| v.map(PathBuf::from).collect())
        .unwrap_or_default();
    let quiet = matches.is_present("quiet");

    let report = match aes_ctr_image(&matches) {
        Ok(Some(opener)) => run(opener, opts, &images, quiet),
        Ok(None) => run(RawImage, opts, &images, quiet),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    };

    if report.has_failures() {
        process::exit(1);
    }
}

fn init_logging(matches: &ArgMatches) {
    let level = if matches.is_present("quiet") {
        log::LevelFilter::Error
    } else {
        match matches.occurrences_of("verbose") {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .init();
}

fn extract_options(matches: &ArgMatches) -> anyhow::Result<ExtractOptions> {
    let id0 = matches
        .value_of("id0")
        .map(|s| s.parse::<Id0>())
        .transpose()
        .context("invalid --id0")?;

    let output_dir = matches
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    if !output_dir.is_dir() {
        bail!("output directory {} does not exist", output_dir.display());
    }

    Ok(ExtractOptions {
        id0,
        skip_dedup: matches.is_present("skip-duplicate-check"),
        strict: !matches.is_present("force"),
        expected: if matches.is_present("partition-b") {
            ExpectedPartitions::Dual
        } else {
            ExpectedPartitions::Single
        },
        output_dir,
    })
}

fn aes_ctr_image(matches: &ArgMatches) -> anyhow::Result<Option<AesCtrImage>> {
    let (Some(key), Some(ctr)) = (matches.value_of("key"), matches.value_of("ctr")) else {
        return Ok(None);
    };

    let key = hex_str_to_array::<0x10>(key).context("invalid --key")?;
    let ctr = hex_str_to_array::<0x10>(ctr).context("invalid --ctr")?;
    Ok(Some(AesCtrImage::new(key, ctr)))
}

fn print_error(name: impl std::fmt::Display, e: &AutocopyError, strict: bool) {
    if strict && e.is_relaxable() {
        eprintln!("{name}: failed: {e} (--force ignores this)");
    } else {
        eprintln!("{name}: failed: {e}");
    }
}

fn print_image(image: &ImageResult, quiet: bool, strict: bool) {
    let name = image.image.display();

    let report = match &image.result {
        Ok(report) => report,
        Err(e) => return print_error(name, e, strict),
    };

    if !quiet {
        println!("  id0 {} ({:?})", report.id0, report.id0_source);
    }

    for slot in &report.slots {
        let size = humansize::format_size(slot.size, humansize::BINARY);
        match &slot.outcome {
            Ok(WriteOutcome::Written { path, .. }) if !quiet => {
                println!("  {} [{size}] dumped to {}", slot.slot, path.display())
            }
            Ok(WriteOutcome::Duplicate { existing, .. }) if !quiet => println!(
                "  {} [{size}] already dumped as {}, skipping",
                slot.slot,
                existing.display()
            ),
            Ok(_) => {}
            Err(e) => print_error(format_args!("{name}: {}", slot.slot), e, strict),
        }
    }
}

fn run<O: ImageOpener>(
    opener: O,
    opts: ExtractOptions,
    images: &[PathBuf],
    quiet: bool,
) -> BatchReport {
    let strict = opts.strict;
    let extractor = Extractor::new(opener, FatMount, opts);
    let mut report = BatchReport::default();

    for path in images {
        if !quiet {
            println!("Extracting {}...", path.display());
        }
        print_image(extractor.extract_image(path, &mut report), quiet, strict);
    }

    if !quiet {
        println!(
            "{} image(s), {} new dump(s), {} duplicate(s), {} failure(s)",
            report.images.len(),
            report.new_payload_count(),
            report.duplicate_count(),
            report.failures().count()
        );
    }

    report
}
