//! Batch extraction of the BOSS save partitions from console storage images.
//!
//! Per image: open the volume, find the first partition, mount it, locate the DISA
//! container, extract its partitions and write them out. A failing image is recorded and
//! the batch carries on with the next one.

pub mod output;
pub mod path;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    common::Id0,
    containers::{
        disa::{Disa, DisaOptions, ExpectedPartitions, ExtractedPartitions, PartitionSlot},
        mbr, Mount,
    },
    image::ImageOpener,
    storage::Storage,
    AutocopyError, AutocopyResult,
};

pub use output::{Fingerprint, OutputWriter, WriteOutcome};
pub use path::{resolve_container, Id0Source};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Use this id0 instead of deriving it.
    pub id0: Option<Id0>,
    /// Write payloads even if an identical file already exists.
    pub skip_dedup: bool,
    /// See [`DisaOptions::strict`].
    pub strict: bool,
    pub expected: ExpectedPartitions,
    pub output_dir: PathBuf,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            id0: None,
            skip_dedup: false,
            strict: true,
            expected: ExpectedPartitions::Single,
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug)]
pub struct SlotOutcome {
    pub slot: PartitionSlot,
    pub size: usize,
    /// What ended up on disk, or why nothing did.
    pub outcome: AutocopyResult<WriteOutcome>,
}

/// Everything found on a volume, before anything is written.
#[derive(Debug, Clone)]
pub struct ExtractedVolume {
    pub id0: Id0,
    pub id0_source: Id0Source,
    pub partitions: ExtractedPartitions,
}

#[derive(Debug)]
pub struct ImageReport {
    pub id0: Id0,
    pub id0_source: Id0Source,
    pub slots: Vec<SlotOutcome>,
}

#[derive(Debug)]
pub struct ImageResult {
    pub image: PathBuf,
    pub result: AutocopyResult<ImageReport>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub images: Vec<ImageResult>,
    /// Payloads written by this batch, per slot and without duplicates.
    pub new_payloads: BTreeMap<PartitionSlot, BTreeMap<Fingerprint, Vec<u8>>>,
}

impl BatchReport {
    /// Every error of the batch: images that failed as a whole, and single payloads that
    /// could not be written.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &AutocopyError)> {
        self.images.iter().flat_map(|i| {
            let errors: Vec<&AutocopyError> = match &i.result {
                Err(e) => vec![e],
                Ok(r) => r
                    .slots
                    .iter()
                    .filter_map(|s| s.outcome.as_ref().err())
                    .collect(),
            };
            errors.into_iter().map(move |e| (i.image.as_path(), e))
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Number of payloads that were skipped because they had been dumped before.
    pub fn duplicate_count(&self) -> usize {
        self.images
            .iter()
            .filter_map(|i| i.result.as_ref().ok())
            .flat_map(|r| &r.slots)
            .filter(|s| matches!(&s.outcome, Ok(o) if o.is_duplicate()))
            .count()
    }

    pub fn new_payload_count(&self) -> usize {
        self.new_payloads.values().map(BTreeMap::len).sum()
    }
}

pub struct Extractor<O, M> {
    opener: O,
    mount: M,
    opts: ExtractOptions,
    writer: OutputWriter,
}

impl<O: ImageOpener, M: Mount> Extractor<O, M> {
    pub fn new(opener: O, mount: M, opts: ExtractOptions) -> Self {
        Self {
            writer: OutputWriter::new(&opts.output_dir),
            opener,
            mount,
            opts,
        }
    }

    fn disa_options(&self) -> DisaOptions {
        DisaOptions {
            strict: self.opts.strict,
            expected: self.opts.expected,
        }
    }

    /// Runs everything but the output step on a decrypted volume.
    pub fn extract_volume(&self, volume: &Storage) -> AutocopyResult<ExtractedVolume> {
        let (_, partition) = mbr::open_first_partition(volume)?;
        let fs = self.mount.mount(partition)?;

        let container = resolve_container(fs.as_ref(), self.opts.id0)?;
        log::info!("id0 = {} ({:?})", container.id0, container.source);

        let partitions = container
            .storage
            .map_to_storage::<Disa>(self.disa_options())?
            .extract()?;

        Ok(ExtractedVolume {
            id0: container.id0,
            id0_source: container.source,
            partitions,
        })
    }

    fn process_image(
        &self,
        image: &Path,
        new_payloads: &mut BTreeMap<PartitionSlot, BTreeMap<Fingerprint, Vec<u8>>>,
    ) -> AutocopyResult<ImageReport> {
        let volume = self.opener.open_image(image)?;
        let extracted = self.extract_volume(&volume)?;

        let mut report = ImageReport {
            id0: extracted.id0,
            id0_source: extracted.id0_source,
            slots: Vec::new(),
        };

        // slots are written independently so the report always matches what is on disk
        for (slot, payload) in extracted.partitions.into_slots() {
            let size = payload.len();
            let outcome = self
                .writer
                .write(slot.file_name(), &payload, self.opts.skip_dedup);

            match &outcome {
                Ok(WriteOutcome::Written { fingerprint, .. }) => {
                    new_payloads
                        .entry(slot)
                        .or_default()
                        .entry(*fingerprint)
                        .or_insert(payload);
                }
                Ok(WriteOutcome::Duplicate { .. }) => {}
                Err(e) => log::error!("{}: writing {slot} failed: {e}", image.display()),
            }

            report.slots.push(SlotOutcome {
                slot,
                size,
                outcome,
            });
        }

        Ok(report)
    }

    /// Processes a single image and appends its result to `batch`.
    pub fn extract_image<'a>(&self, image: &Path, batch: &'a mut BatchReport) -> &'a ImageResult {
        log::info!("extracting {}", image.display());

        let result = self.process_image(image, &mut batch.new_payloads);
        if let Err(e) = &result {
            log::error!("{}: {e}", image.display());
        }

        let idx = batch.images.len();
        batch.images.push(ImageResult {
            image: image.to_path_buf(),
            result,
        });
        &batch.images[idx]
    }

    /// Processes every image in order. Never stops early, failures end up in the report.
    pub fn run<I, P>(&self, images: I) -> BatchReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut batch = BatchReport::default();
        for image in images {
            self.extract_image(image.as_ref(), &mut batch);
        }
        batch
    }
}
