//! Handing freshly dumped payloads to whatever archives them.

use crate::{
    containers::disa::PartitionSlot,
    extract::{BatchReport, Fingerprint},
};

/// Destination for new payloads. No network client ships with this crate.
pub trait Uploader {
    fn upload(&self, slot: PartitionSlot, payload: &[u8]) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct UploadFailure {
    pub slot: PartitionSlot,
    pub fingerprint: Fingerprint,
    pub error: anyhow::Error,
}

/// Uploads every payload the batch wrote, once per distinct content, and returns the
/// ones that failed.
pub fn upload_new_payloads(report: &BatchReport, uploader: &dyn Uploader) -> Vec<UploadFailure> {
    let mut failures = Vec::new();

    for (slot, payloads) in &report.new_payloads {
        for (fingerprint, payload) in payloads {
            log::info!("uploading {slot} ({fingerprint})");

            if let Err(error) = uploader.upload(*slot, payload) {
                log::error!("uploading {slot} ({fingerprint}) failed: {error:#}");
                failures.push(UploadFailure {
                    slot: *slot,
                    fingerprint: *fingerprint,
                    error,
                });
            }
        }
    }

    failures
}
