//! Locating the BOSS save container inside CTRNAND.

use crate::{
    common::{Id0, KeyY},
    containers::FileSystem,
    storage::Storage,
    AutocopyError, AutocopyResult,
};

pub const MOVABLE_SED_PATH: &str = "/private/movable.sed";
pub const KEY_Y_OFFSET: u64 = 0x110;
pub const DATA_DIR: &str = "/data";

pub fn container_path(id0: &Id0) -> String {
    format!("{DATA_DIR}/{id0}/sysdata/00010034/00000000")
}

/// How the id0 used for a container was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id0Source {
    Explicit,
    MovableSed,
    /// first entry of `/data`
    DataDirectory,
}

#[derive(Debug)]
pub struct ResolvedContainer {
    pub id0: Id0,
    pub source: Id0Source,
    pub storage: Storage,
}

/// Reads the key material out of `movable.sed` and derives the id0 from it.
pub fn id0_from_movable_sed(fs: &dyn FileSystem) -> AutocopyResult<Id0> {
    let unavailable = |e: AutocopyError| {
        AutocopyError::KeyMaterialUnavailable(format!("{MOVABLE_SED_PATH}: {e}"))
    };

    let movable = fs.open_file(MOVABLE_SED_PATH).map_err(unavailable)?;
    let mut key_y: KeyY = [0; 0x10];
    movable
        .read_exact_at(KEY_Y_OFFSET, &mut key_y)
        .map_err(unavailable)?;

    Ok(Id0::derive(&key_y))
}

/// Takes the first entry of `/data` as the id0. Consoles only ever have one.
pub fn id0_from_data_dir(fs: &dyn FileSystem) -> AutocopyResult<Id0> {
    let unavailable = |e: String| AutocopyError::KeyMaterialUnavailable(format!("{DATA_DIR}: {e}"));

    let entries = fs.read_dir(DATA_DIR).map_err(|e| unavailable(e.to_string()))?;
    let first = entries
        .first()
        .ok_or_else(|| unavailable("directory is empty".into()))?;

    first.parse().map_err(|e: AutocopyError| unavailable(e.to_string()))
}

fn open_container(
    fs: &dyn FileSystem,
    id0: Id0,
    source: Id0Source,
) -> AutocopyResult<ResolvedContainer> {
    let path = container_path(&id0);
    log::debug!("opening {path} (id0 from {source:?})");

    let storage = fs.open_file(&path).map_err(|e| match e {
        AutocopyError::PathNotFound(_) => AutocopyError::PathNotFound(path),
        e => e,
    })?;

    Ok(ResolvedContainer {
        id0,
        source,
        storage,
    })
}

/// Opens `/data/<id0>/sysdata/00010034/00000000`.
///
/// An explicit id0 is used as is. Otherwise it is derived from `movable.sed`, and if that
/// is missing, or the derived id0 has no container, the first directory in `/data` is
/// used instead.
pub fn resolve_container(
    fs: &dyn FileSystem,
    explicit: Option<Id0>,
) -> AutocopyResult<ResolvedContainer> {
    if let Some(id0) = explicit {
        return open_container(fs, id0, Id0Source::Explicit);
    }

    let primary_err = match id0_from_movable_sed(fs) {
        Ok(id0) => match open_container(fs, id0, Id0Source::MovableSed) {
            Err(e @ AutocopyError::PathNotFound(_)) => e,
            res => return res,
        },
        Err(e @ AutocopyError::KeyMaterialUnavailable(_)) => e,
        Err(e) => return Err(e),
    };

    log::warn!("{primary_err}, falling back to the first entry of {DATA_DIR}");

    let id0 = match id0_from_data_dir(fs) {
        Ok(id0) => id0,
        // report what went wrong with the primary id0 rather than the fallback
        Err(_) if matches!(primary_err, AutocopyError::PathNotFound(_)) => return Err(primary_err),
        Err(e) => return Err(e),
    };

    open_container(fs, id0, Id0Source::DataDirectory)
}
