use super::Storage;

/// Types that can be parsed out of a [`Storage`], see [`Storage::map_to_storage`].
pub trait FromStorage: Sized {
    type Args;
    type Output;

    fn from_storage(parent: Storage, args: Self::Args) -> Self::Output;
}
