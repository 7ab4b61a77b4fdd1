mod ctr;

pub use self::ctr::AesCtrStorage;
