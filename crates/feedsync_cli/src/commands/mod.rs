pub(crate) mod history;
pub(crate) mod meta;
pub(crate) mod migrate;
pub(crate) mod mirror;
pub(crate) mod plan;
pub(crate) mod run;
pub(crate) mod shared;
pub(crate) mod sku;
