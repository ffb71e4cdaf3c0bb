pub(crate) mod construct;
pub(crate) mod error;
pub(crate) mod free_list;
pub(crate) mod heap;
pub(crate) mod integration;
pub(crate) mod ledger;
pub(crate) mod pool;
pub(crate) mod region;
pub(crate) mod size_class;
pub(crate) mod stats;
pub(crate) mod typed;
