pub mod analysis;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fragment;
pub mod fs_util;
pub mod genomejp;
pub mod kegg;
pub mod locus;
pub mod neighbors;
pub mod output;
pub mod record;
pub mod store;
pub mod table;
pub mod taxonomy;
pub mod tui;
