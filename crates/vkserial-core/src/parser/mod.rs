//! HTML parsers for vkserial
//!
//! Contains modules for parsing the catalog and hosting pages.

pub mod catalog;
pub mod hosting;

pub use catalog::{filter_links, parse_catalog, parse_episode_link};
pub use hosting::{HostingPayload, extract_embedded_script, parse_hosting_page};
