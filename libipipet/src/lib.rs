//! # libipipet
//!
//! libipipet is the core of iPipet, a tool that guides manual pipetting over a physical
//! microplate one step at a time. A user uploads a CSV describing pooling steps (source
//! plate/well to destination plate/well, with an optional volume and specimen name), and
//! the steps are then shown on a tablet placed under the plate, highlighting the wells of
//! each transfer in order.
//!
//! ## Plating CSV Format
//!
//! The first row of the file is always a header and is skipped, whatever it contains. Every
//! other row is one step:
//!
//! ```csv
//! source plate,source well,destination plate,destination well,volume,specimen name
//! ```
//!
//! The first four columns are required. Wells are given as 1-based numbers (1-96 or 1-384)
//! which run down the rows first, so on a 96-well plate well 9 is `A02`. Volume and specimen
//! name are optional, but a specimen name is only read when a volume is present.
//!
//! Files exported from different spreadsheet programs are accepted: the delimiter (`,`, tab,
//! `;` or `|`) and quote character are guessed from the first kilobyte, and any newline
//! convention is understood.
//!
//! A single bad row rejects the whole file. Errors report the line number of the offending
//! row so that the spreadsheet can be fixed.
//!
//! ## Output
//!
//! Each step is serialized as a fixed-position array consumed by the run page:
//!
//! ```text
//! [step, src plate, src well number, src well name, dest plate, dest well number, dest well name, (volume), (specimen)]
//! ```
//!
//! and a whole run as `{"data": [[...], ...]}`.
//!
//! ## Storage
//!
//! Uploaded designs are kept in the configured upload directory as the original CSV plus a
//! JSON sidecar with the design metadata. Designs that are shared are also added to a
//! community list next to them. The YAML format of a configuration file is as follows:
//!
//! ```yml
//! upload_path: ./uploads
//! max_upload_bytes: 16777216
//! base_url: http://localhost:5000
//! default_shared_designs:
//! - description: 96-Wells, Single-Channel Demo
//!   id: demolnk1
//!   plate_type: 96
//!   pipet_type: single
//! ```
pub mod community;
pub mod config;
pub mod design;
pub mod dialect;
pub mod error;
pub mod plate;
pub mod plating;
pub mod run_options;
pub mod store;
