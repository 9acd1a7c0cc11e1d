//! Save one PDF per student identifier from a line-oriented instruction file.
//!
//! Leaf modules first: [`size`] and [`script`] parse user input, [`target`] and
//! [`reconcile`] decide what happens to each output file, [`fetch`] renders
//! pages through a headless browser, and [`run`] ties them together.

pub mod config;
pub mod logging;

pub mod fetch;
pub mod reconcile;
pub mod run;
pub mod script;
pub mod size;
pub mod storage;
pub mod target;
