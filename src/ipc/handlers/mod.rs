pub mod bundles;
pub mod core;
pub mod drafts;
pub mod grades;
pub mod reports;
pub mod settings;
