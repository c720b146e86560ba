//! Application identity constants shared by storage and logging.

pub const APP_NAME: &str = "ArtBot";
pub const APP_CONFIG_DIR_NAME: &str = "artbot";
pub const APP_STORAGE_PREFIX: &str = "artbot";
pub const APP_LOG_TARGET: &str = "artbot_inpaint";
