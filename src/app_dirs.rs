use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/formcheck/history.db`, or the platform data dir.
    pub fn history_db_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("formcheck")
                    .join("history.db"),
            )
        } else {
            ProjectDirs::from("", "", "formcheck")
                .map(|proj_dirs| proj_dirs.data_local_dir().join("history.db"))
        }
    }
}
